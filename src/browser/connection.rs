use anyhow::Result;
use chromiumoxide::{Browser, Page};
use futures::StreamExt;
use tokio::time::sleep;
use tracing::{debug, error, info};

/// 连接到浏览器，返回所有属于目标站点的标签页
///
/// 没有匹配的标签页时新建一个并导航到 `target_url`。
pub async fn connect_to_browser_and_pages(
    port: u16,
    target_url: &str,
) -> Result<(Browser, Vec<Page>)> {
    let browser_url = format!("http://localhost:{}", port);
    info!("正在连接到浏览器: {}", browser_url);
    debug!("目标 URL: {}", target_url);

    let (browser, mut handler) = Browser::connect(&browser_url).await.map_err(|e| {
        error!("连接浏览器失败: {}", e);
        e
    })?;
    debug!("浏览器连接成功");

    // 在后台处理浏览器事件
    tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });

    // 添加短暂延迟以等待浏览器状态同步
    sleep(tokio::time::Duration::from_millis(300)).await;

    let pages = browser.pages().await?;
    debug!("获取到 {} 个页面", pages.len());

    let origin = origin_of(target_url);
    let mut matched = Vec::new();
    for p in pages {
        if let Ok(Some(url)) = p.url().await {
            debug!("检查页面: {}", url);
            if origin_of(&url) == origin {
                info!("✓ 找到目标站点标签页: {}", url);
                matched.push(p);
            }
        }
    }

    if matched.is_empty() {
        debug!("未找到匹配的标签页，创建新页面并导航到: {}", target_url);
        let page = browser.new_page("about:blank").await.map_err(|e| {
            error!("创建新页面失败: {}", e);
            e
        })?;
        page.goto(target_url).await.map_err(|e| {
            error!("导航到 {} 失败: {}", target_url, e);
            e
        })?;
        info!("已导航到: {}", target_url);
        matched.push(page);
    }

    Ok((browser, matched))
}

/// 取 URL 的 `scheme://host[:port]` 部分
pub fn origin_of(url: &str) -> String {
    let (scheme, rest) = match url.split_once("://") {
        Some(parts) => parts,
        None => return url.to_string(),
    };
    let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
    format!("{}://{}", scheme.to_ascii_lowercase(), host.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_of() {
        assert_eq!(origin_of("https://GitHub.com/rust-lang/rust?tab=1"), "https://github.com");
        assert_eq!(origin_of("http://localhost:8080#top"), "http://localhost:8080");
        assert_eq!(origin_of("about:blank"), "about:blank");
    }
}
