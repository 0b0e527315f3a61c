//! 应用 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责资源管理和页面上下文的调度。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：会话日志、连接（或启动）浏览器、打开状态文件
//! 2. **协调器**：启动唯一的同步协调器，用环境变量中的 API key 补充设置
//! 3. **页面接入**：为目标站点的每个标签页接入一个教程引擎，之后新打开的同站标签页自动接入
//! 4. **命令循环**：从标准输入读取命令，经协调器发给一个页面上下文
//!    （默认最近接入的标签页，`tab <n> <命令>` 指定标签页）
//! 5. **资源释放**：Ctrl-C / quit 时通知所有引擎 `dispose()` 并等待退出
//!
//! ## 设计特点
//!
//! - **资源所有者**：唯一持有 Browser 的模块
//! - **向下委托**：单个标签页的组装委托给 `page_processor`

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chromiumoxide::cdp::browser_protocol::target::{
    EventTargetCreated, EventTargetDestroyed, EventTargetInfoChanged, TargetId, TargetInfo,
};
use chromiumoxide::{Browser, Page};
use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::browser;
use crate::config::Config;
use crate::infrastructure::{JsonFileStore, KeyValueStore};
use crate::orchestrator::page_processor::{self, AttachedPage};
use crate::services::{GuidanceResolver, LlmGuidance};
use crate::sync::{Coordinator, CoordinatorHandle, TutorialCommand};
use crate::utils::logging::{
    append_log_line, init_log_file, log_contexts_attached, log_startup, log_state_summary,
    print_shutdown,
};

/// 新标签页在浏览器里完成接入前，`get_page` 可能暂时找不到它
const NEW_PAGE_ATTEMPTS: usize = 5;

/// 已接入的标签页
struct Tab {
    target: TargetId,
    page: AttachedPage,
}

/// 运行期间的标签页集合
struct Tabs {
    tabs: Vec<Tab>,
    next_index: usize,
    guidance: Arc<dyn GuidanceResolver>,
    shutdown: watch::Receiver<bool>,
}

impl Tabs {
    fn knows(&self, target: &TargetId) -> bool {
        self.tabs.iter().any(|tab| &tab.target == target)
    }

    fn indices(&self) -> Vec<usize> {
        self.tabs.iter().map(|tab| tab.page.ctx.page_index).collect()
    }
}

/// 应用主结构
pub struct App {
    config: Config,
    browser: Browser,
    pages: Vec<Page>,
    coordinator: CoordinatorHandle,
    coordinator_task: JoinHandle<()>,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        // 初始化日志文件
        init_log_file(&config.output_log_file)?;

        log_startup(&config);

        // 连接浏览器
        let (browser, pages) = if config.headless {
            let (browser, page) = browser::launch_headless_browser(
                &config.target_url,
                config.browser_executable.as_deref(),
            )
            .await?;
            (browser, vec![page])
        } else {
            browser::connect_to_browser_and_pages(config.browser_debug_port, &config.target_url)
                .await?
        };

        // 状态文件与协调器
        let store: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::open(&config.state_file).await?);
        let (coordinator, coordinator_task) = Coordinator::spawn(store).await;

        let mut settings = coordinator.get_settings().await?;
        if config.seed_settings(&mut settings) {
            info!("🔑 已用环境变量补充 API key");
            coordinator.update_settings(settings).await?;
        }

        Ok(Self {
            config,
            browser,
            pages,
            coordinator,
            coordinator_task,
        })
    }

    /// 运行应用主逻辑
    pub async fn run(self) -> Result<()> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut tabs = Tabs {
            tabs: Vec::new(),
            next_index: 1,
            guidance: Arc::new(LlmGuidance::new(&self.config)),
            shutdown: shutdown_rx,
        };

        // 接入所有标签页
        for page in self.pages.clone() {
            self.attach(&mut tabs, page).await;
        }

        if tabs.tabs.is_empty() {
            warn!("⚠️ 没有可用的页面上下文，程序结束");
            return Ok(());
        }
        log_contexts_attached(tabs.tabs.len(), &browser::origin_of(&self.config.target_url));

        self.command_loop(&mut tabs).await?;

        // 通知所有引擎释放资源
        let _ = shutdown_tx.send(true);
        let contexts = tabs.tabs.len();
        for tab in tabs.tabs {
            if let Err(e) = tab.page.handle.await {
                error!("{} 事件循环异常退出: {}", tab.page.ctx, e);
            }
        }

        drop(self.coordinator);
        let _ = self.coordinator_task.await;

        print_shutdown(contexts, &self.config.output_log_file);
        Ok(())
    }

    async fn attach(&self, tabs: &mut Tabs, page: Page) {
        let page_index = tabs.next_index;
        tabs.next_index += 1;
        let target = page.target_id().clone();
        match page_processor::attach_page(
            page,
            page_index,
            self.coordinator.clone(),
            tabs.guidance.clone(),
            &self.config,
            tabs.shutdown.clone(),
        )
        .await
        {
            Ok(page) => tabs.tabs.push(Tab { target, page }),
            Err(e) => error!("[页面 {}] ❌ 接入失败: {:#}", page_index, e),
        }
    }

    /// 新建或跳转后的标签页落在目标站点上时接入
    async fn on_target(&self, tabs: &mut Tabs, info: &TargetInfo) {
        if info.r#type != "page" || tabs.knows(&info.target_id) {
            return;
        }
        if browser::origin_of(&info.url) != browser::origin_of(&self.config.target_url) {
            return;
        }

        for attempt in 1..=NEW_PAGE_ATTEMPTS {
            match self.browser.get_page(info.target_id.clone()).await {
                Ok(page) => {
                    info!("🆕 发现新的目标站点标签页: {}", info.url);
                    self.attach(tabs, page).await;
                    return;
                }
                Err(e) => {
                    debug!("获取新标签页失败 (第 {} 次): {}", attempt, e);
                    tokio::time::sleep(Duration::from_millis(200)).await;
                }
            }
        }
        warn!("⚠️ 无法接入新标签页: {}", info.url);
    }

    fn on_target_destroyed(&self, tabs: &mut Tabs, target: &TargetId) {
        if let Some(pos) = tabs.tabs.iter().position(|tab| &tab.target == target) {
            let tab = tabs.tabs.remove(pos);
            info!("{} 标签页已关闭", tab.page.ctx);
            tab.page.handle.abort();
        }
    }

    /// 读取标准输入命令，直到 quit / EOF / Ctrl-C
    async fn command_loop(&self, tabs: &mut Tabs) -> Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut created = self.browser.event_listener::<EventTargetCreated>().await?;
        let mut changed = self.browser.event_listener::<EventTargetInfoChanged>().await?;
        let mut destroyed = self.browser.event_listener::<EventTargetDestroyed>().await?;

        loop {
            let line = tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("\n收到 Ctrl-C，正在退出...");
                    break;
                }
                Some(event) = created.next() => {
                    self.on_target(tabs, &event.target_info).await;
                    continue;
                }
                Some(event) = changed.next() => {
                    self.on_target(tabs, &event.target_info).await;
                    continue;
                }
                Some(event) = destroyed.next() => {
                    self.on_target_destroyed(tabs, &event.target_id);
                    continue;
                }
                line = lines.next_line() => line?,
            };

            let Some(line) = line else {
                break;
            };
            let input = line.trim();
            if input.is_empty() {
                continue;
            }

            match input {
                "quit" | "exit" | "q" => break,
                "status" => self.print_status(tabs).await,
                "tabs" => {
                    for tab in &tabs.tabs {
                        info!("{} 上下文 #{} ({})", tab.page.ctx, tab.page.context, tab.page.ctx.origin);
                    }
                }
                _ => match parse_console_command(input) {
                    Some((tab, command)) => self.dispatch(tabs, tab, command).await?,
                    None => warn!("⚠️ 未知命令: {}", input),
                },
            }
        }
        Ok(())
    }

    /// 把命令发给一个标签页：指定序号，或者最近接入的那个
    async fn dispatch(
        &self,
        tabs: &Tabs,
        tab: Option<usize>,
        command: TutorialCommand,
    ) -> Result<()> {
        let Some(pos) = pick_tab(&tabs.indices(), tab) else {
            match tab {
                Some(index) => warn!("⚠️ 没有序号为 {} 的标签页", index),
                None => warn!("⚠️ 没有已接入的标签页"),
            }
            return Ok(());
        };
        let page = &tabs.tabs[pos].page;
        match self.coordinator.send_command_to(page.context, command).await {
            Ok(()) => {
                info!("➡️ {:?} 已发送到 {}", command, page.ctx);
                if let Err(e) = append_log_line(
                    &self.config.output_log_file,
                    &format!("{:?} → 页面 {}", command, page.ctx.page_index),
                ) {
                    warn!("⚠️ 写入会话日志失败: {}", e);
                }
            }
            Err(e) => warn!("⚠️ {} 发送命令失败: {}", page.ctx, e),
        }
        Ok(())
    }

    async fn print_status(&self, tabs: &Tabs) {
        let sites: BTreeSet<&str> = tabs.tabs.iter().map(|t| t.page.ctx.site_id.as_str()).collect();
        for site_id in sites {
            match self.coordinator.get_state(site_id).await {
                Ok(Some(state)) => log_state_summary(site_id, &state),
                Ok(None) => info!("📊 站点 {} 还没有教程状态", site_id),
                Err(e) => warn!("⚠️ 读取站点 {} 状态失败: {}", site_id, e),
            }
            if let Ok(Some(progress)) = self.coordinator.get_progress(site_id).await {
                info!(
                    "完成度: {}%{}",
                    progress.completion_percentage,
                    if progress.is_completed { " ✓" } else { "" }
                );
            }
        }
    }
}

/// 解析控制台输入，`tab <n> <命令>` 指定标签页序号
fn parse_console_command(input: &str) -> Option<(Option<usize>, TutorialCommand)> {
    let mut words = input.split_whitespace();
    if words.next()?.eq_ignore_ascii_case("tab") {
        let index = words.next()?.parse().ok()?;
        let rest: Vec<&str> = words.collect();
        let command = TutorialCommand::parse(&rest.join(" "))?;
        return Some((Some(index), command));
    }
    TutorialCommand::parse(input).map(|command| (None, command))
}

/// 在已接入标签页的序号中挑出目标位置；未指定时取最后接入的
fn pick_tab(indices: &[usize], tab: Option<usize>) -> Option<usize> {
    match tab {
        Some(index) => indices.iter().position(|&i| i == index),
        None => indices.len().checked_sub(1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_command_with_tab_prefix() {
        assert_eq!(parse_console_command("next"), Some((None, TutorialCommand::Next)));
        assert_eq!(
            parse_console_command("tab 2 start"),
            Some((Some(2), TutorialCommand::Start))
        );
        assert_eq!(
            parse_console_command("TAB 1 intro-accept"),
            Some((Some(1), TutorialCommand::AcceptIntroduction))
        );
        assert_eq!(parse_console_command("tab x next"), None);
        assert_eq!(parse_console_command("tab 2"), None);
        assert_eq!(parse_console_command("dance"), None);
    }

    #[test]
    fn test_pick_tab_defaults_to_latest() {
        assert_eq!(pick_tab(&[1, 2, 4], None), Some(2));
        assert_eq!(pick_tab(&[1, 2, 4], Some(4)), Some(2));
        assert_eq!(pick_tab(&[1, 2, 4], Some(1)), Some(0));
        assert_eq!(pick_tab(&[1, 2, 4], Some(3)), None);
        assert_eq!(pick_tab(&[], None), None);
    }
}
