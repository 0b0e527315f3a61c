use anyhow::Result;
/// 日志工具模块
///
/// 提供日志初始化、格式化和输出的辅助函数
use std::fs;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::models::TutorialState;

/// 初始化 tracing 订阅者
///
/// 优先使用 `RUST_LOG`，否则按 `verbose` 选择 debug / info。
/// 重复调用是安全的（测试里会多次调用）。
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init();
}

/// 初始化会话日志文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径
pub fn init_log_file(log_file_path: &str) -> Result<()> {
    let log_header = format!(
        "{}\n教程会话日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)?;
    Ok(())
}

/// 向会话日志文件追加一行（带时间戳）
pub fn append_log_line(log_file_path: &str, line: &str) -> Result<()> {
    use std::io::Write;

    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file_path)?;
    writeln!(
        file,
        "[{}] {}",
        chrono::Local::now().format("%H:%M:%S"),
        line
    )?;
    Ok(())
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 页面引导模式");
    info!("🌐 目标站点: {}", config.target_url);
    if config.headless {
        info!("🖥️  浏览器: 无头模式");
    } else {
        info!("🖥️  浏览器: 连接调试端口 {}", config.browser_debug_port);
    }
    info!("💾 状态文件: {}", config.state_file);
    info!("📁 自定义步骤目录: {}", config.steps_folder);
    info!("{}", "=".repeat(60));
}

/// 记录页面上下文接入信息
pub fn log_contexts_attached(count: usize, origin: &str) {
    info!("✓ 已接入 {} 个页面上下文 ({})", count, origin);
    info!("💡 输入 start / next / prev / stop / skip / reset / status / quit\n");
}

/// 打印教程状态摘要
pub fn log_state_summary(site_id: &str, state: &TutorialState) {
    info!("\n{}", "─".repeat(60));
    info!("📊 站点 {} 的教程状态", site_id);
    info!("阶段: {:?}", state.phase);
    if state.total_steps > 0 {
        info!(
            "进度: 第 {}/{} 步, 已完成 {} 步",
            state.current_step + 1,
            state.total_steps,
            state.completed_steps.len()
        );
    }
    if let Some(session_id) = &state.session_id {
        info!("会话: {}", session_id);
    }
    info!("{}", "─".repeat(60));
}

/// 打印退出信息
pub fn print_shutdown(contexts: usize, log_file_path: &str) {
    info!("\n{}", "=".repeat(60));
    info!("👋 程序退出");
    info!(
        "退出时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("已释放 {} 个页面上下文", contexts);
    info!("{}", "=".repeat(60));
    info!("\n日志已保存至: {}", log_file_path);
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text_counts_chars() {
        assert_eq!(truncate_text("你好世界", 2), "你好...");
        assert_eq!(truncate_text("short", 10), "short");
    }

    #[test]
    fn test_log_file_header_and_append() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.log");
        let path = path.to_str().unwrap();

        init_log_file(path).unwrap();
        append_log_line(path, "started").unwrap();

        let content = fs::read_to_string(path).unwrap();
        assert!(content.contains("教程会话日志"));
        assert!(content.trim_end().ends_with("started"));
    }
}
