use std::str::FromStr;

use tracing::warn;

use crate::error::ConfigError;
use crate::models::Settings;

/// 程序配置
///
/// 进程级别的配置，来自环境变量，缺省时使用默认值。
/// 用户偏好（语言、语音、API key 等）保存在 [`Settings`] 中并由协调器持久化。
#[derive(Clone, Debug)]
pub struct Config {
    /// 浏览器调试端口
    pub browser_debug_port: u16,
    /// 目标站点 URL
    pub target_url: String,
    /// 是否启动无头浏览器（否则连接已打开的浏览器）
    pub headless: bool,
    /// 无头模式下的浏览器可执行文件
    pub browser_executable: Option<String>,
    /// 教程状态存储文件
    pub state_file: String,
    /// 自定义步骤 TOML 文件目录
    pub steps_folder: String,
    /// 输出日志文件
    pub output_log_file: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 页面事件轮询间隔（毫秒）
    pub page_poll_interval_ms: u64,
    /// 引导文本请求超时（毫秒）
    pub guidance_timeout_ms: u64,
    // --- 引导文本 provider 配置 ---
    pub openrouter_api_base_url: String,
    pub openrouter_model_name: String,
    pub gemini_api_base_url: String,
    pub gemini_model_name: String,
    /// 仅用于在设置中没有 key 时补充
    pub openrouter_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            browser_debug_port: 9222,
            target_url: "https://github.com".to_string(),
            headless: false,
            browser_executable: None,
            state_file: "tutor_state.json".to_string(),
            steps_folder: "tutorial_steps".to_string(),
            output_log_file: "tutor_session.log".to_string(),
            verbose_logging: false,
            page_poll_interval_ms: 50,
            guidance_timeout_ms: 8000,
            openrouter_api_base_url: "https://openrouter.ai/api/v1".to_string(),
            openrouter_model_name: "anthropic/claude-3-haiku".to_string(),
            gemini_api_base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            gemini_model_name: "gemini-pro".to_string(),
            openrouter_api_key: None,
            gemini_api_key: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            browser_debug_port: env_parse("BROWSER_DEBUG_PORT", default.browser_debug_port),
            target_url: std::env::var("TARGET_URL").unwrap_or(default.target_url),
            headless: env_parse("HEADLESS", default.headless),
            browser_executable: std::env::var("BROWSER_EXECUTABLE").ok().or(default.browser_executable),
            state_file: std::env::var("STATE_FILE").unwrap_or(default.state_file),
            steps_folder: std::env::var("STEPS_FOLDER").unwrap_or(default.steps_folder),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(default.output_log_file),
            verbose_logging: env_parse("VERBOSE_LOGGING", default.verbose_logging),
            page_poll_interval_ms: env_parse("PAGE_POLL_INTERVAL_MS", default.page_poll_interval_ms),
            guidance_timeout_ms: env_parse("GUIDANCE_TIMEOUT_MS", default.guidance_timeout_ms),
            openrouter_api_base_url: std::env::var("OPENROUTER_API_BASE_URL").unwrap_or(default.openrouter_api_base_url),
            openrouter_model_name: std::env::var("OPENROUTER_MODEL_NAME").unwrap_or(default.openrouter_model_name),
            gemini_api_base_url: std::env::var("GEMINI_API_BASE_URL").unwrap_or(default.gemini_api_base_url),
            gemini_model_name: std::env::var("GEMINI_MODEL_NAME").unwrap_or(default.gemini_model_name),
            openrouter_api_key: std::env::var("OPENROUTER_API_KEY").ok().or(default.openrouter_api_key),
            gemini_api_key: std::env::var("GEMINI_API_KEY").ok().or(default.gemini_api_key),
        }
    }

    /// 用环境变量中的 API key 补充设置中缺失的 key
    pub fn seed_settings(&self, settings: &mut Settings) -> bool {
        let mut changed = false;
        if settings.open_router_api_key.is_none() {
            if let Some(key) = &self.openrouter_api_key {
                settings.open_router_api_key = Some(key.clone());
                changed = true;
            }
        }
        if settings.gemini_api_key.is_none() {
            if let Some(key) = &self.gemini_api_key {
                settings.gemini_api_key = Some(key.clone());
                changed = true;
            }
        }
        changed
    }
}

/// 读取并解析环境变量；无法解析时记录警告并使用默认值
fn env_parse<T: FromStr>(var_name: &str, default: T) -> T {
    let Ok(value) = std::env::var(var_name) else {
        return default;
    };
    match parse_value(var_name, &value) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("⚠️ {}，使用默认值", e);
            default
        }
    }
}

fn parse_value<T: FromStr>(var_name: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::EnvVarParseFailed {
            var_name: var_name.to_string(),
            value: value.to_string(),
            expected_type: std::any::type_name::<T>().to_string(),
        })
}
