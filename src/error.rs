//! 错误类型
//!
//! 每个边界一个错误枚举，最终汇总为 [`TutorError`]。
//! 引擎内部的错误一律在边界处记录并降级，不会抛给宿主页面。

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum TutorError {
    /// 页面 / DOM 相关错误
    #[error("页面错误: {0}")]
    Dom(#[from] DomError),
    /// 跨上下文同步错误
    #[error("同步错误: {0}")]
    Sync(#[from] SyncError),
    /// 持久化存储错误
    #[error("存储错误: {0}")]
    Storage(#[from] StorageError),
    /// 引导文本生成错误
    #[error("引导文本错误: {0}")]
    Guidance(#[from] GuidanceError),
    /// 语音播报错误
    #[error("语音错误: {0}")]
    Voice(#[from] VoiceError),
    /// 教程流程错误
    #[error("教程错误: {0}")]
    Tutorial(#[from] TutorialFault),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
}

/// 页面 / DOM 相关错误
#[derive(Debug, Error)]
pub enum DomError {
    /// 在页面中执行脚本失败
    #[error("执行脚本失败: {source}")]
    ScriptFailed {
        #[source]
        source: BoxError,
    },
    /// 脚本返回值无法解析
    #[error("脚本返回值解析失败: {source}")]
    Decode {
        #[source]
        source: serde_json::Error,
    },
    /// 选择器无法解析
    #[error("无效的选择器: {selector}")]
    InvalidSelector { selector: String },
}

/// 跨上下文同步错误
#[derive(Debug, Error)]
pub enum SyncError {
    /// 协调器任务已经退出
    #[error("协调器已关闭")]
    CoordinatorClosed,
    /// 协调器拒绝了请求
    #[error("协调器拒绝请求: {message}")]
    Rejected { message: String },
    /// 响应数据无法解析
    #[error("响应数据解析失败: {source}")]
    Payload {
        #[source]
        source: serde_json::Error,
    },
}

/// 持久化存储错误
#[derive(Debug, Error)]
pub enum StorageError {
    /// 读写文件失败
    #[error("读写存储文件失败 ({path}): {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 序列化 / 反序列化失败
    #[error("存储数据序列化失败: {source}")]
    Serde {
        #[source]
        source: serde_json::Error,
    },
}

/// 引导文本生成错误
#[derive(Debug, Error)]
pub enum GuidanceError {
    /// 没有配置可用的 provider
    #[error("未配置引导文本 provider")]
    NotConfigured,
    /// 请求超时
    #[error("引导文本请求超时 ({timeout_ms}ms)")]
    Timeout { timeout_ms: u64 },
    /// provider 调用失败
    #[error("{provider} 调用失败: {source}")]
    Provider {
        provider: String,
        #[source]
        source: BoxError,
    },
    /// provider 返回非成功状态
    #[error("{provider} 返回错误状态: {status}")]
    BadStatus { provider: String, status: u16 },
    /// provider 返回空内容
    #[error("{provider} 返回内容为空")]
    EmptyContent { provider: String },
}

/// 语音播报错误
#[derive(Debug, Error)]
pub enum VoiceError {
    #[error("语音合成失败: {source}")]
    Synthesis {
        #[source]
        source: BoxError,
    },
}

/// 教程流程错误
#[derive(Debug, Error)]
pub enum TutorialFault {
    /// 选择器没有找到元素
    #[error("未找到目标元素: {selector}")]
    TargetNotFound { selector: String },
    /// 页面上没有可用的交互元素
    #[error("页面上没有可用的教程步骤")]
    DiscoveryEmpty,
    /// 两个高亮会话同时存在
    #[error("高亮会话未完全清理: {highlights} 个高亮, {tooltips} 个提示框")]
    TeardownViolation { highlights: usize, tooltips: usize },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 步骤文件解析失败
    #[error("步骤文件解析失败 ({path}): {source}")]
    StepFileParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

// ========== 便捷构造函数 ==========

impl DomError {
    /// 包装脚本执行错误
    pub fn script(source: impl Into<BoxError>) -> Self {
        DomError::ScriptFailed {
            source: source.into(),
        }
    }
}

impl GuidanceError {
    /// 创建 provider 调用失败错误
    pub fn provider(
        provider: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        GuidanceError::Provider {
            provider: provider.into(),
            source: Box::new(source),
        }
    }
}

impl From<serde_json::Error> for DomError {
    fn from(err: serde_json::Error) -> Self {
        DomError::Decode { source: err }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serde { source: err }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Payload { source: err }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type Result<T> = std::result::Result<T, TutorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_chains_category() {
        let err: TutorError = TutorialFault::TargetNotFound {
            selector: "#missing".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "教程错误: 未找到目标元素: #missing");
    }

    #[test]
    fn test_teardown_violation_message() {
        let err = TutorialFault::TeardownViolation {
            highlights: 2,
            tooltips: 1,
        };
        assert!(err.to_string().contains("2 个高亮"));
    }
}
