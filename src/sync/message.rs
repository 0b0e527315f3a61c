//! 跨上下文消息
//!
//! 请求（页面上下文 → 协调器）必有一个 [`Response`]；
//! 广播（协调器 → 页面上下文）没有回复。

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::status::StatusSignal;
use crate::error::SyncError;
use crate::models::{Settings, SiteInfo, TutorialState};

/// 页面上下文编号，由协调器在注册时分配
pub type ContextId = u64;

/// 教程控制命令
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TutorialCommand {
    Start,
    Stop,
    Next,
    Previous,
    Skip,
    AcceptIntroduction,
    SkipIntroduction,
    Reset,
}

impl TutorialCommand {
    /// 解析控制台输入
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "start" => Some(Self::Start),
            "stop" => Some(Self::Stop),
            "next" | "n" => Some(Self::Next),
            "prev" | "previous" | "p" => Some(Self::Previous),
            "skip" => Some(Self::Skip),
            "intro-accept" => Some(Self::AcceptIntroduction),
            "intro-skip" => Some(Self::SkipIntroduction),
            "reset" => Some(Self::Reset),
            _ => None,
        }
    }
}

/// 发给协调器的请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum Request {
    GetState {
        site_id: String,
    },
    /// 整体覆盖写入，后写者胜
    UpdateState {
        site_id: String,
        state: TutorialState,
    },
    ResetState {
        site_id: String,
    },
    /// `site_id` 为空时发给所有页面上下文
    Command {
        site_id: Option<String>,
        command: TutorialCommand,
    },
    /// 只发给一个页面上下文
    CommandContext {
        context: ContextId,
        command: TutorialCommand,
    },
    SiteDetected {
        context: ContextId,
        site: SiteInfo,
    },
    UpdateStatus {
        context: ContextId,
        status: StatusSignal,
    },
    GetStatus {
        context: ContextId,
    },
    GetSettings,
    UpdateSettings {
        settings: Settings,
    },
    GetProgress {
        site_id: String,
    },
}

impl Request {
    /// 消息类型名称（用于日志）
    pub fn kind(&self) -> &'static str {
        match self {
            Request::GetState { .. } => "GET_STATE",
            Request::UpdateState { .. } => "UPDATE_STATE",
            Request::ResetState { .. } => "RESET_STATE",
            Request::Command { .. } => "COMMAND",
            Request::CommandContext { .. } => "COMMAND_CONTEXT",
            Request::SiteDetected { .. } => "SITE_DETECTED",
            Request::UpdateStatus { .. } => "UPDATE_STATUS",
            Request::GetStatus { .. } => "GET_STATUS",
            Request::GetSettings => "GET_SETTINGS",
            Request::UpdateSettings { .. } => "UPDATE_SETTINGS",
            Request::GetProgress { .. } => "GET_PROGRESS",
        }
    }
}

/// 协调器广播
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum Broadcast {
    StateChanged { site_id: String, state: TutorialState },
    SettingsChanged { settings: Settings },
    Command { command: TutorialCommand },
}

/// 请求的回复
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    pub fn ok() -> Self {
        Self {
            success: true,
            data: None,
            error: None,
        }
    }

    pub fn with_data<T: Serialize>(data: &T) -> Self {
        match serde_json::to_value(data) {
            Ok(value) => Self {
                success: true,
                data: Some(value),
                error: None,
            },
            Err(e) => Self::failure(e.to_string()),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }

    /// 失败回复转为 [`SyncError::Rejected`]
    pub fn into_result(self) -> Result<Option<JsonValue>, SyncError> {
        if self.success {
            Ok(self.data)
        } else {
            Err(SyncError::Rejected {
                message: self.error.unwrap_or_else(|| "unknown error".to_string()),
            })
        }
    }

    /// 取出并反序列化数据；`null` / 缺失得到 `None`
    pub fn into_data<T: serde::de::DeserializeOwned>(self) -> Result<Option<T>, SyncError> {
        match self.into_result()? {
            None | Some(JsonValue::Null) => Ok(None),
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_format() {
        let request = Request::Command {
            site_id: Some("github".to_string()),
            command: TutorialCommand::AcceptIntroduction,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["type"], "COMMAND");
        assert_eq!(json["siteId"], "github");
        assert_eq!(json["command"], "ACCEPT_INTRODUCTION");

        let back: Request = serde_json::from_value(json).unwrap();
        assert_eq!(back, request);
        assert_eq!(
            serde_json::to_value(Request::GetSettings).unwrap()["type"],
            "GET_SETTINGS"
        );
    }

    #[test]
    fn test_broadcast_wire_format() {
        let broadcast = Broadcast::StateChanged {
            site_id: "github".to_string(),
            state: TutorialState::empty(),
        };
        let json = serde_json::to_value(&broadcast).unwrap();
        assert_eq!(json["type"], "STATE_CHANGED");
        assert_eq!(json["state"]["isActive"], false);
    }

    #[test]
    fn test_failure_response_becomes_error() {
        let err = Response::failure("boom").into_result().unwrap_err();
        assert!(matches!(err, SyncError::Rejected { message } if message == "boom"));

        let none: Option<TutorialState> = Response::ok().into_data().unwrap();
        assert!(none.is_none());
    }

    #[test]
    fn test_command_parsing() {
        assert_eq!(TutorialCommand::parse(" Prev "), Some(TutorialCommand::Previous));
        assert_eq!(TutorialCommand::parse("intro-skip"), Some(TutorialCommand::SkipIntroduction));
        assert_eq!(TutorialCommand::parse("status"), None);
    }
}
