use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 教程阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TutorialPhase {
    #[default]
    Idle,
    /// 等待用户确认介绍页（只存在于单个页面上下文中）
    IntroductionPending,
    Active,
    Completed,
    Stopped,
}

/// 某个站点的教程进度
///
/// 协调器持有权威副本，每个页面上下文持有只读副本。
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TutorialState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_id: Option<String>,
    pub is_active: bool,
    #[serde(default)]
    pub phase: TutorialPhase,
    pub current_step: usize,
    pub total_steps: usize,
    #[serde(default)]
    pub completed_steps: BTreeSet<usize>,
    #[serde(default, rename = "isIntroductionShown")]
    pub introduction_shown: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_active_at: Option<DateTime<Utc>>,
    /// 协调器写入时分配的版本号，同一站点内只增不减
    #[serde(default)]
    pub revision: u64,
}

impl TutorialState {
    /// 空状态（重置后 / 首次访问）
    pub fn empty() -> Self {
        Self::default()
    }

    /// 校验状态不变量
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.is_active != (self.phase == TutorialPhase::Active) {
            return Err(format!(
                "isActive={} 与 phase={:?} 不一致",
                self.is_active, self.phase
            ));
        }
        if self.is_active && self.current_step >= self.total_steps {
            return Err(format!(
                "currentStep {} 超出范围 [0, {})",
                self.current_step, self.total_steps
            ));
        }
        if let Some(step) = self.completed_steps.iter().find(|s| **s >= self.total_steps) {
            return Err(format!(
                "completedSteps 包含越界步骤 {} (totalSteps={})",
                step, self.total_steps
            ));
        }
        Ok(())
    }
}

/// 生成新的会话 ID
pub fn new_session_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("session_{}_{}", Utc::now().timestamp_millis(), &suffix[..9])
}

/// 提示框相对目标元素的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnchorPosition {
    Top,
    #[default]
    Bottom,
    Left,
    Right,
}

impl AnchorPosition {
    pub fn as_str(self) -> &'static str {
        match self {
            AnchorPosition::Top => "top",
            AnchorPosition::Bottom => "bottom",
            AnchorPosition::Left => "left",
            AnchorPosition::Right => "right",
        }
    }
}

/// 教程步骤，生成后不可变
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TutorialStep {
    pub id: String,
    #[serde(alias = "selector")]
    pub target_selector: String,
    pub title: String,
    pub description: String,
    #[serde(default, alias = "position")]
    pub anchor_position: AnchorPosition,
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_language() -> String {
    "en".to_string()
}

/// 站点级别的完成记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TutorialProgress {
    pub site_id: String,
    pub completed_steps: Vec<usize>,
    pub total_steps: usize,
    pub completion_percentage: u8,
    pub last_visited: DateTime<Utc>,
    pub is_completed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_serializes_camel_case() {
        let state = TutorialState {
            is_active: true,
            phase: TutorialPhase::Active,
            current_step: 1,
            total_steps: 3,
            completed_steps: [0].into_iter().collect(),
            introduction_shown: true,
            ..TutorialState::empty()
        };
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["isActive"], true);
        assert_eq!(json["currentStep"], 1);
        assert_eq!(json["completedSteps"], serde_json::json!([0]));
        assert_eq!(json["isIntroductionShown"], true);
        assert_eq!(json["phase"], "active");
    }

    #[test]
    fn test_invariants() {
        let mut state = TutorialState {
            is_active: true,
            phase: TutorialPhase::Active,
            current_step: 0,
            total_steps: 2,
            ..TutorialState::empty()
        };
        assert!(state.check_invariants().is_ok());

        state.current_step = 2;
        assert!(state.check_invariants().is_err());

        state.current_step = 1;
        state.completed_steps.insert(5);
        assert!(state.check_invariants().is_err());

        let inconsistent = TutorialState {
            is_active: true,
            ..TutorialState::empty()
        };
        assert!(inconsistent.check_invariants().is_err());
    }

    #[test]
    fn test_session_id_format() {
        let a = new_session_id();
        let b = new_session_id();
        assert!(a.starts_with("session_"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_step_accepts_legacy_field_names() {
        let step: TutorialStep = serde_json::from_value(serde_json::json!({
            "id": "step-0",
            "selector": "#go",
            "title": "Step 1",
            "description": "Interact with this button",
            "position": "right"
        }))
        .unwrap();
        assert_eq!(step.target_selector, "#go");
        assert_eq!(step.anchor_position, AnchorPosition::Right);
        assert_eq!(step.language, "en");
    }
}
