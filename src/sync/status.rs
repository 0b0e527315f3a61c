//! 徽标式状态信号

use serde::{Deserialize, Serialize};

use crate::models::{TutorialPhase, TutorialState};

pub const PROGRESS_COLOR: &str = "#10b981";
pub const AVAILABLE_COLOR: &str = "#3b82f6";

/// 页面上下文的状态信号（文本 + 颜色 + 标题）
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatusSignal {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// `round((current + 1) / total * 100)`；`total == 0` 时为 0
pub fn progress_percent(current_step: usize, total_steps: usize) -> u8 {
    if total_steps == 0 {
        return 0;
    }
    let pct = ((current_step + 1) as f64 / total_steps as f64 * 100.0).round();
    pct.min(100.0) as u8
}

impl StatusSignal {
    pub fn cleared() -> Self {
        Self::default()
    }

    pub fn progress(current_step: usize, total_steps: usize) -> Self {
        Self {
            text: format!("{}%", progress_percent(current_step, total_steps)),
            color: Some(PROGRESS_COLOR.to_string()),
            title: None,
        }
    }

    pub fn completed() -> Self {
        Self {
            text: "✓".to_string(),
            color: Some(PROGRESS_COLOR.to_string()),
            title: Some("Tutorial completed!".to_string()),
        }
    }

    pub fn site_available(site_name: &str) -> Self {
        Self {
            text: "!".to_string(),
            color: Some(AVAILABLE_COLOR.to_string()),
            title: Some(format!("Tutorial available for {}", site_name)),
        }
    }

    /// 由教程状态推导
    pub fn for_state(state: &TutorialState) -> Self {
        match state.phase {
            TutorialPhase::Active if state.is_active => {
                Self::progress(state.current_step, state.total_steps)
            }
            TutorialPhase::Completed => Self::completed(),
            _ => Self::cleared(),
        }
    }

    pub fn is_cleared(&self) -> bool {
        self.text.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_percent() {
        assert_eq!(progress_percent(1, 5), 40);
        assert_eq!(progress_percent(0, 3), 33);
        assert_eq!(progress_percent(1, 3), 67);
        assert_eq!(progress_percent(4, 5), 100);
        assert_eq!(progress_percent(0, 0), 0);
    }

    #[test]
    fn test_signal_for_state() {
        let active = TutorialState {
            is_active: true,
            phase: TutorialPhase::Active,
            current_step: 1,
            total_steps: 5,
            ..TutorialState::empty()
        };
        assert_eq!(StatusSignal::for_state(&active).text, "40%");

        let done = TutorialState {
            phase: TutorialPhase::Completed,
            total_steps: 5,
            ..TutorialState::empty()
        };
        let signal = StatusSignal::for_state(&done);
        assert_eq!(signal.text, "✓");
        assert_eq!(signal.title.as_deref(), Some("Tutorial completed!"));

        let stopped = TutorialState {
            phase: TutorialPhase::Stopped,
            current_step: 2,
            total_steps: 5,
            ..TutorialState::empty()
        };
        assert!(StatusSignal::for_state(&stopped).is_cleared());
    }
}
