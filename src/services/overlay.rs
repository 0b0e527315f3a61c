//! 覆盖层绘制 - 业务能力层
//!
//! 只负责按给定的文档绝对坐标绘制 / 移动 / 移除高亮与提示框，
//! 以及介绍 / 完成面板的内容，不认识教程步骤。

use std::sync::Arc;

use tracing::debug;

use crate::dom::{
    HostDocument, OverlayCensus, OverlayFrame, PanelButton, PanelContent, PanelKind,
    TooltipAction,
};
use crate::error::DomError;
use crate::models::SiteInfo;

/// 完成提示自动关闭的时间
pub const COMPLETION_DISMISS_MS: u64 = 5000;

const INTRODUCTION_FEATURES: [&str; 4] = [
    "Step-by-step guidance",
    "AI-powered explanations",
    "Voice narration (optional)",
    "Progress tracking",
];

/// 开始教程前的介绍面板
pub fn introduction_panel(site: &SiteInfo) -> PanelContent {
    PanelContent {
        kind: PanelKind::Introduction,
        title: format!("Welcome to the {} tutorial!", site.display_name),
        description: site.description.clone(),
        features: INTRODUCTION_FEATURES.iter().map(|f| f.to_string()).collect(),
        note: Some("Estimated time: 3-5 minutes".to_string()),
        buttons: vec![
            PanelButton {
                label: "Skip for Now".to_string(),
                action: TooltipAction::SkipIntroduction,
                primary: false,
            },
            PanelButton {
                label: "Start Learning".to_string(),
                action: TooltipAction::AcceptIntroduction,
                primary: true,
            },
        ],
        auto_dismiss_ms: None,
    }
}

/// 教程完成提示
pub fn completion_panel() -> PanelContent {
    PanelContent {
        kind: PanelKind::Completion,
        title: "Tutorial Complete! 🎉".to_string(),
        description: "You've successfully completed the tutorial.".to_string(),
        features: Vec::new(),
        note: None,
        buttons: vec![PanelButton {
            label: "Close".to_string(),
            action: TooltipAction::DismissPanel,
            primary: true,
        }],
        auto_dismiss_ms: Some(COMPLETION_DISMISS_MS),
    }
}

pub struct OverlayRenderer {
    document: Arc<dyn HostDocument>,
}

impl OverlayRenderer {
    pub fn new(document: Arc<dyn HostDocument>) -> Self {
        Self { document }
    }

    pub async fn draw(&self, frame: &OverlayFrame) -> Result<(), DomError> {
        debug!(
            "绘制覆盖层: 高亮 ({:.0}, {:.0}) {:.0}x{:.0}, 提示框 ({:.0}, {:.0})",
            frame.highlight.x,
            frame.highlight.y,
            frame.highlight.width,
            frame.highlight.height,
            frame.tooltip.x,
            frame.tooltip.y
        );
        self.document.create_overlay(frame).await
    }

    pub async fn move_to(&self, frame: &OverlayFrame) -> Result<(), DomError> {
        self.document.reposition_overlay(frame).await
    }

    pub async fn clear(&self) -> Result<(), DomError> {
        self.document.remove_overlay().await
    }

    pub async fn census(&self) -> Result<OverlayCensus, DomError> {
        self.document.overlay_census().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SiteIdentifier;

    #[test]
    fn test_introduction_panel_offers_start_and_skip() {
        let site = SiteInfo {
            identifier: SiteIdentifier::new("github"),
            display_name: "GitHub".to_string(),
            description: "Learn to navigate repositories".to_string(),
            rule_id: Some("github".to_string()),
        };
        let panel = introduction_panel(&site);
        assert_eq!(panel.kind, PanelKind::Introduction);
        assert!(panel.title.contains("GitHub"));
        assert_eq!(panel.description, "Learn to navigate repositories");
        assert_eq!(panel.features.len(), 4);

        let actions: Vec<_> = panel.buttons.iter().map(|b| b.action).collect();
        assert_eq!(
            actions,
            vec![TooltipAction::SkipIntroduction, TooltipAction::AcceptIntroduction]
        );
        assert!(panel.auto_dismiss_ms.is_none());
    }

    #[test]
    fn test_completion_panel_dismisses_itself() {
        let panel = completion_panel();
        assert_eq!(panel.kind, PanelKind::Completion);
        assert_eq!(panel.auto_dismiss_ms, Some(COMPLETION_DISMISS_MS));
        assert_eq!(panel.buttons[0].action, TooltipAction::DismissPanel);
    }
}
