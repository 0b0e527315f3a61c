//! 高亮会话 - 流程层
//!
//! 同一时刻最多一个高亮会话独占覆盖层。每个会话有递增的代号，
//! 观察者回调和异步结果都带着代号回来，代号过期的一律丢弃。

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, error, warn};

use crate::dom::{ElementSnapshot, HostDocument, LayoutChange, OverlayFrame, TooltipContent};
use crate::error::TutorialFault;
use crate::models::TutorialStep;
use crate::services::positioning::{compute_layout, needs_scroll};
use crate::services::{ElementLocator, OverlayRenderer};

/// 结构变化的防抖时间
pub const MUTATION_DEBOUNCE: Duration = Duration::from_millis(100);

/// `show` 的结果
#[derive(Debug, Clone, PartialEq)]
pub enum ShowOutcome {
    Shown {
        generation: u64,
        element: ElementSnapshot,
    },
    /// 选择器没有匹配元素，没有创建任何节点
    TargetMissing,
}

/// 布局事件的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutOutcome {
    /// 代号过期或没有会话
    Ignored,
    Moved,
    /// 已安排防抖后的重新定位
    Scheduled,
    /// 目标元素已经不在文档中，会话已拆除
    TargetLost,
}

struct HighlightSession {
    generation: u64,
    locator: ElementLocator,
    step: TutorialStep,
    content: TooltipContent,
}

pub struct HighlightController {
    document: Arc<dyn HostDocument>,
    renderer: OverlayRenderer,
    generation: u64,
    session: Option<HighlightSession>,
    pending_mutation: Option<Instant>,
}

impl HighlightController {
    pub fn new(document: Arc<dyn HostDocument>) -> Self {
        Self {
            renderer: OverlayRenderer::new(document.clone()),
            document,
            generation: 0,
            session: None,
            pending_mutation: None,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// 当前会话的选择器
    pub fn active_selector(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.locator.selector())
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.generation == generation)
    }

    /// 防抖截止时间与对应代号
    pub fn mutation_deadline(&self) -> Option<(Instant, u64)> {
        match (&self.session, self.pending_mutation) {
            (Some(session), Some(deadline)) => Some((deadline, session.generation)),
            _ => None,
        }
    }

    /// 拆除当前会话：卸载观察者、删除节点，代号失效
    pub async fn teardown(&mut self) {
        self.generation += 1;
        self.pending_mutation = None;
        let had_session = self.session.take().is_some();

        if let Err(e) = self.document.unwatch_target().await {
            warn!("⚠️ 卸载观察者失败: {}", e);
        }
        if let Err(e) = self.renderer.clear().await {
            warn!("⚠️ 删除覆盖层失败: {}", e);
        }
        if had_session {
            debug!("高亮会话已拆除，新代号 {}", self.generation);
        }
    }

    /// 拆除旧会话后为 `step` 创建新会话
    pub async fn show(
        &mut self,
        step: &TutorialStep,
        content: TooltipContent,
    ) -> Result<ShowOutcome, TutorialFault> {
        self.teardown().await;

        match self.renderer.census().await {
            Ok(census) if !census.is_clear() => {
                error!(
                    "❌ 拆除后仍有覆盖层节点: {} 个高亮, {} 个提示框",
                    census.highlights, census.tooltips
                );
                return Err(TutorialFault::TeardownViolation {
                    highlights: census.highlights,
                    tooltips: census.tooltips,
                });
            }
            Ok(_) => {}
            Err(e) => warn!("⚠️ 统计覆盖层节点失败: {}", e),
        }

        let locator = ElementLocator::new(&step.target_selector);
        let Some(mut element) = locator.resolve(self.document.as_ref()).await else {
            warn!("⚠️ 步骤 {} 的目标 {} 不存在", step.id, step.target_selector);
            return Ok(ShowOutcome::TargetMissing);
        };

        if element.is_hidden_by_style() {
            warn!("⚠️ 目标 {} 被样式隐藏，继续高亮", step.target_selector);
        }

        let mut viewport = self.document.viewport().await.unwrap_or_default();
        if needs_scroll(&element.rect, &viewport) {
            debug!("目标 {} 不在视口内，滚动到中央", step.target_selector);
            if let Err(e) = self.document.scroll_into_center(&step.target_selector).await {
                warn!("⚠️ 滚动失败: {}", e);
            }
            element = match locator.resolve(self.document.as_ref()).await {
                Some(element) => element,
                None => return Ok(ShowOutcome::TargetMissing),
            };
            viewport = self.document.viewport().await.unwrap_or(viewport);
        }

        let layout = compute_layout(&element.rect, step.anchor_position, &viewport);
        let frame = OverlayFrame {
            highlight: layout.highlight,
            tooltip: layout.tooltip,
            content: content.clone(),
        };
        if let Err(e) = self.renderer.draw(&frame).await {
            warn!("⚠️ 绘制覆盖层失败: {}", e);
        }
        if let Err(e) = self
            .document
            .watch_target(&step.target_selector, self.generation)
            .await
        {
            warn!("⚠️ 安装观察者失败: {}", e);
        }

        self.session = Some(HighlightSession {
            generation: self.generation,
            locator,
            step: step.clone(),
            content,
        });
        Ok(ShowOutcome::Shown {
            generation: self.generation,
            element,
        })
    }

    /// 观察者回调
    pub async fn on_layout(&mut self, generation: u64, change: LayoutChange) -> LayoutOutcome {
        if !self.is_current(generation) {
            debug!("忽略过期的布局事件 (代号 {})", generation);
            return LayoutOutcome::Ignored;
        }
        match change {
            LayoutChange::Resized => self.reposition(generation).await,
            LayoutChange::Mutated => {
                self.pending_mutation = Some(Instant::now() + MUTATION_DEBOUNCE);
                LayoutOutcome::Scheduled
            }
        }
    }

    /// 防抖到期
    pub async fn on_mutation_settled(&mut self, generation: u64) -> LayoutOutcome {
        if !self.is_current(generation) {
            return LayoutOutcome::Ignored;
        }
        self.pending_mutation = None;
        self.reposition(generation).await
    }

    /// 重新解析目标并移动覆盖层
    pub async fn reposition(&mut self, generation: u64) -> LayoutOutcome {
        let Some(session) = self.session.as_ref().filter(|s| s.generation == generation) else {
            return LayoutOutcome::Ignored;
        };

        let Some(element) = session.locator.resolve(self.document.as_ref()).await else {
            warn!("⚠️ 目标 {} 已从页面移除", session.locator.selector());
            self.teardown().await;
            return LayoutOutcome::TargetLost;
        };

        let viewport = self.document.viewport().await.unwrap_or_default();
        let layout = compute_layout(&element.rect, session.step.anchor_position, &viewport);
        let frame = OverlayFrame {
            highlight: layout.highlight,
            tooltip: layout.tooltip,
            content: session.content.clone(),
        };
        if let Err(e) = self.renderer.move_to(&frame).await {
            warn!("⚠️ 移动覆盖层失败: {}", e);
        }
        LayoutOutcome::Moved
    }

    /// 替换提示框说明文字并重绘；代号过期时返回 `Ignored`
    pub async fn update_description(&mut self, generation: u64, description: String) -> LayoutOutcome {
        match self.session.as_mut() {
            Some(session) if session.generation == generation => {
                session.content.description = description;
            }
            _ => return LayoutOutcome::Ignored,
        }
        self.reposition(generation).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{MemoryDocument, MemoryElement, Rect, Viewport};
    use crate::models::AnchorPosition;

    fn step(selector: &str) -> TutorialStep {
        TutorialStep {
            id: "step-0".to_string(),
            target_selector: selector.to_string(),
            title: "Step 1".to_string(),
            description: "Interact with this button".to_string(),
            anchor_position: AnchorPosition::Bottom,
            language: "en".to_string(),
        }
    }

    fn content() -> TooltipContent {
        TooltipContent {
            title: "Step 1".to_string(),
            description: "Interact with this button".to_string(),
            anchor: AnchorPosition::Bottom,
            step_number: 1,
            total_steps: 2,
            show_previous: false,
            show_next: true,
        }
    }

    fn setup() -> (Arc<MemoryDocument>, HighlightController) {
        let doc = Arc::new(MemoryDocument::new("https://example.com", Viewport::default()));
        let controller = HighlightController::new(doc.clone());
        (doc, controller)
    }

    #[tokio::test]
    async fn test_new_session_replaces_old_one() {
        let (doc, mut controller) = setup();
        doc.add(MemoryElement::new("button", Rect::new(10.0, 10.0, 80.0, 30.0)).with_id("a"));
        doc.add(MemoryElement::new("button", Rect::new(10.0, 60.0, 80.0, 30.0)).with_id("b"));

        let first = controller.show(&step("#a"), content()).await.unwrap();
        let ShowOutcome::Shown { generation: g1, .. } = first else {
            panic!("expected highlight");
        };
        let second = controller.show(&step("#b"), content()).await.unwrap();
        let ShowOutcome::Shown { generation: g2, .. } = second else {
            panic!("expected highlight");
        };

        assert!(g2 > g1);
        assert_eq!(doc.census().highlights, 1);
        assert_eq!(doc.census().tooltips, 1);
        assert_eq!(doc.watched(), Some(("#b".to_string(), g2)));
        assert_eq!(controller.active_selector(), Some("#b"));
    }

    #[tokio::test]
    async fn test_missing_target_creates_nothing() {
        let (doc, mut controller) = setup();
        let outcome = controller.show(&step("#nope"), content()).await.unwrap();
        assert_eq!(outcome, ShowOutcome::TargetMissing);
        assert!(doc.census().is_clear());
        assert!(doc.watched().is_none());
    }

    #[tokio::test]
    async fn test_offscreen_target_is_scrolled_into_view() {
        let (doc, mut controller) = setup();
        doc.add(MemoryElement::new("button", Rect::new(100.0, 2000.0, 80.0, 30.0)).with_id("far"));

        controller.show(&step("#far"), content()).await.unwrap();

        assert_eq!(doc.scroll_requests(), 1);
        let highlight = doc.current_highlight().unwrap();
        assert_eq!(highlight.y, 1996.0);
    }

    #[tokio::test]
    async fn test_stale_layout_events_are_ignored() {
        let (doc, mut controller) = setup();
        let id = doc.add(MemoryElement::new("button", Rect::new(10.0, 10.0, 80.0, 30.0)).with_id("a"));
        let ShowOutcome::Shown { generation, .. } = controller.show(&step("#a"), content()).await.unwrap() else {
            panic!("expected highlight");
        };

        doc.set_rect(id, Rect::new(10.0, 10.0, 120.0, 30.0));
        assert_eq!(
            controller.on_layout(generation, LayoutChange::Resized).await,
            LayoutOutcome::Moved
        );
        assert_eq!(doc.current_highlight().unwrap().width, 128.0);

        controller.teardown().await;
        assert_eq!(
            controller.on_layout(generation, LayoutChange::Resized).await,
            LayoutOutcome::Ignored
        );
        assert!(doc.census().is_clear());
    }

    #[tokio::test]
    async fn test_mutation_is_debounced_then_detects_removal() {
        let (doc, mut controller) = setup();
        let id = doc.add(MemoryElement::new("button", Rect::new(10.0, 10.0, 80.0, 30.0)).with_id("a"));
        let ShowOutcome::Shown { generation, .. } = controller.show(&step("#a"), content()).await.unwrap() else {
            panic!("expected highlight");
        };

        doc.remove(id);
        assert_eq!(
            controller.on_layout(generation, LayoutChange::Mutated).await,
            LayoutOutcome::Scheduled
        );
        assert!(controller.mutation_deadline().is_some());

        assert_eq!(
            controller.on_mutation_settled(generation).await,
            LayoutOutcome::TargetLost
        );
        assert!(doc.census().is_clear());
        assert!(controller.mutation_deadline().is_none());
    }

    #[tokio::test]
    async fn test_update_description_only_for_current_session() {
        let (doc, mut controller) = setup();
        doc.add(MemoryElement::new("button", Rect::new(10.0, 10.0, 80.0, 30.0)).with_id("a"));
        let ShowOutcome::Shown { generation, .. } = controller.show(&step("#a"), content()).await.unwrap() else {
            panic!("expected highlight");
        };

        assert_eq!(
            controller.update_description(generation + 5, "late".to_string()).await,
            LayoutOutcome::Ignored
        );
        assert_eq!(
            controller.update_description(generation, "Click Save".to_string()).await,
            LayoutOutcome::Moved
        );
        assert_eq!(doc.current_tooltip().unwrap().1.description, "Click Save");
    }
}
