//! 内存文档
//!
//! 不依赖浏览器的 [`HostDocument`] 实现，元素坐标按文档绝对坐标保存，
//! 查询时按当前滚动偏移换算成视口坐标。用于无浏览器运行与测试。

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::document::{
    HostDocument, LayoutChange, OverlayCensus, OverlayFrame, PageEvent, PanelContent,
    TooltipAction, TooltipContent,
};
use super::element::ElementSnapshot;
use super::geometry::{Point, Rect, Viewport};
use super::selector::{NodeView, SimpleSelector};
use crate::error::DomError;
use crate::models::PageLocation;

/// 内存文档中的元素
#[derive(Debug, Clone)]
pub struct MemoryElement {
    pub node_id: u64,
    pub tag: String,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub parent: Option<u64>,
    /// 文档绝对坐标
    pub rect: Rect,
    pub display_none: bool,
    pub visibility_hidden: bool,
    pub text: String,
    pub attributes: BTreeMap<String, String>,
}

impl MemoryElement {
    pub fn new(tag: impl Into<String>, rect: Rect) -> Self {
        Self {
            node_id: 0,
            tag: tag.into().to_ascii_lowercase(),
            id: None,
            classes: Vec::new(),
            parent: None,
            rect,
            display_none: false,
            visibility_hidden: false,
            text: String::new(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn child_of(mut self, parent: u64) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn hidden(mut self) -> Self {
        self.display_none = true;
        self
    }
}

#[derive(Debug)]
struct Inner {
    location: PageLocation,
    viewport: Viewport,
    elements: Vec<MemoryElement>,
    next_id: u64,
    highlights: Vec<Rect>,
    tooltips: Vec<(Point, TooltipContent)>,
    panel: Option<PanelContent>,
    watched: Option<(String, u64)>,
    events: VecDeque<PageEvent>,
    scroll_requests: usize,
}

impl Inner {
    fn child_index(&self, element: &MemoryElement) -> usize {
        self.elements
            .iter()
            .filter(|e| e.parent == element.parent)
            .position(|e| e.node_id == element.node_id)
            .map(|p| p + 1)
            .unwrap_or(1)
    }

    fn parent_of(&self, element: &MemoryElement) -> Option<&MemoryElement> {
        element
            .parent
            .and_then(|id| self.elements.iter().find(|e| e.node_id == id))
    }

    fn snapshot(&self, element: &MemoryElement) -> ElementSnapshot {
        let mut attributes = element.attributes.clone();
        if let Some(id) = &element.id {
            attributes.insert("id".to_string(), id.clone());
        }
        if !element.classes.is_empty() {
            attributes.insert("class".to_string(), element.classes.join(" "));
        }
        ElementSnapshot {
            node_id: element.node_id,
            tag_name: element.tag.clone(),
            id: element.id.clone(),
            class_names: element.classes.clone(),
            parent_tag: Some(
                self.parent_of(element)
                    .map(|p| p.tag.clone())
                    .unwrap_or_else(|| "body".to_string()),
            ),
            child_index: self.child_index(element),
            rect: element
                .rect
                .translate(-self.viewport.scroll_x, -self.viewport.scroll_y),
            display_none: element.display_none,
            visibility_hidden: element.visibility_hidden,
            text_content: element.text.clone(),
            attributes,
        }
    }

    fn push_layout(&mut self, change: LayoutChange) {
        if let Some((_, generation)) = &self.watched {
            self.events.push_back(PageEvent::Layout {
                generation: *generation,
                change,
            });
        }
    }
}

fn location_of(origin: &str) -> PageLocation {
    let hostname = origin
        .split("://")
        .nth(1)
        .unwrap_or(origin)
        .split(['/', ':'])
        .next()
        .unwrap_or_default()
        .to_string();
    PageLocation {
        origin: origin.to_string(),
        hostname,
    }
}

/// 内存文档
#[derive(Debug)]
pub struct MemoryDocument {
    inner: Mutex<Inner>,
}

impl MemoryDocument {
    pub fn new(origin: &str, viewport: Viewport) -> Self {
        Self {
            inner: Mutex::new(Inner {
                location: location_of(origin),
                viewport,
                elements: Vec::new(),
                next_id: 1,
                highlights: Vec::new(),
                tooltips: Vec::new(),
                panel: None,
                watched: None,
                events: VecDeque::new(),
                scroll_requests: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // 锁不会跨越 await，中毒只可能来自测试中的 panic
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 追加元素（文档顺序即追加顺序），返回节点编号
    pub fn add(&self, mut element: MemoryElement) -> u64 {
        let mut inner = self.lock();
        element.node_id = inner.next_id;
        inner.next_id += 1;
        let id = element.node_id;
        inner.elements.push(element);
        inner.push_layout(LayoutChange::Mutated);
        id
    }

    /// 删除元素及其后代
    pub fn remove(&self, node_id: u64) {
        let mut inner = self.lock();
        let mut doomed = vec![node_id];
        let mut i = 0;
        while i < doomed.len() {
            let parent = doomed[i];
            doomed.extend(
                inner
                    .elements
                    .iter()
                    .filter(|e| e.parent == Some(parent))
                    .map(|e| e.node_id),
            );
            i += 1;
        }
        inner.elements.retain(|e| !doomed.contains(&e.node_id));
        inner.push_layout(LayoutChange::Mutated);
    }

    /// 修改元素位置或尺寸
    pub fn set_rect(&self, node_id: u64, rect: Rect) {
        let mut inner = self.lock();
        let Some(element) = inner.elements.iter_mut().find(|e| e.node_id == node_id) else {
            return;
        };
        let resized = element.rect.width != rect.width || element.rect.height != rect.height;
        element.rect = rect;
        inner.push_layout(if resized {
            LayoutChange::Resized
        } else {
            LayoutChange::Mutated
        });
    }

    pub fn set_viewport(&self, viewport: Viewport) {
        self.lock().viewport = viewport;
    }

    /// 模拟用户点击提示框或面板按钮
    pub fn click(&self, action: TooltipAction) {
        self.lock().events.push_back(PageEvent::Action { action });
    }

    pub fn census(&self) -> OverlayCensus {
        let inner = self.lock();
        OverlayCensus {
            highlights: inner.highlights.len(),
            tooltips: inner.tooltips.len(),
        }
    }

    pub fn current_highlight(&self) -> Option<Rect> {
        self.lock().highlights.last().copied()
    }

    pub fn current_tooltip(&self) -> Option<(Point, TooltipContent)> {
        self.lock().tooltips.last().cloned()
    }

    pub fn current_panel(&self) -> Option<PanelContent> {
        self.lock().panel.clone()
    }

    /// 模拟页面重新加载：覆盖层、面板、观察者与排队事件全部丢失，元素保留
    pub fn reload(&self) {
        let mut inner = self.lock();
        inner.highlights.clear();
        inner.tooltips.clear();
        inner.panel = None;
        inner.watched = None;
        inner.events.clear();
        inner.viewport.scroll_x = 0.0;
        inner.viewport.scroll_y = 0.0;
    }

    /// 模拟跳转到另一个来源（同时丢失页面侧状态）
    pub fn navigate(&self, origin: &str) {
        self.reload();
        self.lock().location = location_of(origin);
    }

    pub fn watched(&self) -> Option<(String, u64)> {
        self.lock().watched.clone()
    }

    pub fn scroll_requests(&self) -> usize {
        self.lock().scroll_requests
    }
}

#[async_trait]
impl HostDocument for MemoryDocument {
    async fn location(&self) -> Result<PageLocation, DomError> {
        Ok(self.lock().location.clone())
    }

    async fn viewport(&self) -> Result<Viewport, DomError> {
        Ok(self.lock().viewport)
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<ElementSnapshot>, DomError> {
        let parsed = SimpleSelector::parse(selector)?;
        let inner = self.lock();
        let body_attrs = BTreeMap::new();
        let body = NodeView {
            tag: "body",
            id: None,
            classes: &[],
            attributes: &body_attrs,
            child_index: 1,
        };

        let mut found = Vec::new();
        for element in &inner.elements {
            let view = NodeView {
                tag: &element.tag,
                id: element.id.as_deref(),
                classes: &element.classes,
                attributes: &element.attributes,
                child_index: inner.child_index(element),
            };
            let parent_view = inner.parent_of(element).map(|p| NodeView {
                tag: &p.tag,
                id: p.id.as_deref(),
                classes: &p.classes,
                attributes: &p.attributes,
                child_index: inner.child_index(p),
            });
            let parent = parent_view.as_ref().unwrap_or(&body);
            if parsed.matches(&view, Some(parent)) {
                found.push(inner.snapshot(element));
            }
        }
        Ok(found)
    }

    async fn scroll_into_center(&self, selector: &str) -> Result<(), DomError> {
        let target = self.query_one(selector).await?;
        let mut inner = self.lock();
        inner.scroll_requests += 1;
        if let Some(element) = target {
            let vp = inner.viewport;
            let doc = vp.to_document(&element.rect);
            inner.viewport.scroll_x = (doc.x + doc.width / 2.0 - vp.width / 2.0).max(0.0);
            inner.viewport.scroll_y = (doc.y + doc.height / 2.0 - vp.height / 2.0).max(0.0);
        }
        Ok(())
    }

    async fn create_overlay(&self, frame: &OverlayFrame) -> Result<(), DomError> {
        let mut inner = self.lock();
        inner.highlights.push(frame.highlight);
        inner.tooltips.push((frame.tooltip, frame.content.clone()));
        Ok(())
    }

    async fn reposition_overlay(&self, frame: &OverlayFrame) -> Result<(), DomError> {
        let mut inner = self.lock();
        if let Some(highlight) = inner.highlights.last_mut() {
            *highlight = frame.highlight;
        }
        if let Some(tooltip) = inner.tooltips.last_mut() {
            *tooltip = (frame.tooltip, frame.content.clone());
        }
        Ok(())
    }

    async fn remove_overlay(&self) -> Result<(), DomError> {
        let mut inner = self.lock();
        inner.highlights.clear();
        inner.tooltips.clear();
        Ok(())
    }

    async fn overlay_census(&self) -> Result<OverlayCensus, DomError> {
        Ok(self.census())
    }

    async fn watch_target(&self, selector: &str, generation: u64) -> Result<(), DomError> {
        self.lock().watched = Some((selector.to_string(), generation));
        Ok(())
    }

    async fn unwatch_target(&self) -> Result<(), DomError> {
        let mut inner = self.lock();
        inner.watched = None;
        inner
            .events
            .retain(|e| matches!(e, PageEvent::Action { .. }));
        Ok(())
    }

    async fn show_panel(&self, panel: &PanelContent) -> Result<(), DomError> {
        self.lock().panel = Some(panel.clone());
        Ok(())
    }

    async fn remove_panel(&self) -> Result<(), DomError> {
        self.lock().panel = None;
        Ok(())
    }

    async fn drain_events(&self) -> Result<Vec<PageEvent>, DomError> {
        Ok(self.lock().events.drain(..).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_query_reports_viewport_coordinates() {
        let doc = MemoryDocument::new("https://example.com", Viewport::default());
        let id = doc.add(MemoryElement::new("button", Rect::new(100.0, 1500.0, 80.0, 30.0)).with_id("far"));

        let el = doc.query_one("#far").await.unwrap().unwrap();
        assert_eq!(el.node_id, id);
        assert_eq!(el.rect.y, 1500.0);

        doc.scroll_into_center("#far").await.unwrap();
        let el = doc.query_one("#far").await.unwrap().unwrap();
        let vp = doc.viewport().await.unwrap();
        assert!(vp.contains_fully(&el.rect));
        assert_eq!(doc.scroll_requests(), 1);
    }

    #[tokio::test]
    async fn test_remove_drops_descendants_and_notifies_watcher() {
        let doc = MemoryDocument::new("https://example.com", Viewport::default());
        let form = doc.add(MemoryElement::new("form", Rect::new(0.0, 0.0, 300.0, 200.0)));
        doc.add(MemoryElement::new("input", Rect::new(10.0, 10.0, 100.0, 20.0)).child_of(form));
        doc.watch_target("form > input:nth-child(1)", 7).await.unwrap();

        doc.remove(form);

        assert!(doc.query_all("input").await.unwrap().is_empty());
        let events = doc.drain_events().await.unwrap();
        assert_eq!(
            events,
            vec![PageEvent::Layout {
                generation: 7,
                change: LayoutChange::Mutated
            }]
        );
    }

    #[tokio::test]
    async fn test_reload_drops_page_side_state() {
        let doc = MemoryDocument::new("https://example.com", Viewport::default());
        doc.add(MemoryElement::new("button", Rect::new(10.0, 10.0, 80.0, 30.0)).with_id("go"));
        doc.watch_target("#go", 3).await.unwrap();
        doc.click(TooltipAction::Next);

        doc.reload();

        assert!(doc.watched().is_none());
        assert!(doc.drain_events().await.unwrap().is_empty());
        assert!(doc.census().is_clear());
        assert!(doc.query_one("#go").await.unwrap().is_some());
    }

    #[test]
    fn test_hostname_parsing() {
        let doc = MemoryDocument::new("https://www.github.com:443/path", Viewport::default());
        assert_eq!(doc.lock().location.hostname, "www.github.com");
    }
}
