//! 元素定位 - 业务能力层

use tracing::{debug, warn};

use crate::dom::{ElementSnapshot, HostDocument};

/// 把选择器解析为最多一个实时元素，可以随时重新解析
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementLocator {
    selector: String,
}

impl ElementLocator {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
        }
    }

    pub fn selector(&self) -> &str {
        &self.selector
    }

    /// 解析当前匹配的第一个元素
    ///
    /// 选择器无效或脚本执行失败都按"找不到"处理。
    pub async fn resolve(&self, document: &dyn HostDocument) -> Option<ElementSnapshot> {
        match document.query_one(&self.selector).await {
            Ok(Some(element)) => Some(element),
            Ok(None) => {
                debug!("选择器 {} 没有匹配元素", self.selector);
                None
            }
            Err(e) => {
                warn!("⚠️ 解析选择器 {} 失败: {}", self.selector, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{MemoryDocument, MemoryElement, Rect, Viewport};

    #[tokio::test]
    async fn test_resolve_tracks_live_document() {
        let doc = MemoryDocument::new("https://example.com", Viewport::default());
        let locator = ElementLocator::new("#save");
        assert!(locator.resolve(&doc).await.is_none());

        let id = doc.add(MemoryElement::new("button", Rect::new(0.0, 0.0, 10.0, 10.0)).with_id("save"));
        assert_eq!(locator.resolve(&doc).await.map(|e| e.node_id), Some(id));

        doc.remove(id);
        assert!(locator.resolve(&doc).await.is_none());
    }

    #[tokio::test]
    async fn test_invalid_selector_resolves_to_none() {
        let doc = MemoryDocument::new("https://example.com", Viewport::default());
        assert!(ElementLocator::new("a > b > c").resolve(&doc).await.is_none());
    }
}
