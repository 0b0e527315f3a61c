use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::geometry::{Rect, Viewport};

/// 页面元素在某一时刻的快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementSnapshot {
    /// 同一文档内稳定的节点编号
    pub node_id: u64,
    /// 小写标签名
    pub tag_name: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub class_names: Vec<String>,
    #[serde(default)]
    pub parent_tag: Option<String>,
    /// 在父元素子元素中的位置（从 1 开始）
    #[serde(default)]
    pub child_index: usize,
    /// 视口坐标下的 bounding client rect
    pub rect: Rect,
    #[serde(default)]
    pub display_none: bool,
    #[serde(default)]
    pub visibility_hidden: bool,
    #[serde(default)]
    pub text_content: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl ElementSnapshot {
    /// computed style 是否把元素隐藏了
    pub fn is_hidden_by_style(&self) -> bool {
        self.display_none || self.visibility_hidden
    }

    /// 有渲染尺寸、未被样式隐藏、且与视口垂直范围相交
    pub fn is_visible_in(&self, viewport: &Viewport) -> bool {
        !self.rect.is_empty()
            && !self.is_hidden_by_style()
            && viewport.intersects_vertical_band(&self.rect)
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// 是否是可交互元素
    pub fn is_interactive(&self) -> bool {
        matches!(
            self.tag_name.as_str(),
            "button" | "input" | "select" | "textarea" | "a"
        ) || self.attributes.contains_key("onclick")
            || self.attribute("role") == Some("button")
            || self
                .attribute("tabindex")
                .and_then(|v| v.parse::<i32>().ok())
                .is_some_and(|v| v >= 0)
    }

    /// 引导文本生成所需的上下文
    pub fn context(&self) -> ElementContext {
        ElementContext {
            tag_name: self.tag_name.clone(),
            text_content: self.text_content.trim().to_string(),
            attributes: self.attributes.clone(),
            rect: self.rect,
            is_interactive: self.is_interactive(),
        }
    }
}

/// 引导文本生成的元素上下文
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementContext {
    pub tag_name: String,
    pub text_content: String,
    pub attributes: BTreeMap<String, String>,
    pub rect: Rect,
    pub is_interactive: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(tag: &str) -> ElementSnapshot {
        ElementSnapshot {
            node_id: 1,
            tag_name: tag.to_string(),
            id: None,
            class_names: Vec::new(),
            parent_tag: Some("body".to_string()),
            child_index: 1,
            rect: Rect::new(0.0, 0.0, 50.0, 20.0),
            display_none: false,
            visibility_hidden: false,
            text_content: "  Save  ".to_string(),
            attributes: BTreeMap::new(),
        }
    }

    #[test]
    fn test_visibility_rules() {
        let vp = Viewport::default();
        let mut el = snapshot("button");
        assert!(el.is_visible_in(&vp));

        el.visibility_hidden = true;
        assert!(!el.is_visible_in(&vp));

        el.visibility_hidden = false;
        el.rect = Rect::new(0.0, 0.0, 0.0, 20.0);
        assert!(!el.is_visible_in(&vp));

        el.rect = Rect::new(0.0, 900.0, 50.0, 20.0);
        assert!(!el.is_visible_in(&vp));
    }

    #[test]
    fn test_context_trims_text() {
        let mut el = snapshot("div");
        assert!(!el.is_interactive());
        el.attributes
            .insert("tabindex".to_string(), "0".to_string());
        let ctx = el.context();
        assert_eq!(ctx.text_content, "Save");
        assert!(ctx.is_interactive);
    }
}
