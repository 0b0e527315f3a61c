//! 交互元素发现 - 业务能力层
//!
//! 没有自定义步骤时，扫描页面上的可交互元素并生成步骤列表。

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::dom::{ElementSnapshot, HostDocument};
use crate::error::DomError;
use crate::models::{AnchorPosition, TutorialStep};

/// 按优先级排列的交互元素选择器
pub const INTERACTIVE_SELECTORS: [&str; 7] = [
    "button:not([disabled])",
    "input:not([disabled])",
    "select:not([disabled])",
    "textarea:not([disabled])",
    "a[href]",
    r#"[role="button"]"#,
    r#"[tabindex="0"]"#,
];

/// 候选元素上限
pub const MAX_CANDIDATES: usize = 10;
/// 生成的步骤上限
pub const MAX_STEPS: usize = 5;

/// 收集可见的交互元素
///
/// 选择器顺序是主排序键，同一选择器内按文档顺序；重复元素只保留第一次出现。
pub async fn find_interactive_elements(
    document: &dyn HostDocument,
) -> Result<Vec<ElementSnapshot>, DomError> {
    let viewport = document.viewport().await?;
    let mut seen = HashSet::new();
    let mut candidates = Vec::new();

    for selector in INTERACTIVE_SELECTORS {
        let found = match document.query_all(selector).await {
            Ok(found) => found,
            Err(e) => {
                warn!("⚠️ 查询选择器 {} 失败，已跳过: {}", selector, e);
                continue;
            }
        };
        for element in found {
            if element.is_visible_in(&viewport) && seen.insert(element.node_id) {
                candidates.push(element);
            }
        }
    }

    debug!("发现 {} 个可见交互元素", candidates.len());
    candidates.truncate(MAX_CANDIDATES);
    Ok(candidates)
}

/// 为元素生成选择器
///
/// 优先级：`#id` → `tag.firstClass` → `parent > tag:nth-child(n)` → `tag`
pub fn generate_selector(element: &ElementSnapshot) -> String {
    if let Some(id) = element.id.as_deref().filter(|id| !id.is_empty()) {
        return format!("#{}", id);
    }

    if let Some(class) = element.class_names.iter().find(|c| !c.is_empty()) {
        return format!("{}.{}", element.tag_name, class);
    }

    match &element.parent_tag {
        Some(parent) => format!(
            "{} > {}:nth-child({})",
            parent, element.tag_name, element.child_index
        ),
        None => element.tag_name.clone(),
    }
}

/// 由候选元素生成占位步骤
pub fn steps_from_elements(elements: &[ElementSnapshot], language: &str) -> Vec<TutorialStep> {
    elements
        .iter()
        .take(MAX_STEPS)
        .enumerate()
        .map(|(i, element)| TutorialStep {
            id: format!("step-{}", i),
            target_selector: generate_selector(element),
            title: format!("Step {}", i + 1),
            description: format!("Interact with this {}", element.tag_name),
            anchor_position: AnchorPosition::Bottom,
            language: language.to_string(),
        })
        .collect()
}

/// 扫描页面并生成步骤；页面上没有候选元素时返回空列表
pub async fn discover_steps(
    document: &dyn HostDocument,
    language: &str,
) -> Result<Vec<TutorialStep>, DomError> {
    let elements = find_interactive_elements(document).await?;
    Ok(steps_from_elements(&elements, language))
}
