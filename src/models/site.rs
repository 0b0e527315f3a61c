use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// 站点标识
///
/// 同一 origin 重新加载后保持不变，用作教程状态与自定义步骤的 key。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SiteIdentifier(String);

impl SiteIdentifier {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for SiteIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// 站点识别结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteInfo {
    pub identifier: SiteIdentifier,
    pub display_name: String,
    pub description: String,
    /// 命中的识别规则；`None` 表示按域名兜底
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
}

impl SiteInfo {
    /// 是否命中了内置识别规则
    pub fn is_compatible(&self) -> bool {
        self.rule_id.is_some()
    }
}

/// 页面位置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageLocation {
    pub origin: String,
    pub hostname: String,
}
