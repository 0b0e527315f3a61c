//! 站点识别 - 业务能力层
//!
//! 先按域名规则匹配，再按优先级尝试通用规则；都不命中时按域名生成标识。

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info};

use crate::dom::HostDocument;
use crate::models::{SiteIdentifier, SiteInfo};

/// 兜底描述
pub const FALLBACK_DESCRIPTION: &str = "Learn the key features and navigation of this website";

static WWW_PREFIX: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"^www\.").ok());

/// 识别规则
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SiteRule {
    pub id: &'static str,
    /// `None` 表示通用规则
    pub domain: Option<&'static str>,
    pub selectors: &'static [&'static str],
    pub name: &'static str,
    pub description: &'static str,
    pub priority: u8,
}

impl SiteRule {
    /// 命中所需的最少选择器数量
    pub fn required_matches(&self) -> usize {
        (self.selectors.len() * 3 / 10).max(1)
    }
}

pub const BUILTIN_RULES: &[SiteRule] = &[
    SiteRule {
        id: "github",
        domain: Some("github.com"),
        selectors: &[
            r#"button[data-testid="create-repository-button"]"#,
            ".js-new-repository-button",
            r#"[data-testid="new-repo-button"]"#,
            ".repository-content",
            ".file-navigation",
        ],
        name: "GitHub",
        description: "Learn GitHub repository management and navigation",
        priority: 1,
    },
    SiteRule {
        id: "gmail",
        domain: Some("mail.google.com"),
        selectors: &[
            r#"[data-tooltip="Compose"]"#,
            ".T-I.T-I-KE.L3",
            r#"[role="button"][data-tooltip="Compose"]"#,
            ".nH .nH .nH",
            ".aeN",
        ],
        name: "Gmail",
        description: "Master Gmail interface and email management",
        priority: 1,
    },
    SiteRule {
        id: "google-docs",
        domain: Some("docs.google.com"),
        selectors: &[
            ".docs-titlebar-badge",
            ".docs-material .docs-titlebar",
            r#"[data-tooltip="Bold (Ctrl+B)"]"#,
            ".docs-toolbar",
            ".kix-page",
        ],
        name: "Google Docs",
        description: "Learn document editing and collaboration features",
        priority: 1,
    },
    SiteRule {
        id: "linkedin",
        domain: Some("linkedin.com"),
        selectors: &[
            r#"[data-test-id="compose-button"]"#,
            ".share-box-feed-entry__trigger",
            ".feed-shared-update-v2",
            ".global-nav",
            ".scaffold-layout__main",
        ],
        name: "LinkedIn",
        description: "Navigate professional networking features",
        priority: 1,
    },
    SiteRule {
        id: "youtube",
        domain: Some("youtube.com"),
        selectors: &[
            "#create-icon",
            ".ytd-masthead #avatar-btn",
            ".ytd-video-primary-info-renderer",
            "#subscribe-button",
            ".ytd-watch-flexy",
        ],
        name: "YouTube",
        description: "Discover video platform features and controls",
        priority: 1,
    },
    SiteRule {
        id: "generic-ecommerce",
        domain: None,
        selectors: &[
            r#"[data-testid="add-to-cart"]"#,
            ".add-to-cart",
            ".btn-add-to-cart",
            ".product-form__cart",
            ".shopping-cart",
        ],
        name: "E-commerce",
        description: "Learn online shopping interface basics",
        priority: 2,
    },
    SiteRule {
        id: "generic-form",
        domain: None,
        selectors: &[
            r#"form[role="search"]"#,
            ".search-form",
            r#"input[type="search"]"#,
            ".contact-form",
            ".newsletter-form",
        ],
        name: "Web Forms",
        description: "Master form filling and submission",
        priority: 3,
    },
];

/// 站点识别器
pub struct SiteDetector {
    rules: Vec<SiteRule>,
}

impl Default for SiteDetector {
    fn default() -> Self {
        Self::new(BUILTIN_RULES.to_vec())
    }
}

impl SiteDetector {
    pub fn new(rules: Vec<SiteRule>) -> Self {
        Self { rules }
    }

    /// 命中的规则
    pub async fn detect(&self, document: &dyn HostDocument) -> Option<SiteRule> {
        let hostname = document.location().await.ok()?.hostname;

        for rule in &self.rules {
            if let Some(domain) = rule.domain {
                if hostname.contains(domain) && has_matching_elements(document, rule).await {
                    return Some(*rule);
                }
            }
        }

        let mut generic: Vec<&SiteRule> = self.rules.iter().filter(|r| r.domain.is_none()).collect();
        generic.sort_by_key(|r| r.priority);
        for rule in generic {
            if has_matching_elements(document, rule).await {
                return Some(*rule);
            }
        }

        None
    }

    /// 识别站点；页面位置都拿不到时返回 `None`
    pub async fn site_info(&self, document: &dyn HostDocument) -> Option<SiteInfo> {
        let location = document.location().await.ok()?;

        let info = match self.detect(document).await {
            Some(rule) => SiteInfo {
                identifier: SiteIdentifier::new(rule.id),
                display_name: rule.name.to_string(),
                description: rule.description.to_string(),
                rule_id: Some(rule.id.to_string()),
            },
            None => SiteInfo {
                identifier: fallback_identifier(&location.hostname),
                display_name: fallback_display_name(&location.hostname),
                description: FALLBACK_DESCRIPTION.to_string(),
                rule_id: None,
            },
        };

        info!("🧭 识别站点: {} ({})", info.display_name, info.identifier);
        Some(info)
    }
}

async fn has_matching_elements(document: &dyn HostDocument, rule: &SiteRule) -> bool {
    let required = rule.required_matches();
    let mut matched = 0;
    for selector in rule.selectors {
        // 无效选择器直接跳过
        if let Ok(Some(_)) = document.query_one(selector).await {
            matched += 1;
            if matched >= required {
                debug!("规则 {} 命中 ({}/{})", rule.id, matched, required);
                return true;
            }
        }
    }
    false
}

fn strip_www(hostname: &str) -> String {
    match WWW_PREFIX.as_ref() {
        Some(re) => re.replace(hostname, "").into_owned(),
        None => hostname.to_string(),
    }
}

/// 按域名生成的站点标识：去掉 `www.`，点换成横线
pub fn fallback_identifier(hostname: &str) -> SiteIdentifier {
    SiteIdentifier::new(strip_www(hostname).replace('.', "-"))
}

/// 按域名生成的显示名称：去掉 `www.`，首字母大写
pub fn fallback_display_name(hostname: &str) -> String {
    let domain = strip_www(hostname);
    let mut chars = domain.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{MemoryDocument, MemoryElement, Rect, Viewport};

    fn rect() -> Rect {
        Rect::new(0.0, 0.0, 10.0, 10.0)
    }

    #[test]
    fn test_required_matches() {
        assert_eq!(BUILTIN_RULES[0].required_matches(), 1);
        let rule = SiteRule {
            selectors: &["a", "b", "c", "d", "e", "f", "g"],
            ..BUILTIN_RULES[0]
        };
        assert_eq!(rule.required_matches(), 2);
    }

    #[test]
    fn test_fallback_naming() {
        assert_eq!(fallback_identifier("www.example.co.uk").as_str(), "example-co-uk");
        assert_eq!(fallback_identifier("wwwx.io").as_str(), "wwwx-io");
        assert_eq!(fallback_display_name("www.example.com"), "Example.com");
    }

    #[tokio::test]
    async fn test_domain_rule_requires_elements() {
        let doc = MemoryDocument::new("https://github.com", Viewport::default());
        let detector = SiteDetector::default();

        let info = detector.site_info(&doc).await.unwrap();
        assert_eq!(info.identifier.as_str(), "github-com");
        assert!(!info.is_compatible());
        assert_eq!(info.description, FALLBACK_DESCRIPTION);

        doc.add(MemoryElement::new("div", rect()).with_class("repository-content"));
        let info = detector.site_info(&doc).await.unwrap();
        assert_eq!(info.identifier.as_str(), "github");
        assert_eq!(info.display_name, "GitHub");
        assert!(info.is_compatible());
    }

    #[tokio::test]
    async fn test_generic_rules_by_priority() {
        let doc = MemoryDocument::new("https://www.shop.test", Viewport::default());
        doc.add(MemoryElement::new("input", rect()).with_attr("type", "search"));
        doc.add(MemoryElement::new("button", rect()).with_class("add-to-cart"));

        let rule = SiteDetector::default().detect(&doc).await.unwrap();
        assert_eq!(rule.id, "generic-ecommerce");
    }

    #[tokio::test]
    async fn test_domain_rule_ignored_on_other_hosts() {
        let doc = MemoryDocument::new("https://example.com", Viewport::default());
        doc.add(MemoryElement::new("div", rect()).with_class("repository-content"));
        assert!(SiteDetector::default().detect(&doc).await.is_none());
    }
}
