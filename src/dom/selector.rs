//! 内存文档使用的最小 CSS 选择器
//!
//! 支持：标签、`#id`、`.class`、`[attr]`、`[attr="v"]`、`:not([attr])`、
//! `:nth-child(n)`，以及一层子代组合符 `a > b`。

use std::collections::BTreeMap;

use crate::error::DomError;

/// 参与匹配的元素视图
#[derive(Debug, Clone)]
pub struct NodeView<'a> {
    pub tag: &'a str,
    pub id: Option<&'a str>,
    pub classes: &'a [String],
    pub attributes: &'a BTreeMap<String, String>,
    pub child_index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Condition {
    Id(String),
    Class(String),
    HasAttr(String),
    AttrEquals(String, String),
    NotAttr(String),
    NthChild(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct Compound {
    tag: Option<String>,
    conditions: Vec<Condition>,
}

impl Compound {
    fn matches(&self, node: &NodeView<'_>) -> bool {
        if let Some(tag) = &self.tag {
            if !tag.eq_ignore_ascii_case(node.tag) {
                return false;
            }
        }
        self.conditions.iter().all(|c| match c {
            Condition::Id(id) => node.id == Some(id.as_str()),
            Condition::Class(class) => node.classes.iter().any(|c| c == class),
            Condition::HasAttr(name) => attr_present(node, name),
            Condition::AttrEquals(name, value) => {
                attr_value(node, name).is_some_and(|v| v == value)
            }
            Condition::NotAttr(name) => !attr_present(node, name),
            Condition::NthChild(n) => node.child_index == *n,
        })
    }
}

fn attr_value<'a>(node: &'a NodeView<'_>, name: &str) -> Option<&'a str> {
    match name {
        "id" => node.id,
        _ => node.attributes.get(name).map(String::as_str),
    }
}

fn attr_present(node: &NodeView<'_>, name: &str) -> bool {
    attr_value(node, name).is_some()
}

/// 解析后的选择器
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleSelector {
    parent: Option<Compound>,
    target: Compound,
}

impl SimpleSelector {
    pub fn parse(selector: &str) -> Result<Self, DomError> {
        let invalid = || DomError::InvalidSelector {
            selector: selector.to_string(),
        };
        let parts: Vec<&str> = selector.split('>').map(str::trim).collect();
        match parts.as_slice() {
            [target] => Ok(Self {
                parent: None,
                target: parse_compound(target).ok_or_else(invalid)?,
            }),
            [parent, target] => Ok(Self {
                parent: Some(parse_compound(parent).ok_or_else(invalid)?),
                target: parse_compound(target).ok_or_else(invalid)?,
            }),
            _ => Err(invalid()),
        }
    }

    pub fn matches(&self, node: &NodeView<'_>, parent: Option<&NodeView<'_>>) -> bool {
        if !self.target.matches(node) {
            return false;
        }
        match (&self.parent, parent) {
            (None, _) => true,
            (Some(compound), Some(parent)) => compound.matches(parent),
            (Some(_), None) => false,
        }
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn take_ident(chars: &[char], pos: &mut usize) -> Option<String> {
    let start = *pos;
    while *pos < chars.len() && is_ident_char(chars[*pos]) {
        *pos += 1;
    }
    (*pos > start).then(|| chars[start..*pos].iter().collect())
}

fn take_until(chars: &[char], pos: &mut usize, end: char) -> Option<String> {
    let start = *pos;
    while *pos < chars.len() && chars[*pos] != end {
        *pos += 1;
    }
    if *pos >= chars.len() {
        return None;
    }
    let out = chars[start..*pos].iter().collect();
    *pos += 1;
    Some(out)
}

/// `attr` 或 `attr="value"`
fn parse_attribute(body: &str) -> Option<Condition> {
    match body.split_once('=') {
        None => {
            let name = body.trim();
            (!name.is_empty() && name.chars().all(is_ident_char))
                .then(|| Condition::HasAttr(name.to_string()))
        }
        Some((name, value)) => {
            let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
            Some(Condition::AttrEquals(
                name.trim().to_string(),
                value.to_string(),
            ))
        }
    }
}

fn parse_compound(input: &str) -> Option<Compound> {
    let chars: Vec<char> = input.chars().collect();
    if chars.is_empty() {
        return None;
    }
    let mut pos = 0;
    let mut compound = Compound::default();

    if is_ident_char(chars[0]) {
        compound.tag = Some(take_ident(&chars, &mut pos)?.to_ascii_lowercase());
    }

    while pos < chars.len() {
        match chars[pos] {
            '#' => {
                pos += 1;
                compound.conditions.push(Condition::Id(take_ident(&chars, &mut pos)?));
            }
            '.' => {
                pos += 1;
                compound
                    .conditions
                    .push(Condition::Class(take_ident(&chars, &mut pos)?));
            }
            '[' => {
                pos += 1;
                let body = take_until(&chars, &mut pos, ']')?;
                compound.conditions.push(parse_attribute(&body)?);
            }
            ':' => {
                pos += 1;
                let name = take_ident(&chars, &mut pos)?;
                if chars.get(pos) != Some(&'(') {
                    return None;
                }
                pos += 1;
                let arg = take_until(&chars, &mut pos, ')')?;
                match name.as_str() {
                    "not" => {
                        let inner = arg.trim().strip_prefix('[')?.strip_suffix(']')?;
                        match parse_attribute(inner)? {
                            Condition::HasAttr(attr) => {
                                compound.conditions.push(Condition::NotAttr(attr))
                            }
                            _ => return None,
                        }
                    }
                    "nth-child" => {
                        let n = arg.trim().parse().ok()?;
                        compound.conditions.push(Condition::NthChild(n));
                    }
                    _ => return None,
                }
            }
            _ => return None,
        }
    }

    Some(compound)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view<'a>(
        tag: &'a str,
        id: Option<&'a str>,
        classes: &'a [String],
        attributes: &'a BTreeMap<String, String>,
        child_index: usize,
    ) -> NodeView<'a> {
        NodeView {
            tag,
            id,
            classes,
            attributes,
            child_index,
        }
    }

    #[test]
    fn test_interactive_selectors() {
        let mut attrs = BTreeMap::new();
        let classes = vec!["primary".to_string()];
        let button = view("button", Some("go"), &classes, &attrs, 2);

        assert!(SimpleSelector::parse("button:not([disabled])").unwrap().matches(&button, None));
        assert!(SimpleSelector::parse("#go").unwrap().matches(&button, None));
        assert!(SimpleSelector::parse("button.primary").unwrap().matches(&button, None));
        assert!(!SimpleSelector::parse("a[href]").unwrap().matches(&button, None));

        attrs.insert("disabled".to_string(), String::new());
        attrs.insert("tabindex".to_string(), "0".to_string());
        let disabled = view("button", None, &classes, &attrs, 2);
        assert!(!SimpleSelector::parse("button:not([disabled])").unwrap().matches(&disabled, None));
        assert!(SimpleSelector::parse(r#"[tabindex="0"]"#).unwrap().matches(&disabled, None));
    }

    #[test]
    fn test_child_combinator_with_nth_child() {
        let attrs = BTreeMap::new();
        let no_classes: Vec<String> = Vec::new();
        let span = view("span", None, &no_classes, &attrs, 3);
        let parent = view("div", None, &no_classes, &attrs, 1);

        let selector = SimpleSelector::parse("div > span:nth-child(3)").unwrap();
        assert!(selector.matches(&span, Some(&parent)));
        assert!(!selector.matches(&span, None));
        assert!(!SimpleSelector::parse("div > span:nth-child(2)").unwrap().matches(&span, Some(&parent)));
    }

    #[test]
    fn test_invalid_selectors() {
        assert!(SimpleSelector::parse("").is_err());
        assert!(SimpleSelector::parse("a > b > c").is_err());
        assert!(SimpleSelector::parse("button:hover(1)").is_err());
        assert!(SimpleSelector::parse("div[unclosed").is_err());
    }
}
