//! 页面上下文
//!
//! 封装"我正在驱动哪个站点的第几个标签页"这一信息

use std::fmt::Display;

/// 页面上下文
#[derive(Debug, Clone)]
pub struct PageCtx {
    /// 站点标识
    pub site_id: String,

    /// 标签页序号（从1开始，仅用于日志显示）
    pub page_index: usize,

    /// 页面 origin
    pub origin: String,
}

impl PageCtx {
    pub fn new(site_id: impl Into<String>, page_index: usize, origin: impl Into<String>) -> Self {
        Self {
            site_id: site_id.into(),
            page_index,
            origin: origin.into(),
        }
    }
}

impl Display for PageCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[页面#{} 站点#{}]", self.page_index, self.site_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let ctx = PageCtx::new("github", 2, "https://github.com");
        assert_eq!(ctx.to_string(), "[页面#2 站点#github]");
    }
}
