//! 页面坐标与视口

use serde::{Deserialize, Serialize};

/// 矩形（CSS 像素）
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn top(&self) -> f64 {
        self.y
    }

    pub fn left(&self) -> f64 {
        self.x
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// 渲染尺寸为零
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// 四周各扩展 `padding`
    pub fn expand(&self, padding: f64) -> Rect {
        Rect::new(
            self.x - padding,
            self.y - padding,
            self.width + padding * 2.0,
            self.height + padding * 2.0,
        )
    }

    pub fn translate(&self, dx: f64, dy: f64) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.width, self.height)
    }
}

/// 点
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// 视口尺寸与当前滚动偏移
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
    pub scroll_x: f64,
    pub scroll_y: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 720.0,
            scroll_x: 0.0,
            scroll_y: 0.0,
        }
    }
}

impl Viewport {
    /// 视口坐标中的矩形是否完全在视口内
    pub fn contains_fully(&self, rect: &Rect) -> bool {
        rect.top() >= 0.0
            && rect.left() >= 0.0
            && rect.bottom() <= self.height
            && rect.right() <= self.width
    }

    /// 视口坐标中的矩形是否与视口的垂直范围相交
    pub fn intersects_vertical_band(&self, rect: &Rect) -> bool {
        rect.top() < self.height && rect.bottom() > 0.0
    }

    /// 视口坐标 → 文档绝对坐标
    pub fn to_document(&self, rect: &Rect) -> Rect {
        rect.translate(self.scroll_x, self.scroll_y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_and_edges() {
        let rect = Rect::new(10.0, 20.0, 100.0, 40.0).expand(4.0);
        assert_eq!(rect, Rect::new(6.0, 16.0, 108.0, 48.0));
        assert_eq!(rect.right(), 114.0);
        assert_eq!(rect.bottom(), 64.0);
    }

    #[test]
    fn test_viewport_containment() {
        let vp = Viewport {
            width: 800.0,
            height: 600.0,
            ..Viewport::default()
        };
        assert!(vp.contains_fully(&Rect::new(0.0, 0.0, 800.0, 600.0)));
        assert!(!vp.contains_fully(&Rect::new(-1.0, 0.0, 10.0, 10.0)));
        assert!(!vp.contains_fully(&Rect::new(0.0, 590.0, 10.0, 20.0)));

        assert!(vp.intersects_vertical_band(&Rect::new(0.0, 590.0, 10.0, 20.0)));
        assert!(!vp.intersects_vertical_band(&Rect::new(0.0, 600.0, 10.0, 20.0)));
        assert!(!vp.intersects_vertical_band(&Rect::new(0.0, -20.0, 10.0, 20.0)));
    }
}
