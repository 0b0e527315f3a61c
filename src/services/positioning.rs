//! 覆盖层定位 - 业务能力层
//!
//! 纯计算：输入元素的视口坐标、锚点和视口，输出高亮矩形与提示框位置
//! （文档绝对坐标）。

use crate::dom::{Point, Rect, Viewport};
use crate::models::AnchorPosition;

/// 高亮矩形四周留白
pub const HIGHLIGHT_PADDING: f64 = 4.0;
/// 提示框与高亮矩形的间距
pub const TOOLTIP_GAP: f64 = 12.0;
/// 假定的提示框尺寸
pub const TOOLTIP_WIDTH: f64 = 320.0;
pub const TOOLTIP_HEIGHT: f64 = 200.0;
/// 提示框与视口边缘的最小距离
pub const VIEWPORT_MARGIN: f64 = 10.0;

/// 定位结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayLayout {
    pub highlight: Rect,
    pub tooltip: Point,
}

/// 元素是否需要滚动到视口中央
pub fn needs_scroll(element: &Rect, viewport: &Viewport) -> bool {
    !viewport.contains_fully(element)
}

/// 高亮矩形：元素矩形外扩留白，再换算到文档坐标
pub fn highlight_rect(element: &Rect, viewport: &Viewport) -> Rect {
    viewport.to_document(&element.expand(HIGHLIGHT_PADDING))
}

/// 先按下界再按上界收拢；视口比提示框还小时以上界为准
fn clamp_axis(value: f64, viewport_size: f64, tooltip_size: f64) -> f64 {
    let mut value = value;
    if value < VIEWPORT_MARGIN {
        value = VIEWPORT_MARGIN;
    }
    if value + tooltip_size > viewport_size - VIEWPORT_MARGIN {
        value = viewport_size - tooltip_size - VIEWPORT_MARGIN;
    }
    value
}

/// 提示框位置（视口坐标，已收拢到视口内）
pub fn tooltip_origin(element: &Rect, anchor: AnchorPosition, viewport: &Viewport) -> Point {
    let target = element.expand(HIGHLIGHT_PADDING);
    let (left, top) = match anchor {
        AnchorPosition::Top => (
            target.left() + (target.width - TOOLTIP_WIDTH) / 2.0,
            target.top() - TOOLTIP_HEIGHT - TOOLTIP_GAP,
        ),
        AnchorPosition::Bottom => (
            target.left() + (target.width - TOOLTIP_WIDTH) / 2.0,
            target.bottom() + TOOLTIP_GAP,
        ),
        AnchorPosition::Left => (
            target.left() - TOOLTIP_WIDTH - TOOLTIP_GAP,
            target.top() + (target.height - TOOLTIP_HEIGHT) / 2.0,
        ),
        AnchorPosition::Right => (
            target.right() + TOOLTIP_GAP,
            target.top() + (target.height - TOOLTIP_HEIGHT) / 2.0,
        ),
    };

    Point::new(
        clamp_axis(left, viewport.width, TOOLTIP_WIDTH),
        clamp_axis(top, viewport.height, TOOLTIP_HEIGHT),
    )
}

/// 计算高亮与提示框的文档绝对坐标
pub fn compute_layout(element: &Rect, anchor: AnchorPosition, viewport: &Viewport) -> OverlayLayout {
    let tooltip = tooltip_origin(element, anchor, viewport);
    OverlayLayout {
        highlight: highlight_rect(element, viewport),
        tooltip: Point::new(tooltip.x + viewport.scroll_x, tooltip.y + viewport.scroll_y),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewport() -> Viewport {
        Viewport {
            width: 1000.0,
            height: 800.0,
            scroll_x: 0.0,
            scroll_y: 0.0,
        }
    }

    #[test]
    fn test_highlight_includes_padding_and_scroll() {
        let vp = Viewport {
            scroll_x: 30.0,
            scroll_y: 500.0,
            ..viewport()
        };
        let rect = highlight_rect(&Rect::new(100.0, 200.0, 50.0, 20.0), &vp);
        assert_eq!(rect, Rect::new(126.0, 696.0, 58.0, 28.0));
    }

    #[test]
    fn test_anchor_formulas() {
        let vp = viewport();
        let el = Rect::new(400.0, 300.0, 200.0, 40.0);
        // 外扩后: x=396, y=296, w=208, h=48

        let bottom = tooltip_origin(&el, AnchorPosition::Bottom, &vp);
        assert_eq!(bottom, Point::new(396.0 + (208.0 - 320.0) / 2.0, 344.0 + 12.0));

        let top = tooltip_origin(&el, AnchorPosition::Top, &vp);
        assert_eq!(top.y, 296.0 - 200.0 - 12.0);

        let right = tooltip_origin(&el, AnchorPosition::Right, &vp);
        assert_eq!(right, Point::new(604.0 + 12.0, 296.0 + (48.0 - 200.0) / 2.0));

        let left = tooltip_origin(&el, AnchorPosition::Left, &vp);
        assert_eq!(left.x, 396.0 - 320.0 - 12.0);
    }

    #[test]
    fn test_tooltip_clamped_into_viewport() {
        let vp = viewport();

        // 左上角元素，锚点在上方：两个方向都被推回视口
        let corner = tooltip_origin(&Rect::new(0.0, 0.0, 20.0, 20.0), AnchorPosition::Top, &vp);
        assert_eq!(corner, Point::new(10.0, 10.0));

        // 右下角元素，锚点在右侧
        let far = tooltip_origin(&Rect::new(980.0, 780.0, 10.0, 10.0), AnchorPosition::Right, &vp);
        assert_eq!(far, Point::new(1000.0 - 320.0 - 10.0, 800.0 - 200.0 - 10.0));
    }

    #[test]
    fn test_tiny_viewport_prefers_upper_bound() {
        let vp = Viewport {
            width: 300.0,
            height: 150.0,
            ..viewport()
        };
        let p = tooltip_origin(&Rect::new(50.0, 50.0, 10.0, 10.0), AnchorPosition::Bottom, &vp);
        assert_eq!(p, Point::new(300.0 - 320.0 - 10.0, 150.0 - 200.0 - 10.0));
    }

    #[test]
    fn test_layout_translates_tooltip_by_scroll() {
        let vp = Viewport {
            scroll_y: 1000.0,
            ..viewport()
        };
        let layout = compute_layout(&Rect::new(400.0, 300.0, 200.0, 40.0), AnchorPosition::Bottom, &vp);
        assert_eq!(layout.tooltip.y, 356.0 + 1000.0);
        assert_eq!(layout.highlight.y, 296.0 + 1000.0);
    }

    #[test]
    fn test_needs_scroll() {
        let vp = viewport();
        assert!(!needs_scroll(&Rect::new(10.0, 10.0, 10.0, 10.0), &vp));
        assert!(needs_scroll(&Rect::new(10.0, 795.0, 10.0, 10.0), &vp));
    }
}
