//! 宿主文档层
//!
//! - `geometry` - 矩形、视口
//! - `element` - 元素快照与引导上下文
//! - `document` - [`HostDocument`] 抽象与覆盖层 / 面板 / 事件类型
//! - `memory` - 内存实现

pub mod document;
pub mod element;
pub mod geometry;
pub mod memory;
pub mod selector;

pub use document::{
    HostDocument, LayoutChange, OverlayCensus, OverlayFrame, PageEvent, PanelButton,
    PanelContent, PanelKind, TooltipAction, TooltipContent,
};
pub use element::{ElementContext, ElementSnapshot};
pub use geometry::{Point, Rect, Viewport};
pub use memory::{MemoryDocument, MemoryElement};
