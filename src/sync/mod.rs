//! 跨页面上下文同步
//!
//! - `coordinator` - 规范状态的唯一写入者与广播路由
//! - `message` - 请求 / 广播 / 回复的类型化消息
//! - `status` - 徽标式状态信号

pub mod coordinator;
pub mod message;
pub mod status;

pub use coordinator::{Coordinator, CoordinatorHandle};
pub use message::{Broadcast, ContextId, Request, Response, TutorialCommand};
pub use status::{progress_percent, StatusSignal};
