pub mod highlight;
pub mod page_ctx;
pub mod state_machine;
pub mod tutorial_flow;

pub use highlight::{HighlightController, LayoutOutcome, ShowOutcome};
pub use page_ctx::PageCtx;
pub use state_machine::{RemoteEffect, StartPlan, TutorialMachine};
pub use tutorial_flow::{EngineDeps, EngineEvent, TutorialEngine};
