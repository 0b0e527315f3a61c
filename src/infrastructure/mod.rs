//! 基础设施层（Infrastructure）
//!
//! 持有稀缺资源（Page、存储文件），只暴露能力，不认识教程流程。

pub mod cdp_document;
pub mod js_executor;
pub mod store;

pub use cdp_document::CdpDocument;
pub use js_executor::JsExecutor;
pub use store::{JsonFileStore, KeyValueStore, MemoryStore};
