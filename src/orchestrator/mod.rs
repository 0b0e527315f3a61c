//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责资源持有和页面上下文调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `app` - 应用
//! - 管理应用生命周期（初始化、运行、清理）
//! - 管理浏览器资源（Browser、Page）和状态文件
//! - 启动同步协调器
//! - 读取控制台命令并广播
//!
//! ### `page_processor` - 单个标签页接入
//! - 识别站点、查找自定义步骤
//! - 组装并初始化 TutorialEngine
//! - 在后台运行引擎事件循环
//!
//! ## 层次关系
//!
//! ```text
//! app (持有 Browser，处理 Vec<Page>)
//!     ↓
//! page_processor (处理单个 Page)
//!     ↓
//! workflow::TutorialEngine (驱动单个标签页的教程)
//!     ↓
//! services / sync (能力层：定位 / 绘制 / 引导文本 / 语音 / 协调器)
//!     ↓
//! infrastructure (基础设施：JsExecutor、CdpDocument、存储)
//! ```
//!
//! ## 设计原则
//!
//! 1. **单一职责**：app 管全局，page_processor 管单个标签页
//! 2. **资源隔离**：只有编排层持有 Browser
//! 3. **向下依赖**：编排层 → workflow → services → infrastructure
//! 4. **无业务逻辑**：只做组装和调度，不做教程状态判断

pub mod app;
pub mod page_processor;

// 重新导出主要类型
pub use app::App;
pub use page_processor::{attach_document, attach_page, AttachedPage};
