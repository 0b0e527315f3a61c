//! # Page Tutor
//!
//! 在真实网页上叠加分步引导教程的 Rust 应用程序
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（Page、状态文件），只暴露能力
//! - `JsExecutor` - 唯一的 page owner，提供 eval() 能力
//! - `CdpDocument` - 基于 JsExecutor 的宿主文档实现
//! - `KeyValueStore` - 键值存储（JSON 文件 / 内存）
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，不认识教程流程
//! - `discovery` - 扫描交互元素、生成步骤
//! - `positioning` / `overlay` / `locator` - 定位、绘制、元素解析
//! - `guidance` / `voice` - 引导文本与语音播报
//! - `site_detection` - 站点识别
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个标签页"上的完整教程流程
//! - `TutorialMachine` - 纯状态机
//! - `HighlightController` - 高亮会话（拆除 → 创建、过期代号丢弃）
//! - `TutorialEngine` - 事件驱动的引擎
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/app` - 应用，管理浏览器、协调器和命令循环
//! - `orchestrator/page_processor` - 单个标签页接入
//!
//! 跨标签页的规范状态由 `sync::Coordinator` 统一写入并广播。
//!
//! ## 模块结构

pub mod browser;
pub mod config;
pub mod dom;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod sync;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use browser::{connect_to_browser_and_pages, launch_headless_browser};
pub use config::Config;
pub use dom::{HostDocument, MemoryDocument};
pub use error::{Result, TutorError};
pub use infrastructure::{CdpDocument, JsExecutor, JsonFileStore, MemoryStore};
pub use models::{Settings, SiteInfo, TutorialPhase, TutorialState, TutorialStep};
pub use orchestrator::App;
pub use sync::{Coordinator, CoordinatorHandle, TutorialCommand};
pub use workflow::{EngineDeps, PageCtx, TutorialEngine};
