//! 单个标签页接入 - 编排层
//!
//! ## 职责
//!
//! 为一个标签页组装完整的教程引擎并启动它的事件循环：
//!
//! 1. 包装页面资源（`JsExecutor` → `CdpDocument`）
//! 2. 识别站点，查找自定义步骤
//! 3. 注入协作者（协调器、引导文本、语音）并 `init()`
//! 4. 在后台任务中运行事件循环，收到关闭信号后 `dispose()`
//! 5. 把页面的加载完成事件转成 [`EngineEvent::PageReloaded`]

use std::sync::Arc;

use anyhow::{anyhow, Result};
use chromiumoxide::cdp::browser_protocol::page::EventLoadEventFired;
use chromiumoxide::Page;
use futures::{Stream, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::dom::HostDocument;
use crate::infrastructure::{CdpDocument, JsExecutor};
use crate::models::{find_custom_steps, TutorialStep};
use crate::services::{GuidanceResolver, Narrator, SiteDetector, SpeechSynthesisNarrator};
use crate::sync::{ContextId, CoordinatorHandle};
use crate::workflow::{EngineDeps, EngineEvent, PageCtx, TutorialEngine};

/// 已接入的页面上下文
pub struct AttachedPage {
    pub ctx: PageCtx,
    /// 协调器分配的上下文编号
    pub context: ContextId,
    pub events: mpsc::UnboundedSender<EngineEvent>,
    pub handle: JoinHandle<()>,
}

/// 接入一个浏览器标签页
pub async fn attach_page(
    page: Page,
    page_index: usize,
    coordinator: CoordinatorHandle,
    guidance: Arc<dyn GuidanceResolver>,
    config: &Config,
    shutdown: watch::Receiver<bool>,
) -> Result<AttachedPage> {
    // 先订阅，接入期间发生的加载也不会漏掉
    let loads = page.event_listener::<EventLoadEventFired>().await?;

    let executor = Arc::new(JsExecutor::new(page));
    let document: Arc<dyn HostDocument> = Arc::new(CdpDocument::new(executor.clone()));
    let narrator: Arc<dyn Narrator> = Arc::new(SpeechSynthesisNarrator::new(executor));

    let attached = attach_document(
        EngineDeps {
            document,
            coordinator,
            guidance,
            narrator,
        },
        page_index,
        config,
        shutdown.clone(),
    )
    .await?;

    forward_reloads(loads, attached.events.clone(), shutdown, attached.ctx.clone());
    Ok(attached)
}

/// 页面每次加载完成，通知引擎重新恢复教程
pub(crate) fn forward_reloads<S>(
    mut loads: S,
    events: mpsc::UnboundedSender<EngineEvent>,
    mut shutdown: watch::Receiver<bool>,
    ctx: PageCtx,
) -> JoinHandle<()>
where
    S: Stream + Unpin + Send + 'static,
    S::Item: Send,
{
    tokio::spawn(async move {
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                loaded = loads.next() => {
                    if loaded.is_none() {
                        break;
                    }
                    debug!("{} 页面加载完成", ctx);
                    if events.send(EngineEvent::PageReloaded).is_err() {
                        break;
                    }
                }
            }
        }
    })
}

/// 为任意宿主文档组装并启动引擎
pub async fn attach_document(
    deps: EngineDeps,
    page_index: usize,
    config: &Config,
    shutdown: watch::Receiver<bool>,
) -> Result<AttachedPage> {
    let location = deps
        .document
        .location()
        .await
        .map_err(|e| anyhow!("[页面 {}] 读取页面位置失败: {}", page_index, e))?;

    let site = SiteDetector::default()
        .site_info(deps.document.as_ref())
        .await
        .ok_or_else(|| anyhow!("[页面 {}] 无法识别站点", page_index))?;

    let ctx = PageCtx::new(site.identifier.as_str(), page_index, &location.origin);
    let custom_steps = load_custom_steps(&ctx, &config.steps_folder).await;

    let mut engine = TutorialEngine::new(ctx.clone(), site, deps, custom_steps)
        .with_poll_interval(std::time::Duration::from_millis(config.page_poll_interval_ms));
    engine.init().await?;
    let context = engine
        .context_id()
        .ok_or_else(|| anyhow!("{} 引擎没有注册到协调器", ctx))?;
    let events = engine.event_sender();

    let handle = tokio::spawn(engine.run(shutdown));
    info!("{} ✓ 已接入 {} (上下文 #{})", ctx, location.origin, context);

    Ok(AttachedPage {
        ctx,
        context,
        events,
        handle,
    })
}

async fn load_custom_steps(ctx: &PageCtx, steps_folder: &str) -> Option<Vec<TutorialStep>> {
    match find_custom_steps(steps_folder, &ctx.site_id).await {
        Ok(Some(steps)) => {
            info!("{} 📁 使用自定义步骤 ({} 个)", ctx, steps.len());
            Some(steps)
        }
        Ok(None) => {
            debug!("{} 没有自定义步骤，将自动扫描页面", ctx);
            None
        }
        Err(e) => {
            warn!("{} ⚠️ 读取自定义步骤失败: {}", ctx, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_each_load_becomes_reload_event() {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let loads = futures::stream::iter(vec![(), ()]);

        let task = forward_reloads(loads, events_tx, shutdown_rx, PageCtx::new("shop", 1, "https://shop.example.com"));
        tokio_test::assert_ok!(task.await);

        assert_eq!(events_rx.recv().await, Some(EngineEvent::PageReloaded));
        assert_eq!(events_rx.recv().await, Some(EngineEvent::PageReloaded));
        assert_eq!(events_rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_forwarder_stops_on_shutdown() {
        let (events_tx, _events_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let loads = futures::stream::pending::<()>();

        let task = forward_reloads(loads, events_tx, shutdown_rx, PageCtx::new("shop", 1, "https://shop.example.com"));
        shutdown_tx.send(true).unwrap();
        tokio_test::assert_ok!(task.await);
    }
}
