//! 同步协调器
//!
//! 进程内唯一的规范教程状态写入者，以 tokio actor 的形式运行：
//! - 每次写入都落盘，并广播给该站点的所有页面上下文（包括发起者）
//! - 并发写入不加锁，后到者覆盖先到者
//! - 每次写入（包括重置）分配站点内递增的版本号，页面据此识别过期广播
//! - 为每个页面上下文维护徽标式状态信号

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::message::{Broadcast, ContextId, Request, Response, TutorialCommand};
use super::status::StatusSignal;
use crate::error::SyncError;
use crate::infrastructure::store::{self, progress_key, state_key, KeyValueStore, SETTINGS_KEY};
use crate::models::{Settings, SiteInfo, TutorialPhase, TutorialProgress, TutorialState};

const MAILBOX_CAPACITY: usize = 64;

enum Envelope {
    Register {
        site_id: String,
        sender: mpsc::UnboundedSender<Broadcast>,
        reply: oneshot::Sender<ContextId>,
    },
    Unregister {
        context: ContextId,
    },
    Request {
        request: Request,
        reply: oneshot::Sender<Response>,
    },
}

struct ContextEntry {
    site_id: String,
    sender: mpsc::UnboundedSender<Broadcast>,
    status: StatusSignal,
    site: Option<SiteInfo>,
}

/// 协调器 actor
pub struct Coordinator {
    store: Arc<dyn KeyValueStore>,
    settings: Settings,
    contexts: BTreeMap<ContextId, ContextEntry>,
    next_context: ContextId,
    revisions: BTreeMap<String, u64>,
}

impl Coordinator {
    /// 读取设置并启动 actor 任务
    ///
    /// 所有 [`CoordinatorHandle`] 都被释放后任务自行结束。
    pub async fn spawn(store: Arc<dyn KeyValueStore>) -> (CoordinatorHandle, JoinHandle<()>) {
        let settings = match store::load::<Settings>(store.as_ref(), SETTINGS_KEY).await {
            Ok(Some(settings)) => settings,
            Ok(None) => {
                debug!("没有保存的设置，使用默认值");
                Settings::default()
            }
            Err(e) => {
                warn!("⚠️ 读取设置失败，使用默认值: {}", e);
                Settings::default()
            }
        };

        let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
        let coordinator = Coordinator {
            store,
            settings,
            contexts: BTreeMap::new(),
            next_context: 1,
            revisions: BTreeMap::new(),
        };
        let task = tokio::spawn(coordinator.run(rx));
        (CoordinatorHandle { tx }, task)
    }

    async fn run(mut self, mut rx: mpsc::Receiver<Envelope>) {
        info!("🔗 协调器已启动");
        while let Some(envelope) = rx.recv().await {
            match envelope {
                Envelope::Register {
                    site_id,
                    sender,
                    reply,
                } => {
                    let context = self.next_context;
                    self.next_context += 1;
                    debug!("注册页面上下文 #{} (站点 {})", context, site_id);
                    self.contexts.insert(
                        context,
                        ContextEntry {
                            site_id,
                            sender,
                            status: StatusSignal::cleared(),
                            site: None,
                        },
                    );
                    let _ = reply.send(context);
                }
                Envelope::Unregister { context } => {
                    debug!("注销页面上下文 #{}", context);
                    self.contexts.remove(&context);
                }
                Envelope::Request { request, reply } => {
                    let kind = request.kind();
                    let response = self.handle(request).await;
                    if !response.success {
                        debug!("{} 失败: {:?}", kind, response.error);
                    }
                    let _ = reply.send(response);
                }
            }
        }
        info!("🔗 协调器已退出");
    }

    async fn handle(&mut self, request: Request) -> Response {
        match request {
            Request::GetState { site_id } => {
                match store::load::<TutorialState>(self.store.as_ref(), &state_key(&site_id)).await
                {
                    Ok(state) => Response::with_data(&state),
                    Err(e) => {
                        warn!("⚠️ 读取站点 {} 的教程状态失败: {}", site_id, e);
                        Response::with_data(&Option::<TutorialState>::None)
                    }
                }
            }
            Request::UpdateState { site_id, state } => self.update_state(site_id, state).await,
            Request::ResetState { site_id } => self.reset_state(site_id).await,
            Request::Command { site_id, command } => {
                let reached = self.route_command(site_id.as_deref(), command);
                Response::with_data(&reached)
            }
            Request::CommandContext { context, command } => {
                debug!("命令 {:?} 发往页面上下文 #{}", command, context);
                if self.send_to(&[context], Broadcast::Command { command }) == 1 {
                    Response::ok()
                } else {
                    Response::failure(format!("unknown context {}", context))
                }
            }
            Request::SiteDetected { context, site } => self.site_detected(context, site).await,
            Request::UpdateStatus { context, status } => match self.contexts.get_mut(&context) {
                Some(entry) => {
                    entry.status = status;
                    Response::ok()
                }
                None => Response::failure(format!("unknown context {}", context)),
            },
            Request::GetStatus { context } => match self.contexts.get(&context) {
                Some(entry) => Response::with_data(&entry.status),
                None => Response::failure(format!("unknown context {}", context)),
            },
            Request::GetSettings => Response::with_data(&self.settings),
            Request::UpdateSettings { settings } => {
                if let Err(e) = store::save(self.store.as_ref(), SETTINGS_KEY, &settings).await {
                    warn!("⚠️ 保存设置失败: {}", e);
                }
                self.settings = settings;
                self.broadcast_all(Broadcast::SettingsChanged {
                    settings: self.settings.clone(),
                });
                Response::ok()
            }
            Request::GetProgress { site_id } => {
                match store::load::<TutorialProgress>(self.store.as_ref(), &progress_key(&site_id))
                    .await
                {
                    Ok(progress) => Response::with_data(&progress),
                    Err(e) => {
                        warn!("⚠️ 读取站点 {} 的进度失败: {}", site_id, e);
                        Response::with_data(&Option::<TutorialProgress>::None)
                    }
                }
            }
        }
    }

    async fn update_state(&mut self, site_id: String, mut state: TutorialState) -> Response {
        if let Err(reason) = state.check_invariants() {
            warn!("⚠️ 拒绝站点 {} 的非法状态: {}", site_id, reason);
            return Response::failure(reason);
        }

        state.site_id = Some(site_id.clone());
        state.last_active_at = Some(Utc::now());
        state.revision = self.next_revision(&site_id).await;

        if let Err(e) = store::save(self.store.as_ref(), &state_key(&site_id), &state).await {
            warn!("⚠️ 保存站点 {} 的教程状态失败: {}", site_id, e);
        }
        self.save_progress(&site_id, &state).await;

        debug!(
            "站点 {} 状态更新 (版本 {}): {:?} 第 {}/{} 步",
            site_id,
            state.revision,
            state.phase,
            state.current_step + 1,
            state.total_steps
        );

        self.set_site_status(&site_id, StatusSignal::for_state(&state));
        self.broadcast_site(
            &site_id,
            Broadcast::StateChanged {
                site_id: site_id.clone(),
                state: state.clone(),
            },
        );
        Response::with_data(&state)
    }

    async fn reset_state(&mut self, site_id: String) -> Response {
        if let Err(e) = self.store.remove(&state_key(&site_id)).await {
            warn!("⚠️ 删除站点 {} 的教程状态失败: {}", site_id, e);
        }
        info!("🔄 站点 {} 的教程状态已重置", site_id);

        let state = TutorialState {
            site_id: Some(site_id.clone()),
            revision: self.next_revision(&site_id).await,
            ..TutorialState::empty()
        };
        self.set_site_status(&site_id, StatusSignal::cleared());
        self.broadcast_site(
            &site_id,
            Broadcast::StateChanged {
                site_id: site_id.clone(),
                state: state.clone(),
            },
        );
        Response::with_data(&state)
    }

    /// 站点的下一个版本号；第一次写入时从已保存的状态接着数
    async fn next_revision(&mut self, site_id: &str) -> u64 {
        let current = match self.revisions.get(site_id) {
            Some(revision) => *revision,
            None => store::load::<TutorialState>(self.store.as_ref(), &state_key(site_id))
                .await
                .ok()
                .flatten()
                .map_or(0, |state| state.revision),
        };
        let next = current + 1;
        self.revisions.insert(site_id.to_string(), next);
        next
    }

    async fn site_detected(&mut self, context: ContextId, site: SiteInfo) -> Response {
        let Some(entry) = self.contexts.get(&context) else {
            return Response::failure(format!("unknown context {}", context));
        };

        let active = match store::load::<TutorialState>(
            self.store.as_ref(),
            &state_key(&entry.site_id),
        )
        .await
        {
            Ok(state) => state.is_some_and(|s| s.is_active),
            Err(_) => false,
        };

        let badge = site.is_compatible()
            && self.settings.auto_detect_tutorials
            && self.settings.badge_notifications
            && !active;
        if let Some(entry) = self.contexts.get_mut(&context) {
            if badge {
                entry.status = StatusSignal::site_available(&site.display_name);
            }
            entry.site = Some(site);
        }
        Response::ok()
    }

    async fn save_progress(&self, site_id: &str, state: &TutorialState) {
        if state.total_steps == 0 {
            return;
        }
        let is_completed = state.phase == TutorialPhase::Completed;
        let completion_percentage = if is_completed {
            100
        } else {
            (state.completed_steps.len() as f64 / state.total_steps as f64 * 100.0).round() as u8
        };
        let progress = TutorialProgress {
            site_id: site_id.to_string(),
            completed_steps: state.completed_steps.iter().copied().collect(),
            total_steps: state.total_steps,
            completion_percentage,
            last_visited: Utc::now(),
            is_completed,
        };
        if let Err(e) = store::save(self.store.as_ref(), &progress_key(site_id), &progress).await {
            warn!("⚠️ 保存站点 {} 的进度失败: {}", site_id, e);
        }
    }

    fn set_site_status(&mut self, site_id: &str, status: StatusSignal) {
        for entry in self.contexts.values_mut().filter(|e| e.site_id == site_id) {
            entry.status = status.clone();
        }
    }

    fn route_command(&mut self, site_id: Option<&str>, command: TutorialCommand) -> usize {
        let targets: Vec<ContextId> = self
            .contexts
            .iter()
            .filter(|(_, e)| site_id.is_none_or(|site| e.site_id == site))
            .map(|(id, _)| *id)
            .collect();
        debug!("命令 {:?} 发往 {} 个页面上下文", command, targets.len());
        self.send_to(&targets, Broadcast::Command { command })
    }

    fn broadcast_site(&mut self, site_id: &str, broadcast: Broadcast) {
        let targets: Vec<ContextId> = self
            .contexts
            .iter()
            .filter(|(_, e)| e.site_id == site_id)
            .map(|(id, _)| *id)
            .collect();
        self.send_to(&targets, broadcast);
    }

    fn broadcast_all(&mut self, broadcast: Broadcast) {
        let targets: Vec<ContextId> = self.contexts.keys().copied().collect();
        self.send_to(&targets, broadcast);
    }

    /// 逐个投递，接收端已关闭的上下文顺便移除
    fn send_to(&mut self, targets: &[ContextId], broadcast: Broadcast) -> usize {
        let mut delivered = 0;
        for id in targets {
            let alive = self
                .contexts
                .get(id)
                .is_some_and(|entry| entry.sender.send(broadcast.clone()).is_ok());
            if alive {
                delivered += 1;
            } else {
                debug!("页面上下文 #{} 已关闭，移除", id);
                self.contexts.remove(id);
            }
        }
        delivered
    }
}

/// 协调器客户端
#[derive(Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::Sender<Envelope>,
}

impl CoordinatorHandle {
    /// 注册页面上下文，返回编号和广播接收端
    pub async fn register(
        &self,
        site_id: &str,
    ) -> Result<(ContextId, mpsc::UnboundedReceiver<Broadcast>), SyncError> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Envelope::Register {
                site_id: site_id.to_string(),
                sender,
                reply,
            })
            .await
            .map_err(|_| SyncError::CoordinatorClosed)?;
        let context = rx.await.map_err(|_| SyncError::CoordinatorClosed)?;
        Ok((context, receiver))
    }

    pub async fn unregister(&self, context: ContextId) {
        let _ = self.tx.send(Envelope::Unregister { context }).await;
    }

    /// 发送请求并等待回复
    pub async fn request(&self, request: Request) -> Result<Response, SyncError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Envelope::Request { request, reply })
            .await
            .map_err(|_| SyncError::CoordinatorClosed)?;
        rx.await.map_err(|_| SyncError::CoordinatorClosed)
    }

    pub async fn get_state(&self, site_id: &str) -> Result<Option<TutorialState>, SyncError> {
        self.request(Request::GetState {
            site_id: site_id.to_string(),
        })
        .await?
        .into_data()
    }

    /// 写入规范状态，返回协调器盖章后的状态
    pub async fn update_state(
        &self,
        site_id: &str,
        state: TutorialState,
    ) -> Result<TutorialState, SyncError> {
        self.request(Request::UpdateState {
            site_id: site_id.to_string(),
            state,
        })
        .await?
        .into_data()?
        .ok_or_else(|| SyncError::Rejected {
            message: "UPDATE_STATE 回复缺少状态".to_string(),
        })
    }

    /// 删除站点的状态记录，返回广播出去的空状态
    pub async fn reset_state(&self, site_id: &str) -> Result<TutorialState, SyncError> {
        self.request(Request::ResetState {
            site_id: site_id.to_string(),
        })
        .await?
        .into_data()?
        .ok_or_else(|| SyncError::Rejected {
            message: "RESET_STATE 回复缺少状态".to_string(),
        })
    }

    /// 发送控制命令，返回收到命令的页面上下文数量
    pub async fn send_command(
        &self,
        site_id: Option<&str>,
        command: TutorialCommand,
    ) -> Result<usize, SyncError> {
        Ok(self
            .request(Request::Command {
                site_id: site_id.map(str::to_string),
                command,
            })
            .await?
            .into_data()?
            .unwrap_or(0))
    }

    /// 只向一个页面上下文发送控制命令
    pub async fn send_command_to(
        &self,
        context: ContextId,
        command: TutorialCommand,
    ) -> Result<(), SyncError> {
        self.request(Request::CommandContext { context, command })
            .await?
            .into_result()
            .map(|_| ())
    }

    pub async fn site_detected(&self, context: ContextId, site: SiteInfo) -> Result<(), SyncError> {
        self.request(Request::SiteDetected { context, site })
            .await?
            .into_result()
            .map(|_| ())
    }

    pub async fn update_status(
        &self,
        context: ContextId,
        status: StatusSignal,
    ) -> Result<(), SyncError> {
        self.request(Request::UpdateStatus { context, status })
            .await?
            .into_result()
            .map(|_| ())
    }

    pub async fn get_status(&self, context: ContextId) -> Result<StatusSignal, SyncError> {
        Ok(self
            .request(Request::GetStatus { context })
            .await?
            .into_data()?
            .unwrap_or_default())
    }

    pub async fn get_settings(&self) -> Result<Settings, SyncError> {
        Ok(self
            .request(Request::GetSettings)
            .await?
            .into_data()?
            .unwrap_or_default())
    }

    pub async fn update_settings(&self, settings: Settings) -> Result<(), SyncError> {
        self.request(Request::UpdateSettings { settings })
            .await?
            .into_result()
            .map(|_| ())
    }

    pub async fn get_progress(&self, site_id: &str) -> Result<Option<TutorialProgress>, SyncError> {
        self.request(Request::GetProgress {
            site_id: site_id.to_string(),
        })
        .await?
        .into_data()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::store::MemoryStore;

    fn active(step: usize, total: usize) -> TutorialState {
        TutorialState {
            is_active: true,
            phase: TutorialPhase::Active,
            current_step: step,
            total_steps: total,
            completed_steps: (0..step).collect(),
            session_id: Some("session_1_abc".to_string()),
            ..TutorialState::empty()
        }
    }

    fn site(id: &str, compatible: bool) -> SiteInfo {
        SiteInfo {
            identifier: crate::models::SiteIdentifier::new(id),
            display_name: "GitHub".to_string(),
            description: String::new(),
            rule_id: compatible.then(|| id.to_string()),
        }
    }

    #[tokio::test]
    async fn test_update_persists_stamps_and_broadcasts_to_site() {
        let store = Arc::new(MemoryStore::new());
        let (handle, _task) = Coordinator::spawn(store.clone()).await;
        let (a, mut rx_a) = handle.register("github").await.unwrap();
        let (_b, mut rx_b) = handle.register("github").await.unwrap();
        let (_c, mut rx_c) = handle.register("gitlab").await.unwrap();

        let stamped = handle.update_state("github", active(1, 5)).await.unwrap();
        assert_eq!(stamped.site_id.as_deref(), Some("github"));
        assert!(stamped.last_active_at.is_some());

        for rx in [&mut rx_a, &mut rx_b] {
            match rx.try_recv().unwrap() {
                Broadcast::StateChanged { site_id, state } => {
                    assert_eq!(site_id, "github");
                    assert_eq!(state, stamped);
                }
                other => panic!("unexpected broadcast {:?}", other),
            }
        }
        assert!(rx_c.try_recv().is_err());

        assert_eq!(handle.get_state("github").await.unwrap(), Some(stamped));
        assert_eq!(handle.get_status(a).await.unwrap().text, "40%");

        let progress = handle.get_progress("github").await.unwrap().unwrap();
        assert_eq!(progress.completed_steps, vec![0]);
        assert_eq!(progress.completion_percentage, 20);
        assert!(!progress.is_completed);
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let (handle, _task) = Coordinator::spawn(Arc::new(MemoryStore::new())).await;
        handle.update_state("github", active(3, 5)).await.unwrap();
        handle.update_state("github", active(2, 5)).await.unwrap();
        assert_eq!(handle.get_state("github").await.unwrap().unwrap().current_step, 2);
    }

    #[tokio::test]
    async fn test_revisions_increase_across_writes_and_reset() {
        let store = Arc::new(MemoryStore::new());
        let (handle, _task) = Coordinator::spawn(store.clone()).await;

        let first = handle.update_state("github", active(0, 3)).await.unwrap();
        let second = handle.update_state("github", active(1, 3)).await.unwrap();
        let other_site = handle.update_state("gitlab", active(0, 3)).await.unwrap();
        assert_eq!(first.revision, 1);
        assert_eq!(second.revision, 2);
        assert_eq!(other_site.revision, 1);

        let cleared = handle.reset_state("github").await.unwrap();
        assert_eq!(cleared.revision, 3);
        let after_reset = handle.update_state("github", active(0, 3)).await.unwrap();
        assert_eq!(after_reset.revision, 4);

        drop(handle);
        let (reopened, _task) = Coordinator::spawn(store).await;
        let resumed = reopened.update_state("github", active(1, 3)).await.unwrap();
        assert_eq!(resumed.revision, 5);
    }

    #[tokio::test]
    async fn test_invalid_state_rejected() {
        let (handle, _task) = Coordinator::spawn(Arc::new(MemoryStore::new())).await;
        let err = handle.update_state("github", active(5, 5)).await.unwrap_err();
        assert!(matches!(err, SyncError::Rejected { .. }));
        assert!(handle.get_state("github").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reset_removes_record_and_clears_status() {
        let store = Arc::new(MemoryStore::new());
        let (handle, _task) = Coordinator::spawn(store.clone()).await;
        let (ctx, mut rx) = handle.register("github").await.unwrap();

        handle.update_state("github", active(0, 3)).await.unwrap();
        handle.reset_state("github").await.unwrap();

        assert!(handle.get_state("github").await.unwrap().is_none());
        assert!(!store.keys().contains(&state_key("github")));
        assert!(handle.get_status(ctx).await.unwrap().is_cleared());

        let _first = rx.try_recv().unwrap();
        match rx.try_recv().unwrap() {
            Broadcast::StateChanged { state, .. } => {
                assert!(!state.is_active);
                assert_eq!(state.total_steps, 0);
            }
            other => panic!("unexpected broadcast {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_completed_status_and_progress() {
        let (handle, _task) = Coordinator::spawn(Arc::new(MemoryStore::new())).await;
        let (ctx, _rx) = handle.register("github").await.unwrap();
        let done = TutorialState {
            phase: TutorialPhase::Completed,
            total_steps: 3,
            completed_steps: [0, 1].into_iter().collect(),
            ..TutorialState::empty()
        };
        handle.update_state("github", done).await.unwrap();

        let status = handle.get_status(ctx).await.unwrap();
        assert_eq!(status, StatusSignal::completed());
        let progress = handle.get_progress("github").await.unwrap().unwrap();
        assert!(progress.is_completed);
        assert_eq!(progress.completion_percentage, 100);
    }

    #[tokio::test]
    async fn test_site_detected_badge_respects_settings() {
        let (handle, _task) = Coordinator::spawn(Arc::new(MemoryStore::new())).await;
        let (ctx, _rx) = handle.register("github").await.unwrap();

        handle.site_detected(ctx, site("github", false)).await.unwrap();
        assert!(handle.get_status(ctx).await.unwrap().is_cleared());

        handle.site_detected(ctx, site("github", true)).await.unwrap();
        let status = handle.get_status(ctx).await.unwrap();
        assert_eq!(status.text, "!");
        assert_eq!(status.title.as_deref(), Some("Tutorial available for GitHub"));

        let (other, _rx2) = handle.register("github").await.unwrap();
        handle
            .update_settings(Settings {
                badge_notifications: false,
                ..Settings::default()
            })
            .await
            .unwrap();
        handle.site_detected(other, site("github", true)).await.unwrap();
        assert!(handle.get_status(other).await.unwrap().is_cleared());
    }

    #[tokio::test]
    async fn test_site_detected_badge_respects_auto_detect() {
        let (handle, _task) = Coordinator::spawn(Arc::new(MemoryStore::new())).await;
        let (ctx, _rx) = handle.register("github").await.unwrap();
        handle
            .update_settings(Settings {
                auto_detect_tutorials: false,
                ..Settings::default()
            })
            .await
            .unwrap();

        handle.site_detected(ctx, site("github", true)).await.unwrap();
        assert!(handle.get_status(ctx).await.unwrap().is_cleared());
    }

    #[tokio::test]
    async fn test_settings_persist_and_broadcast() {
        let store = Arc::new(MemoryStore::new());
        let (handle, _task) = Coordinator::spawn(store.clone()).await;
        let (_ctx, mut rx) = handle.register("anything").await.unwrap();

        let settings = Settings {
            language: "de".to_string(),
            ..Settings::default()
        };
        handle.update_settings(settings.clone()).await.unwrap();

        assert_eq!(handle.get_settings().await.unwrap(), settings);
        assert_eq!(
            rx.try_recv().unwrap(),
            Broadcast::SettingsChanged {
                settings: settings.clone()
            }
        );

        drop(handle);
        let (reopened, _task) = Coordinator::spawn(store).await;
        assert_eq!(reopened.get_settings().await.unwrap().language, "de");
    }

    #[tokio::test]
    async fn test_commands_routed_by_site_and_dead_contexts_pruned() {
        let (handle, _task) = Coordinator::spawn(Arc::new(MemoryStore::new())).await;
        let (_a, mut rx_a) = handle.register("github").await.unwrap();
        let (_b, rx_b) = handle.register("gitlab").await.unwrap();

        assert_eq!(
            handle.send_command(Some("github"), TutorialCommand::Next).await.unwrap(),
            1
        );
        assert_eq!(
            rx_a.try_recv().unwrap(),
            Broadcast::Command {
                command: TutorialCommand::Next
            }
        );

        drop(rx_b);
        assert_eq!(handle.send_command(None, TutorialCommand::Stop).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_command_to_single_context() {
        let (handle, _task) = Coordinator::spawn(Arc::new(MemoryStore::new())).await;
        let (a, mut rx_a) = handle.register("github").await.unwrap();
        let (_b, mut rx_b) = handle.register("github").await.unwrap();

        handle.send_command_to(a, TutorialCommand::Start).await.unwrap();
        assert_eq!(
            rx_a.try_recv().unwrap(),
            Broadcast::Command {
                command: TutorialCommand::Start
            }
        );
        assert!(rx_b.try_recv().is_err());

        drop(rx_a);
        assert!(handle.send_command_to(a, TutorialCommand::Next).await.is_err());
        assert!(handle.send_command_to(99, TutorialCommand::Next).await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_context_status_rejected() {
        let (handle, _task) = Coordinator::spawn(Arc::new(MemoryStore::new())).await;
        assert!(handle.get_status(99).await.is_err());
    }
}
