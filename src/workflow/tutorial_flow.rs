//! 教程引擎 - 流程层
//!
//! 核心职责：驱动"一个标签页"上的完整教程流程
//!
//! - 状态机转换后发布规范状态，再根据状态高亮当前步骤
//! - 协调器广播、页面事件、引导文本结果都作为 [`EngineEvent`] 逐个处理
//! - 页面重新加载后重新走一遍恢复流程（页面侧的覆盖层和观察者已经丢失）
//! - 所有协作者在构造时注入，生命周期由 `init()` / `dispose()` 显式管理
//! - 任何错误都在这里记录并降级，不会抛给页面

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::dom::{
    ElementSnapshot, HostDocument, PageEvent, PanelContent, PanelKind, TooltipAction,
    TooltipContent,
};
use crate::error::{TutorError, TutorialFault};
use crate::models::{Settings, SiteInfo, TutorialPhase, TutorialState, TutorialStep};
use crate::services::{
    completion_panel, discover_steps, introduction_panel, GuidanceRequest, GuidanceResolver,
    Narrator,
};
use crate::sync::{Broadcast, ContextId, CoordinatorHandle, StatusSignal, TutorialCommand};
use crate::utils::logging::truncate_text;
use crate::workflow::highlight::{HighlightController, LayoutOutcome, ShowOutcome};
use crate::workflow::page_ctx::PageCtx;
use crate::workflow::state_machine::{RemoteEffect, StartPlan, TutorialMachine};

/// 引擎一次处理的事件
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Command(TutorialCommand),
    Broadcast(Broadcast),
    Page(PageEvent),
    /// 结构变化防抖到期
    MutationSettled { generation: u64 },
    /// 引导文本返回，带着请求时的高亮代号和会话
    GuidanceReady {
        generation: u64,
        session_id: Option<String>,
        text: String,
    },
    /// 标签页重新加载完成
    PageReloaded,
}

/// 引擎的外部协作者
#[derive(Clone)]
pub struct EngineDeps {
    pub document: Arc<dyn HostDocument>,
    pub coordinator: CoordinatorHandle,
    pub guidance: Arc<dyn GuidanceResolver>,
    pub narrator: Arc<dyn Narrator>,
}

pub struct TutorialEngine {
    ctx: PageCtx,
    site: SiteInfo,
    document: Arc<dyn HostDocument>,
    coordinator: CoordinatorHandle,
    guidance: Arc<dyn GuidanceResolver>,
    narrator: Arc<dyn Narrator>,
    custom_steps: Option<Vec<TutorialStep>>,
    settings: Settings,
    machine: TutorialMachine,
    steps: Vec<TutorialStep>,
    highlight: HighlightController,
    panel: Option<PanelKind>,
    context_id: Option<ContextId>,
    broadcasts: Option<mpsc::UnboundedReceiver<Broadcast>>,
    internal_tx: mpsc::UnboundedSender<EngineEvent>,
    internal_rx: mpsc::UnboundedReceiver<EngineEvent>,
    guidance_task: Option<JoinHandle<()>>,
    poll_interval: Duration,
}

impl TutorialEngine {
    pub fn new(
        ctx: PageCtx,
        site: SiteInfo,
        deps: EngineDeps,
        custom_steps: Option<Vec<TutorialStep>>,
    ) -> Self {
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        Self {
            ctx,
            site,
            highlight: HighlightController::new(deps.document.clone()),
            document: deps.document,
            coordinator: deps.coordinator,
            guidance: deps.guidance,
            narrator: deps.narrator,
            custom_steps,
            settings: Settings::default(),
            machine: TutorialMachine::new(),
            steps: Vec::new(),
            panel: None,
            context_id: None,
            broadcasts: None,
            internal_tx,
            internal_rx,
            guidance_task: None,
            poll_interval: Duration::from_millis(50),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn ctx(&self) -> &PageCtx {
        &self.ctx
    }

    pub fn state(&self) -> &TutorialState {
        self.machine.state()
    }

    pub fn steps(&self) -> &[TutorialStep] {
        &self.steps
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn context_id(&self) -> Option<ContextId> {
        self.context_id
    }

    /// 当前高亮的选择器
    pub fn highlighted(&self) -> Option<&str> {
        self.highlight.active_selector()
    }

    pub fn highlight_generation(&self) -> u64 {
        self.highlight.generation()
    }

    /// 当前打开的面板
    pub fn panel(&self) -> Option<PanelKind> {
        self.panel
    }

    /// 向事件循环投递事件的发送端（页面重新加载等外部通知）
    pub fn event_sender(&self) -> mpsc::UnboundedSender<EngineEvent> {
        self.internal_tx.clone()
    }

    /// 注册到协调器，读取设置与已保存的状态
    ///
    /// 已保存的状态处于激活中时，重新生成步骤：数量一致则从当前步骤继续，否则重新开始。
    pub async fn init(&mut self) -> Result<(), TutorError> {
        let (context, receiver) = self.coordinator.register(&self.ctx.site_id).await?;
        self.context_id = Some(context);
        self.broadcasts = Some(receiver);

        self.settings = match self.coordinator.get_settings().await {
            Ok(settings) => settings,
            Err(e) => {
                warn!("{} ⚠️ 读取设置失败，使用默认值: {}", self.ctx, e);
                Settings::default()
            }
        };

        self.report_site(context).await;

        info!(
            "{} ✓ 引擎已初始化: {} (上下文 #{})",
            self.ctx, self.site.display_name, context
        );

        self.restore().await;
        Ok(())
    }

    async fn report_site(&self, context: ContextId) {
        if let Err(e) = self.coordinator.site_detected(context, self.site.clone()).await {
            warn!("{} ⚠️ 上报站点失败: {}", self.ctx, e);
        }
    }

    /// 按协调器中保存的状态恢复
    async fn restore(&mut self) {
        match self.coordinator.get_state(&self.ctx.site_id).await {
            Ok(Some(state)) if state.is_active => self.resume(state).await,
            Ok(Some(state)) => self.machine = TutorialMachine::from_state(state),
            Ok(None) => {
                debug!("{} 没有保存的教程状态", self.ctx);
                self.machine.reset();
            }
            Err(e) => warn!("{} ⚠️ 读取教程状态失败: {}", self.ctx, e),
        }
    }

    /// 页面重新加载：丢弃本地会话，再按保存的状态恢复
    async fn on_reload(&mut self) {
        self.end_session().await;
        self.panel = None;

        let location = match self.document.location().await {
            Ok(location) => location,
            Err(e) => {
                warn!("{} ⚠️ 重新加载后读取页面位置失败: {}", self.ctx, e);
                return;
            }
        };
        if location.origin != self.ctx.origin {
            info!(
                "{} 页面已离开站点 ({})，暂停教程",
                self.ctx, location.origin
            );
            self.steps.clear();
            return;
        }

        info!("{} 🔄 页面已重新加载，恢复教程", self.ctx);
        if let Some(context) = self.context_id {
            self.report_site(context).await;
        }
        self.restore().await;
    }

    /// 拆除覆盖层、取消挂起的请求并从协调器注销
    pub async fn dispose(&mut self) {
        self.end_session().await;
        self.close_panel().await;
        if let Some(context) = self.context_id.take() {
            if let Err(e) = self
                .coordinator
                .update_status(context, StatusSignal::cleared())
                .await
            {
                debug!("{} 清除状态信号失败: {}", self.ctx, e);
            }
            self.coordinator.unregister(context).await;
        }
        self.broadcasts = None;
        info!("{} 引擎已释放", self.ctx);
    }

    /// 事件循环：轮询页面事件，处理广播与内部事件，直到收到关闭信号
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let Some(mut broadcasts) = self.broadcasts.take() else {
            warn!("{} ⚠️ 引擎未初始化，事件循环不启动", self.ctx);
            return;
        };
        let (_, placeholder) = mpsc::unbounded_channel();
        let mut internal = std::mem::replace(&mut self.internal_rx, placeholder);

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let deadline = self.highlight.mutation_deadline();
            let wake_at = deadline
                .map(|(at, _)| at)
                .unwrap_or_else(|| Instant::now() + Duration::from_secs(3600));

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                Some(broadcast) = broadcasts.recv() => {
                    self.handle(EngineEvent::Broadcast(broadcast)).await;
                }
                Some(event) = internal.recv() => {
                    self.handle(event).await;
                }
                _ = ticker.tick() => {
                    self.poll_page().await;
                }
                _ = tokio::time::sleep_until(wake_at), if deadline.is_some() => {
                    if let Some((_, generation)) = deadline {
                        self.handle(EngineEvent::MutationSettled { generation }).await;
                    }
                }
            }
        }

        self.dispose().await;
    }

    /// 取出页面排队的事件并逐个处理
    pub async fn poll_page(&mut self) -> usize {
        match self.document.drain_events().await {
            Ok(events) => {
                let count = events.len();
                for event in events {
                    self.handle(EngineEvent::Page(event)).await;
                }
                count
            }
            Err(e) => {
                debug!("{} 读取页面事件失败: {}", self.ctx, e);
                0
            }
        }
    }

    /// 不阻塞地处理所有已经到达的事件（页面事件、广播、引导文本、到期的防抖）
    pub async fn pump(&mut self) -> usize {
        let mut handled = 0;
        loop {
            let mut round = self.poll_page().await;
            while let Some(event) = self.next_queued() {
                self.handle(event).await;
                round += 1;
            }
            if round == 0 {
                return handled;
            }
            handled += round;
        }
    }

    fn next_queued(&mut self) -> Option<EngineEvent> {
        if let Some(Ok(broadcast)) = self.broadcasts.as_mut().map(|rx| rx.try_recv()) {
            return Some(EngineEvent::Broadcast(broadcast));
        }
        if let Ok(event) = self.internal_rx.try_recv() {
            return Some(event);
        }
        match self.highlight.mutation_deadline() {
            Some((deadline, generation)) if deadline <= Instant::now() => {
                Some(EngineEvent::MutationSettled { generation })
            }
            _ => None,
        }
    }

    /// 处理一个事件
    pub async fn handle(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Command(command) => self.execute(command).await,
            EngineEvent::Broadcast(broadcast) => self.on_broadcast(broadcast).await,
            EngineEvent::Page(PageEvent::Action { action }) => self.on_action(action).await,
            EngineEvent::Page(PageEvent::Layout { generation, change }) => {
                let outcome = self.highlight.on_layout(generation, change).await;
                self.after_layout(outcome).await;
            }
            EngineEvent::MutationSettled { generation } => {
                let outcome = self.highlight.on_mutation_settled(generation).await;
                self.after_layout(outcome).await;
            }
            EngineEvent::GuidanceReady {
                generation,
                session_id,
                text,
            } => self.on_guidance(generation, session_id, text).await,
            EngineEvent::PageReloaded => self.on_reload().await,
        }
    }

    async fn on_action(&mut self, action: TooltipAction) {
        let command = match action {
            TooltipAction::Next => TutorialCommand::Next,
            TooltipAction::Previous => TutorialCommand::Previous,
            TooltipAction::Skip => TutorialCommand::Skip,
            TooltipAction::AcceptIntroduction => TutorialCommand::AcceptIntroduction,
            TooltipAction::SkipIntroduction => TutorialCommand::SkipIntroduction,
            TooltipAction::DismissPanel => {
                self.close_panel().await;
                return;
            }
        };
        self.execute(command).await;
    }

    /// 执行控制命令
    pub async fn execute(&mut self, command: TutorialCommand) {
        debug!("{} 命令: {:?}", self.ctx, command);
        match command {
            TutorialCommand::Start => self.start().await,
            TutorialCommand::AcceptIntroduction => {
                if self.machine.is_active() {
                    debug!("{} 教程进行中，忽略介绍确认", self.ctx);
                    return;
                }
                self.close_panel().await;
                self.machine.accept_introduction();
                if !self.start_tutorial().await {
                    self.publish().await;
                }
            }
            TutorialCommand::SkipIntroduction => {
                self.close_panel().await;
                if self.machine.skip_introduction() {
                    info!("{} 跳过教程介绍", self.ctx);
                    self.publish().await;
                }
            }
            TutorialCommand::Next => {
                if !self.machine.next() {
                    debug!("{} 教程未激活，忽略 next", self.ctx);
                    return;
                }
                self.publish().await;
                self.show_current().await;
            }
            TutorialCommand::Previous => {
                if self.machine.previous() {
                    self.publish().await;
                    self.show_current().await;
                }
            }
            TutorialCommand::Stop | TutorialCommand::Skip => {
                if self.machine.stop() {
                    self.end_session().await;
                    self.close_panel().await;
                    self.publish().await;
                    info!(
                        "{} ⏹ 教程已停止 (第 {}/{} 步)",
                        self.ctx,
                        self.machine.state().current_step + 1,
                        self.machine.state().total_steps
                    );
                }
            }
            TutorialCommand::Reset => {
                self.end_session().await;
                self.close_panel().await;
                self.machine.reset();
                self.steps.clear();
                match self.coordinator.reset_state(&self.ctx.site_id).await {
                    Ok(cleared) => self.machine.adopt_stamp(&cleared),
                    Err(e) => warn!("{} ⚠️ 重置状态失败: {}", self.ctx, e),
                }
                info!("{} 🔄 教程已重置", self.ctx);
            }
        }
    }

    async fn start(&mut self) {
        match self.machine.plan_start(self.settings.show_introduction) {
            StartPlan::ShowIntroduction => {
                self.end_session().await;
                info!(
                    "{} 👋 {}: {} (intro-accept 开始 / intro-skip 跳过)",
                    self.ctx, self.site.display_name, self.site.description
                );
                self.open_panel(introduction_panel(&self.site)).await;
            }
            StartPlan::GenerateSteps => {
                self.start_tutorial().await;
            }
        }
    }

    /// 生成步骤并开始新会话；没有步骤时不启动，返回 false
    async fn start_tutorial(&mut self) -> bool {
        self.end_session().await;
        self.close_panel().await;
        let steps = self.generate_steps().await;
        if let Err(fault) = self.machine.begin(steps.len()) {
            warn!("{} ⚠️ {}，不启动教程", self.ctx, fault);
            return false;
        }
        self.steps = steps;
        info!(
            "{} 🚀 教程开始: 共 {} 步 (会话 {})",
            self.ctx,
            self.steps.len(),
            self.machine.state().session_id.as_deref().unwrap_or("-")
        );
        self.publish().await;
        self.show_current().await;
        true
    }

    async fn resume(&mut self, state: TutorialState) {
        let steps = self.generate_steps().await;
        if steps.len() == state.total_steps {
            info!(
                "{} ▶️ 恢复教程: 第 {}/{} 步",
                self.ctx,
                state.current_step + 1,
                state.total_steps
            );
            self.machine = TutorialMachine::from_state(state);
            self.steps = steps;
            self.show_current().await;
            return;
        }

        info!(
            "{} 步骤数变化 ({} → {})，重新开始",
            self.ctx,
            state.total_steps,
            steps.len()
        );
        self.machine = TutorialMachine::from_state(state);
        match self.machine.begin(steps.len()) {
            Ok(()) => {
                self.steps = steps;
                self.publish().await;
                self.show_current().await;
            }
            Err(fault) => {
                warn!("{} ⚠️ {}，停止已保存的教程", self.ctx, fault);
                self.machine.stop();
                self.publish().await;
            }
        }
    }

    async fn generate_steps(&self) -> Vec<TutorialStep> {
        if let Some(steps) = self.custom_steps.as_ref().filter(|s| !s.is_empty()) {
            debug!("{} 使用自定义步骤 ({} 个)", self.ctx, steps.len());
            return steps.clone();
        }
        match discover_steps(self.document.as_ref(), &self.settings.language).await {
            Ok(steps) => steps,
            Err(e) => {
                warn!("{} ⚠️ 扫描交互元素失败: {}", self.ctx, e);
                Vec::new()
            }
        }
    }

    /// 高亮当前步骤；目标不存在时自动前进
    async fn show_current(&mut self) {
        self.cancel_guidance();
        loop {
            if !self.machine.is_active() {
                self.end_session().await;
                if self.machine.phase() == TutorialPhase::Completed {
                    info!("{} 🎉 教程已完成", self.ctx);
                    self.open_panel(completion_panel()).await;
                }
                return;
            }

            let index = self.machine.state().current_step;
            let Some(step) = self.steps.get(index).cloned() else {
                warn!("{} ⚠️ 第 {} 步没有对应的步骤定义", self.ctx, index + 1);
                self.highlight.teardown().await;
                return;
            };

            let content = self.tooltip_content(&step);
            match self.highlight.show(&step, content).await {
                Ok(ShowOutcome::Shown {
                    generation,
                    element,
                }) => {
                    info!(
                        "{} 🎯 第 {}/{} 步: {} ({})",
                        self.ctx,
                        index + 1,
                        self.machine.state().total_steps,
                        step.title,
                        step.target_selector
                    );
                    self.request_guidance(generation, &element, step);
                    return;
                }
                Ok(ShowOutcome::TargetMissing) => {
                    let fault = TutorialFault::TargetNotFound {
                        selector: step.target_selector.clone(),
                    };
                    warn!("{} ⚠️ {}，自动跳到下一步", self.ctx, fault);
                    self.machine.next();
                    self.publish().await;
                }
                Err(fault) => {
                    error!("{} ❌ {}", self.ctx, fault);
                    return;
                }
            }
        }
    }

    async fn after_layout(&mut self, outcome: LayoutOutcome) {
        if outcome == LayoutOutcome::TargetLost && self.machine.is_active() {
            info!("{} 目标元素消失，前进到下一步", self.ctx);
            self.machine.next();
            self.publish().await;
            self.show_current().await;
        }
    }

    fn tooltip_content(&self, step: &TutorialStep) -> TooltipContent {
        let state = self.machine.state();
        TooltipContent {
            title: step.title.clone(),
            description: step.description.clone(),
            anchor: step.anchor_position,
            step_number: state.current_step + 1,
            total_steps: state.total_steps,
            show_previous: state.current_step > 0,
            show_next: true,
        }
    }

    fn request_guidance(&mut self, generation: u64, element: &ElementSnapshot, step: TutorialStep) {
        self.cancel_guidance();
        let request = GuidanceRequest {
            context: element.context(),
            step,
            settings: self.settings.clone(),
        };
        let guidance = self.guidance.clone();
        let tx = self.internal_tx.clone();
        let session_id = self.machine.state().session_id.clone();
        self.guidance_task = Some(tokio::spawn(async move {
            let text = guidance.guidance(&request).await;
            let _ = tx.send(EngineEvent::GuidanceReady {
                generation,
                session_id,
                text,
            });
        }));
    }

    fn cancel_guidance(&mut self) {
        if let Some(task) = self.guidance_task.take() {
            task.abort();
        }
    }

    async fn on_guidance(&mut self, generation: u64, session_id: Option<String>, text: String) {
        if !self.machine.is_active() || session_id != self.machine.state().session_id {
            debug!("{} 丢弃过期会话的引导文本", self.ctx);
            return;
        }
        match self.highlight.update_description(generation, text.clone()).await {
            LayoutOutcome::Ignored => {
                debug!("{} 丢弃过期步骤的引导文本", self.ctx);
                return;
            }
            LayoutOutcome::TargetLost => {
                self.after_layout(LayoutOutcome::TargetLost).await;
                return;
            }
            LayoutOutcome::Moved | LayoutOutcome::Scheduled => {}
        }
        self.guidance_task = None;
        debug!("{} 引导文本: {}", self.ctx, truncate_text(&text, 60));

        if self.settings.voice_enabled {
            self.narrate(text);
        }
    }

    /// 语音播报，不等待结果
    fn narrate(&self, text: String) {
        let narrator = self.narrator.clone();
        let language = self.settings.language.clone();
        let voice = self.settings.voice;
        let ctx = self.ctx.clone();
        tokio::spawn(async move {
            if let Err(e) = narrator.speak(&text, &language, voice).await {
                warn!("{} ⚠️ 语音播报失败: {}", ctx, e);
            }
        });
    }

    async fn on_broadcast(&mut self, broadcast: Broadcast) {
        match broadcast {
            Broadcast::StateChanged { site_id, state } => {
                if site_id != self.ctx.site_id {
                    return;
                }
                match self.machine.apply_remote(state) {
                    RemoteEffect::Unchanged | RemoteEffect::Updated => {}
                    RemoteEffect::Started => {
                        self.end_session().await;
                        let steps = self.generate_steps().await;
                        if steps.len() == self.machine.state().total_steps {
                            info!("{} 跟随其他标签页开始的教程", self.ctx);
                            self.steps = steps;
                            self.show_current().await;
                        } else {
                            warn!(
                                "{} ⚠️ 本页步骤数 ({}) 与其他标签页 ({}) 不一致，不跟随高亮",
                                self.ctx,
                                steps.len(),
                                self.machine.state().total_steps
                            );
                        }
                    }
                    RemoteEffect::StepChanged => self.show_current().await,
                    RemoteEffect::Ended => {
                        self.end_session().await;
                        debug!("{} 其他标签页结束了教程", self.ctx);
                    }
                }
            }
            Broadcast::SettingsChanged { settings } => {
                debug!("{} 设置已更新", self.ctx);
                self.settings = settings;
            }
            Broadcast::Command { command } => self.execute(command).await,
        }
    }

    async fn publish(&mut self) {
        let state = self.machine.canonical();
        match self.coordinator.update_state(&self.ctx.site_id, state).await {
            Ok(stamped) => self.machine.adopt_stamp(&stamped),
            Err(e) => warn!("{} ⚠️ 发布教程状态失败: {}", self.ctx, e),
        }
    }

    async fn open_panel(&mut self, panel: PanelContent) {
        match self.document.show_panel(&panel).await {
            Ok(()) => self.panel = Some(panel.kind),
            Err(e) => warn!("{} ⚠️ 显示面板失败: {}", self.ctx, e),
        }
    }

    async fn close_panel(&mut self) {
        if self.panel.take().is_some() {
            if let Err(e) = self.document.remove_panel().await {
                debug!("{} 关闭面板失败: {}", self.ctx, e);
            }
        }
    }

    async fn end_session(&mut self) {
        self.cancel_guidance();
        self.highlight.teardown().await;
        if let Err(e) = self.narrator.stop().await {
            debug!("{} 停止语音失败: {}", self.ctx, e);
        }
    }
}
