//! 教程状态机 - 流程层
//!
//! 纯同步的状态转换，不接触页面和协调器。
//! 每个方法返回规范状态是否发生了变化，由调用方决定是否发布。

use chrono::Utc;
use tracing::debug;

use crate::error::TutorialFault;
use crate::models::{new_session_id, TutorialPhase, TutorialState};

/// `start` 的下一步
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartPlan {
    /// 先显示介绍，等待用户确认
    ShowIntroduction,
    /// 生成步骤并开始
    GenerateSteps,
}

/// 应用远端广播后页面需要做的事
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteEffect {
    /// 与本地规范状态一致，什么都不用做
    Unchanged,
    /// 另一个上下文开始了新的会话
    Started,
    /// 同一会话内切换了步骤
    StepChanged,
    /// 会话结束（完成 / 停止 / 重置）
    Ended,
    /// 只有非激活状态的字段变化
    Updated,
}

#[derive(Debug, Clone, Default)]
pub struct TutorialMachine {
    state: TutorialState,
}

impl TutorialMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_state(state: TutorialState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &TutorialState {
        &self.state
    }

    pub fn phase(&self) -> TutorialPhase {
        self.state.phase
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active
    }

    /// 要发布的规范状态
    ///
    /// 介绍阶段只存在于本地，发布时视为 `Idle`。
    pub fn canonical(&self) -> TutorialState {
        let mut state = self.state.clone();
        if state.phase == TutorialPhase::IntroductionPending {
            state.phase = TutorialPhase::Idle;
        }
        state
    }

    /// 采用协调器盖章后的时间戳、站点与版本号
    pub fn adopt_stamp(&mut self, stamped: &TutorialState) {
        self.state.site_id = stamped.site_id.clone();
        self.state.last_active_at = stamped.last_active_at;
        self.state.revision = self.state.revision.max(stamped.revision);
    }

    pub fn revision(&self) -> u64 {
        self.state.revision
    }

    pub fn plan_start(&mut self, introduction_required: bool) -> StartPlan {
        if introduction_required && !self.state.introduction_shown {
            self.state.phase = TutorialPhase::IntroductionPending;
            self.state.is_active = false;
            StartPlan::ShowIntroduction
        } else {
            StartPlan::GenerateSteps
        }
    }

    /// 以 `total_steps` 个步骤开始新会话
    pub fn begin(&mut self, total_steps: usize) -> Result<(), TutorialFault> {
        if total_steps == 0 {
            return Err(TutorialFault::DiscoveryEmpty);
        }
        self.state.is_active = true;
        self.state.phase = TutorialPhase::Active;
        self.state.current_step = 0;
        self.state.total_steps = total_steps;
        self.state.completed_steps.clear();
        self.state.session_id = Some(new_session_id());
        self.state.started_at = Some(Utc::now());
        Ok(())
    }

    pub fn accept_introduction(&mut self) {
        self.state.introduction_shown = true;
        if self.state.phase == TutorialPhase::IntroductionPending {
            self.state.phase = TutorialPhase::Idle;
        }
    }

    pub fn skip_introduction(&mut self) -> bool {
        let changed = !self.state.introduction_shown;
        self.state.introduction_shown = true;
        if self.state.phase == TutorialPhase::IntroductionPending {
            self.state.phase = TutorialPhase::Idle;
        }
        changed
    }

    /// 前进一步；最后一步之后进入 `Completed`
    pub fn next(&mut self) -> bool {
        if self.state.phase != TutorialPhase::Active {
            return false;
        }
        if self.state.current_step + 1 >= self.state.total_steps {
            self.state.is_active = false;
            self.state.phase = TutorialPhase::Completed;
            self.state.current_step = 0;
        } else {
            self.state.completed_steps.insert(self.state.current_step);
            self.state.current_step += 1;
        }
        true
    }

    pub fn previous(&mut self) -> bool {
        if self.state.phase != TutorialPhase::Active || self.state.current_step == 0 {
            return false;
        }
        self.state.current_step -= 1;
        true
    }

    /// 停止（或跳过）教程，保留当前步骤
    pub fn stop(&mut self) -> bool {
        match self.state.phase {
            TutorialPhase::Active | TutorialPhase::IntroductionPending => {
                self.state.is_active = false;
                self.state.phase = TutorialPhase::Stopped;
                true
            }
            _ => false,
        }
    }

    /// 清空状态，版本号保留，之前的广播仍然算过期
    pub fn reset(&mut self) {
        let revision = self.state.revision;
        self.state = TutorialState {
            revision,
            ..TutorialState::empty()
        };
    }

    /// 应用协调器广播的状态，重复应用同一状态是幂等的
    ///
    /// 版本号低于本地副本的广播已经被后来的写入覆盖（通常是本页自己发布的回声），直接忽略。
    pub fn apply_remote(&mut self, remote: TutorialState) -> RemoteEffect {
        if remote.revision < self.state.revision {
            debug!(
                "忽略过期的远端状态: 版本 {} < 本地 {}",
                remote.revision, self.state.revision
            );
            return RemoteEffect::Unchanged;
        }

        let local = self.canonical();
        if same_canonical(&local, &remote) {
            self.adopt_stamp(&remote);
            return RemoteEffect::Unchanged;
        }

        let effect = match (local.is_active, remote.is_active) {
            (_, true) if local.session_id != remote.session_id || !local.is_active => {
                RemoteEffect::Started
            }
            (true, true) if local.current_step != remote.current_step => RemoteEffect::StepChanged,
            (true, false) => RemoteEffect::Ended,
            _ => RemoteEffect::Updated,
        };
        debug!("应用远端状态: {:?}", effect);

        let keep_introduction =
            self.state.phase == TutorialPhase::IntroductionPending && !remote.is_active;
        self.state = remote;
        if keep_introduction && !self.state.introduction_shown {
            self.state.phase = TutorialPhase::IntroductionPending;
        }
        effect
    }
}

/// 比较不含时间戳、站点和版本号的规范字段
fn same_canonical(a: &TutorialState, b: &TutorialState) -> bool {
    a.is_active == b.is_active
        && a.phase == b.phase
        && a.current_step == b.current_step
        && a.total_steps == b.total_steps
        && a.completed_steps == b.completed_steps
        && a.introduction_shown == b.introduction_shown
        && a.session_id == b.session_id
}
