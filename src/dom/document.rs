//! 宿主文档抽象
//!
//! 引擎通过 [`HostDocument`] 访问页面，不直接接触具体的浏览器连接。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::element::ElementSnapshot;
use super::geometry::{Point, Rect, Viewport};
use crate::error::DomError;
use crate::models::{AnchorPosition, PageLocation};

/// 提示框内容
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TooltipContent {
    pub title: String,
    pub description: String,
    pub anchor: AnchorPosition,
    /// 从 1 开始
    pub step_number: usize,
    pub total_steps: usize,
    pub show_previous: bool,
    pub show_next: bool,
}

/// 一帧覆盖层：高亮矩形 + 提示框位置 + 提示框内容，均为文档绝对坐标
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayFrame {
    pub highlight: Rect,
    pub tooltip: Point,
    pub content: TooltipContent,
}

/// 页面中当前存在的覆盖层节点数量
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OverlayCensus {
    pub highlights: usize,
    pub tooltips: usize,
}

impl OverlayCensus {
    pub fn is_clear(&self) -> bool {
        self.highlights == 0 && self.tooltips == 0
    }
}

/// 布局变化类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LayoutChange {
    /// 目标元素尺寸变化
    Resized,
    /// 目标所在子树结构变化
    Mutated,
}

/// 提示框与面板上的按钮
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TooltipAction {
    Next,
    Previous,
    Skip,
    /// 介绍面板：开始学习
    AcceptIntroduction,
    /// 介绍面板：暂时跳过
    SkipIntroduction,
    /// 关闭完成提示
    DismissPanel,
}

/// 居中面板的用途
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PanelKind {
    Introduction,
    Completion,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelButton {
    pub label: String,
    pub action: TooltipAction,
    pub primary: bool,
}

/// 居中面板（教程介绍 / 完成提示），与高亮会话相互独立，同一时间最多一个
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelContent {
    pub kind: PanelKind,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub buttons: Vec<PanelButton>,
    /// 到时自动关闭
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_dismiss_ms: Option<u64>,
}

/// 页面排队等待引擎处理的事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PageEvent {
    /// 观察者回调，带上安装时的会话代号
    Layout { generation: u64, change: LayoutChange },
    /// 用户点击了提示框按钮
    Action { action: TooltipAction },
}

/// 宿主文档
#[async_trait]
pub trait HostDocument: Send + Sync {
    /// 页面 origin / hostname
    async fn location(&self) -> Result<PageLocation, DomError>;

    /// 视口尺寸与滚动偏移
    async fn viewport(&self) -> Result<Viewport, DomError>;

    /// 按文档顺序返回所有匹配元素
    async fn query_all(&self, selector: &str) -> Result<Vec<ElementSnapshot>, DomError>;

    /// 第一个匹配元素
    async fn query_one(&self, selector: &str) -> Result<Option<ElementSnapshot>, DomError> {
        Ok(self.query_all(selector).await?.into_iter().next())
    }

    /// 平滑滚动，使元素在两个方向上居中
    async fn scroll_into_center(&self, selector: &str) -> Result<(), DomError>;

    /// 创建高亮与提示框节点
    async fn create_overlay(&self, frame: &OverlayFrame) -> Result<(), DomError>;

    /// 更新已有高亮与提示框的位置和内容
    async fn reposition_overlay(&self, frame: &OverlayFrame) -> Result<(), DomError>;

    /// 删除高亮与提示框节点
    async fn remove_overlay(&self) -> Result<(), DomError>;

    /// 统计页面中的覆盖层节点
    async fn overlay_census(&self) -> Result<OverlayCensus, DomError>;

    /// 为目标元素安装尺寸观察者与结构观察者
    async fn watch_target(&self, selector: &str, generation: u64) -> Result<(), DomError>;

    /// 卸载观察者
    async fn unwatch_target(&self) -> Result<(), DomError>;

    /// 显示居中面板，替换已有的面板
    async fn show_panel(&self, panel: &PanelContent) -> Result<(), DomError>;

    /// 关闭居中面板
    async fn remove_panel(&self) -> Result<(), DomError>;

    /// 取出页面中排队的事件
    async fn drain_events(&self) -> Result<Vec<PageEvent>, DomError>;
}
