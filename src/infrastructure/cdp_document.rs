//! CDP 文档 - 基础设施层
//!
//! 通过 [`JsExecutor`] 在真实标签页中实现 [`HostDocument`]。
//! 每个脚本前都会带上一段幂等的引导代码，在页面上挂一个 `window.__pageTutor`：
//! 节点编号表、事件队列、观察者句柄，以及提示框 / 面板按钮的点击监听。
//! 页面重新加载后这些都会丢失，下一次调用时重新挂上。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;

use crate::dom::{
    ElementSnapshot, HostDocument, OverlayCensus, OverlayFrame, PageEvent, PanelContent,
    Viewport,
};
use crate::error::DomError;
use crate::infrastructure::js_executor::JsExecutor;
use crate::models::PageLocation;

/// 平滑滚动完成前等待的时间
const SMOOTH_SCROLL_SETTLE: Duration = Duration::from_millis(350);

const BOOTSTRAP: &str = r#"
if (!window.__pageTutor) {
    const t = { seq: 0, ids: new WeakMap(), events: [], resize: null, mutation: null };
    t.idOf = (el) => {
        if (!t.ids.has(el)) t.ids.set(el, ++t.seq);
        return t.ids.get(el);
    };
    t.isOwn = (node) => node && node.nodeType === 1 && !!node.closest('.page-tutor-highlight, .page-tutor-tooltip, .page-tutor-panel');
    t.snap = (el) => {
        const r = el.getBoundingClientRect();
        const cs = window.getComputedStyle(el);
        const attrs = {};
        for (const a of Array.from(el.attributes)) attrs[a.name] = a.value;
        const p = el.parentElement;
        return {
            nodeId: t.idOf(el),
            tagName: el.tagName.toLowerCase(),
            id: el.id || null,
            classNames: Array.from(el.classList),
            parentTag: p ? p.tagName.toLowerCase() : null,
            childIndex: p ? Array.prototype.indexOf.call(p.children, el) + 1 : 1,
            rect: { x: r.left, y: r.top, width: r.width, height: r.height },
            displayNone: cs.display === 'none',
            visibilityHidden: cs.visibility === 'hidden',
            textContent: (el.textContent || '').trim().slice(0, 200),
            attributes: attrs,
        };
    };
    t.unwatch = () => {
        if (t.resize) t.resize.disconnect();
        if (t.mutation) t.mutation.disconnect();
        t.resize = null;
        t.mutation = null;
        t.events = t.events.filter((e) => e.kind !== 'layout');
    };
    document.addEventListener('click', (e) => {
        const button = e.target && e.target.closest ? e.target.closest('[data-page-tutor-action]') : null;
        if (!button) return;
        e.preventDefault();
        e.stopPropagation();
        t.events.push({ kind: 'action', action: button.dataset.pageTutorAction });
    }, true);
    window.__pageTutor = t;
}
"#;

const OVERLAY_RENDER: &str = r#"
const highlightStyle = (el, r) => {
    Object.assign(el.style, {
        position: 'absolute',
        left: r.x + 'px',
        top: r.y + 'px',
        width: r.width + 'px',
        height: r.height + 'px',
        border: '2px solid #3b82f6',
        borderRadius: '6px',
        boxShadow: '0 0 0 4px rgba(59, 130, 246, 0.25)',
        pointerEvents: 'none',
        zIndex: '2147483646',
        boxSizing: 'border-box',
    });
};
const tooltipStyle = (el, p) => {
    Object.assign(el.style, {
        position: 'absolute',
        left: p.x + 'px',
        top: p.y + 'px',
        width: '320px',
        maxHeight: '200px',
        overflow: 'auto',
        background: '#ffffff',
        color: '#111827',
        borderRadius: '8px',
        boxShadow: '0 10px 25px rgba(0, 0, 0, 0.2)',
        padding: '12px 16px',
        font: '14px/1.4 system-ui, sans-serif',
        zIndex: '2147483647',
        boxSizing: 'border-box',
    });
};
const fillTooltip = (el, c) => {
    el.textContent = '';
    el.dataset.anchor = c.anchor;
    const title = document.createElement('div');
    title.style.fontWeight = '600';
    title.style.marginBottom = '6px';
    title.textContent = c.title;
    const body = document.createElement('div');
    body.textContent = c.description;
    const footer = document.createElement('div');
    Object.assign(footer.style, { display: 'flex', gap: '8px', marginTop: '10px', alignItems: 'center' });
    const counter = document.createElement('span');
    counter.style.flex = '1';
    counter.style.color = '#6b7280';
    counter.textContent = c.stepNumber + ' / ' + c.totalSteps;
    footer.appendChild(counter);
    const button = (label, action) => {
        const b = document.createElement('button');
        b.type = 'button';
        b.textContent = label;
        b.dataset.pageTutorAction = action;
        footer.appendChild(b);
    };
    button('Skip', 'skip');
    if (c.showPrevious) button('Previous', 'previous');
    if (c.showNext) button(c.stepNumber === c.totalSteps ? 'Finish' : 'Next', 'next');
    el.append(title, body, footer);
};
"#;

const PANEL_RENDER: &str = r#"
document.querySelectorAll('.page-tutor-panel').forEach((n) => n.remove());
const backdrop = document.createElement('div');
backdrop.className = 'page-tutor-panel';
backdrop.dataset.kind = args.kind;
Object.assign(backdrop.style, {
    position: 'fixed',
    inset: '0',
    background: args.kind === 'introduction' ? 'rgba(17, 24, 39, 0.45)' : 'transparent',
    display: 'flex',
    alignItems: 'center',
    justifyContent: 'center',
    pointerEvents: args.kind === 'introduction' ? 'auto' : 'none',
    zIndex: '2147483647',
});
const card = document.createElement('div');
Object.assign(card.style, {
    width: '380px',
    background: '#ffffff',
    color: '#111827',
    borderRadius: '12px',
    boxShadow: '0 20px 40px rgba(0, 0, 0, 0.25)',
    padding: '20px 24px',
    font: '14px/1.5 system-ui, sans-serif',
    pointerEvents: 'auto',
    boxSizing: 'border-box',
});
const title = document.createElement('h3');
title.style.margin = '0 0 8px';
title.textContent = args.title;
const body = document.createElement('p');
body.style.margin = '0 0 12px';
body.textContent = args.description;
card.append(title, body);
if (args.features && args.features.length) {
    const list = document.createElement('ul');
    list.style.margin = '0 0 12px';
    for (const f of args.features) {
        const li = document.createElement('li');
        li.textContent = f;
        list.appendChild(li);
    }
    card.appendChild(list);
}
if (args.note) {
    const note = document.createElement('div');
    note.style.color = '#6b7280';
    note.style.marginBottom = '12px';
    note.textContent = args.note;
    card.appendChild(note);
}
const footer = document.createElement('div');
Object.assign(footer.style, { display: 'flex', gap: '8px', justifyContent: 'flex-end' });
for (const b of args.buttons) {
    const button = document.createElement('button');
    button.type = 'button';
    button.textContent = b.label;
    button.dataset.pageTutorAction = b.action;
    if (b.primary) {
        Object.assign(button.style, { background: '#3b82f6', color: '#ffffff', border: 'none', borderRadius: '6px', padding: '6px 12px' });
    }
    footer.appendChild(button);
}
card.appendChild(footer);
backdrop.appendChild(card);
document.body.appendChild(backdrop);
if (args.autoDismissMs) {
    setTimeout(() => backdrop.remove(), args.autoDismissMs);
}
return true;
"#;

/// 把引导代码和函数体拼成一个以 JSON 参数调用的表达式
fn script(body: &str) -> String {
    format!(
        "(args) => {{ {}\nconst t = window.__pageTutor;\n{} }}",
        BOOTSTRAP, body
    )
}

/// 基于 CDP 的宿主文档
pub struct CdpDocument {
    executor: Arc<JsExecutor>,
}

impl CdpDocument {
    pub fn new(executor: Arc<JsExecutor>) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &Arc<JsExecutor> {
        &self.executor
    }

    async fn run<A: Serialize + Sync, T: DeserializeOwned>(
        &self,
        body: &str,
        args: &A,
    ) -> Result<T, DomError> {
        self.executor
            .call(&script(body), args)
            .await
            .map_err(DomError::script)
    }
}

#[async_trait]
impl HostDocument for CdpDocument {
    async fn location(&self) -> Result<PageLocation, DomError> {
        self.run(
            "return { origin: location.origin, hostname: location.hostname };",
            &json!({}),
        )
        .await
    }

    async fn viewport(&self) -> Result<Viewport, DomError> {
        self.run(
            r#"return {
                width: window.innerWidth,
                height: window.innerHeight,
                scrollX: window.scrollX,
                scrollY: window.scrollY,
            };"#,
            &json!({}),
        )
        .await
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<ElementSnapshot>, DomError> {
        self.run(
            "return Array.from(document.querySelectorAll(args.selector)).filter((el) => !t.isOwn(el)).map(t.snap);",
            &json!({ "selector": selector }),
        )
        .await
    }

    async fn scroll_into_center(&self, selector: &str) -> Result<(), DomError> {
        let scrolled: bool = self
            .run(
                r#"const el = document.querySelector(args.selector);
                if (!el) return false;
                el.scrollIntoView({ behavior: 'smooth', block: 'center', inline: 'center' });
                return true;"#,
                &json!({ "selector": selector }),
            )
            .await?;
        if scrolled {
            tokio::time::sleep(SMOOTH_SCROLL_SETTLE).await;
        }
        Ok(())
    }

    async fn create_overlay(&self, frame: &OverlayFrame) -> Result<(), DomError> {
        let body = format!(
            r#"{OVERLAY_RENDER}
            const highlight = document.createElement('div');
            highlight.className = 'page-tutor-highlight';
            highlightStyle(highlight, args.highlight);
            const tooltip = document.createElement('div');
            tooltip.className = 'page-tutor-tooltip';
            tooltip.setAttribute('role', 'dialog');
            tooltipStyle(tooltip, args.tooltip);
            fillTooltip(tooltip, args.content);
            document.body.append(highlight, tooltip);
            return true;"#
        );
        let _: bool = self.run(&body, frame).await?;
        Ok(())
    }

    async fn reposition_overlay(&self, frame: &OverlayFrame) -> Result<(), DomError> {
        let body = format!(
            r#"{OVERLAY_RENDER}
            const highlight = document.querySelector('.page-tutor-highlight');
            const tooltip = document.querySelector('.page-tutor-tooltip');
            if (highlight) highlightStyle(highlight, args.highlight);
            if (tooltip) {{
                tooltipStyle(tooltip, args.tooltip);
                fillTooltip(tooltip, args.content);
            }}
            return !!(highlight && tooltip);"#
        );
        let _: bool = self.run(&body, frame).await?;
        Ok(())
    }

    async fn remove_overlay(&self) -> Result<(), DomError> {
        let _: usize = self
            .run(
                r#"const nodes = document.querySelectorAll('.page-tutor-highlight, .page-tutor-tooltip');
                nodes.forEach((n) => n.remove());
                return nodes.length;"#,
                &json!({}),
            )
            .await?;
        Ok(())
    }

    async fn overlay_census(&self) -> Result<OverlayCensus, DomError> {
        self.run(
            r#"return {
                highlights: document.querySelectorAll('.page-tutor-highlight').length,
                tooltips: document.querySelectorAll('.page-tutor-tooltip').length,
            };"#,
            &json!({}),
        )
        .await
    }

    async fn watch_target(&self, selector: &str, generation: u64) -> Result<(), DomError> {
        let _: bool = self
            .run(
                r#"t.unwatch();
                const el = document.querySelector(args.selector);
                if (!el) return false;
                const generation = args.generation;
                let first = true;
                t.resize = new ResizeObserver(() => {
                    if (first) { first = false; return; }
                    t.events.push({ kind: 'layout', generation, change: 'resized' });
                });
                t.resize.observe(el);
                const root = el.parentElement || document.body;
                t.mutation = new MutationObserver((records) => {
                    const relevant = records.some((r) => {
                        if (t.isOwn(r.target)) return false;
                        if (r.type !== 'childList') return true;
                        const nodes = [...r.addedNodes, ...r.removedNodes];
                        return nodes.length === 0 || !nodes.every((n) => t.isOwn(n));
                    });
                    if (relevant) t.events.push({ kind: 'layout', generation, change: 'mutated' });
                });
                t.mutation.observe(root, { childList: true, subtree: true, attributes: true });
                return true;"#,
                &json!({ "selector": selector, "generation": generation }),
            )
            .await?;
        Ok(())
    }

    async fn unwatch_target(&self) -> Result<(), DomError> {
        let _: bool = self.run("t.unwatch(); return true;", &json!({})).await?;
        Ok(())
    }

    async fn show_panel(&self, panel: &PanelContent) -> Result<(), DomError> {
        let _: bool = self.run(PANEL_RENDER, panel).await?;
        Ok(())
    }

    async fn remove_panel(&self) -> Result<(), DomError> {
        let _: usize = self
            .run(
                r#"const nodes = document.querySelectorAll('.page-tutor-panel');
                nodes.forEach((n) => n.remove());
                return nodes.length;"#,
                &json!({}),
            )
            .await?;
        Ok(())
    }

    async fn drain_events(&self) -> Result<Vec<PageEvent>, DomError> {
        self.run(
            "const out = t.events; t.events = []; return out;",
            &json!({}),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_wraps_bootstrap_once() {
        let src = script("return 1;");
        assert!(src.starts_with("(args) => {"));
        assert_eq!(src.matches("if (!window.__pageTutor)").count(), 1);
        assert!(src.trim_end().ends_with("return 1; }"));
    }

    #[test]
    fn test_panel_script_reads_serialized_field_names() {
        let panel = crate::services::completion_panel();
        let json = serde_json::to_value(&panel).unwrap();
        assert_eq!(json["kind"], "completion");
        assert!(json["autoDismissMs"].is_u64());
        assert_eq!(json["buttons"][0]["action"], "dismissPanel");
        assert!(PANEL_RENDER.contains("args.autoDismissMs"));
        assert!(PANEL_RENDER.contains("b.action"));
    }

    #[tokio::test]
    #[ignore]
    async fn test_cdp_document_against_live_browser() {
        let _ = tracing_subscriber::fmt::try_init();

        let (_browser, page) = crate::browser::launch_headless_browser(
            "data:text/html,<button id='go'>Go</button>",
            None,
        )
        .await
        .unwrap();
        let doc = CdpDocument::new(Arc::new(JsExecutor::new(page)));

        let buttons = doc.query_all("button").await.unwrap();
        assert_eq!(buttons.len(), 1);
        assert_eq!(buttons[0].id.as_deref(), Some("go"));
        assert!(doc.overlay_census().await.unwrap().is_clear());
    }
}
