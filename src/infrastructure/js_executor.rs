//! JS 执行器 - 基础设施层
//!
//! 持有唯一的 page 资源，只暴露"执行 JS"的能力

use anyhow::Result;
use chromiumoxide::Page;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::utils::logging::truncate_text;

/// JS 执行器
///
/// 职责：
/// - 持有唯一的 Page 资源
/// - 暴露 eval() 能力
/// - 不认识 TutorialStep / TutorialState
/// - 不处理教程流程
pub struct JsExecutor {
    page: Page,
}

impl JsExecutor {
    /// 创建新的 JS 执行器
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    /// 获取 page 的引用（用于其他操作）
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// 执行 JS 代码并返回 JSON 结果
    ///
    /// 脚本返回 `undefined` / `null` 时得到 `JsonValue::Null`
    pub async fn eval(&self, js_code: impl Into<String>) -> Result<JsonValue> {
        let js_code = js_code.into();
        debug!("执行脚本: {}", truncate_text(js_code.trim(), 120));
        let result = self.page.evaluate(js_code).await?;
        Ok(result.value().cloned().unwrap_or(JsonValue::Null))
    }

    /// 执行 JS 代码并反序列化为指定类型
    pub async fn eval_as<T: DeserializeOwned>(&self, js_code: impl Into<String>) -> Result<T> {
        let json_value = self.eval(js_code).await?;
        let typed_value = serde_json::from_value(json_value)?;
        Ok(typed_value)
    }

    /// 以 JSON 参数调用一个 JS 函数表达式
    ///
    /// `function_src` 形如 `(args) => { ... }`，参数经 serde 序列化后内联，
    /// 不需要手动转义字符串。
    pub async fn call<A: Serialize, T: DeserializeOwned>(
        &self,
        function_src: &str,
        args: &A,
    ) -> Result<T> {
        let args_json = serde_json::to_string(args)?;
        self.eval_as(call_expression(function_src, &args_json)).await
    }
}

/// 拼接 `(function)(args)` 调用表达式
pub fn call_expression(function_src: &str, args_json: &str) -> String {
    format!("({})({})", function_src.trim(), args_json)
}
