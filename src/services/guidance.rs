//! 引导文本服务 - 业务能力层
//!
//! 只负责"为一个步骤生成引导文本"的能力，不关心流程
//!
//! ## 技术栈
//! - OpenRouter（OpenAI 兼容接口）使用 `async-openai` crate
//! - Gemini 使用 `reqwest` 直接调用 `generateContent`
//! - 任何失败（未配置 key、超时、非成功状态、空内容）都降级为静态文本

use std::time::Duration;

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use tracing::{debug, warn};

use crate::config::Config;
use crate::dom::ElementContext;
use crate::error::GuidanceError;
use crate::models::{AiProvider, Settings, TutorialStep};
use crate::utils::logging::truncate_text;

const SYSTEM_PROMPT: &str = "You are an AI tutor helping users learn web interfaces. \
Provide clear, concise guidance in 1-2 sentences. \
Be encouraging and specific about what action to take.";

static LANGUAGE_NAMES: phf::Map<&'static str, &'static str> = phf::phf_map! {
    "en" => "English",
    "es" => "Spanish",
    "fr" => "French",
    "de" => "German",
    "it" => "Italian",
    "pt" => "Portuguese",
    "ru" => "Russian",
    "ja" => "Japanese",
    "ko" => "Korean",
    "zh" => "Chinese",
};

/// 语言代码对应的英文名称，未知代码按 English 处理
pub fn language_name(code: &str) -> &'static str {
    LANGUAGE_NAMES.get(code).copied().unwrap_or("English")
}

/// 一次引导文本请求
#[derive(Debug, Clone)]
pub struct GuidanceRequest {
    pub context: ElementContext,
    pub step: TutorialStep,
    pub settings: Settings,
}

/// 引导文本解析器
///
/// 必须总是返回文本，失败在内部降级。
#[async_trait]
pub trait GuidanceResolver: Send + Sync {
    async fn guidance(&self, request: &GuidanceRequest) -> String;
}

/// 基于元素信息的静态引导文本
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticGuidance;

impl StaticGuidance {
    pub fn compose(context: &ElementContext, step: &TutorialStep) -> String {
        let tag = context.tag_name.to_ascii_lowercase();
        let text = context.text_content.trim();
        let has_text = !text.is_empty();
        let attr = |name: &str| context.attributes.get(name).map(String::as_str);

        let is_button = tag == "button" || attr("role") == Some("button");
        let is_input = tag == "input" || tag == "textarea";
        let is_link = tag == "a";

        if is_button && has_text {
            format!(
                "Click the \"{}\" button to {}",
                text,
                step.description.to_lowercase()
            )
        } else if is_input {
            let input_type = attr("type").unwrap_or("text");
            match attr("placeholder") {
                Some(placeholder) => {
                    format!("Enter information in the {} field ({})", input_type, placeholder)
                }
                None => format!("Fill in this {} field to continue", input_type),
            }
        } else if is_link && has_text {
            format!("Click on \"{}\" to navigate to the next section", text)
        } else if has_text {
            format!("Interact with \"{}\" - {}", text, step.description)
        } else {
            step.description.clone()
        }
    }
}

#[async_trait]
impl GuidanceResolver for StaticGuidance {
    async fn guidance(&self, request: &GuidanceRequest) -> String {
        Self::compose(&request.context, &request.step)
    }
}

/// 构建发送给 provider 的提示词
pub fn build_prompt(context: &ElementContext, step: &TutorialStep, language: &str) -> String {
    let text: String = context.text_content.chars().take(100).collect();
    let language_instruction = if language != "en" {
        format!("Please respond in {}.", language_name(language))
    } else {
        String::new()
    };

    format!(
        r#"I'm tutoring a user on this webpage element:
- Element type: {}
- Text content: "{}"
- Interactive: {}
- Current step: {}
- Step description: {}

Provide helpful guidance for what the user should do with this element. Be specific and encouraging. {}"#,
        context.tag_name.to_ascii_lowercase(),
        text,
        context.is_interactive,
        step.title,
        step.description,
        language_instruction
    )
    .trim_end()
    .to_string()
}

/// 远程 provider 引导文本
///
/// 职责：
/// - 按设置选择 OpenRouter / Gemini
/// - 每次请求从设置读取 key，设置更新后立即生效
/// - 超时或失败时退回 [`StaticGuidance`]
pub struct LlmGuidance {
    http: reqwest::Client,
    openrouter_api_base_url: String,
    openrouter_model_name: String,
    gemini_api_base_url: String,
    gemini_model_name: String,
    timeout: Duration,
}

impl LlmGuidance {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            openrouter_api_base_url: config.openrouter_api_base_url.clone(),
            openrouter_model_name: config.openrouter_model_name.clone(),
            gemini_api_base_url: config.gemini_api_base_url.clone(),
            gemini_model_name: config.gemini_model_name.clone(),
            timeout: Duration::from_millis(config.guidance_timeout_ms),
        }
    }

    /// 调用设置中选择的 provider
    pub async fn request(&self, request: &GuidanceRequest) -> Result<String, GuidanceError> {
        let settings = &request.settings;
        let prompt = build_prompt(&request.context, &request.step, &settings.language);

        match settings.ai_provider {
            AiProvider::OpenRouter => {
                let key = usable_key(&settings.open_router_api_key)
                    .ok_or(GuidanceError::NotConfigured)?;
                self.openrouter(key, &prompt).await
            }
            AiProvider::Gemini => {
                let key =
                    usable_key(&settings.gemini_api_key).ok_or(GuidanceError::NotConfigured)?;
                self.gemini(key, &prompt).await
            }
        }
    }

    async fn openrouter(&self, api_key: &str, prompt: &str) -> Result<String, GuidanceError> {
        const PROVIDER: &str = "OpenRouter";
        debug!("调用 OpenRouter，模型: {}", self.openrouter_model_name);

        let openai_config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(&self.openrouter_api_base_url);
        let client = Client::with_config(openai_config);

        let system_msg = ChatCompletionRequestSystemMessageArgs::default()
            .content(SYSTEM_PROMPT)
            .build()
            .map_err(|e| GuidanceError::provider(PROVIDER, e))?;
        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(prompt)
            .build()
            .map_err(|e| GuidanceError::provider(PROVIDER, e))?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.openrouter_model_name)
            .messages(vec![
                ChatCompletionRequestMessage::System(system_msg),
                ChatCompletionRequestMessage::User(user_msg),
            ])
            .temperature(0.7)
            .max_tokens(150u32)
            .build()
            .map_err(|e| GuidanceError::provider(PROVIDER, e))?;

        let response = client
            .chat()
            .create(request)
            .await
            .map_err(|e| GuidanceError::provider(PROVIDER, e))?;

        response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| GuidanceError::EmptyContent {
                provider: PROVIDER.to_string(),
            })
    }

    async fn gemini(&self, api_key: &str, prompt: &str) -> Result<String, GuidanceError> {
        const PROVIDER: &str = "Gemini";
        debug!("调用 Gemini，模型: {}", self.gemini_model_name);

        let url = format!(
            "{}/models/{}:generateContent",
            self.gemini_api_base_url.trim_end_matches('/'),
            self.gemini_model_name
        );
        let body = json!({
            "contents": [{
                "parts": [{ "text": format!("{}\n\n{}", SYSTEM_PROMPT, prompt) }]
            }],
            "generationConfig": {
                "maxOutputTokens": 150,
                "temperature": 0.7
            }
        });

        let response = self
            .http
            .post(&url)
            .query(&[("key", api_key)])
            .json(&body)
            .send()
            .await
            .map_err(|e| GuidanceError::provider(PROVIDER, e))?;

        if !response.status().is_success() {
            return Err(GuidanceError::BadStatus {
                provider: PROVIDER.to_string(),
                status: response.status().as_u16(),
            });
        }

        let data: JsonValue = response
            .json()
            .await
            .map_err(|e| GuidanceError::provider(PROVIDER, e))?;

        gemini_text(&data).ok_or_else(|| GuidanceError::EmptyContent {
            provider: PROVIDER.to_string(),
        })
    }
}

fn usable_key(key: &Option<String>) -> Option<&str> {
    key.as_deref().map(str::trim).filter(|k| !k.is_empty())
}

/// 从 Gemini 响应中取出第一段文本
fn gemini_text(data: &JsonValue) -> Option<String> {
    data.pointer("/candidates/0/content/parts/0/text")
        .and_then(JsonValue::as_str)
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

#[async_trait]
impl GuidanceResolver for LlmGuidance {
    async fn guidance(&self, request: &GuidanceRequest) -> String {
        let result = match tokio::time::timeout(self.timeout, self.request(request)).await {
            Ok(result) => result,
            Err(_) => Err(GuidanceError::Timeout {
                timeout_ms: self.timeout.as_millis() as u64,
            }),
        };

        match result {
            Ok(text) => {
                debug!("引导文本: {}", truncate_text(&text, 80));
                text
            }
            Err(GuidanceError::NotConfigured) => {
                debug!("未配置 provider，使用静态引导文本");
                StaticGuidance::compose(&request.context, &request.step)
            }
            Err(e) => {
                warn!("⚠️ 引导文本获取失败，使用静态文本: {}", e);
                StaticGuidance::compose(&request.context, &request.step)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::dom::Rect;
    use crate::models::AnchorPosition;

    fn context(tag: &str, text: &str, attrs: &[(&str, &str)]) -> ElementContext {
        ElementContext {
            tag_name: tag.to_string(),
            text_content: text.to_string(),
            attributes: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
            rect: Rect::new(0.0, 0.0, 10.0, 10.0),
            is_interactive: true,
        }
    }

    fn step() -> TutorialStep {
        TutorialStep {
            id: "step-0".to_string(),
            target_selector: "#go".to_string(),
            title: "Step 1".to_string(),
            description: "Open The Menu".to_string(),
            anchor_position: AnchorPosition::Bottom,
            language: "en".to_string(),
        }
    }

    #[test]
    fn test_static_guidance_heuristics() {
        let s = step();
        assert_eq!(
            StaticGuidance::compose(&context("button", "Save", &[]), &s),
            r#"Click the "Save" button to open the menu"#
        );
        assert_eq!(
            StaticGuidance::compose(&context("input", "", &[("type", "email"), ("placeholder", "you@x.com")]), &s),
            "Enter information in the email field (you@x.com)"
        );
        assert_eq!(
            StaticGuidance::compose(&context("textarea", "", &[]), &s),
            "Fill in this text field to continue"
        );
        assert_eq!(
            StaticGuidance::compose(&context("a", "Docs", &[("href", "/docs")]), &s),
            r#"Click on "Docs" to navigate to the next section"#
        );
        assert_eq!(
            StaticGuidance::compose(&context("div", "Panel", &[]), &s),
            r#"Interact with "Panel" - Open The Menu"#
        );
        assert_eq!(StaticGuidance::compose(&context("div", "  ", &[]), &s), "Open The Menu");
    }

    #[test]
    fn test_prompt_language_instruction() {
        let ctx = context("button", &"x".repeat(150), &[]);
        let english = build_prompt(&ctx, &step(), "en");
        assert!(!english.contains("Please respond in"));
        assert!(english.contains(&format!("\"{}\"", "x".repeat(100))));

        let chinese = build_prompt(&ctx, &step(), "zh");
        assert!(chinese.ends_with("Please respond in Chinese."));
        assert_eq!(language_name("xx"), "English");
    }

    #[test]
    fn test_gemini_text_extraction() {
        let data = json!({ "candidates": [{ "content": { "parts": [{ "text": " Click it. " }] } }] });
        assert_eq!(gemini_text(&data).as_deref(), Some("Click it."));
        assert!(gemini_text(&json!({ "candidates": [] })).is_none());
    }

    #[tokio::test]
    async fn test_missing_key_falls_back_to_static() {
        let guidance = LlmGuidance::new(&Config::default());
        let request = GuidanceRequest {
            context: context("button", "Save", &[]),
            step: step(),
            settings: Settings {
                open_router_api_key: Some("   ".to_string()),
                ..Settings::default()
            },
        };

        assert!(matches!(
            guidance.request(&request).await,
            Err(GuidanceError::NotConfigured)
        ));
        assert_eq!(
            guidance.guidance(&request).await,
            r#"Click the "Save" button to open the menu"#
        );
    }

    #[tokio::test]
    async fn test_unreachable_provider_falls_back_to_static() {
        let config = Config {
            gemini_api_base_url: "http://127.0.0.1:9".to_string(),
            guidance_timeout_ms: 2000,
            ..Config::default()
        };
        let guidance = LlmGuidance::new(&config);
        let request = GuidanceRequest {
            context: context("a", "Docs", &[]),
            step: step(),
            settings: Settings {
                ai_provider: AiProvider::Gemini,
                gemini_api_key: Some("key".to_string()),
                ..Settings::default()
            },
        };

        assert_eq!(
            guidance.guidance(&request).await,
            r#"Click on "Docs" to navigate to the next section"#
        );
    }
}
