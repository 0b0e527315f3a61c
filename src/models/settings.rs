use serde::{Deserialize, Serialize};

/// 引导文本 provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiProvider {
    #[default]
    OpenRouter,
    Gemini,
}

/// 语音参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoiceSettings {
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            rate: 0.9,
            pitch: 1.0,
            volume: 0.8,
        }
    }
}

/// 用户设置，保存在固定的设置 key 下
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub language: String,
    pub voice_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_router_api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gemini_api_key: Option<String>,
    pub ai_provider: AiProvider,
    pub auto_detect_tutorials: bool,
    pub show_introduction: bool,
    pub badge_notifications: bool,
    pub voice: VoiceSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            voice_enabled: false,
            open_router_api_key: None,
            gemini_api_key: None,
            ai_provider: AiProvider::OpenRouter,
            auto_detect_tutorials: true,
            show_introduction: true,
            badge_notifications: true,
            voice: VoiceSettings::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_settings_fill_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{"language":"zh","aiProvider":"gemini"}"#).unwrap();
        assert_eq!(settings.language, "zh");
        assert_eq!(settings.ai_provider, AiProvider::Gemini);
        assert!(settings.show_introduction);
        assert_eq!(settings.voice, VoiceSettings::default());
    }
}
