//! 语音播报 - 业务能力层
//!
//! 引擎每一步以 fire-and-forget 的方式调用，播报失败只记录日志。

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use crate::error::VoiceError;
use crate::infrastructure::JsExecutor;
use crate::models::VoiceSettings;

static LANGUAGE_CODES: phf::Map<&'static str, &'static str> = phf::phf_map! {
    "en" => "en-US",
    "es" => "es-ES",
    "fr" => "fr-FR",
    "de" => "de-DE",
    "it" => "it-IT",
    "pt" => "pt-PT",
    "ru" => "ru-RU",
    "ja" => "ja-JP",
    "ko" => "ko-KR",
    "zh" => "zh-CN",
    "ar" => "ar-SA",
    "hi" => "hi-IN",
};

/// 语言代码 → BCP 47 语音代码，未知代码原样返回
pub fn speech_language_code(language: &str) -> &str {
    match LANGUAGE_CODES.get(language) {
        Some(code) => code,
        None => language,
    }
}

/// 语音播报
#[async_trait]
pub trait Narrator: Send + Sync {
    /// 播报文本，播报结束（或被打断）后返回
    async fn speak(&self, text: &str, language: &str, voice: VoiceSettings) -> Result<(), VoiceError>;

    /// 停止当前播报
    async fn stop(&self) -> Result<(), VoiceError>;
}

/// 不发声的播报器（未启用语音 / 无浏览器）
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentNarrator;

#[async_trait]
impl Narrator for SilentNarrator {
    async fn speak(&self, _text: &str, _language: &str, _voice: VoiceSettings) -> Result<(), VoiceError> {
        Ok(())
    }

    async fn stop(&self) -> Result<(), VoiceError> {
        Ok(())
    }
}

/// 记录播报内容的播报器，用于测试
#[derive(Debug, Default)]
pub struct RecordingNarrator {
    spoken: Mutex<Vec<(String, String)>>,
}

impl RecordingNarrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已播报的 (文本, 语言) 列表
    pub fn spoken(&self) -> Vec<(String, String)> {
        self.spoken.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl Narrator for RecordingNarrator {
    async fn speak(&self, text: &str, language: &str, _voice: VoiceSettings) -> Result<(), VoiceError> {
        self.spoken
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((text.to_string(), language.to_string()));
        Ok(())
    }

    async fn stop(&self) -> Result<(), VoiceError> {
        Ok(())
    }
}

#[derive(Serialize)]
struct Utterance<'a> {
    text: &'a str,
    lang: &'a str,
    rate: f32,
    pitch: f32,
    volume: f32,
}

/// 通过页面的 `speechSynthesis` 播报
pub struct SpeechSynthesisNarrator {
    executor: Arc<JsExecutor>,
}

impl SpeechSynthesisNarrator {
    pub fn new(executor: Arc<JsExecutor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl Narrator for SpeechSynthesisNarrator {
    async fn speak(&self, text: &str, language: &str, voice: VoiceSettings) -> Result<(), VoiceError> {
        if text.trim().is_empty() {
            return Ok(());
        }
        let lang = speech_language_code(language);
        debug!("🔊 播报 ({}): {}", lang, text);

        let utterance = Utterance {
            text,
            lang,
            rate: voice.rate,
            pitch: voice.pitch,
            volume: voice.volume,
        };
        let _: bool = self
            .executor
            .call(
                r#"(u) => new Promise((resolve, reject) => {
                    const synth = window.speechSynthesis;
                    if (!synth) { resolve(false); return; }
                    if (synth.speaking) synth.cancel();
                    const utterance = new SpeechSynthesisUtterance(u.text);
                    utterance.lang = u.lang;
                    utterance.rate = u.rate;
                    utterance.pitch = u.pitch;
                    utterance.volume = u.volume;
                    const family = u.lang.split('-')[0];
                    const voices = synth.getVoices();
                    const voice = voices.find((v) => v.lang === u.lang && v.localService)
                        || voices.find((v) => v.lang === u.lang)
                        || voices.find((v) => v.lang.startsWith(family));
                    if (voice) utterance.voice = voice;
                    utterance.onend = () => resolve(true);
                    utterance.onerror = (e) => e.error === 'interrupted' || e.error === 'canceled'
                        ? resolve(true)
                        : reject(new Error('Speech synthesis error: ' + e.error));
                    synth.speak(utterance);
                })"#,
                &utterance,
            )
            .await
            .map_err(|e| VoiceError::Synthesis { source: e.into() })?;
        Ok(())
    }

    async fn stop(&self) -> Result<(), VoiceError> {
        self.executor
            .eval("(() => { if (window.speechSynthesis) window.speechSynthesis.cancel(); return true; })()")
            .await
            .map_err(|e| VoiceError::Synthesis { source: e.into() })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_codes() {
        assert_eq!(speech_language_code("en"), "en-US");
        assert_eq!(speech_language_code("zh"), "zh-CN");
        assert_eq!(speech_language_code("pt-BR"), "pt-BR");
    }

    #[tokio::test]
    async fn test_recording_narrator_keeps_order() {
        let narrator = RecordingNarrator::new();
        narrator.speak("one", "en", VoiceSettings::default()).await.unwrap();
        narrator.speak("two", "fr", VoiceSettings::default()).await.unwrap();
        assert_eq!(
            narrator.spoken(),
            vec![("one".to_string(), "en".to_string()), ("two".to_string(), "fr".to_string())]
        );
    }
}
