pub mod discovery;
pub mod guidance;
pub mod locator;
pub mod overlay;
pub mod positioning;
pub mod site_detection;
pub mod voice;

pub use discovery::discover_steps;
pub use guidance::{GuidanceRequest, GuidanceResolver, LlmGuidance, StaticGuidance};
pub use locator::ElementLocator;
pub use overlay::{completion_panel, introduction_panel, OverlayRenderer};
pub use positioning::{compute_layout, OverlayLayout};
pub use site_detection::{SiteDetector, SiteRule};
pub use voice::{Narrator, RecordingNarrator, SilentNarrator, SpeechSynthesisNarrator};
