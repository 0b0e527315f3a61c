pub mod loaders;
pub mod settings;
pub mod site;
pub mod tutorial;

pub use loaders::{find_custom_steps, load_all_step_sets, StepSet};
pub use settings::{AiProvider, Settings, VoiceSettings};
pub use site::{PageLocation, SiteIdentifier, SiteInfo};
pub use tutorial::{
    new_session_id, AnchorPosition, TutorialPhase, TutorialProgress, TutorialState, TutorialStep,
};
