pub mod toml_loader;

pub use toml_loader::{find_custom_steps, load_all_step_sets, load_step_set, StepSet};
