pub mod store;
pub mod types;

pub use store::{SettingsStore, default_settings_path};
pub use types::*;
