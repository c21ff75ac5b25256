pub mod history;
pub mod merge;
pub mod sessions;
pub mod settings;
