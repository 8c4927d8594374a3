pub mod catalog;
pub mod collection;
pub mod content_store;
pub mod download_output;
pub mod game_config;
pub mod name_cache;
pub mod reconciler;
pub mod registry;
pub mod supervisor;
