pub mod config;
pub mod engine;
pub mod flags;
pub mod reveal;
