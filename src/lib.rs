//! Dialog Engine — branching conversations for games.
//!
//! Walks a script of dialog lines, reroutes on previously recorded story
//! flags, pauses for two-way choices, and reveals each line one character
//! at a time without reflowing the text box.

pub mod core;
pub mod schema;

pub use crate::core::config::{ConfigError, DialogConfig};
pub use crate::core::engine::{
    DialogEngine, DialogEngineBuilder, DialogError, DialogEvent, DialogSession, EngineState,
    RevealState,
};
pub use crate::core::flags::{FlagError, FlagStore};
pub use crate::core::reveal::{Frame, RevealMarkup, TextRevealer};
pub use crate::schema::line::{Choice, DialogLine, DialogOption};
pub use crate::schema::script::{DialogScript, LintIssue, ScriptError, ScriptLibrary};
