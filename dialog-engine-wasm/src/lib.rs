//! WASM bindings for dialog-engine — powers the interactive web demo.

use std::sync::Arc;
use wasm_bindgen::prelude::*;

use dialog_engine::core::engine::{DialogEngine, DialogEvent, EngineState};
use dialog_engine::core::flags::FlagStore;
use dialog_engine::core::reveal::RevealMarkup;
use dialog_engine::schema::line::Choice;
use dialog_engine::schema::script::{DialogScript, ScriptLibrary};

// ---------------------------------------------------------------------------
// Embedded scripts — compiled into the WASM binary
// ---------------------------------------------------------------------------
mod data {
    pub const BATTLE_INTRO: &str = include_str!("../../data/scripts/battle_intro.ron");
    pub const HEALER: &str = include_str!("../../data/scripts/healer.ron");
}

// ---------------------------------------------------------------------------
// JSON helper types for communication across the WASM boundary
// ---------------------------------------------------------------------------
#[derive(serde::Serialize)]
struct OptionsInfo {
    first: String,
    second: String,
}

#[derive(serde::Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum EventInfo {
    Rerouted { from: usize, to: usize, flag: String },
    LineStarted { line: usize },
    LineRevealed { line: usize },
    OptionsShown { line: usize, first: String, second: String },
    FlagSet { line: usize, flag: String },
    Ended,
    Aborted { message: String },
}

impl From<DialogEvent> for EventInfo {
    fn from(event: DialogEvent) -> Self {
        match event {
            DialogEvent::Rerouted { from, to, flag } => EventInfo::Rerouted { from, to, flag },
            DialogEvent::LineStarted { line } => EventInfo::LineStarted { line },
            DialogEvent::LineRevealed { line } => EventInfo::LineRevealed { line },
            DialogEvent::OptionsShown {
                line,
                first,
                second,
            } => EventInfo::OptionsShown {
                line,
                first,
                second,
            },
            DialogEvent::FlagSet { line, flag } => EventInfo::FlagSet { line, flag },
            DialogEvent::Ended => EventInfo::Ended,
            DialogEvent::Aborted(e) => EventInfo::Aborted {
                message: e.to_string(),
            },
        }
    }
}

fn state_label(state: EngineState) -> &'static str {
    match state {
        EngineState::Inactive => "inactive",
        EngineState::AwaitingReveal => "awaiting_reveal",
        EngineState::AwaitingConfirm => "awaiting_confirm",
        EngineState::AwaitingChoice => "awaiting_choice",
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, JsError> {
    serde_json::to_string(value).map_err(|e| JsError::new(&format!("Serialization error: {e}")))
}

fn bundled_library() -> Result<ScriptLibrary, JsError> {
    let mut library = ScriptLibrary::new();
    for (name, source) in [("battle_intro", data::BATTLE_INTRO), ("healer", data::HEALER)] {
        let script = DialogScript::parse_ron(source)
            .map_err(|e| JsError::new(&format!("Script parse error in {name}: {e}")))?;
        library.insert(name, script);
    }
    Ok(library)
}

// ---------------------------------------------------------------------------
// DialogPlayer — the main exported struct
// ---------------------------------------------------------------------------
#[wasm_bindgen]
pub struct DialogPlayer {
    engine: DialogEngine,
    library: ScriptLibrary,
    flags: FlagStore,
}

#[wasm_bindgen]
impl DialogPlayer {
    /// Create a player over the bundled scripts, revealing text at
    /// `chars_per_second`. The web page hides unrevealed glyphs with a span.
    #[wasm_bindgen(constructor)]
    pub fn new(chars_per_second: f32) -> Result<DialogPlayer, JsError> {
        let flags = FlagStore::new();
        let engine = DialogEngine::builder()
            .chars_per_second(chars_per_second)
            .markup(RevealMarkup::new("<span class=\"hidden\">", "</span>"))
            .with_flags(flags.clone())
            .build()
            .map_err(|e| JsError::new(&format!("Engine build error: {e}")))?;

        Ok(DialogPlayer {
            engine,
            library: bundled_library()?,
            flags,
        })
    }

    /// Add a script from RON source under `name`, replacing any existing one.
    pub fn add_script(&mut self, name: &str, ron_source: &str) -> Result<(), JsError> {
        let script = DialogScript::parse_ron(ron_source)
            .map_err(|e| JsError::new(&format!("Script parse error: {e}")))?;
        self.library.insert(name, script);
        Ok(())
    }

    /// Return JSON array of available script names.
    pub fn scripts(&self) -> Result<String, JsError> {
        to_json(&self.library.names())
    }

    /// Begin the named conversation.
    pub fn start(&mut self, name: &str) -> Result<(), JsError> {
        let script: Arc<DialogScript> = self
            .library
            .get(name)
            .ok_or_else(|| JsError::new(&format!("Unknown script: {name}")))?;
        self.engine
            .start(script)
            .map_err(|e| JsError::new(&format!("Dialog error: {e}")))
    }

    /// Advance the reveal by `elapsed_ms` milliseconds.
    pub fn tick(&mut self, elapsed_ms: f64) {
        self.engine.tick_secs((elapsed_ms / 1000.0) as f32);
    }

    pub fn confirm(&mut self) -> Result<(), JsError> {
        self.engine
            .on_confirm()
            .map_err(|e| JsError::new(&format!("Dialog error: {e}")))
    }

    /// Pick option 1 or 2. Other numbers are ignored.
    pub fn choose(&mut self, option: u8) -> Result<(), JsError> {
        match Choice::from_number(option) {
            Some(choice) => self
                .engine
                .on_choose(choice)
                .map_err(|e| JsError::new(&format!("Dialog error: {e}"))),
            None => Ok(()),
        }
    }

    pub fn skip(&mut self) {
        self.engine.on_skip_reveal();
    }

    pub fn end(&mut self) {
        self.engine.end();
    }

    pub fn is_active(&self) -> bool {
        self.engine.is_active()
    }

    /// One of `inactive`, `awaiting_reveal`, `awaiting_confirm`, `awaiting_choice`.
    pub fn state(&self) -> String {
        state_label(self.engine.state()).to_string()
    }

    /// Current line with unrevealed text wrapped in the hidden span.
    pub fn display_text(&self) -> String {
        self.engine.current_display_text()
    }

    pub fn plain_text(&self) -> String {
        self.engine.current_plain_text()
    }

    /// JSON `{ "first": .., "second": .. }` while a choice is pending, else `null`.
    pub fn options(&self) -> Result<String, JsError> {
        let options = self
            .engine
            .current_options()
            .map(|(first, second)| OptionsInfo { first, second });
        to_json(&options)
    }

    /// Drain pending engine events as a JSON array.
    pub fn events(&mut self) -> Result<String, JsError> {
        let events: Vec<EventInfo> = self
            .engine
            .take_events()
            .into_iter()
            .map(EventInfo::from)
            .collect();
        to_json(&events)
    }

    /// JSON object of every set flag, suitable for local storage.
    pub fn flags_json(&self) -> Result<String, JsError> {
        to_json(&self.flags.snapshot())
    }

    /// Merge flags saved by `flags_json`.
    pub fn load_flags(&mut self, json: &str) -> Result<(), JsError> {
        let snapshot: std::collections::BTreeMap<String, bool> = serde_json::from_str(json)
            .map_err(|e| JsError::new(&format!("Invalid flags JSON: {e}")))?;
        self.flags.restore(snapshot);
        Ok(())
    }

    pub fn set_flag(&mut self, name: &str) {
        self.flags.set(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_scripts_parse() {
        let library = bundled_library().unwrap();
        assert_eq!(library.names(), vec!["battle_intro", "healer"]);
    }

    #[test]
    fn events_serialize_with_kind_tag() {
        let json = serde_json::to_string(&EventInfo::from(DialogEvent::LineStarted { line: 3 })).unwrap();
        assert_eq!(json, r#"{"kind":"line_started","line":3}"#);
    }
}
