/// The dialog state machine: flag-based rerouting, timed reveal, choices
/// and confirm-driven advance.

use log::{debug, trace, warn};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::core::config::{ConfigError, DialogConfig};
use crate::core::flags::FlagStore;
use crate::core::reveal::{RevealMarkup, TextRevealer};
use crate::schema::line::{Choice, DialogLine};
use crate::schema::script::DialogScript;

/// Content and session errors. Any of these ends the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DialogError {
    #[error("index {index} is out of range for a script of {len} lines (referenced from {})", origin(.line))]
    OutOfRangeIndex {
        /// The line holding the bad reference; `None` for the conversation start.
        line: Option<usize>,
        index: usize,
        len: usize,
    },
    #[error("line {line}: reroute cycle {path:?}")]
    CyclicReroute { line: usize, path: Vec<usize> },
    #[error("line {line}: requires input but {choice} has no label")]
    MissingOptionContent { line: usize, choice: Choice },
    #[error("a conversation is already in progress")]
    SessionAlreadyActive,
}

fn origin(line: &Option<usize>) -> String {
    match line {
        Some(line) => format!("line {}", line),
        None => "conversation start".to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Inactive,
    /// Text is still being paced out.
    AwaitingReveal,
    /// Plain line fully shown, waiting for a confirm.
    AwaitingConfirm,
    /// Input line fully shown, waiting for an option.
    AwaitingChoice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealState {
    Idle,
    Revealing,
    Complete,
}

/// Notifications for the presentation layer, drained with
/// [`DialogEngine::take_events`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogEvent {
    Rerouted { from: usize, to: usize, flag: String },
    LineStarted { line: usize },
    LineRevealed { line: usize },
    OptionsShown { line: usize, first: String, second: String },
    FlagSet { line: usize, flag: String },
    Ended,
    Aborted(DialogError),
}

/// State of the conversation currently on screen.
#[derive(Debug)]
pub struct DialogSession {
    script: Arc<DialogScript>,
    current_line: usize,
    reveal_state: RevealState,
    revealer: TextRevealer,
    /// Targets of the options passed over at the latest choice.
    skipped_arms: Vec<usize>,
    /// Time spent waiting for a confirm, for auto-advance.
    idle: Duration,
}

impl DialogSession {
    fn new(script: Arc<DialogScript>) -> Self {
        Self {
            script,
            current_line: 0,
            reveal_state: RevealState::Idle,
            revealer: TextRevealer::new("", 0.0, 0),
            skipped_arms: Vec::new(),
            idle: Duration::ZERO,
        }
    }

    pub fn script(&self) -> &Arc<DialogScript> {
        &self.script
    }

    pub fn current_line(&self) -> usize {
        self.current_line
    }

    pub fn reveal_state(&self) -> RevealState {
        self.reveal_state
    }

    pub fn revealer(&self) -> &TextRevealer {
        &self.revealer
    }

    pub fn skipped_arms(&self) -> &[usize] {
        &self.skipped_arms
    }

    fn line(&self) -> Option<&DialogLine> {
        self.script.get(self.current_line)
    }
}

/// Runs one conversation at a time against a shared [`FlagStore`].
///
/// Starting a conversation while another is active is rejected with
/// [`DialogError::SessionAlreadyActive`]; call [`end`](Self::end) first.
/// Confirms and choices that arrive in the wrong state are ignored.
#[derive(Debug)]
pub struct DialogEngine {
    config: DialogConfig,
    flags: FlagStore,
    session: Option<DialogSession>,
    events: Vec<DialogEvent>,
}

/// Builder for constructing a `DialogEngine`.
#[derive(Debug, Default)]
pub struct DialogEngineBuilder {
    config: Option<DialogConfig>,
    config_path: Option<String>,
    chars_per_second: Option<f32>,
    auto_advance: Option<f32>,
    markup: Option<RevealMarkup>,
    flags: Option<FlagStore>,
}

impl DialogEngine {
    pub fn builder() -> DialogEngineBuilder {
        DialogEngineBuilder::default()
    }

    /// An engine with the default configuration over `flags`.
    pub fn new(flags: FlagStore) -> Self {
        Self {
            config: DialogConfig::default(),
            flags,
            session: None,
            events: Vec::new(),
        }
    }

    pub fn config(&self) -> &DialogConfig {
        &self.config
    }

    pub fn flags(&self) -> &FlagStore {
        &self.flags
    }

    pub fn session(&self) -> Option<&DialogSession> {
        self.session.as_ref()
    }

    pub fn state(&self) -> EngineState {
        let Some(session) = &self.session else {
            return EngineState::Inactive;
        };
        match session.reveal_state {
            RevealState::Idle | RevealState::Revealing => EngineState::AwaitingReveal,
            RevealState::Complete => match session.line() {
                Some(line) if line.requires_input => EngineState::AwaitingChoice,
                _ => EngineState::AwaitingConfirm,
            },
        }
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn current_line(&self) -> Option<usize> {
        self.session.as_ref().map(|s| s.current_line)
    }

    /// The current line with unrevealed characters hidden by the configured
    /// markup. Empty when no conversation is active.
    pub fn current_display_text(&self) -> String {
        self.session
            .as_ref()
            .map(|s| s.revealer.display_text(&self.config.markup))
            .unwrap_or_default()
    }

    /// Only the characters revealed so far, without markup.
    pub fn current_plain_text(&self) -> String {
        self.session
            .as_ref()
            .map(|s| s.revealer.plain_text())
            .unwrap_or_default()
    }

    /// Option labels, present only while waiting for a choice.
    pub fn current_options(&self) -> Option<(String, String)> {
        if self.state() != EngineState::AwaitingChoice {
            return None;
        }
        let (first, second) = self.session.as_ref()?.line()?.option_labels()?;
        Some((first.to_string(), second.to_string()))
    }

    pub fn take_events(&mut self) -> Vec<DialogEvent> {
        std::mem::take(&mut self.events)
    }

    /// Begin a conversation at line 0, following any reroutes.
    pub fn start(&mut self, script: impl Into<Arc<DialogScript>>) -> Result<(), DialogError> {
        if self.session.is_some() {
            warn!("start ignored: a conversation is already in progress");
            return Err(DialogError::SessionAlreadyActive);
        }

        let script = script.into();
        debug!("starting conversation of {} lines", script.len());
        match resolve(&script, &self.flags, 0, None, &mut self.events) {
            Ok(index) => {
                self.session = Some(DialogSession::new(script));
                self.begin_line(index);
                Ok(())
            }
            Err(e) => {
                self.abort(e.clone());
                Err(e)
            }
        }
    }

    /// Advance the reveal clock, or the auto-advance timer once a plain
    /// line is fully shown. Never fails; content errors from an automatic
    /// advance end the conversation and surface as [`DialogEvent::Aborted`].
    pub fn tick(&mut self, delta: Duration) {
        match self.state() {
            EngineState::AwaitingReveal => {
                let finished = match self.session.as_mut() {
                    Some(session) => {
                        let newly = session.revealer.tick(delta);
                        if newly > 0 {
                            trace!(
                                "line {}: {}/{} characters shown",
                                session.current_line,
                                session.revealer.revealed_count(),
                                session.revealer.len()
                            );
                        }
                        session.revealer.is_complete()
                    }
                    None => false,
                };
                if finished {
                    self.complete_line();
                }
            }
            EngineState::AwaitingConfirm => {
                let Some(delay) = self.config.auto_advance_delay() else {
                    return;
                };
                let due = match self.session.as_mut() {
                    Some(session) => {
                        session.idle = session.idle.saturating_add(delta);
                        session.idle >= delay
                    }
                    None => false,
                };
                if due {
                    debug!("auto-advancing");
                    // Failures are already recorded as an Aborted event.
                    let _ = self.on_confirm();
                }
            }
            EngineState::AwaitingChoice | EngineState::Inactive => {}
        }
    }

    /// [`tick`](Self::tick) with a frame delta in seconds. Negative or
    /// non-finite deltas count as zero.
    pub fn tick_secs(&mut self, secs: f32) {
        let delta = if secs.is_finite() && secs > 0.0 {
            Duration::try_from_secs_f32(secs).unwrap_or(Duration::MAX)
        } else {
            Duration::ZERO
        };
        self.tick(delta);
    }

    /// Move past a fully shown plain line. Ignored in any other state.
    pub fn on_confirm(&mut self) -> Result<(), DialogError> {
        if self.state() != EngineState::AwaitingConfirm {
            trace!("confirm ignored in state {:?}", self.state());
            return Ok(());
        }
        let Some(session) = self.session.as_ref() else {
            return Ok(());
        };

        let current = session.current_line;
        let next = session
            .script
            .next_visible_after(current, &session.skipped_arms);
        match next {
            Some(next) => self.advance_to(next, current),
            None => {
                self.end();
                Ok(())
            }
        }
    }

    /// Take one of the options of a fully shown input line. Ignored in any
    /// other state.
    pub fn on_choose(&mut self, choice: Choice) -> Result<(), DialogError> {
        if self.state() != EngineState::AwaitingChoice {
            trace!("{} ignored in state {:?}", choice, self.state());
            return Ok(());
        }
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };

        let current = session.current_line;
        let script = Arc::clone(&session.script);
        let Some(line) = script.get(current) else {
            return Ok(());
        };
        let Some(target) = line.option(choice).map(|o| o.target) else {
            let e = DialogError::MissingOptionContent {
                line: current,
                choice,
            };
            self.abort(e.clone());
            return Err(e);
        };

        session.skipped_arms = line
            .option(choice.other())
            .map(|o| o.target)
            .filter(|&other| other != target)
            .into_iter()
            .collect();

        debug!("line {}: chose {} -> line {}", current, choice, target);
        self.advance_to(target, current)
    }

    /// Skip the rest of the reveal. The line counts as fully shown, so its
    /// flag is still recorded.
    pub fn on_skip_reveal(&mut self) {
        if self.state() != EngineState::AwaitingReveal {
            return;
        }
        if let Some(session) = self.session.as_mut() {
            session.revealer.cancel();
            trace!("line {}: reveal skipped", session.current_line);
        }
        self.complete_line();
    }

    /// End the active conversation, if any. Flags already set stay set.
    pub fn end(&mut self) {
        if self.session.take().is_some() {
            debug!("conversation ended");
            self.events.push(DialogEvent::Ended);
        }
    }

    fn advance_to(&mut self, target: usize, from: usize) -> Result<(), DialogError> {
        let Some(script) = self.session.as_ref().map(|s| Arc::clone(&s.script)) else {
            return Ok(());
        };
        match resolve(&script, &self.flags, target, Some(from), &mut self.events) {
            Ok(index) => {
                self.begin_line(index);
                Ok(())
            }
            Err(e) => {
                self.abort(e.clone());
                Err(e)
            }
        }
    }

    fn begin_line(&mut self, index: usize) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let script = Arc::clone(&session.script);
        let Some(line) = script.get(index) else {
            return;
        };

        session.current_line = index;
        session.revealer = TextRevealer::new(&line.text, self.config.chars_per_second, 0);
        session.reveal_state = RevealState::Revealing;
        session.idle = Duration::ZERO;
        debug!("line {}: {:?}", index, line.text);
        self.events.push(DialogEvent::LineStarted { line: index });

        if session.revealer.is_complete() {
            self.complete_line();
        }
    }

    fn complete_line(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.revealer.finish();
        session.reveal_state = RevealState::Complete;
        session.idle = Duration::ZERO;

        let index = session.current_line;
        let script = Arc::clone(&session.script);
        let Some(line) = script.get(index) else {
            return;
        };
        self.events.push(DialogEvent::LineRevealed { line: index });

        if let Some(flag) = line.flag_to_set() {
            if self.flags.set(flag) {
                self.events.push(DialogEvent::FlagSet {
                    line: index,
                    flag: flag.to_string(),
                });
            }
        }

        if let Some((first, second)) = line.option_labels() {
            self.events.push(DialogEvent::OptionsShown {
                line: index,
                first: first.to_string(),
                second: second.to_string(),
            });
        }
    }

    fn abort(&mut self, error: DialogError) {
        warn!("conversation aborted: {}", error);
        self.session = None;
        self.events.push(DialogEvent::Aborted(error));
    }
}

/// Follow reroutes from `start` until a line that is shown, checking the
/// references that line depends on.
fn resolve(
    script: &DialogScript,
    flags: &FlagStore,
    start: usize,
    from: Option<usize>,
    events: &mut Vec<DialogEvent>,
) -> Result<usize, DialogError> {
    let len = script.len();
    let mut index = start;
    let mut referrer = from;
    let mut path = Vec::new();

    loop {
        let line = script.get(index).ok_or(DialogError::OutOfRangeIndex {
            line: referrer,
            index,
            len,
        })?;

        if path.contains(&index) {
            path.push(index);
            return Err(DialogError::CyclicReroute { line: index, path });
        }
        path.push(index);

        match line.checked_flag() {
            Some(flag) if flags.contains(flag) => {
                debug!("line {}: {} is set, rerouting to {}", index, flag, line.reroute_index);
                events.push(DialogEvent::Rerouted {
                    from: index,
                    to: line.reroute_index,
                    flag: flag.to_string(),
                });
                referrer = Some(index);
                index = line.reroute_index;
            }
            _ => {
                check_options(line, index, len)?;
                return Ok(index);
            }
        }
    }
}

fn check_options(line: &DialogLine, index: usize, len: usize) -> Result<(), DialogError> {
    if !line.requires_input {
        return Ok(());
    }
    for choice in [Choice::First, Choice::Second] {
        match line.option(choice) {
            Some(option) if option.has_label() => {
                if option.target >= len {
                    return Err(DialogError::OutOfRangeIndex {
                        line: Some(index),
                        index: option.target,
                        len,
                    });
                }
            }
            _ => {
                return Err(DialogError::MissingOptionContent {
                    line: index,
                    choice,
                })
            }
        }
    }
    Ok(())
}

impl DialogEngineBuilder {
    /// Start from an already loaded configuration.
    pub fn with_config(mut self, config: DialogConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Load the configuration from a RON file at build time.
    pub fn config_file(mut self, path: &str) -> Self {
        self.config_path = Some(path.to_string());
        self
    }

    pub fn chars_per_second(mut self, rate: f32) -> Self {
        self.chars_per_second = Some(rate);
        self
    }

    /// Advance plain lines automatically after `seconds` fully shown.
    pub fn auto_advance(mut self, seconds: f32) -> Self {
        self.auto_advance = Some(seconds);
        self
    }

    pub fn markup(mut self, markup: RevealMarkup) -> Self {
        self.markup = Some(markup);
        self
    }

    /// Use an existing flag store, e.g. one restored from a save.
    pub fn with_flags(mut self, flags: FlagStore) -> Self {
        self.flags = Some(flags);
        self
    }

    /// Explicit setters override values from `with_config`/`config_file`.
    pub fn build(self) -> Result<DialogEngine, ConfigError> {
        let mut config = match (self.config, self.config_path) {
            (Some(config), _) => config,
            (None, Some(path)) => DialogConfig::load_from_ron(std::path::Path::new(&path))?,
            (None, None) => DialogConfig::default(),
        };

        if let Some(rate) = self.chars_per_second {
            config.chars_per_second = rate;
        }
        if let Some(delay) = self.auto_advance {
            config.auto_advance = Some(delay);
        }
        if let Some(markup) = self.markup {
            config.markup = markup;
        }
        config.validate()?;

        Ok(DialogEngine {
            config,
            flags: self.flags.unwrap_or_default(),
            session: None,
            events: Vec::new(),
        })
    }
}
