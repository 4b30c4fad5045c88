use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the two options offered by an input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Choice {
    First,
    Second,
}

impl Choice {
    /// Map a 1-based option number (as shown to the player) to a choice.
    pub fn from_number(number: u8) -> Option<Choice> {
        match number {
            1 => Some(Self::First),
            2 => Some(Self::Second),
            _ => None,
        }
    }

    /// The 1-based option number.
    pub fn number(self) -> u8 {
        match self {
            Self::First => 1,
            Self::Second => 2,
        }
    }

    /// The option that was not picked.
    pub fn other(self) -> Choice {
        match self {
            Self::First => Self::Second,
            Self::Second => Self::First,
        }
    }
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "option {}", self.number())
    }
}

/// A labelled branch offered to the player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogOption {
    pub text: String,
    /// Index of the line to jump to when this option is chosen.
    pub target: usize,
}

impl DialogOption {
    pub fn new(text: impl Into<String>, target: usize) -> Self {
        Self {
            text: text.into(),
            target,
        }
    }

    /// An option with an empty label cannot be shown.
    pub fn has_label(&self) -> bool {
        !self.text.is_empty()
    }
}

/// A single line of a conversation.
///
/// Flag names are optional; an empty name is treated the same as no flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogLine {
    pub text: String,
    /// When this flag is already set, the line is replaced by `reroute_index`.
    #[serde(default)]
    pub check_flag: Option<String>,
    #[serde(default)]
    pub reroute_index: usize,
    /// Recorded once the line has been fully shown.
    #[serde(default)]
    pub set_flag: Option<String>,
    /// Pause for `option1`/`option2` instead of waiting for a confirm.
    #[serde(default)]
    pub requires_input: bool,
    #[serde(default)]
    pub option1: Option<DialogOption>,
    #[serde(default)]
    pub option2: Option<DialogOption>,
    /// Skipped by linear advance; only shown when targeted directly.
    #[serde(default)]
    pub is_conditional_only: bool,
}

impl DialogLine {
    /// A plain line that waits for a confirm.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            check_flag: None,
            reroute_index: 0,
            set_flag: None,
            requires_input: false,
            option1: None,
            option2: None,
            is_conditional_only: false,
        }
    }

    /// Reroute to `index` whenever `flag` has been set.
    pub fn reroute_if(mut self, flag: impl Into<String>, index: usize) -> Self {
        self.check_flag = Some(flag.into());
        self.reroute_index = index;
        self
    }

    /// Record `flag` after this line is shown.
    pub fn setting_flag(mut self, flag: impl Into<String>) -> Self {
        self.set_flag = Some(flag.into());
        self
    }

    /// Turn this line into a two-way choice.
    pub fn with_options(mut self, first: DialogOption, second: DialogOption) -> Self {
        self.requires_input = true;
        self.option1 = Some(first);
        self.option2 = Some(second);
        self
    }

    pub fn conditional_only(mut self) -> Self {
        self.is_conditional_only = true;
        self
    }

    /// The flag that triggers a reroute, if any.
    pub fn checked_flag(&self) -> Option<&str> {
        non_empty(self.check_flag.as_deref())
    }

    /// The flag recorded once this line is shown, if any.
    pub fn flag_to_set(&self) -> Option<&str> {
        non_empty(self.set_flag.as_deref())
    }

    pub fn option(&self, choice: Choice) -> Option<&DialogOption> {
        match choice {
            Choice::First => self.option1.as_ref(),
            Choice::Second => self.option2.as_ref(),
        }
    }

    /// Both option labels, when this is an input line with complete options.
    pub fn option_labels(&self) -> Option<(&str, &str)> {
        if !self.requires_input {
            return None;
        }
        match (&self.option1, &self.option2) {
            (Some(first), Some(second)) if first.has_label() && second.has_label() => {
                Some((first.text.as_str(), second.text.as_str()))
            }
            _ => None,
        }
    }
}

fn non_empty(name: Option<&str>) -> Option<&str> {
    name.filter(|n| !n.is_empty())
}
