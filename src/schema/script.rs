/// Dialog scripts, script libraries, loading and static checks.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use super::line::{Choice, DialogLine};

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

/// An ordered, read-only sequence of lines forming one conversation.
///
/// Line indices are the branch references used by reroutes and options.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DialogScript {
    lines: Vec<DialogLine>,
}

impl DialogScript {
    pub fn new(lines: Vec<DialogLine>) -> Self {
        Self { lines }
    }

    pub fn lines(&self) -> &[DialogLine] {
        &self.lines
    }

    pub fn get(&self, index: usize) -> Option<&DialogLine> {
        self.lines.get(index)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// First line after `index` that linear advance may stop on.
    ///
    /// Conditional-only lines and any index in `skipped` are passed over.
    pub fn next_visible_after(&self, index: usize, skipped: &[usize]) -> Option<usize> {
        (index + 1..self.lines.len())
            .find(|&i| !self.lines[i].is_conditional_only && !skipped.contains(&i))
    }

    /// Load a script from a RON file containing a list of lines.
    pub fn load_from_ron(path: &Path) -> Result<DialogScript, ScriptError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    /// Parse a script from a RON string.
    pub fn parse_ron(input: &str) -> Result<DialogScript, ScriptError> {
        Ok(ron::from_str(input)?)
    }

    /// Static authoring checks. The engine still validates at resolve time;
    /// this catches problems before a player walks into them.
    pub fn lint(&self) -> Vec<LintIssue> {
        let mut issues = Vec::new();
        let len = self.lines.len();

        if self.lines.is_empty() {
            issues.push(LintIssue::EmptyScript);
            return issues;
        }

        let mut targeted = BTreeSet::new();
        targeted.insert(0);

        for (index, line) in self.lines.iter().enumerate() {
            if line.checked_flag().is_some() {
                targeted.insert(line.reroute_index);
                if line.reroute_index >= len {
                    issues.push(LintIssue::IndexOutOfRange {
                        line: index,
                        field: "reroute_index",
                        index: line.reroute_index,
                    });
                }
            }

            for choice in [Choice::First, Choice::Second] {
                let option = line.option(choice);
                if let Some(option) = option {
                    targeted.insert(option.target);
                }

                if line.requires_input {
                    match option {
                        Some(option) if option.has_label() => {
                            if option.target >= len {
                                issues.push(LintIssue::IndexOutOfRange {
                                    line: index,
                                    field: match choice {
                                        Choice::First => "option1.target",
                                        Choice::Second => "option2.target",
                                    },
                                    index: option.target,
                                });
                            }
                        }
                        _ => issues.push(LintIssue::MissingOption {
                            line: index,
                            choice,
                        }),
                    }
                } else if option.is_some() {
                    issues.push(LintIssue::OptionsIgnored { line: index });
                }
            }
        }

        issues.dedup();

        for (index, line) in self.lines.iter().enumerate() {
            if line.is_conditional_only && !targeted.contains(&index) {
                issues.push(LintIssue::UnreachableLine { line: index });
            }
        }

        for line in self.reroute_cycles() {
            issues.push(LintIssue::RerouteLoop { line });
        }

        issues
    }

    /// Lowest index of every reroute chain that loops back on itself when
    /// all of its flags are set.
    fn reroute_cycles(&self) -> BTreeSet<usize> {
        let mut cycles = BTreeSet::new();
        for start in 0..self.lines.len() {
            let mut chain = Vec::new();
            let mut index = start;
            while let Some(line) = self.lines.get(index) {
                if line.checked_flag().is_none() {
                    break;
                }
                if let Some(pos) = chain.iter().position(|&i| i == index) {
                    if let Some(&lowest) = chain[pos..].iter().min() {
                        cycles.insert(lowest);
                    }
                    break;
                }
                chain.push(index);
                index = line.reroute_index;
            }
        }
        cycles
    }
}

impl From<Vec<DialogLine>> for DialogScript {
    fn from(lines: Vec<DialogLine>) -> Self {
        Self::new(lines)
    }
}

/// A problem found by [`DialogScript::lint`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LintIssue {
    EmptyScript,
    IndexOutOfRange {
        line: usize,
        field: &'static str,
        index: usize,
    },
    MissingOption {
        line: usize,
        choice: Choice,
    },
    /// Options on a line that never asks for input.
    OptionsIgnored {
        line: usize,
    },
    /// A conditional-only line that nothing jumps to.
    UnreachableLine {
        line: usize,
    },
    RerouteLoop {
        line: usize,
    },
}

impl LintIssue {
    /// Errors break a conversation at runtime; everything else is a warning.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Self::EmptyScript | Self::IndexOutOfRange { .. } | Self::MissingOption { .. }
        )
    }
}

impl fmt::Display for LintIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyScript => write!(f, "script has no lines"),
            Self::IndexOutOfRange { line, field, index } => {
                write!(f, "line {}: {} {} does not exist", line, field, index)
            }
            Self::MissingOption { line, choice } => {
                write!(f, "line {}: requires input but {} has no label", line, choice)
            }
            Self::OptionsIgnored { line } => write!(
                f,
                "line {}: has options but requires_input is false",
                line
            ),
            Self::UnreachableLine { line } => write!(
                f,
                "line {}: conditional-only but no reroute or option targets it",
                line
            ),
            Self::RerouteLoop { line } => write!(
                f,
                "line {}: reroute chain loops when all of its flags are set",
                line
            ),
        }
    }
}

/// Named scripts shared by reference, so replays never copy line data.
#[derive(Debug, Clone, Default)]
pub struct ScriptLibrary {
    scripts: FxHashMap<String, Arc<DialogScript>>,
}

impl ScriptLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, script: DialogScript) {
        self.scripts.insert(name.into(), Arc::new(script));
    }

    pub fn get(&self, name: &str) -> Option<Arc<DialogScript>> {
        self.scripts.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.scripts.contains_key(name)
    }

    /// Script names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.scripts.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }

    /// Merge another library into this one. Scripts from `other` replace
    /// scripts in `self` with the same name.
    pub fn merge(&mut self, other: ScriptLibrary) {
        for (name, script) in other.scripts {
            self.scripts.insert(name, script);
        }
    }

    /// Load a library from a RON file mapping script names to line lists.
    pub fn load_from_ron(path: &Path) -> Result<ScriptLibrary, ScriptError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    pub fn parse_ron(input: &str) -> Result<ScriptLibrary, ScriptError> {
        let raw: HashMap<String, DialogScript> = ron::from_str(input)?;
        let mut library = ScriptLibrary::new();
        for (name, script) in raw {
            library.insert(name, script);
        }
        Ok(library)
    }

    /// Load every `.ron` file in `dir` as one script named by its file stem.
    pub fn load_dir(dir: &Path) -> Result<ScriptLibrary, ScriptError> {
        let mut library = ScriptLibrary::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|s| s.to_str()) != Some("ron") {
                continue;
            }
            let name = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("unknown")
                .to_string();
            library.insert(name, DialogScript::load_from_ron(&path)?);
        }
        Ok(library)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::line::DialogOption;

    fn branching_script() -> DialogScript {
        DialogScript::new(vec![
            DialogLine::new("Hi"),
            DialogLine::new("Choose:")
                .with_options(DialogOption::new("Yes", 2), DialogOption::new("No", 3)),
            DialogLine::new("You said yes"),
            DialogLine::new("You said no"),
        ])
    }

    #[test]
    fn next_visible_skips_conditional_lines() {
        let script = DialogScript::new(vec![
            DialogLine::new("A"),
            DialogLine::new("B").conditional_only(),
            DialogLine::new("C"),
        ]);
        assert_eq!(script.next_visible_after(0, &[]), Some(2));
        assert_eq!(script.next_visible_after(2, &[]), None);
    }

    #[test]
    fn next_visible_honors_skip_list() {
        let script = branching_script();
        assert_eq!(script.next_visible_after(2, &[]), Some(3));
        assert_eq!(script.next_visible_after(2, &[3]), None);
        assert_eq!(script.next_visible_after(0, &[1]), Some(2));
    }

    #[test]
    fn parse_script_from_ron() {
        let script = DialogScript::parse_ron(
            r#"#![enable(implicit_some)]
            [
                (text: "Hello there.", check_flag: "met_bob", reroute_index: 2),
                (text: "I'm Bob.", set_flag: "met_bob"),
                (text: "Welcome back.", is_conditional_only: true),
            ]"#,
        )
        .unwrap();
        assert_eq!(script.len(), 3);
        assert_eq!(script.lines()[0].checked_flag(), Some("met_bob"));
        assert_eq!(script.lines()[1].flag_to_set(), Some("met_bob"));
        assert!(script.lines()[2].is_conditional_only);
    }

    #[test]
    fn parse_script_rejects_garbage() {
        assert!(matches!(
            DialogScript::parse_ron("[ (txt: 1) ]"),
            Err(ScriptError::Ron(_))
        ));
    }

    #[test]
    fn lint_clean_script() {
        assert!(branching_script().lint().is_empty());
    }

    #[test]
    fn lint_reports_errors_and_warnings() {
        let mut choice = DialogLine::new("Pick one").with_options(
            DialogOption::new("Left", 9),
            DialogOption::new("", 0),
        );
        choice.set_flag = Some("picked".to_string());

        let mut talky = DialogLine::new("Nothing to pick");
        talky.option1 = Some(DialogOption::new("Stray", 0));

        let script = DialogScript::new(vec![
            DialogLine::new("Start").reroute_if("a", 1),
            DialogLine::new("Loop").reroute_if("b", 0),
            choice,
            talky,
            DialogLine::new("Orphan").conditional_only(),
        ]);

        let issues = script.lint();
        assert!(issues.contains(&LintIssue::IndexOutOfRange {
            line: 2,
            field: "option1.target",
            index: 9,
        }));
        assert!(issues.contains(&LintIssue::MissingOption {
            line: 2,
            choice: Choice::Second,
        }));
        assert!(issues.contains(&LintIssue::OptionsIgnored { line: 3 }));
        assert!(issues.contains(&LintIssue::UnreachableLine { line: 4 }));
        assert!(issues.contains(&LintIssue::RerouteLoop { line: 0 }));

        let errors = issues.iter().filter(|i| i.is_error()).count();
        assert_eq!(errors, 2);
    }

    #[test]
    fn lint_self_reroute_is_a_loop() {
        let script = DialogScript::new(vec![
            DialogLine::new("Intro"),
            DialogLine::new("Again").reroute_if("seen", 1),
        ]);
        assert_eq!(script.lint(), vec![LintIssue::RerouteLoop { line: 1 }]);
    }

    #[test]
    fn lint_empty_script() {
        assert_eq!(DialogScript::default().lint(), vec![LintIssue::EmptyScript]);
    }

    #[test]
    fn library_parse_and_share() {
        let library = ScriptLibrary::parse_ron(
            r#"{
                "guard": [ (text: "Halt!") ],
                "merchant": [ (text: "Wares?"), (text: "Come again.") ],
            }"#,
        )
        .unwrap();
        assert_eq!(library.names(), vec!["guard", "merchant"]);

        let first = library.get("merchant").unwrap();
        let second = library.get("merchant").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.len(), 2);
        assert!(library.get("innkeeper").is_none());
    }

    #[test]
    fn library_merge_precedence() {
        let mut base = ScriptLibrary::new();
        base.insert("guard", DialogScript::new(vec![DialogLine::new("Halt!")]));
        base.insert("smith", DialogScript::new(vec![DialogLine::new("Clang.")]));

        let mut patch = ScriptLibrary::new();
        patch.insert("guard", DialogScript::new(vec![DialogLine::new("Move along.")]));

        base.merge(patch);
        assert_eq!(base.len(), 2);
        assert_eq!(base.get("guard").unwrap().lines()[0].text, "Move along.");
        assert!(base.contains("smith"));
    }

    #[test]
    fn script_ron_round_trip() {
        let script = branching_script();
        let serialized = ron::to_string(&script).unwrap();
        let deserialized = DialogScript::parse_ron(&serialized).unwrap();
        assert_eq!(deserialized, script);
    }
}
