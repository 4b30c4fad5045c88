/// Dialog Linter — validates dialog scripts before they reach the engine.
///
/// Usage: dialog_linter <script.ron | library.ron | dir> [--strict]
///
/// A file may hold a single script (a list of lines) or a library (a map of
/// script names to line lists). Directories are searched recursively.

use dialog_engine::schema::script::{DialogScript, LintIssue, ScriptLibrary};
use std::path::Path;
use std::process;

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        println!("Usage: dialog_linter <script.ron | library.ron | dir> [--strict]");
        process::exit(0);
    }

    let target = &args[1];
    let strict = args[2..].iter().any(|a| a == "--strict");

    let mut scripts: Vec<(String, DialogScript)> = Vec::new();
    let mut load_failures = 0;
    let path = Path::new(target);

    if path.is_file() {
        load_file(path, &mut scripts, &mut load_failures);
    } else if path.is_dir() {
        load_recursive(path, &mut scripts, &mut load_failures);
    } else {
        eprintln!("ERROR: Path '{}' does not exist", target);
        process::exit(1);
    }

    println!("Loaded {} dialog scripts", scripts.len());

    let (errors, warnings) = lint_scripts(&scripts);

    println!("\n=== Dialog Lint Report ===\n");

    if errors.is_empty() && warnings.is_empty() {
        println!("All checks passed!");
    }

    for warning in &warnings {
        println!("WARNING: {}", warning);
    }

    for error in &errors {
        println!("ERROR: {}", error);
    }

    println!(
        "\nSummary: {} errors, {} warnings, {} files failed to load",
        errors.len(),
        warnings.len(),
        load_failures
    );

    let failed = !errors.is_empty() || load_failures > 0 || (strict && !warnings.is_empty());
    process::exit(if failed { 1 } else { 0 });
}

fn load_file(path: &Path, scripts: &mut Vec<(String, DialogScript)>, failures: &mut usize) {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            eprintln!("  ERROR reading {}: {}", path.display(), e);
            *failures += 1;
            return;
        }
    };

    match DialogScript::parse_ron(&contents) {
        Ok(script) => {
            println!("  Loaded: {}", path.display());
            scripts.push((path.display().to_string(), script));
        }
        Err(script_err) => match ScriptLibrary::parse_ron(&contents) {
            Ok(library) => {
                println!("  Loaded library: {} ({} scripts)", path.display(), library.len());
                for name in library.names() {
                    if let Some(script) = library.get(name) {
                        scripts.push((
                            format!("{}#{}", path.display(), name),
                            script.as_ref().clone(),
                        ));
                    }
                }
            }
            Err(_) => {
                eprintln!("  ERROR loading {}: {}", path.display(), script_err);
                *failures += 1;
            }
        },
    }
}

fn load_recursive(dir: &Path, scripts: &mut Vec<(String, DialogScript)>, failures: &mut usize) {
    if let Ok(entries) = std::fs::read_dir(dir) {
        let mut paths: Vec<_> = entries.flatten().map(|e| e.path()).collect();
        paths.sort();
        for path in paths {
            if path.is_dir() {
                load_recursive(&path, scripts, failures);
            } else if path.extension().and_then(|s| s.to_str()) == Some("ron") {
                load_file(&path, scripts, failures);
            }
        }
    }
}

fn lint_scripts(scripts: &[(String, DialogScript)]) -> (Vec<String>, Vec<String>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    for (name, script) in scripts {
        let issues: Vec<LintIssue> = script.lint();
        for issue in issues {
            let message = format!("{}: {}", name, issue);
            if issue.is_error() {
                errors.push(message);
            } else {
                warnings.push(message);
            }
        }

        // Flags that are checked but never set by this script are often typos,
        // unless another conversation sets them.
        for (index, line) in script.lines().iter().enumerate() {
            if let Some(flag) = line.checked_flag() {
                let set_anywhere = scripts
                    .iter()
                    .flat_map(|(_, s)| s.lines())
                    .any(|l| l.flag_to_set() == Some(flag));
                if !set_anywhere {
                    warnings.push(format!(
                        "{}: line {}: checks flag '{}' which no loaded script sets",
                        name, index, flag
                    ));
                }
            }
        }
    }

    (errors, warnings)
}
