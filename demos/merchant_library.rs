/// Merchant Library example — several conversations sharing one flag store.
///
/// Loads every script under `data/scripts` plus the fixtures library, then
/// plays the merchant twice and the guard once. The merchant remembers the
/// sale on the second visit.
///
/// Run with: cargo run --example merchant_library

use dialog_engine::core::engine::{DialogEngine, EngineState};
use dialog_engine::core::flags::FlagStore;
use dialog_engine::core::reveal::RevealMarkup;
use dialog_engine::schema::line::Choice;
use dialog_engine::schema::script::ScriptLibrary;
use std::path::Path;
use std::time::Duration;

fn main() {
    // --- Load every conversation into one library ---
    let mut library = ScriptLibrary::load_dir(Path::new("data/scripts"))
        .expect("Failed to load bundled scripts");
    library.merge(
        ScriptLibrary::load_from_ron(Path::new("tests/fixtures/library.ron"))
            .expect("Failed to load fixture library"),
    );
    println!("Scripts: {}\n", library.names().join(", "));

    let flags = FlagStore::new();
    let mut engine = DialogEngine::builder()
        .chars_per_second(12.0)
        .markup(RevealMarkup::new("[", "]"))
        .with_flags(flags.clone())
        .build()
        .expect("Failed to build engine");

    for (name, choices) in [
        ("merchant", vec![Choice::First]),
        ("merchant", vec![]),
        ("guard", vec![]),
    ] {
        println!("=== {} ===", name);
        let script = library.get(name).expect("Script missing from library");
        engine.start(script).expect("Failed to start conversation");
        let mut choices = choices.into_iter();

        while engine.is_active() {
            match engine.state() {
                EngineState::AwaitingReveal => {
                    // show a couple of partial frames, then skip ahead
                    println!("  ... {}", engine.current_display_text());
                    engine.tick(Duration::from_millis(250));
                    if engine.state() == EngineState::AwaitingReveal {
                        engine.on_skip_reveal();
                    }
                }
                EngineState::AwaitingConfirm => {
                    println!("  {}", engine.current_plain_text());
                    engine.on_confirm().expect("Script error");
                }
                EngineState::AwaitingChoice => {
                    println!("  {}", engine.current_plain_text());
                    let choice = choices.next().unwrap_or(Choice::Second);
                    if let Some((first, second)) = engine.current_options() {
                        println!("    [1] {}  [2] {}  -> {}", first, second, choice.number());
                    }
                    engine.on_choose(choice).expect("Script error");
                }
                EngineState::Inactive => break,
            }
        }
        println!();
    }

    println!("Flags: {}", flags.names().join(", "));
}
