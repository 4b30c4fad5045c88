/// Battle Intro example — a rival who remembers the last fight.
///
/// The first conversation offers a challenge; after the battle sets
/// `beat_rival`, the same script reroutes straight to the rematch line.
///
/// Run with: cargo run --example battle_intro

use dialog_engine::core::engine::{DialogEngine, DialogEvent, EngineState};
use dialog_engine::core::flags::FlagStore;
use dialog_engine::schema::line::Choice;
use dialog_engine::schema::script::DialogScript;
use std::sync::Arc;
use std::time::Duration;

fn main() {
    // --- Load the rival's script ---
    let script = Arc::new(
        DialogScript::load_from_ron(std::path::Path::new("data/scripts/battle_intro.ron"))
            .expect("Failed to load battle intro script"),
    );

    let flags = FlagStore::new();
    let mut engine = DialogEngine::builder()
        .config_file("data/config.ron")
        .with_flags(flags.clone())
        .build()
        .expect("Failed to build engine");

    println!("=== First meeting ===\n");
    play(&mut engine, Arc::clone(&script), Choice::First);

    // The battle itself happens elsewhere; the player wins it.
    flags.set("beat_rival");

    println!("\n=== After the battle ===\n");
    play(&mut engine, script, Choice::First);

    println!("\nFlags: {}", flags.names().join(", "));
}

/// Run one conversation, printing each line once it has fully revealed.
fn play(engine: &mut DialogEngine, script: Arc<DialogScript>, choice: Choice) {
    engine.start(script).expect("Failed to start conversation");

    while engine.is_active() {
        for event in engine.take_events() {
            match event {
                DialogEvent::Rerouted { from, to, flag } => {
                    println!("  (line {} -> {}: '{}' is set)", from, to, flag)
                }
                DialogEvent::LineRevealed { .. } => println!("Rival: {}", engine.current_plain_text()),
                DialogEvent::FlagSet { flag, .. } => println!("  (flag set: {})", flag),
                _ => {}
            }
        }

        match engine.state() {
            EngineState::AwaitingReveal => engine.tick(Duration::from_millis(50)),
            EngineState::AwaitingConfirm => engine.on_confirm().expect("Script error"),
            EngineState::AwaitingChoice => {
                if let Some((first, second)) = engine.current_options() {
                    println!("  [1] {}\n  [2] {}", first, second);
                }
                println!("> {}", choice.number());
                engine.on_choose(choice).expect("Script error");
            }
            EngineState::Inactive => break,
        }
    }
}
