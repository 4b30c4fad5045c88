/// Preview — play a dialog script in the terminal.
///
/// Usage: dialog_preview --script <path> [options]
///        dialog_preview --library <path> --name <script> [options]
///
/// Options:
///   --config <path>   engine configuration (RON)
///   --flags <path>    story flags to load before and save after playing
///   --speed <cps>     reveal speed in characters per second
///   --auto            no waiting; choices are picked at random
///   --seed <n>        RNG seed for --auto (default 42)
///   --set <flag>      set a flag before playing (repeatable)
///
/// While playing: Enter confirms or skips the reveal, 1/2 picks an option.

use dialog_engine::core::engine::{DialogEngine, DialogEvent, EngineState};
use dialog_engine::core::flags::FlagStore;
use dialog_engine::schema::line::Choice;
use dialog_engine::schema::script::{DialogScript, ScriptLibrary};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const FRAME: Duration = Duration::from_millis(16);

struct Options {
    script_path: Option<String>,
    library_path: Option<String>,
    name: Option<String>,
    config_path: Option<String>,
    flags_path: Option<String>,
    speed: Option<f32>,
    auto: bool,
    seed: u64,
    preset_flags: Vec<String>,
}

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage();
        return;
    }

    let options = parse_args(&args);
    let script = match load_script(&options) {
        Ok(script) => script,
        Err(message) => {
            eprintln!("ERROR: {}", message);
            std::process::exit(1);
        }
    };

    let flags = match &options.flags_path {
        Some(path) if Path::new(path).exists() => match FlagStore::load_from_ron(Path::new(path)) {
            Ok(flags) => flags,
            Err(e) => {
                eprintln!("ERROR: Failed to load flags from {}: {}", path, e);
                std::process::exit(1);
            }
        },
        _ => FlagStore::new(),
    };
    for flag in &options.preset_flags {
        flags.set(flag);
    }

    let mut builder = DialogEngine::builder().with_flags(flags.clone());
    if let Some(ref path) = options.config_path {
        builder = builder.config_file(path);
    }
    if let Some(speed) = options.speed {
        builder = builder.chars_per_second(speed);
    }
    let mut engine = match builder.build() {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = play(&mut engine, script, &options) {
        eprintln!("ERROR: {}", e);
        std::process::exit(1);
    }

    println!("\n== Flags: {} ==", flags.names().join(", "));

    if let Some(ref path) = options.flags_path {
        if let Err(e) = flags.save_to_ron(Path::new(path)) {
            eprintln!("ERROR: Failed to save flags to {}: {}", path, e);
            std::process::exit(1);
        }
        println!("Saved flags to {}", path);
    }
}

fn parse_args(args: &[String]) -> Options {
    let mut options = Options {
        script_path: None,
        library_path: None,
        name: None,
        config_path: None,
        flags_path: None,
        speed: None,
        auto: false,
        seed: 42,
        preset_flags: Vec::new(),
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--script" if i + 1 < args.len() => {
                i += 1;
                options.script_path = Some(args[i].clone());
            }
            "--library" if i + 1 < args.len() => {
                i += 1;
                options.library_path = Some(args[i].clone());
            }
            "--name" if i + 1 < args.len() => {
                i += 1;
                options.name = Some(args[i].clone());
            }
            "--config" if i + 1 < args.len() => {
                i += 1;
                options.config_path = Some(args[i].clone());
            }
            "--flags" if i + 1 < args.len() => {
                i += 1;
                options.flags_path = Some(args[i].clone());
            }
            "--speed" if i + 1 < args.len() => {
                i += 1;
                options.speed = args[i].parse().ok();
            }
            "--seed" if i + 1 < args.len() => {
                i += 1;
                options.seed = args[i].parse().unwrap_or(42);
            }
            "--set" if i + 1 < args.len() => {
                i += 1;
                options.preset_flags.push(args[i].clone());
            }
            "--auto" => options.auto = true,
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    options
}

fn load_script(options: &Options) -> Result<Arc<DialogScript>, String> {
    if let Some(ref path) = options.script_path {
        return DialogScript::load_from_ron(Path::new(path))
            .map(Arc::new)
            .map_err(|e| format!("Failed to load script {}: {}", path, e));
    }

    let Some(ref path) = options.library_path else {
        return Err("one of --script or --library is required".to_string());
    };
    let library = if Path::new(path).is_dir() {
        ScriptLibrary::load_dir(Path::new(path))
    } else {
        ScriptLibrary::load_from_ron(Path::new(path))
    }
    .map_err(|e| format!("Failed to load library {}: {}", path, e))?;

    let Some(ref name) = options.name else {
        return Err(format!(
            "--name is required with --library; available: {}",
            library.names().join(", ")
        ));
    };
    library
        .get(name)
        .ok_or_else(|| format!("no script named '{}' in {}", name, path))
}

fn play(
    engine: &mut DialogEngine,
    script: Arc<DialogScript>,
    options: &Options,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut rng = StdRng::seed_from_u64(options.seed);
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut stdout = io::stdout();
    let mut printed = 0;

    engine.start(script)?;

    loop {
        for event in engine.take_events() {
            match event {
                DialogEvent::LineStarted { .. } => {
                    printed = 0;
                    println!();
                }
                DialogEvent::FlagSet { flag, .. } => {
                    println!();
                    print!("   [flag set: {}]", flag);
                }
                DialogEvent::Rerouted { from, to, flag } => {
                    println!("   [line {} -> {} because '{}' is set]", from, to, flag);
                }
                DialogEvent::Aborted(e) => return Err(e.into()),
                DialogEvent::Ended => {
                    println!("\n== Dialogue complete ==");
                    return Ok(());
                }
                DialogEvent::LineRevealed { .. } | DialogEvent::OptionsShown { .. } => {}
            }
        }

        let text = engine.current_plain_text();
        let fresh: String = text.chars().skip(printed).collect();
        if !fresh.is_empty() {
            printed += fresh.chars().count();
            print!("{}", fresh);
            stdout.flush()?;
        }

        match engine.state() {
            EngineState::AwaitingReveal => {
                if !options.auto {
                    std::thread::sleep(FRAME);
                }
                engine.tick(FRAME);
            }
            EngineState::AwaitingConfirm => {
                if !options.auto {
                    let mut line = String::new();
                    input.read_line(&mut line)?;
                }
                engine.on_confirm()?;
            }
            EngineState::AwaitingChoice => {
                if let Some((first, second)) = engine.current_options() {
                    println!("\n== Choose option ==");
                    println!("1: {}", first);
                    println!("2: {}", second);
                }
                let choice = if options.auto {
                    let choice = if rng.gen_bool(0.5) {
                        Choice::First
                    } else {
                        Choice::Second
                    };
                    println!("> {}", choice.number());
                    choice
                } else {
                    read_choice(&mut input)?
                };
                engine.on_choose(choice)?;
            }
            EngineState::Inactive => return Ok(()),
        }
    }
}

fn read_choice(input: &mut impl BufRead) -> io::Result<Choice> {
    loop {
        print!("> ");
        io::stdout().flush()?;
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "no choice given"));
        }
        match line.trim().parse::<u8>().ok().and_then(Choice::from_number) {
            Some(choice) => return Ok(choice),
            None => println!("Please enter 1 or 2."),
        }
    }
}

fn print_usage() {
    println!("Usage: dialog_preview --script <path> [options]");
    println!("       dialog_preview --library <path> --name <script> [options]");
    println!();
    println!("Options:");
    println!("  --config <path>   engine configuration (RON)");
    println!("  --flags <path>    story flags to load before and save after playing");
    println!("  --speed <cps>     reveal speed in characters per second");
    println!("  --auto            no waiting; choices are picked at random");
    println!("  --seed <n>        RNG seed for --auto (default 42)");
    println!("  --set <flag>      set a flag before playing (repeatable)");
}
