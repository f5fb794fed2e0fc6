//! Prop runtime CLI
//!
//! Usage:
//!   prop-runtime                              # Interactive desk simulator
//!   prop-runtime --preset test-magnet         # Built-in prop
//!   prop-runtime --config prop.json           # Prop from a JSON file
//!   prop-runtime --print-config               # Dump the effective config
//!   prop-runtime --serve                      # HTTP bench server
//!   prop-runtime --json                       # JSON lines output

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use prop_runtime::config::PropConfig;
use prop_runtime::core::{run_server, PropController};
use prop_runtime::hal::{Clock, Level, PublishedMessage, SimBoard, SimTransport};
use prop_runtime::types::PropPhase;
use prop_runtime::{SIM_TICK_MS, VERSION};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Preset {
    /// Fortune wheel: RFID or magnet, one maglock
    RoueFortune,
    /// Single magnet bench prop
    TestMagnet,
}

#[derive(Parser, Debug)]
#[command(
    name = "prop-runtime",
    version = VERSION,
    about = "Escape-room prop runtime - simulate a prop on the desk or serve it over HTTP",
    long_about = "Runs the prop control loop against a simulated board and broker.\n\n\
                  Modes:\n  \
                  (default)      Interactive desk simulator\n  \
                  --serve        HTTP + WebSocket bench server\n\n\
                  Phases:\n  \
                  IDLE           - Unsolved, sensors live\n  \
                  RESET_FEEDBACK - Just reset, fast blink, sensors suspended\n  \
                  SOLVED         - Latched until reset"
)]
struct Args {
    /// Prop configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Built-in prop configuration (ignored with --config)
    #[arg(short, long, value_enum, default_value = "roue-fortune")]
    preset: Preset,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Run as HTTP bench server
    #[arg(short, long)]
    serve: bool,

    /// Server address (default: 127.0.0.1:3000)
    #[arg(long, default_value = "127.0.0.1:3000")]
    addr: String,

    /// Output as JSON
    #[arg(long)]
    json: bool,

    /// Disable colors in output
    #[arg(long)]
    no_color: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Config error: {}", e);
            std::process::exit(1);
        }
    };

    let result: Result<(), Box<dyn std::error::Error>> = if args.print_config {
        serde_json::to_string_pretty(&config)
            .map(|json| println!("{}", json))
            .map_err(Into::into)
    } else if args.serve {
        run_serve(&args, config).await
    } else {
        run_interactive(&args, config)
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn load_config(args: &Args) -> Result<PropConfig, prop_runtime::error::ConfigError> {
    match &args.config {
        Some(path) => PropConfig::load(path),
        None => {
            let config = match args.preset {
                Preset::RoueFortune => PropConfig::roue_fortune(),
                Preset::TestMagnet => PropConfig::test_magnet(),
            };
            config.validate()?;
            Ok(config)
        }
    }
}

/// One line typed at the desk
#[derive(Debug, Clone, PartialEq, Eq)]
enum DeskCommand {
    Sensor { id: String, present: bool },
    Button { held_ms: Option<u32> },
    Cmd(String),
    Wait(u32),
    Net(bool),
    Broker(bool),
    Status,
    Log,
    Help,
    Quit,
}

fn parse_on_off(word: Option<&str>) -> Result<bool, String> {
    match word {
        Some("on" | "up" | "1" | "true") => Ok(true),
        Some("off" | "down" | "0" | "false") => Ok(false),
        other => Err(format!("expected on/off, got {:?}", other.unwrap_or(""))),
    }
}

fn parse_ms(word: &str) -> Result<u32, String> {
    word.parse().map_err(|_| format!("not a number of ms: {}", word))
}

fn parse_desk_line(line: &str) -> Result<DeskCommand, String> {
    let line = line.trim();
    let (verb, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();
    let mut words = rest.split_whitespace();

    match verb.to_ascii_lowercase().as_str() {
        "sensor" => {
            let id = words.next().ok_or("usage: sensor <id> on|off")?.to_string();
            let present = parse_on_off(words.next())?;
            Ok(DeskCommand::Sensor { id, present })
        }
        "button" => Ok(DeskCommand::Button { held_ms: words.next().map(parse_ms).transpose()? }),
        "cmd" if !rest.is_empty() => Ok(DeskCommand::Cmd(rest.to_string())),
        "cmd" => Err("usage: cmd <payload>".to_string()),
        "wait" => Ok(DeskCommand::Wait(parse_ms(words.next().ok_or("usage: wait <ms>")?)?)),
        "net" => Ok(DeskCommand::Net(parse_on_off(words.next())?)),
        "broker" => Ok(DeskCommand::Broker(parse_on_off(words.next())?)),
        "status" => Ok(DeskCommand::Status),
        "log" => Ok(DeskCommand::Log),
        "help" | "?" => Ok(DeskCommand::Help),
        "quit" | "exit" => Ok(DeskCommand::Quit),
        other => Err(format!("unknown command: {} (try 'help')", other)),
    }
}

/// Run the interactive desk simulator
fn run_interactive(args: &Args, config: PropConfig) -> Result<(), Box<dyn std::error::Error>> {
    let mut prop = PropController::new(config, SimBoard::new(), SimTransport::new())?;
    prop.begin();
    let mut history: Vec<PublishedMessage> = Vec::new();

    print_header(prop.config(), args.no_color);
    print_help();
    drain(&mut prop, &mut history, args);

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("{}", format_prompt(&prop, args.no_color));
        stdout.flush()?;

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(_) => break,
        }
        if line.trim().is_empty() {
            continue;
        }

        let command = match parse_desk_line(&line) {
            Ok(command) => command,
            Err(e) => {
                println!("  {}", e);
                continue;
            }
        };

        match command {
            DeskCommand::Sensor { id, present } => {
                let Some(def) = prop.sensors().definitions().iter().find(|d| d.id == id).cloned() else {
                    println!("  unknown sensor: {}", id);
                    continue;
                };
                prop.board_mut().set_level(def.pin, def.present_level(present));
                // let the debounce window pass
                prop.run_for(prop.config().timing.debounce_ms + 2 * SIM_TICK_MS);
            }
            DeskCommand::Button { held_ms } => {
                let pin = prop.config().pins.reset_button;
                let held = held_ms.unwrap_or(prop.config().timing.reset_hold_ms + 2 * SIM_TICK_MS);
                prop.board_mut().set_level(pin, Level::Low);
                prop.run_for(held);
                prop.board_mut().release(pin);
                prop.run_for(SIM_TICK_MS);
            }
            DeskCommand::Cmd(payload) => {
                let topic = prop.bridge().topics().cmd.clone();
                prop.transport_mut().inject(topic, payload);
                prop.run_for(SIM_TICK_MS);
            }
            DeskCommand::Wait(ms) => prop.run_for(ms),
            DeskCommand::Net(up) => {
                prop.transport_mut().set_link_available(up);
                prop.run_for(SIM_TICK_MS);
            }
            DeskCommand::Broker(up) => {
                prop.transport_mut().set_broker_available(up);
                prop.run_for(SIM_TICK_MS);
            }
            DeskCommand::Status => {
                print_status(&prop, args);
                continue;
            }
            DeskCommand::Log => {
                for message in &history {
                    print_message(message, args);
                }
                continue;
            }
            DeskCommand::Help => {
                print_help();
                continue;
            }
            DeskCommand::Quit => {
                println!("\nSession ended at {}.", prop.board().now());
                break;
            }
        }

        drain(&mut prop, &mut history, args);
    }
    Ok(())
}

/// Print and keep everything published since the last call
fn drain(prop: &mut PropController<SimBoard, SimTransport>, history: &mut Vec<PublishedMessage>, args: &Args) {
    for message in prop.transport_mut().take_published() {
        print_message(&message, args);
        history.push(message);
    }
}

fn print_message(message: &PublishedMessage, args: &Args) {
    if args.json {
        if let Ok(line) = serde_json::to_string(message) {
            println!("{}", line);
        }
        return;
    }
    let (color, reset) = if args.no_color { ("", "") } else { ("\x1b[36m", PropPhase::color_reset()) };
    let flags = match (message.retain, message.from_will) {
        (_, true) => " (will)",
        (true, false) => " (retained)",
        (false, false) => "",
    };
    println!("{}  → {}{}{}", color, message.topic, flags, reset);
    println!("    {}", message.payload);
}

fn print_status(prop: &PropController<SimBoard, SimTransport>, args: &Args) {
    let snapshot = prop.snapshot();
    if args.json {
        if let Ok(line) = serde_json::to_string(&snapshot) {
            println!("{}", line);
        }
        return;
    }
    println!(
        "  phase={} solved={} source={} override={} online={} uptime={}",
        prop.phase(),
        snapshot.solved,
        snapshot.last_change_source,
        snapshot.override_active,
        snapshot.online,
        prop.board().now()
    );
    for (def, state) in prop.sensors().iter() {
        println!(
            "  sensor {:<10} pin={:<3} armed={:<5} present={:<5} locked={}",
            def.id, def.pin, state.armed, state.present, state.force_locked
        );
    }
    for (def, state) in prop.outputs().iter() {
        println!("  output {:<10} pin={:<3} {}", def.id, def.pin, state);
    }
    println!("  indicator {}", if prop.indicator_lit() { "on" } else { "off" });
}

/// Print header
fn print_header(config: &PropConfig, no_color: bool) {
    let title = format!(
        "prop-runtime v{} - {} ({})",
        VERSION, config.identity.device_name, config.identity.device_id
    );
    if no_color {
        println!("========================================");
        println!("  {}", title);
        println!("========================================");
    } else {
        println!("\x1b[1m╔════════════════════════════════════════════════════════╗\x1b[0m");
        println!("\x1b[1m║  {:<54}║\x1b[0m", title);
        println!("\x1b[1m╚════════════════════════════════════════════════════════╝\x1b[0m");
    }
    println!(
        "Sensors: {} ({:?}) | Outputs: {} | client id: {}",
        config.sensors.len(),
        config.solve_mode,
        config.outputs.len(),
        config.client_id()
    );
    println!();
}

fn print_help() {
    println!("Commands:");
    println!("  sensor <id> on|off   drive a sensor input (present / absent)");
    println!("  button [ms]          hold the reset button (default: hold time)");
    println!("  cmd <payload>        publish a payload on the prop command topic");
    println!("  wait <ms>            let simulated time run");
    println!("  net up|down          link reachability");
    println!("  broker up|down       broker reachability");
    println!("  status | log | help | quit");
    println!();
}

/// Format prompt
fn format_prompt(prop: &PropController<SimBoard, SimTransport>, no_color: bool) -> String {
    let phase = prop.phase();
    let net = if prop.bridge().is_connected() { "online" } else { "offline" };
    if no_color {
        format!("[{} | {}] > ", phase, net)
    } else {
        format!(
            "{}{} [{} | {}]{} > ",
            phase.color_code(),
            phase.emoji(),
            phase,
            net,
            PropPhase::color_reset()
        )
    }
}

/// Run HTTP bench server
async fn run_serve(args: &Args, config: PropConfig) -> Result<(), Box<dyn std::error::Error>> {
    println!();
    println!("╔════════════════════════════════════════════════════════╗");
    println!("║  🔒 Prop Runtime Bench Server                          ║");
    println!("║  Version: {:<45}║", VERSION);
    println!("╚════════════════════════════════════════════════════════╝");
    println!();

    run_server(&args.addr, config).await
}
