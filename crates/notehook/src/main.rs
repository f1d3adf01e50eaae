//! notehook - pass MIDI through and run a handler program for mapped notes
//!
//! ## Command line flags
//!
//! - `--config-dir <dir>`: directory holding `event.conf`, `scripts/`, `settings.yaml`
//! - `--backend jack|midi`: host to run under (JACK when built with it, else midi)
//! - `--port <pattern>`: input port (midi: name substring; jack: full port name)
//! - `--output <pattern>`: output port for forwarded MIDI
//! - `--executable <exe>`: program used to run handlers (saved for next time)
//! - `--sample-rate <hz>`: nominal rate for the midi backend
//! - `--list-ports`: print MIDI ports and exit
//!
//! While running, type `r` + Enter to reload `event.conf`, `s` + Enter for
//! the status report, or just Enter to quit.

use std::io::BufRead;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use notehook_core::config::{default_config_dir, load_yaml, HookSettings, SETTINGS_FILE, STATE_FILE};
use notehook_core::{HookSession, PluginState};
use notehook_midi::MidiHookInput;

#[cfg(all(target_os = "linux", feature = "jack-backend"))]
use notehook_core::host::{JackHookHandle, JackHost};

#[cfg(all(target_os = "linux", feature = "jack-backend"))]
const CLIENT_NAME: &str = "notehook";
const DEFAULT_SAMPLE_RATE: f64 = 48000.0;

const USAGE: &str = "\
usage: notehook [--config-dir DIR] [--backend jack|midi] [--port PATTERN]
                [--output PATTERN] [--executable EXE] [--sample-rate HZ]
                [--list-ports]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Backend {
    Jack,
    Midi,
}

impl Backend {
    fn default_for_build() -> Self {
        if notehook_core::host::jack_available() {
            Self::Jack
        } else {
            Self::Midi
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Args {
    config_dir: Option<PathBuf>,
    backend: Backend,
    port: Option<String>,
    output: Option<String>,
    executable: Option<String>,
    sample_rate: f64,
    list_ports: bool,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            config_dir: None,
            backend: Backend::default_for_build(),
            port: None,
            output: None,
            executable: None,
            sample_rate: DEFAULT_SAMPLE_RATE,
            list_ports: false,
        }
    }
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<Args> {
    let mut parsed = Args::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        let mut value = |flag: &str| {
            args.next()
                .with_context(|| format!("{} needs a value", flag))
        };

        match arg.as_str() {
            "--config-dir" => parsed.config_dir = Some(PathBuf::from(value(&arg)?)),
            "--backend" => {
                parsed.backend = match value(&arg)?.as_str() {
                    "jack" => Backend::Jack,
                    "midi" => Backend::Midi,
                    other => bail!("unknown backend '{}' (expected jack or midi)", other),
                }
            }
            "--port" => parsed.port = Some(value(&arg)?),
            "--output" => parsed.output = Some(value(&arg)?),
            "--executable" => parsed.executable = Some(value(&arg)?),
            "--sample-rate" => {
                let raw = value(&arg)?;
                parsed.sample_rate = raw
                    .parse::<f64>()
                    .ok()
                    .filter(|hz| *hz > 0.0)
                    .with_context(|| format!("invalid sample rate '{}'", raw))?;
            }
            "--list-ports" => parsed.list_ports = true,
            other => bail!("unknown argument '{}'", other),
        }
    }

    Ok(parsed)
}

/// Keeps the active host alive
enum Running {
    #[cfg(all(target_os = "linux", feature = "jack-backend"))]
    Jack(JackHookHandle),
    Midi(MidiHookInput),
}

impl Running {
    fn describe(&self) -> String {
        match self {
            #[cfg(all(target_os = "linux", feature = "jack-backend"))]
            Self::Jack(handle) => format!("JACK client '{}'", handle.client_name()),
            Self::Midi(input) => match input.output_port() {
                Some(output) => format!("MIDI {} -> {}", input.input_port(), output),
                None => format!("MIDI {} (no forwarding)", input.input_port()),
            },
        }
    }
}

fn start(args: &Args, session: &mut HookSession) -> Result<Running> {
    match args.backend {
        Backend::Jack => start_jack(args, session),
        Backend::Midi => {
            let port = args
                .port
                .as_deref()
                .context("--port is required for the midi backend (see --list-ports)")?;
            let processor = session.prepare(args.sample_rate)?;
            let input = MidiHookInput::connect(port, args.output.as_deref(), processor)?;
            Ok(Running::Midi(input))
        }
    }
}

#[cfg(all(target_os = "linux", feature = "jack-backend"))]
fn start_jack(args: &Args, session: &mut HookSession) -> Result<Running> {
    let host = JackHost::open(CLIENT_NAME)?;
    let processor = session.prepare(host.sample_rate())?;
    let handle = host.activate(processor, args.port.as_deref(), args.output.as_deref())?;
    Ok(Running::Jack(handle))
}

#[cfg(not(all(target_os = "linux", feature = "jack-backend")))]
fn start_jack(_args: &Args, _session: &mut HookSession) -> Result<Running> {
    bail!("this build has no JACK support; use --backend midi")
}

fn list_ports() -> Result<()> {
    let ports = notehook_midi::list_ports()?;
    println!("MIDI inputs:");
    for name in &ports.inputs {
        println!("  {}", name);
    }
    println!("MIDI outputs:");
    for name in &ports.outputs {
        println!("  {}", name);
    }
    Ok(())
}

fn main() -> Result<()> {
    // Initialize logger - set RUST_LOG=debug for verbose output
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {:#}", e);
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
    };

    if args.list_ports {
        return list_ports();
    }

    let config_dir = args.config_dir.clone().unwrap_or_else(default_config_dir);
    let settings: HookSettings = load_yaml(&config_dir.join(SETTINGS_FILE));
    let state_path = config_dir.join(STATE_FILE);
    let mut state = PluginState::load(&state_path);
    if let Some(executable) = &args.executable {
        state.executable = executable.clone();
    }

    log::info!("notehook starting up ({:?} backend)", args.backend);

    let mut session = HookSession::new(&config_dir, settings, state);
    let running = start(&args, &mut session)?;

    println!("Running: {}", running.describe());
    println!("{}", session.status());
    println!();
    println!("r + Enter: reload, s + Enter: status, Enter: quit");

    for line in std::io::stdin().lock().lines() {
        match line?.trim() {
            "r" => {
                session.reload();
                println!("{}", session.status());
            }
            "s" => println!("{}", session.status()),
            _ => break,
        }
    }

    // Stop the real-time callback before the worker goes away
    drop(running);
    session.release();

    if let Err(e) = session.state().save(&state_path) {
        log::warn!("Could not save state: {:#}", e);
    }

    log::info!("notehook stopped");
    Ok(())
}
