//! crtmode - KMS mode setter for CRT outputs
//!
//! Sets a named display mode on a DRM connector and, as a service, keeps the
//! device open so the mode survives: KMS reverts the output when DRM master
//! is released.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │  Device (/dev/dri/card*)                 │
//! │        ↓                                 │
//! │  resolve: connector → mode/encoder/CRTC  │
//! │        ↓                                 │
//! │  TV norm property → SETCRTC commit       │
//! │        ↓                                 │
//! │  ModeHolder loop (SIGUSR1/SIGUSR2 reload)│
//! └──────────────────────────────────────────┘
//! ```

mod config;
mod constants;
mod drm;
mod service;

use anyhow::{anyhow, bail, Context, Result};
use log::{info, warn};
use std::path::PathBuf;
use std::process::ExitCode;

use crate::drm::{available_modes, norm_for_mode, Device, KmsDevice, ModeError};
use crate::service::{
    detach_into_background, establish_mode, install_handlers, HolderSettings, MasterPolicy,
    ModeHolder, PidFile, ReloadPolicy, ServiceState, SERVICE_FLAGS,
};

/// Parsed command line
#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Help,
    Version,
    List { connector: u32, devices: Vec<String> },
    Set(SetOptions),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct SetOptions {
    connector: u32,
    mode: String,
    /// Explicit norm; inferred from the mode name when absent
    norm: Option<i32>,
    /// Keep running to hold the mode
    service: bool,
    /// Stay in the foreground (systemd Type=notify)
    foreground: bool,
    master: Option<MasterPolicy>,
    reload: Option<ReloadPolicy>,
    devices: Vec<String>,
}

fn help_text() -> String {
    format!(
        r#"crtmode {} - DRM mode setter for CRT outputs

USAGE:
    crtmode <connector_id> <mode> [tv_norm] [daemon] [OPTIONS]
    crtmode <connector_id> --list

ARGUMENTS:
    mode       720x240, 720x480i, 720x288, 720x576i (exact connector mode name)
    tv_norm    0=NTSC, 3=PAL (default: PAL for 576/288 modes, NTSC otherwise)
    daemon     keep running in the background to hold the mode

OPTIONS:
    -h, --help         Print this help message
    -V, --version      Print version information
    --list             List the connector's modes and exit
    --device PATH      DRM device to open (repeatable; default card1, card0)
    --yield            Drop DRM master right after setting the mode
    --static           Ignore reload signals
    --foreground       With daemon: do not detach (for systemd)

SIGNALS (daemon):
    SIGUSR1            Re-read TV norm from {}
    SIGUSR2            Re-read margins (left right top bottom) from {}
    SIGTERM/SIGINT     Release the device and exit

CONFIG FILE:
    ~/.config/crtmode/config.toml
"#,
        env!("CARGO_PKG_VERSION"),
        constants::DEFAULT_NORM_FILE,
        constants::DEFAULT_MARGINS_FILE,
    )
}

fn parse_args(args: &[String]) -> Result<Command> {
    if args.iter().any(|a| a == "--help" || a == "-h") {
        return Ok(Command::Help);
    }
    if args.iter().any(|a| a == "--version" || a == "-V") {
        return Ok(Command::Version);
    }

    let mut positional = Vec::new();
    let mut opts = SetOptions::default();
    let mut list = false;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--list" => list = true,
            "--yield" => opts.master = Some(MasterPolicy::Yield),
            "--static" => opts.reload = Some(ReloadPolicy::Static),
            "--foreground" => opts.foreground = true,
            "--device" => {
                let path = iter
                    .next()
                    .ok_or_else(|| anyhow!("--device requires a path"))?;
                opts.devices.push(path.clone());
            }
            s if s.starts_with("--") => bail!("unknown option: {}", s),
            _ => positional.push(arg.as_str()),
        }
    }

    let mut positional = positional.into_iter();
    let connector = positional
        .next()
        .ok_or_else(|| anyhow!("missing connector id"))?;
    let connector: u32 = connector
        .parse()
        .with_context(|| format!("invalid connector id: {}", connector))?;

    if list {
        if let Some(extra) = positional.next() {
            bail!("unexpected argument with --list: {}", extra);
        }
        return Ok(Command::List {
            connector,
            devices: opts.devices,
        });
    }

    opts.connector = connector;
    opts.mode = positional
        .next()
        .ok_or_else(|| anyhow!("missing mode name"))?
        .to_string();

    for arg in positional {
        if arg == "daemon" {
            opts.service = true;
        } else if arg.starts_with(|c: char| c.is_ascii_digit()) {
            let norm = arg
                .parse()
                .with_context(|| format!("invalid TV norm: {}", arg))?;
            opts.norm = Some(norm);
        } else {
            bail!("unexpected argument: {}", arg);
        }
    }

    Ok(Command::Set(opts))
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("crtmode: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let command = match parse_args(&args) {
        Ok(command) => command,
        Err(e) => {
            eprint!("{}", help_text());
            return Err(e);
        }
    };

    match command {
        Command::Help => {
            print!("{}", help_text());
            Ok(())
        }
        Command::Version => {
            println!("crtmode {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Command::List { connector, devices } => {
            let device = open_device(&devices, &config::Config::load())?;
            print!("{}", mode_listing(&device, connector)?);
            Ok(())
        }
        Command::Set(opts) => set_mode(opts, config::Config::load()),
    }
}

fn open_device(devices: &[String], config: &config::Config) -> Result<Device, ModeError> {
    if devices.is_empty() {
        Device::open_first(&config.device.paths)
    } else {
        Device::open_first(devices)
    }
}

fn mode_listing<D: KmsDevice>(device: &D, connector: u32) -> Result<String, ModeError> {
    let info = device
        .connector(connector)
        .ok_or(ModeError::ConnectorNotFound(connector))?;
    let mut out = format!("Connector {} modes:\n", connector);
    for mode in available_modes(&info) {
        out.push_str(&format!("  {}\n", mode));
    }
    Ok(out)
}

fn set_mode(opts: SetOptions, mut config: config::Config) -> Result<()> {
    if let Some(master) = opts.master {
        config.service.master = master;
    }
    if let Some(reload) = opts.reload {
        config.service.reload = reload;
    }
    let norm = opts.norm.unwrap_or_else(|| norm_for_mode(&opts.mode));

    let mut state = ServiceState::Init;
    let device = open_device(&opts.devices, &config)?;
    establish_mode(
        &device,
        opts.connector,
        &opts.mode,
        norm,
        config.service.master,
    )?;
    state.advance(ServiceState::ModeSet);

    if !opts.service {
        return Ok(());
    }

    if !opts.foreground {
        detach_into_background()?;
    }
    let pid_file = match PidFile::create(&config.service.pid_file) {
        Ok(pid_file) => Some(pid_file),
        Err(e) => {
            warn!("{:#}", e);
            None
        }
    };
    state.advance(ServiceState::Detached);

    install_handlers(config.service.reload)?;

    let settings = HolderSettings {
        poll_interval: config.service.poll_interval(),
        norm_file: PathBuf::from(&config.service.norm_file),
        margins_file: PathBuf::from(&config.service.margins_file),
        master: config.service.master,
    };
    let state = ModeHolder::new(device, opts.connector, settings).run(&SERVICE_FLAGS);
    drop(pid_file);
    info!("Service {:?}", state);
    Ok(())
}
