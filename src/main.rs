use anyhow::Result;
use clap::Parser;
use echogate::audio::capture::list_devices;
use echogate::cli::{Cli, Commands, ConfigAction};
use echogate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None => {
            let config = resolve_config(&cli)?;
            echogate::app::run_gate(config, cli.quiet, cli.verbose).await?;
        }
        Some(Commands::Devices) => {
            list_audio_devices()?;
        }
        Some(Commands::Config { action }) => {
            handle_config_command(action, &cli)?;
        }
    }

    Ok(())
}

/// Load configuration and apply CLI overrides.
///
/// Priority order:
/// 1. Command-line flags
/// 2. Environment variables
/// 3. Custom config path from CLI (--config)
/// 4. Default config path (~/.config/echogate/config.toml)
/// 5. Built-in defaults
fn resolve_config(cli: &Cli) -> Result<Config> {
    let config = if let Some(path) = cli.config.as_deref() {
        // Load from custom path
        Config::load(path)?
    } else {
        // Try default path, fall back to defaults
        let default_path = Config::default_path();
        Config::load_or_default(&default_path)
    };

    let mut config = config.with_env_overrides();

    if let Some(d) = &cli.device {
        config.audio.device = Some(d.clone());
    }
    if let Some(path) = &cli.voice_sample {
        config.verification.voice_sample = path.clone();
    }
    if cli.no_verify {
        config.verification.enabled = false;
    }
    if cli.no_wake {
        config.wake.enabled = false;
    }
    if let Some(secs) = cli.ambient_duration {
        config.ambient.duration_secs = secs;
    }

    Ok(config)
}

/// List available audio input devices.
fn list_audio_devices() -> Result<()> {
    let devices = list_devices()?;

    if devices.is_empty() {
        eprintln!("No audio input devices found");
        std::process::exit(1);
    }

    println!("Available audio input devices:");
    for (idx, device) in devices.iter().enumerate() {
        println!("  [{}] {}", idx, device);
    }

    Ok(())
}

/// Handle configuration commands.
fn handle_config_command(action: ConfigAction, cli: &Cli) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = resolve_config(cli)?;
            print!("{}", toml::to_string_pretty(&config)?);
        }
        ConfigAction::Path => {
            let path = cli
                .config
                .clone()
                .unwrap_or_else(Config::default_path);
            println!("{}", path.display());
        }
    }
    Ok(())
}
