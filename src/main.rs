use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::Arc;

use feedvoice::config::Config;
use feedvoice::reader::{InputPin, ReadFeed, RunOutcome, SpeakFn, SysfsPin, Unconnected};

/// Get the config file path (~/.config/feedvoice/config.toml)
fn default_config_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home)
        .join(".config")
        .join("feedvoice")
        .join("config.toml"))
}

#[derive(Parser, Debug)]
#[command(name = "feedvoice", about = "Read feed entries aloud, stop with a button")]
struct Args {
    /// Config file (default: ~/.config/feedvoice/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Feed URL to read
    #[arg(long)]
    url: Option<String>,

    /// Maximum number of entries to read
    #[arg(long)]
    count: Option<usize>,

    /// Entry property to speak; repeat for several (e.g. --property title --property summary)
    #[arg(long = "property", value_name = "NAME")]
    properties: Vec<String>,

    /// Sysfs GPIO number of the stop button (BCM number plus the gpiochip base on newer kernels)
    #[arg(long, conflicts_with = "no_button")]
    pin: Option<u32>,

    /// Run without a stop button
    #[arg(long)]
    no_button: bool,

    /// Program used to speak each line, called as `<command> <text>`
    #[arg(long, value_name = "COMMAND")]
    speak_command: Option<String>,

    /// Do not speak or print anything (log only)
    #[arg(long)]
    quiet: bool,
}

impl Args {
    /// Command-line values take precedence over the config file.
    fn apply(self, mut config: Config) -> (Config, bool) {
        if let Some(url) = self.url {
            config.feed_url = url;
        }
        if let Some(count) = self.count {
            config.feed_count = count;
        }
        if !self.properties.is_empty() {
            config.properties = self.properties;
        }
        if self.no_button {
            config.button_pin = None;
        } else if let Some(pin) = self.pin {
            config.button_pin = Some(pin);
        }
        if self.speak_command.is_some() {
            config.speak_command = self.speak_command;
        }
        (config, self.quiet)
    }
}

/// Build the speak callback: an external command when configured, stdout otherwise.
fn speaker(command: Option<String>) -> SpeakFn {
    match command {
        Some(program) => Arc::new(move |text: &str| {
            let status = Command::new(&program)
                .arg(text)
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status();
            match status {
                Ok(status) if status.success() => {}
                Ok(status) => {
                    tracing::warn!(command = %program, status = %status, "Speak command failed")
                }
                Err(e) => tracing::warn!(command = %program, error = %e, "Failed to run speak command"),
            }
        }),
        None => Arc::new(|text: &str| println!("{}", text)),
    }
}

fn button(pin: Option<u32>) -> Arc<dyn InputPin> {
    let Some(pin) = pin else {
        return Arc::new(Unconnected);
    };
    match SysfsPin::open(pin) {
        Ok(pin) => Arc::new(pin),
        Err(e) => {
            tracing::warn!(pin = pin, error = %e, "Stop button unavailable, reading without it");
            Arc::new(Unconnected)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing for debug logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => default_config_path()?,
    };
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    let (config, quiet) = args.apply(config);

    let say = (!quiet).then(|| speaker(config.speak_command.clone()));

    let reader = ReadFeed::new(
        say,
        config.feed_url.clone(),
        config.feed_count,
        config.properties.clone(),
    )
    .with_fetcher(config.fetcher())
    .with_timing(config.timing())
    .with_button(button(config.button_pin));

    let outcome = reader.run().await;
    tracing::debug!(outcome = ?outcome, "Read-out complete");

    if outcome != RunOutcome::Finished {
        std::process::exit(1);
    }
    Ok(())
}
