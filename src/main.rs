use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sheriff::commands::{parse_line, Command, Reply, Who};
use sheriff::config::Config;
use sheriff::error::Error;
use sheriff::scheduler::{CommandSender, RotationTrigger};

#[derive(Parser)]
#[command(
    name = "sheriff",
    version,
    about = "Rotates the person-on-duty through a team, skipping days off",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML); missing means defaults plus environment
    #[arg(short, long, global = true, default_value = "sheriff.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json); defaults to the configured format
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the rotation trigger and read chat commands from stdin
    Run {
        /// Name used for commands typed on the console
        #[arg(long = "as", default_value = "operator")]
        caller: String,
    },

    /// Declare days off (YYYY-MM-DD or MON..FRI)
    Off {
        /// Team member (name or prefix)
        name: String,

        /// Dates or weekdays
        #[arg(required = true)]
        days: Vec<String>,
    },

    /// Withdraw days off
    Back {
        /// Team member (name or prefix)
        name: String,

        /// Dates or weekdays
        #[arg(required = true)]
        days: Vec<String>,
    },

    /// Show someone's days off
    Days {
        /// Team member (name or prefix)
        name: String,
    },

    /// Show the current person-on-duty
    Current,

    /// Show who the next advance would pick today
    Next,

    /// Advance to the next available person now
    Switch,

    /// Hand the duty to the first member matching a prefix
    Set {
        /// Name prefix, case-insensitive
        prefix: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(&cli.config)?;
    let log_format = cli
        .log_format
        .clone()
        .unwrap_or_else(|| config.logging.format.clone());
    setup_tracing(&log_format, &config.logging.level, cli.verbose)?;

    tracing::debug!(
        members = config.team.members.len(),
        daysoff_file = %config.team.daysoff_file.display(),
        state_file = %config.team.state_file.display(),
        schedule = %config.trigger.schedule,
        "Configuration loaded"
    );

    let trigger = match startup(&config) {
        Ok(trigger) => trigger,
        Err(e) => {
            tracing::error!(category = e.category().as_str(), error = %e, "Startup failed");
            return Err(e.into());
        }
    };

    match cli.command {
        Commands::Run { caller } => {
            tracing::info!(caller = %caller, "Starting rotation service");
            run(trigger, caller).await?;
        }
        Commands::Off { name, days } => {
            one_shot(
                trigger,
                Command::AddDaysOff {
                    who: Who::Mention(name),
                    tokens: days,
                },
            )
            .await;
        }
        Commands::Back { name, days } => {
            one_shot(
                trigger,
                Command::RemoveDaysOff {
                    who: Who::Mention(name),
                    tokens: days,
                },
            )
            .await;
        }
        Commands::Days { name } => {
            one_shot(
                trigger,
                Command::ShowDaysOff {
                    who: Who::Mention(name),
                },
            )
            .await;
        }
        Commands::Current => one_shot(trigger, Command::ShowCurrent).await,
        Commands::Next => one_shot(trigger, Command::ShowNext).await,
        Commands::Switch => one_shot(trigger, Command::AdvanceNow).await,
        Commands::Set { prefix } => one_shot(trigger, Command::SetCurrent { prefix }).await,
    }

    Ok(())
}

fn setup_tracing(format: &str, level: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("sheriff=debug,info")
    } else {
        tracing_subscriber::EnvFilter::try_new(format!("sheriff={level},warn"))
            .with_context(|| format!("Invalid log level: {level}"))?
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}

fn startup(config: &Config) -> sheriff::error::Result<RotationTrigger> {
    config
        .validate()
        .map_err(|e| Error::config(format!("{e:#}")))?;
    RotationTrigger::from_config(config)
}

async fn one_shot(mut trigger: RotationTrigger, command: Command) {
    let reply = trigger.execute(command);
    println!("{reply}");
    trigger.drain_notifications().await;
}

async fn run(trigger: RotationTrigger, caller: String) -> Result<()> {
    if let Some(next) = trigger.next_fire_time() {
        println!("Next rotation at {}", next.format("%Y-%m-%d %H:%M"));
    }

    let handle = trigger.spawn();
    let console = tokio::spawn(console(handle.commands(), caller));

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    tracing::info!("Shutdown requested");
    console.abort();
    handle.shutdown().await?;

    tracing::info!("sheriff stopped");
    Ok(())
}

/// Forward stdin lines to the trigger and print the replies.
///
/// Stdin is read on a plain thread so a pending read never holds up
/// runtime shutdown.
async fn console(commands: CommandSender, caller: String) {
    let (line_tx, mut line_rx) = mpsc::channel::<String>(16);

    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            let Ok(line) = line else { break };
            if line_tx.blocking_send(line).is_err() {
                break;
            }
        }
    });

    while let Some(line) = line_rx.recv().await {
        let Some(command) = parse_line(&line, &caller) else {
            continue;
        };

        match commands.execute(command).await {
            Ok(Reply::Silent) => {}
            Ok(reply) => println!("{reply}"),
            Err(e) => {
                tracing::warn!(error = %e, "Console detached from the trigger loop");
                break;
            }
        }
    }
}
