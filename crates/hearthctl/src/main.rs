use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use serde::Serialize;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use hearthctl::api;
use hearthctl::config;
use hearthctl::config::LoggingConfig;
use hearthctl::triggers;
use hearthctl::triggers::ArrivalStage;
use hearthctl::Config;
use hearthctl::TransitionEngine;
use hearthctl::TransitionKind;

#[derive(Debug, Parser)]
#[command(name = "hearthctl", version, about = "Home climate transitions")]
struct Cli {
    /// Config file; repeat to merge several
    #[arg(short, long = "config", default_value = "hearthctl.toml")]
    configs: Vec<PathBuf>,

    /// Log intended device calls and notifications without performing them
    #[arg(long)]
    dry_run: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Morning transition
    Wake,
    /// Night transition
    Sleep,
    /// Everyone left
    Away,
    /// Someone arrived
    Home {
        /// Skip the summary notification
        #[arg(long)]
        quiet: bool,
    },
    /// Run any scheduled transition due now
    Tick,
    /// Report a presence change
    Presence { state: PresenceArg },
    /// Report an arrival stage
    Arrive { stage: ArrivalStage },
    /// Report a temperature reading
    Alert { sensor: String, temp_f: f64 },
    /// Print the state store
    Status,
    /// Run the webhook server
    Serve,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PresenceArg {
    Home,
    Away,
}

#[derive(Serialize)]
struct AlertOutput<'a> {
    sensor: &'a str,
    temp_f: f64,
    alerted: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (config, warnings) = Config::from_files(&cli.configs).context("Failed to load config")?;
    if !warnings.is_empty() {
        eprint!("{}", config::format_diagnostics(&warnings));
    }

    init_logging(&config.logging);
    tracing::info!("Loaded config from: {:?}", cli.configs);

    let env_dry_run = std::env::var("DRY_RUN").ok();
    let dry_run = config::resolve_dry_run(cli.dry_run, env_dry_run.as_deref(), &config.automations);

    let engine = TransitionEngine::from_config(&config, dry_run)
        .context("Failed to set up device and service clients")?;

    match cli.command {
        Command::Wake => print_json(&engine.run(TransitionKind::Wake).await),
        Command::Sleep => print_json(&engine.run(TransitionKind::Sleep).await),
        Command::Away => print_json(&engine.run(TransitionKind::Away).await),
        Command::Home { quiet } => print_json(&engine.home(!quiet).await),
        Command::Tick => {
            print_json(&triggers::scheduler_tick(&engine, &config.schedule).await)
        }
        Command::Presence { state } => {
            let is_home = matches!(state, PresenceArg::Home);
            let change = triggers::apply_presence(&engine, is_home)
                .await
                .context("Failed to record presence")?;
            print_json(&change)
        }
        Command::Arrive { stage } => {
            let outcome = triggers::handle_arrival(&engine, stage)
                .await
                .context("Failed to record arrival")?;
            print_json(&outcome)
        }
        Command::Alert { sensor, temp_f } => {
            let alerted = triggers::check_temperature(
                engine.store(),
                engine.notifier().as_ref(),
                &config.alerts,
                &sensor,
                temp_f,
                dry_run,
            )
            .await
            .context("Failed to record alert")?;
            print_json(&AlertOutput {
                sensor: &sensor,
                temp_f,
                alerted,
            })
        }
        Command::Status => print_json(&engine.store().snapshot()),
        Command::Serve => serve(engine, &config).await,
    }
}

async fn serve(engine: TransitionEngine, config: &Config) -> anyhow::Result<()> {
    let state = Arc::new(api::AppState::new(
        engine,
        config.alerts.clone(),
        config.api.token.clone(),
    ));

    tracing::info!("Press Ctrl+C to exit");
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Received shutdown signal"),
            Err(e) => tracing::error!("Failed to listen for shutdown signal: {}", e),
        }
    };
    api::serve_until(state, &config.api.listen, config.api.port, ctrl_c).await?;

    tracing::info!("hearthctl shutdown complete");
    Ok(())
}

fn init_logging(logging: &LoggingConfig) {
    let targets = logging
        .overrides
        .iter()
        .fold(
            Targets::new().with_default(logging.level),
            |targets, (target, level)| targets.with_target(target.clone(), *level),
        );

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(targets)
        .init();
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to encode output")?;
    println!("{}", json);
    Ok(())
}
