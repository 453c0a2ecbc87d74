use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use quotawatch::config::Config;
use quotawatch::gateway::GatewayClient;
use quotawatch::{cron, job, workday};
use tracing_subscriber::{EnvFilter, fmt};

/// `quotawatch` - watch an AI-gateway account balance and notify DingTalk.
#[derive(Parser, Debug)]
#[command(name = "quotawatch")]
#[command(version)]
#[command(about = "Adaptive AI-gateway balance watcher with DingTalk notifications", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the adaptive scheduler until interrupted (default)
    Run,
    /// Run a single check cycle and send one notification
    Check,
    /// Print the current balance snapshot without notifying
    Status,
    /// Print today's usage summary and the per-day dashboard
    Usage,
    /// Judge whether a date is a workday (defaults to today)
    Workday {
        /// Date in YYYY-MM-DD form
        date: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load_or_init()?;
    init_tracing(&config)?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            tracing::info!("quotawatch is running");
            tokio::select! {
                result = cron::run(config) => result,
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("shutting down");
                    Ok(())
                }
            }
        }
        Commands::Check => {
            job::run_cycle(&config, None).await;
            Ok(())
        }
        Commands::Status => status(&config).await,
        Commands::Usage => usage(&config).await,
        Commands::Workday { date } => workday_command(&config, date).await,
    }
}

fn init_tracing(config: &Config) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.observability.log_level.clone()));

    match &config.observability.log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            let subscriber = fmt::Subscriber::builder()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file))
                .finish();
            tracing::subscriber::set_global_default(subscriber)
        }
        None => {
            let subscriber = fmt::Subscriber::builder().with_env_filter(filter).finish();
            tracing::subscriber::set_global_default(subscriber)
        }
    }
    .context("setting default subscriber failed")
}

async fn status(config: &Config) -> Result<()> {
    let client = GatewayClient::new(&config.gateway, &config.reliability)?;
    let snapshot = client.get_balance_snapshot().await?;

    // Best-effort account line; the snapshot is the point of this command.
    match client.get_self().await {
        Ok(profile) => {
            if let Some(username) = profile.pointer("/data/username").and_then(|u| u.as_str()) {
                println!("account:   {username}");
            }
        }
        Err(e) => tracing::debug!("account profile unavailable: {e}"),
    }

    println!("token:     {}", snapshot.token_name);
    println!("key:       {}", snapshot.masked_key);
    if snapshot.unlimited {
        println!("remaining: unlimited");
    } else {
        println!(
            "remaining: {}{:.2}",
            config.gateway.currency,
            snapshot.remaining_credit()
        );
    }
    println!(
        "used:      {}{:.2}",
        config.gateway.currency,
        snapshot.used_credit()
    );
    Ok(())
}

async fn usage(config: &Config) -> Result<()> {
    let client = GatewayClient::new(&config.gateway, &config.reliability)?;

    let summary = client.get_usage_window_summary(None, None).await?;
    println!(
        "today: {} requests, {}{:.3} spent, {} tokens",
        summary.request_count,
        config.gateway.currency,
        summary.total_cost,
        summary.tokens_display()
    );

    let days = client.get_dashboard().await?;
    for day in days {
        println!(
            "{}  {:>6} requests  {:>10} prompt  {:>10} completion",
            day.date, day.request_count, day.prompt_tokens, day.completion_tokens
        );
    }
    Ok(())
}

async fn workday_command(config: &Config, date: Option<String>) -> Result<()> {
    let date = match date {
        Some(raw) => NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
            .context("date must be in YYYY-MM-DD form")?,
        None => Local::now().date_naive(),
    };

    let lookup = workday::WorkdayLookup::new(
        config.holiday.host.clone(),
        config.state_dir.join("holidays"),
    );
    if lookup.is_workday(date).await {
        println!("{date} is a workday");
    } else {
        println!("{date} is not a workday");
    }
    Ok(())
}
