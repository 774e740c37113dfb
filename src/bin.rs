//! Binary entry point for `perplexed-bot`.
//!
//! This module provides the command-line interface for perplexed-bot with options
//! for configuration file paths, logging verbosity, and one-shot commands. It
//! initializes the necessary components and starts the service.

use clap::{Parser, Subcommand};
use opentelemetry::trace::TracerProvider;
use opentelemetry_otlp::{Protocol, WithExportConfig};
use perplexed_bot::{
    base::{config::Config, types::Void},
    interaction::command::{Command, QUESTION_PREFIX, SEARCH_PREFIX},
};
use tracing_subscriber::{Layer, fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt};

/// Perplexed-bot – answers questions from Reddit discussions.
///
/// Configuration can come from `config.toml` or environment variables
/// prefixed with `PERPLEXED_BOT_`.
#[derive(Parser, Debug)]
#[command(version, author, about, long_about = None)]
struct Args {
    /// Override the config file path (optional).
    ///
    /// By default, the bot will look for a config file at `.hidden/config.toml`
    /// in the current directory.
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,
    /// Increase log verbosity (-v, -vv, etc.).
    ///
    /// Use multiple times to increase verbosity:
    /// - No flag: INFO level
    /// - -v: DEBUG level
    /// - -vv or more: TRACE level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Export spans over OTLP/HTTP (endpoint from `OTEL_EXPORTER_OTLP_ENDPOINT`).
    #[arg(long, global = true)]
    otlp: bool,
    /// What to do; defaults to `serve`.
    #[command(subcommand)]
    command: Option<Mode>,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Run the Slack bot.
    Serve,
    /// Answer one question and print the answer.
    Ask {
        /// The question to answer.
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },
    /// List discussion links for a query and print them.
    Links {
        /// The search keywords.
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },
}

/// Main entry point for the perplexed-bot binary.
///
/// Sets up logging based on verbosity, loads configuration, and runs the selected mode.
#[tokio::main]
async fn main() -> Void {
    let args = Args::parse();

    // Construct the level filter.

    let level = match args.verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    let level_filter = tracing_subscriber::filter::LevelFilter::from_level(level);

    // Prepare the log layer.  One-shot modes print their answer on stdout, so logs go to stderr.

    let stdout = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .without_time()
        .with_ansi(true)
        .with_level(true)
        .with_file(false)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE);

    // Prepare the otlp layer.

    let otel = if args.otlp {
        let exporter = opentelemetry_otlp::SpanExporter::builder().with_http().with_protocol(Protocol::HttpBinary).build()?;
        let tracer = opentelemetry_sdk::trace::SdkTracerProvider::builder().with_simple_exporter(exporter).build().tracer("perplexed-bot");
        Some(tracing_opentelemetry::layer().with_tracer(tracer).boxed())
    } else {
        None
    };

    tracing_subscriber::registry().with(otel).with(level_filter).with(stdout).init();

    let config = Config::load(args.config.as_deref())?;

    let command = match args.command.unwrap_or(Mode::Serve) {
        Mode::Serve => return perplexed_bot::start(config).await,
        Mode::Ask { question } => Command::from_parts(QUESTION_PREFIX, &question.join(" ")),
        Mode::Links { query } => Command::from_parts(SEARCH_PREFIX, &query.join(" ")),
    };
    let command = command.ok_or_else(|| anyhow::anyhow!("The query must not be blank."))?;

    let reply = perplexed_bot::run_once(config, command).await?;
    println!("{reply}");

    Ok(())
}
