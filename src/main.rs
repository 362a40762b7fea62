use anyhow::{Context, Result};
use birdwatch_core::{BirdwatchConfig, ErrorReporter, Thread, TimeWindow};
use clap::{Parser, Subcommand};
use course_service::{CourseService, ServiceError};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "birdwatch=info,course_service=info,reddit_client=info";

#[derive(Debug, Parser)]
#[command(name = "birdwatch")]
#[command(about = "Find subreddit threads about bird courses")]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// General bird course search, highest score first
    Search {
        #[arg(long)]
        limit: Option<u32>,
        /// hour, day, week, month, year or all
        #[arg(long)]
        time_window: Option<TimeWindow>,
        #[arg(long)]
        json: bool,
    },
    /// Threads mentioning a course code such as EM203
    Course {
        code: String,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = BirdwatchConfig::load(cli.config.as_deref())
        .context("failed to load configuration")?;
    let service = CourseService::new(&config)?;
    let reporter = ErrorReporter::new();

    let (threads, json) = match cli.command {
        Commands::Search {
            limit,
            time_window,
            json,
        } => {
            let limit = limit.unwrap_or(config.search.default_limit);
            let window = time_window.unwrap_or(config.search.default_time_window);
            let threads = service
                .search_topic(limit, window)
                .await
                .map_err(|e| report(&reporter, e))?;
            (threads, json)
        }
        Commands::Course { code, limit, json } => {
            let limit = limit.unwrap_or(config.search.course_limit);
            let threads = service
                .search_by_code(&code, limit)
                .await
                .map_err(|e| report(&reporter, e))?;
            (threads, json)
        }
    };

    tracing::info!("Found {} threads", threads.len());

    if json {
        println!("{}", serde_json::to_string_pretty(&threads)?);
    } else {
        print_listing(&threads);
    }

    Ok(())
}

fn report(reporter: &ErrorReporter, error: ServiceError) -> anyhow::Error {
    if error.is_validation() {
        reporter.report_warning(error.core_error());
    } else {
        reporter.report_error(error.core_error());
    }
    error.into()
}

fn print_listing(threads: &[Thread]) {
    if threads.is_empty() {
        println!("No threads found.");
        return;
    }

    for (i, thread) in threads.iter().enumerate() {
        let tag = thread
            .search_type
            .map(|t| format!(" [{}]", t.as_str()))
            .unwrap_or_default();
        println!("{}. {}{}", i + 1, thread.title, tag);
        let ratio = thread
            .upvote_ratio
            .map(|r| format!(" | {:.0}% upvoted", r * 100.0))
            .unwrap_or_default();
        println!(
            "   score {} | {} comments{}",
            thread.score, thread.num_comments, ratio
        );
        println!(
            "   u/{} on {}",
            thread.author,
            thread.created.format("%Y-%m-%d")
        );
        println!("   {}", thread.url);
    }
}
