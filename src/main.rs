use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use insight_dashboard::{
    build_router, config, insight_generator, logging,
    services::{
        cleaner::{clean, CleanOptions, MissingPolicy},
        dashboard::{build_dashboard, write_dashboard},
        loader::load_path,
        summary::summarize,
    },
    AppState,
};

#[derive(Parser)]
#[command(about = "Turn a CSV, Excel or JSON file into an interactive HTML dashboard.")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Render a dashboard for a local file.
    Render {
        /// Input data file (.csv, .xlsx, .xls or .json).
        path: PathBuf,

        /// Where to write the HTML.
        #[arg(long, short, default_value = "dashboard.html")]
        output: PathBuf,

        /// Do not open the dashboard in a browser.
        #[arg(long)]
        no_open: bool,

        /// Keep duplicate rows.
        #[arg(long)]
        keep_duplicates: bool,

        /// Missing value handling: keep, drop, fill, mean, median, mode or ffill.
        #[arg(long, default_value = "drop")]
        missing: String,

        /// Replacement value for `--missing fill`.
        #[arg(long)]
        fill_value: Option<String>,

        /// Add rule-based and narrative insights to the page.
        #[arg(long)]
        insights: bool,
    },
    /// Run the HTTP service (default).
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    // Loads .env first so RUST_LOG from it reaches the subscriber.
    let config = config::Config::from_env()?;
    logging::init_logging()?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Render {
            path,
            output,
            no_open,
            keep_duplicates,
            missing,
            fill_value,
            insights,
        } => {
            let options = CleanOptions {
                drop_duplicates: !keep_duplicates,
                missing: MissingPolicy::parse(Some(&missing), fill_value.as_deref())?,
            };
            render(&config, &path, &output, &options, insights).await?;
            if !no_open {
                open_in_browser(&output);
            }
            Ok(())
        }
    }
}

async fn serve(config: config::Config) -> Result<()> {
    let addr = config.bind_addr;
    let state = Arc::new(AppState::new(config));
    let app = build_router(state);

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn render(
    config: &config::Config,
    path: &Path,
    output: &Path,
    options: &CleanOptions,
    with_insights: bool,
) -> Result<()> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("Invalid input path: {}", path.display()))?;

    let df = clean(&load_path(path)?, options)?;
    let summary = summarize(&df)?;

    let insights = if with_insights {
        Some(insight_generator(config).generate(&summary).await)
    } else {
        None
    };

    let dashboard = build_dashboard(&df, summary, file_name, insights.as_ref())?;
    write_dashboard(output, &dashboard.html)?;
    println!("Dashboard saved to {}", output.display());
    Ok(())
}

/// Absolute path when it resolves, so the browser is not handed a relative one.
fn browser_target(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn open_in_browser(path: &Path) {
    let target = browser_target(path);
    if let Err(e) = open::that(&target) {
        tracing::warn!("Could not open {} in a browser: {}", target.display(), e);
    }
}
