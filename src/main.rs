use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};

use post_converter::downloader::Fetcher;
use post_converter::pipeline;
use post_converter::settings::Settings;

#[derive(Parser)]
#[command(
    name = "post_converter",
    about = "Turn blog posts into percent-format scripts and Jupyter notebooks"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert urls.txt and every *.md file in the input directory
    Process {
        /// Directory with Markdown files and an optional urls.txt
        #[arg(short, long)]
        input_dir: Option<PathBuf>,
        /// Where converted projects are written
        #[arg(short, long)]
        processed_dir: Option<PathBuf>,
    },
    /// Convert a single Markdown file (moved into its project directory)
    File {
        path: PathBuf,
        #[arg(short, long)]
        processed_dir: Option<PathBuf>,
    },
    /// Fetch and convert a single web page
    Url {
        url: String,
        #[arg(short, long)]
        processed_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load()?;

    let result = match cli.command {
        Commands::Process {
            input_dir,
            processed_dir,
        } => {
            let settings = settings.with_overrides(input_dir, processed_dir);
            let stats = pipeline::process_dir(&settings).await?;
            println!(
                "Done: {} items ({} ok, {} errors).",
                stats.total, stats.ok, stats.errors
            );
            Ok(())
        }
        Commands::File {
            path,
            processed_dir,
        } => {
            let settings = settings.with_overrides(None, processed_dir);
            std::fs::create_dir_all(&settings.processed_dir).with_context(|| {
                format!("Failed to create {}", settings.processed_dir.display())
            })?;
            let dir = pipeline::process_file(&path, &settings.processed_dir)?;
            println!("{} -> {}", path.display(), dir.display());
            Ok(())
        }
        Commands::Url { url, processed_dir } => {
            let settings = settings.with_overrides(None, processed_dir);
            std::fs::create_dir_all(&settings.processed_dir).with_context(|| {
                format!("Failed to create {}", settings.processed_dir.display())
            })?;
            let fetcher = Fetcher::new(&settings)?;
            let dir = pipeline::process_url(&fetcher, &url, &settings.processed_dir).await?;
            println!("{} -> {}", url, dir.display());
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else {
        format!("{}m {}s", secs / 60, secs % 60)
    }
}
