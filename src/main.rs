mod builder;
mod cms;
mod config;
mod content_loader;
mod error;
mod hot_reload;
mod listing;
mod models;
mod reading_time;
mod render;
mod rich_text;
mod server;
mod state;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cms::{ContentSource, PrismicClient};
use crate::config::Config;

/// Blog front-end over a Prismic repository.
#[derive(Parser)]
#[command(name = "headless-blog", version, about)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "blog.toml", global = true)]
    config: PathBuf,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve pages on demand, fetching posts the first time they are requested
    Serve {
        /// Port to listen on (overrides PORT and the config file)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Render the whole site into a directory
    Build {
        /// Output directory (overrides build.output_dir)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| default_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = Config::load(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config.display()))?;

    let client = PrismicClient::new(&config.cms).context("failed to create CMS client")?;
    let source: Arc<dyn ContentSource> = Arc::new(client);

    match cli.command {
        Command::Serve { port } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            let state = server::app_state(config, source).await?;
            server::serve(state).await?;
        }
        Command::Build { output } => {
            let output = output.unwrap_or_else(|| config.build.output_dir.clone());
            let templates = content_loader::load_templates(&config.site.content_dir)
                .await
                .context("failed to load templates")?;
            let report = builder::build_site(&config, source.as_ref(), &templates, &output)
                .await
                .context("build failed")?;
            info!(
                output = %output.display(),
                posts = report.posts,
                listing_pages = report.listing_pages,
                "Site written"
            );
        }
    }

    Ok(())
}
