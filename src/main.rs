use anyhow::Result;
use clap::Parser;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use transcript_pipeline::cli::{Cli, Commands};
use transcript_pipeline::config::Config;
use transcript_pipeline::extractors::{StrategyKind, VideoReference};
use transcript_pipeline::output;
use transcript_pipeline::pipeline::TranscriptPipeline;
use transcript_pipeline::utils::DependencyCheck;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let default_filter = if cli.verbose {
        "transcript_pipeline=debug"
    } else {
        "transcript_pipeline=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Fetch {
            url,
            strategies,
            api_key,
            output: output_path,
            format,
            preview,
        } => {
            let config = Config::load().await?;

            let order = if strategies.is_empty() {
                config.strategies.order.clone()
            } else {
                strategies
            };

            // Check helper prerequisites (non-fatal, later strategies may still work)
            if order.contains(&StrategyKind::Subprocess) {
                let check = DependencyCheck::new(&config.subprocess);
                let warnings = check.warnings().await;
                if !warnings.is_empty() {
                    eprintln!("{}  Dependency check warnings:", style("⚠️").yellow());
                    for warning in warnings {
                        eprintln!("   • {}", warning);
                    }
                    eprintln!("   (Continuing anyway - other strategies may succeed)");
                }
            }

            let pipeline = TranscriptPipeline::from_config(&config, &order, api_key.as_deref())?;

            tracing::info!("Starting transcript fetch for URL: {}", url);

            let progress = (!cli.quiet).then(|| {
                let progress = ProgressBar::new_spinner();
                progress.set_style(
                    ProgressStyle::default_spinner()
                        .template("{spinner:.green} [{elapsed_precise}] {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                );
                progress.set_message("Fetching transcript...");
                progress.enable_steady_tick(Duration::from_millis(120));
                progress
            });

            let result = pipeline.run(&url).await;

            if let Some(progress) = progress {
                progress.finish_and_clear();
            }

            let result = result?;

            match output_path {
                Some(path) => {
                    output::save_to_file(&result, &path, &format, preview).await?;
                    println!("Transcript saved to: {}", path.display());
                }
                None => {
                    output::print_to_console(&result, &format, preview)?;
                }
            }
        }
        Commands::Parse { url } => {
            let video = VideoReference::parse(&url)?;
            println!("{}", video.id());
        }
        Commands::Config { show } => {
            let config = Config::load().await?;
            if show {
                config.display();
            } else {
                println!("Configuration file: {}", Config::config_path()?.display());
                println!("Edit it to change the strategy order or helper limits.");
            }
        }
        Commands::Strategies => {
            let default_order = StrategyKind::default_order();
            println!("Extraction strategies:");
            for kind in StrategyKind::all() {
                let marker = match default_order.iter().position(|k| *k == kind) {
                    Some(index) => format!("default #{}", index + 1),
                    None => "on request".to_string(),
                };
                println!(
                    "  • {:<13} {} ({})",
                    style(kind.as_str()).bold(),
                    kind.description(),
                    marker
                );
            }
        }
    }

    Ok(())
}
