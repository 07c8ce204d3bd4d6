use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::extractors::StrategyKind;

#[derive(Parser)]
#[command(
    name = "transcript",
    about = "Transcript Pipeline - Fetch normalized YouTube transcripts with strategy fallback",
    version,
    long_about = "Fetches the captions of a YouTube video and merges them into one normalized transcript. Strategies (a helper process, in-process scraping, the official Data API) are tried in order until one succeeds."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch the transcript of a video
    Fetch {
        /// Video URL (watch, youtu.be, embed or shorts link)
        #[arg(value_name = "URL")]
        url: String,

        /// Strategy to try, repeatable; order matters (default: configured order)
        #[arg(short, long = "strategy", value_enum, value_name = "STRATEGY")]
        strategies: Vec<StrategyKind>,

        /// YouTube Data API key for the official-api strategy
        #[arg(long, env = "YOUTUBE_API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        /// Output file path (prints to console if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Only show the first N words of the transcript (text format)
        #[arg(long, value_name = "WORDS")]
        preview: Option<usize>,
    },

    /// Print the video id a URL resolves to
    Parse {
        /// Video URL
        #[arg(value_name = "URL")]
        url: String,
    },

    /// Show or initialize configuration
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },

    /// List extraction strategies
    Strategies,
}

#[derive(ValueEnum, Clone, Debug)]
pub enum OutputFormat {
    /// Header plus full transcript text
    Text,
    /// JSON with segments and metadata
    Json,
    /// One timestamped line per caption segment
    Timestamped,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Timestamped => write!(f, "timestamped"),
        }
    }
}
