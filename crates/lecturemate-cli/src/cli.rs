//! Command-line interface definition using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// LectureMate - summarize video lectures within a model's token budget
#[derive(Parser, Debug)]
#[command(name = "lecturemate")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Model identifier
    #[arg(long, env = "LECTUREMATE_MODEL", global = true)]
    pub model: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Summarize a transcript file (.txt or caption .json)
    Summarize {
        /// Transcript file
        #[arg(required = true)]
        input: PathBuf,

        /// Summarization strategy
        #[arg(short, long, default_value = "chunked")]
        strategy: Strategy,

        /// Overall token target for the recursive strategy
        #[arg(long, default_value_t = 1000)]
        target_tokens: usize,

        /// Output format
        #[arg(short, long, default_value = "markdown")]
        format: OutputFormat,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Dry run with a local echo backend instead of the API
        #[arg(long)]
        offline: bool,
    },

    /// Show token count and chunk plan of a transcript
    Tokens {
        /// Transcript file
        #[arg(required = true)]
        input: PathBuf,

        /// Planning budget (defaults to LECTUREMATE_TOKEN_BUDGET or 3600)
        #[arg(long)]
        budget: Option<usize>,
    },

    /// Extract the video id from a link
    VideoId {
        /// Video link
        #[arg(required = true)]
        url: String,

        /// Also look up title and author
        #[arg(short, long)]
        metadata: bool,
    },

    /// Ask a question about a transcript
    Ask {
        /// Transcript file
        #[arg(required = true)]
        input: PathBuf,

        /// The question
        #[arg(required = true)]
        question: String,

        /// Passages sent as context
        #[arg(long, default_value_t = 2)]
        top_k: usize,

        /// Passage size in tokens
        #[arg(long, default_value_t = 500)]
        passage_tokens: usize,

        /// Dry run with a local echo backend instead of the API
        #[arg(long)]
        offline: bool,
    },
}

/// Summarization strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Strategy {
    /// Summarize and format chunk by chunk
    #[default]
    Chunked,
    /// Reduce recursively to a token target, then clean up
    Recursive,
}

/// Output format for summaries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Markdown,
    Html,
    Pdf,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Markdown => "md",
            Self::Html => "html",
            Self::Pdf => "pdf",
        }
    }
}

impl Cli {
    /// Log filter for the verbosity level.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "lecturemate=warn,lecturemate_summary=warn,lecturemate_core=warn",
            1 => "lecturemate=info,lecturemate_summary=info,lecturemate_core=info",
            2 => "lecturemate=debug,lecturemate_summary=debug,lecturemate_core=debug",
            _ => "trace",
        }
    }
}
