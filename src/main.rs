//! # Credit Memo CLI (`memo`)
//!
//! Extracts text from financial PDFs and generates structured credit memos
//! through an OpenAI-compatible chat-completion API.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `memo extract <pdf>` | Extract and display one PDF |
//! | `memo batch <paths…>` | Extract many PDFs and write a summary report |
//! | `memo generate` | Generate a memo from `ocr_text.json` or a text file |
//! | `memo run <paths…>` | Batch extraction followed by memo generation |
//! | `memo serve` | Start the HTTP API |
//!
//! The API key is read from the variable named by `[llm].api_key_env`
//! (default `GROQ_API_KEY`); a `.env` file in the working directory is
//! honored.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;

use credit_memo::batch::{run_batch, BatchArgs};
use credit_memo::config::load_config_or_default;
use credit_memo::extract::run_extract;
use credit_memo::generate::{run_generate, run_pipeline};
use credit_memo::progress::ProgressMode;
use credit_memo::server;

/// Credit memo generator: PDF text extraction plus LLM-backed memo
/// generation.
#[derive(Parser)]
#[command(
    name = "memo",
    about = "Credit memo generator: extract text from financial PDFs and draft structured credit memos",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/memo.toml`. Built-in defaults are used when the
    /// file does not exist.
    #[arg(long, global = true, default_value = "./config/memo.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v info, -vv debug). Logs go to stderr.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract and display the text of one PDF.
    Extract {
        /// PDF file to read.
        pdf: PathBuf,

        /// Show only this page (1-based).
        #[arg(long)]
        page: Option<u32>,

        /// Also write `<stem>_extracted.txt` next to the PDF.
        #[arg(long)]
        save: bool,

        /// Print the extraction result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Extract text from many PDFs.
    ///
    /// Directories are searched recursively for `*.pdf`. Each file is
    /// processed independently; failures are reported and the batch goes on.
    Batch {
        /// PDF files or directories.
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Do not write per-PDF `_extracted.txt` files.
        #[arg(long)]
        no_save: bool,

        /// Directory for `_extracted.txt` files (default: next to each PDF).
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Summary report path (default from `[batch].summary_file`).
        #[arg(long)]
        summary: Option<PathBuf>,

        /// Progress output: auto, off, human or json (stderr).
        #[arg(long, default_value = "auto")]
        progress: String,

        /// Print the batch result as JSON instead of the text summary.
        #[arg(long)]
        json: bool,
    },

    /// Generate a credit memo from previously extracted text.
    Generate {
        /// Hand-off file (default from `[handoff].ocr_text_file`).
        #[arg(long)]
        input: Option<PathBuf>,

        /// Read plain text from this file instead of the hand-off file.
        #[arg(long, conflicts_with = "input")]
        text_file: Option<PathBuf>,

        /// Write the memo JSON here instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Extract PDFs, write the hand-off file and generate a memo.
    Run {
        /// PDF files or directories.
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Write the memo JSON here instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Progress output: auto, off, human or json (stderr).
        #[arg(long, default_value = "auto")]
        progress: String,
    },

    /// Start the HTTP API.
    Serve,
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = load_config_or_default(&cli.config)?;

    match cli.command {
        Commands::Extract {
            pdf,
            page,
            save,
            json,
        } => {
            run_extract(&pdf, page, save, json)?;
        }
        Commands::Batch {
            paths,
            no_save,
            output_dir,
            summary,
            progress,
            json,
        } => {
            let args = BatchArgs {
                no_save,
                output_dir,
                summary_file: summary,
                progress: ProgressMode::parse(&progress)?,
                json,
            };
            run_batch(&cfg, &paths, &args)?;
        }
        Commands::Generate {
            input,
            text_file,
            output,
        } => {
            run_generate(&cfg, input, text_file, output).await?;
        }
        Commands::Run {
            paths,
            output,
            progress,
        } => {
            run_pipeline(&cfg, &paths, ProgressMode::parse(&progress)?, output).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
