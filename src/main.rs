use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use ocr_gallery_rust::{Command, Config};

#[derive(Parser, Debug)]
#[command(
    name = "ocr-gallery-rust",
    version,
    about = "Browse OCR results of uploaded images"
)]
struct Cli {
    /// Backend base URL (overrides settings and OCR_GALLERY_BASE_URL)
    #[arg(short = 'b', long = "base-url", global = true)]
    base_url: Option<String>,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings", global = true)]
    read_settings: Option<String>,

    /// Disable colored highlights
    #[arg(long = "no-color", global = true)]
    no_color: bool,

    /// Enable verbose logging
    #[arg(long = "verbose", global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// List uploaded images
    List,
    /// Upload an image and print the extracted text
    Upload {
        path: PathBuf,
    },
    /// Show the combined text and word counts of one or more images
    Show {
        #[arg(required = true)]
        filenames: Vec<String>,

        /// Highlight this word (case-insensitive substring)
        #[arg(short = 'w', long = "word")]
        word: Option<String>,

        /// Number of words in the frequency table
        #[arg(short = 't', long = "top")]
        top: Option<usize>,

        /// Print the structured document as JSON
        #[arg(long = "json")]
        json: bool,
    },
    /// Delete one upload by id
    Delete {
        id: String,
    },
    /// Delete every upload
    DeleteAll,
    /// Most used words across all uploads
    TopWords,
    /// Serve the gallery viewer over HTTP
    Serve {
        /// Listen address (default from settings [server] addr)
        #[arg(short = 'a', long = "addr")]
        addr: Option<String>,
    },
}

impl From<CliCommand> for Command {
    fn from(command: CliCommand) -> Self {
        match command {
            CliCommand::List => Command::List,
            CliCommand::Upload { path } => Command::Upload { path },
            CliCommand::Show {
                filenames,
                word,
                top,
                json,
            } => Command::Show {
                filenames,
                word,
                top,
                json,
            },
            CliCommand::Delete { id } => Command::Delete { id },
            CliCommand::DeleteAll => Command::DeleteAll,
            CliCommand::TopWords => Command::TopWords,
            CliCommand::Serve { addr } => Command::Serve { addr },
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let serving = matches!(cli.command, CliCommand::Serve { .. });
    ocr_gallery_rust::logging::init(cli.verbose, serving)?;

    let config = Config {
        base_url: cli.base_url,
        settings_path: cli.read_settings,
        color: cli.no_color.then_some(false),
    };
    let output = ocr_gallery_rust::run(config, cli.command.into()).await?;
    if !output.is_empty() {
        println!("{}", output);
    }
    Ok(())
}
