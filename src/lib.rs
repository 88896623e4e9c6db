use anyhow::{Result, anyhow};
use serde::Serialize;
use std::path::{Path, PathBuf};

pub mod aggregate;
pub mod client;
pub mod highlight;
pub mod logging;
pub mod models;
pub mod render;
mod server;
pub mod settings;
pub mod view;

pub use aggregate::{AggregatedResult, aggregate};
pub use client::GalleryClient;
pub use highlight::{Line, Paragraph, Span, StructuredDocument, structure};
pub use models::{GlobalWord, OcrResult, Upload, UploadResponse, WordCount};
pub use server::run_server;
pub use view::{GalleryView, Selection};

const PREVIEW_CHARS: usize = 60;

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub base_url: Option<String>,
    pub settings_path: Option<String>,
    /// Overrides `display.color`.
    pub color: Option<bool>,
}

#[derive(Debug, Clone)]
pub enum Command {
    List,
    Upload {
        path: PathBuf,
    },
    Show {
        filenames: Vec<String>,
        word: Option<String>,
        top: Option<usize>,
        json: bool,
    },
    Delete {
        id: String,
    },
    DeleteAll,
    TopWords,
    Serve {
        addr: Option<String>,
    },
}

#[derive(Serialize)]
struct ShowOutput<'a> {
    filenames: &'a [String],
    document: &'a StructuredDocument,
    aggregated: &'a AggregatedResult,
}

pub async fn run(config: Config, command: Command) -> Result<String> {
    let settings_path = config.settings_path.as_deref().map(Path::new);
    let mut settings = settings::load_settings(settings_path)?;
    if let Some(url) = config.base_url.as_deref() {
        settings.set_base_url(url);
    }
    let style = render::Style::from_color(config.color.unwrap_or(settings.color));

    let client = || GalleryClient::from_settings(&settings);
    match command {
        Command::Serve { addr } => {
            let addr = addr.unwrap_or_else(|| settings.server_addr.clone());
            server::run_server(settings.clone(), addr).await?;
            Ok(String::new())
        }
        Command::List => {
            let uploads = client()?.list_uploads().await?;
            Ok(format_uploads(&uploads))
        }
        Command::Upload { path } => {
            let response = client()?.upload_image(&path).await?;
            let document = structure(&response.text, None);
            Ok(format!(
                "uploaded {}\n\n{}",
                path.display(),
                render::terminal(&document, style)
            ))
        }
        Command::Show {
            filenames,
            word,
            top,
            json,
        } => {
            if filenames.is_empty() {
                return Err(anyhow!("at least one filename is required"));
            }
            let mut view = GalleryView::default();
            view.open_details(Selection::from_uploads(
                filenames
                    .iter()
                    .map(|filename| Upload {
                        filename: filename.clone(),
                        ..Upload::default()
                    })
                    .collect(),
            ));
            let filenames_in_order = view.selection.filenames();
            let results = client()?.fetch_ocr_many(&filenames_in_order).await?;
            let aggregated = view.apply_results(&results);
            if let Some(word) = word.as_deref() {
                view.select_word(word);
            }
            let document = view.document();
            if json {
                return Ok(serde_json::to_string_pretty(&ShowOutput {
                    filenames: &filenames,
                    document: &document,
                    aggregated: &aggregated,
                })?);
            }
            let limit = top.unwrap_or(settings.top_words);
            Ok(format_show(
                &document,
                &aggregated,
                view.selected_word.as_deref(),
                limit,
                style,
            ))
        }
        Command::Delete { id } => {
            client()?.delete_upload(&id).await?;
            Ok(format!("deleted {}", id.trim()))
        }
        Command::DeleteAll => client()?.delete_all().await,
        Command::TopWords => {
            let words = client()?.top_words().await?;
            Ok(format_global_words(&words))
        }
    }
}

fn format_show(
    document: &StructuredDocument,
    aggregated: &AggregatedResult,
    selected: Option<&str>,
    limit: usize,
    style: render::Style,
) -> String {
    let mut output = render::terminal(document, style);
    let table = render::word_table(aggregated.top(limit), selected);
    if !table.is_empty() {
        output.push_str("\n\n");
        output.push_str(&table);
    }
    output
}

fn format_uploads(uploads: &[Upload]) -> String {
    if uploads.is_empty() {
        return "no uploads".to_string();
    }
    uploads
        .iter()
        .map(|upload| {
            format!(
                "{}\t{}\t{}\t{}",
                upload.id,
                upload.filename,
                upload.created_at.as_deref().unwrap_or("-"),
                preview(&upload.text)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_global_words(words: &[GlobalWord]) -> String {
    words
        .iter()
        .map(|entry| {
            if entry.translation.trim().is_empty() {
                format!("{}\t{}", entry.word, entry.count)
            } else {
                format!("{}\t{}\t{}", entry.word, entry.count, entry.translation)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn preview(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= PREVIEW_CHARS {
        return flat;
    }
    let mut cut = flat.chars().take(PREVIEW_CHARS).collect::<String>();
    cut.push('…');
    cut
}
