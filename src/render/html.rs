use anyhow::{Context, Result};
use reqwest::Url;
use serde::Serialize;
use tera::{Context as TeraContext, Tera};

use crate::highlight::Span;
use crate::models::Upload;
use crate::view::{GalleryView, MAX_ZOOM, MIN_ZOOM};

const GALLERY_TEMPLATE: &str = include_str!("templates/gallery.html.tera");
const DETAILS_TEMPLATE: &str = include_str!("templates/details.html.tera");
const ERROR_TEMPLATE: &str = include_str!("templates/error.html.tera");

/// Everything the details page shows for one selection. `image_urls` runs
/// parallel to the selection's filenames.
#[derive(Debug, Clone)]
pub struct DetailsPage<'a> {
    pub view: &'a GalleryView,
    pub image_urls: &'a [String],
    pub top_words: usize,
}

/// Query state of a details page link.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetailsLink<'a> {
    pub filenames: &'a [String],
    pub word: Option<&'a str>,
    pub search: Option<&'a str>,
    pub preview: Option<&'a str>,
    pub zoom: Option<f32>,
}

#[derive(Serialize)]
struct GalleryCard<'a> {
    id: &'a str,
    filename: &'a str,
    text: &'a str,
    created_at: Option<&'a str>,
    image: String,
    href: String,
}

#[derive(Serialize)]
struct ParagraphView {
    multiline: bool,
    lines: Vec<Vec<Span>>,
}

#[derive(Serialize)]
struct WordLink<'a> {
    word: &'a str,
    count: i64,
    selected: bool,
    href: String,
}

#[derive(Serialize)]
struct Thumbnail<'a> {
    filename: &'a str,
    image: &'a str,
    href: String,
}

#[derive(Serialize)]
struct PreviewView<'a> {
    filename: &'a str,
    image: &'a str,
    percent: u32,
    zoom_in_href: Option<String>,
    zoom_out_href: Option<String>,
    reset_href: String,
    close_href: String,
}

/// Renders the upload grid. `image_url` maps a filename to its thumbnail.
pub fn html_gallery(uploads: &[Upload], image_url: impl Fn(&str) -> String) -> Result<String> {
    let cards = uploads
        .iter()
        .map(|upload| GalleryCard {
            id: &upload.id,
            filename: &upload.filename,
            text: &upload.text,
            created_at: upload.created_at.as_deref(),
            image: image_url(&upload.filename),
            href: details_href(std::slice::from_ref(&upload.filename), None),
        })
        .collect::<Vec<_>>();
    let mut context = TeraContext::new();
    context.insert("uploads", &cards);
    Tera::one_off(GALLERY_TEMPLATE, &context, true)
        .with_context(|| "failed to render gallery template")
}

pub fn html_details(page: &DetailsPage<'_>) -> Result<String> {
    let view = page.view;
    let filenames = view.selection.filenames();
    let document = view.document();
    let paragraphs = document
        .paragraphs()
        .iter()
        .map(|paragraph| ParagraphView {
            multiline: paragraph.multiline,
            lines: paragraph.lines.iter().map(|line| line.spans()).collect(),
        })
        .collect::<Vec<_>>();

    let selected_word = view.selected_word.as_deref();
    let base = DetailsLink {
        filenames: &filenames,
        word: selected_word,
        search: view.search_term.as_deref(),
        ..DetailsLink::default()
    };

    let selected = selected_word.map(str::to_lowercase);
    let words = view.top_words[..page.top_words.min(view.top_words.len())]
        .iter()
        .map(|entry| {
            let is_selected = selected.as_deref() == Some(entry.word.as_str());
            // clicking the selected word again clears the highlight
            let word = if is_selected {
                None
            } else {
                Some(entry.word.as_str())
            };
            WordLink {
                word: &entry.word,
                count: entry.count,
                selected: is_selected,
                href: DetailsLink { word, ..base }.href(),
            }
        })
        .collect::<Vec<_>>();

    let thumbnails = filenames
        .iter()
        .map(|filename| Thumbnail {
            filename: filename.as_str(),
            image: image_for(&filenames, page.image_urls, filename),
            href: DetailsLink {
                preview: Some(filename.as_str()),
                ..base
            }
            .href(),
        })
        .collect::<Vec<_>>();

    let preview = view.preview().map(|filename| {
        let at_zoom = |zoom: f32| {
            DetailsLink {
                preview: Some(filename),
                zoom: Some(zoom),
                ..base
            }
            .href()
        };
        PreviewView {
            filename,
            image: image_for(&filenames, page.image_urls, filename),
            percent: (view.zoom * 100.0).round() as u32,
            zoom_in_href: (view.zoom < MAX_ZOOM).then(|| at_zoom(view.zoomed_in())),
            zoom_out_href: (view.zoom > MIN_ZOOM).then(|| at_zoom(view.zoomed_out())),
            reset_href: at_zoom(1.0),
            close_href: base.href(),
        }
    });

    let title = match filenames.as_slice() {
        [single] => single.clone(),
        many => format!("{} images", many.len()),
    };

    let mut context = TeraContext::new();
    context.insert("title", &title);
    context.insert("filenames", &filenames);
    context.insert("no_text", &document.is_empty());
    context.insert("paragraphs", &paragraphs);
    context.insert("words", &words);
    context.insert("thumbnails", &thumbnails);
    context.insert("preview", &preview);
    context.insert("selected_word", selected_word.unwrap_or_default());
    context.insert("search", view.search_term.as_deref().unwrap_or_default());
    context.insert("highlight", view.highlight_term().unwrap_or_default());
    context.insert(
        "clear_search_href",
        &DetailsLink {
            search: None,
            ..base
        }
        .href(),
    );
    Tera::one_off(DETAILS_TEMPLATE, &context, true)
        .with_context(|| "failed to render details template")
}

fn image_for<'a>(filenames: &[String], image_urls: &'a [String], filename: &str) -> &'a str {
    filenames
        .iter()
        .position(|name| name == filename)
        .and_then(|index| image_urls.get(index))
        .map(String::as_str)
        .unwrap_or_default()
}

pub fn html_error(message: &str) -> Result<String> {
    let mut context = TeraContext::new();
    context.insert("message", message);
    Tera::one_off(ERROR_TEMPLATE, &context, true)
        .with_context(|| "failed to render error template")
}

/// Relative link to the details page for `filenames`, optionally
/// highlighting `word`.
pub fn details_href(filenames: &[String], word: Option<&str>) -> String {
    DetailsLink {
        filenames,
        word,
        ..DetailsLink::default()
    }
    .href()
}

impl DetailsLink<'_> {
    pub fn href(&self) -> String {
        let Ok(mut url) = Url::parse("http://localhost/details") else {
            return "/details".to_string();
        };
        {
            let mut pairs = url.query_pairs_mut();
            for filename in self.filenames {
                pairs.append_pair("filename", filename);
            }
            if let Some(word) = self.word {
                pairs.append_pair("word", word);
            }
            if let Some(search) = self.search {
                pairs.append_pair("q", search);
            }
            if let Some(preview) = self.preview {
                pairs.append_pair("preview", preview);
            }
            if let Some(zoom) = self.zoom {
                pairs.append_pair("zoom", &zoom.to_string());
            }
        }
        match url.query() {
            Some(query) if !query.is_empty() => format!("/details?{}", query),
            _ => "/details".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OcrResult, WordCount};
    use crate::view::Selection;

    fn upload(filename: &str) -> Upload {
        Upload {
            filename: filename.to_string(),
            ..Upload::default()
        }
    }

    fn view_of(filenames: &[&str], results: &[OcrResult]) -> GalleryView {
        let mut view = GalleryView::default();
        view.open_details(Selection::from_uploads(
            filenames.iter().map(|name| upload(name)).collect(),
        ));
        view.apply_results(results);
        view
    }

    fn image_urls(filenames: &[&str]) -> Vec<String> {
        filenames
            .iter()
            .map(|name| format!("http://backend/uploaded_images/{}", name))
            .collect()
    }

    #[test]
    fn href_encodes_every_filename() {
        let files = vec!["a b.png".to_string(), "c&d.jpg".to_string()];
        assert_eq!(
            details_href(&files, Some("straße")),
            "/details?filename=a+b.png&filename=c%26d.jpg&word=stra%C3%9Fe"
        );
        assert_eq!(details_href(&[], None), "/details");
        let link = DetailsLink {
            filenames: &files[..1],
            search: Some("a&b"),
            preview: Some("a b.png"),
            zoom: Some(1.25),
            ..DetailsLink::default()
        };
        assert_eq!(
            link.href(),
            "/details?filename=a+b.png&q=a%26b&preview=a+b.png&zoom=1.25"
        );
    }

    #[test]
    fn details_page_marks_and_escapes() {
        let mut view = view_of(
            &["scan.png"],
            &[OcrResult::new(
                "<b>Haus</b> am See\n\nzweites haus",
                vec![WordCount::new("haus", 2), WordCount::new("see", 1)],
            )],
        );
        view.select_word("haus");
        let urls = image_urls(&["scan.png"]);
        let html = html_details(&DetailsPage {
            view: &view,
            image_urls: &urls,
            top_words: 20,
        })
        .expect("render details");

        assert!(html.contains("&lt;b&gt;<mark>Haus</mark>&lt;&#x2F;b&gt; am See"));
        assert!(html.contains("zweites <mark>haus</mark>"));
        assert!(html.contains(r#"class="selected""#));
        assert!(html.contains("<hr>"));
        assert!(html.contains("<title>scan.png</title>"));
        assert!(html.contains(r#"<img src="http://backend/uploaded_images/scan.png""#));
        assert!(html.contains(r#"href="/details?filename=scan.png&word=haus&preview=scan.png""#));
        assert!(html.contains(r#"<input type="search" name="q" value="""#));
    }

    #[test]
    fn search_overrides_word_on_page() {
        let mut view = view_of(
            &["a.png"],
            &[OcrResult::new(
                "Hund und Katze",
                vec![WordCount::new("hund", 1), WordCount::new("katze", 1)],
            )],
        );
        view.select_word("hund");
        view.set_search("katze");
        let urls = image_urls(&["a.png"]);
        let html = html_details(&DetailsPage {
            view: &view,
            image_urls: &urls,
            top_words: 20,
        })
        .expect("render details");
        assert!(html.contains("Hund und <mark>Katze</mark>"));
        assert!(html.contains("Highlighting: &quot;katze&quot;"));
        assert!(html.contains(r#"name="q" value="katze""#));
        assert!(html.contains(r#"<input type="hidden" name="word" value="hund">"#));
        // the word list keeps the search running
        assert!(html.contains(r#"href="/details?filename=a.png&word=katze&q=katze""#));
        assert!(html.contains(r#"href="/details?filename=a.png&word=hund">Clear</a>"#));
    }

    #[test]
    fn preview_links_step_zoom() {
        let mut view = view_of(&["a.png", "b.png"], &[]);
        assert!(view.open_preview("b.png"));
        view.set_zoom(3.0);
        let urls = image_urls(&["a.png", "b.png"]);
        let html = html_details(&DetailsPage {
            view: &view,
            image_urls: &urls,
            top_words: 20,
        })
        .expect("render details");
        assert!(html.contains(r#"style="width: 300%""#));
        assert!(html.contains(r#"<img src="http://backend/uploaded_images/b.png" alt="b.png" style"#));
        assert!(html.contains("preview=b.png&zoom=2.75"));
        assert!(!html.contains(">+</a>"));
        assert!(html.contains(r#"href="/details?filename=a.png&filename=b.png">Close</a>"#));
    }

    #[test]
    fn empty_document_shows_placeholder() {
        let view = view_of(&["a.png", "b.png"], &[]);
        let html = html_details(&DetailsPage {
            view: &view,
            image_urls: &[],
            top_words: 20,
        })
        .expect("render details");
        assert!(html.contains("No text detected"));
        assert!(html.contains("2 images"));
        assert!(!html.contains(r#"class="preview""#));
    }

    #[test]
    fn gallery_lists_uploads() {
        let uploads = vec![Upload {
            id: "1".to_string(),
            text: "Vorschau".to_string(),
            filename: "page.png".to_string(),
            created_at: Some("2024-05-01 12:00:00".to_string()),
        }];
        let html = html_gallery(&uploads, |name| format!("/img/{}", name)).expect("render gallery");
        assert!(html.contains("page.png"));
        assert!(html.contains("Vorschau"));
        assert!(html.contains("/details?filename=page.png"));
        assert!(html.contains(r#"<img src="/img/page.png""#));
        assert!(html.contains(r#"formaction="/uploads/1/delete""#));
        assert!(html_gallery(&[], |_| String::new())
            .expect("render empty")
            .contains("No uploads yet."));
    }
}
