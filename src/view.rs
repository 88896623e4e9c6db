//! Presentation-layer state of the gallery: what is selected, whether the
//! details panel is open, which word is highlighted.

use crate::aggregate::{AggregatedResult, aggregate};
use crate::highlight::{StructuredDocument, structure};
use crate::models::{OcrResult, Upload, WordCount};

pub const MIN_ZOOM: f32 = 0.5;
pub const MAX_ZOOM: f32 = 3.0;
pub const ZOOM_STEP: f32 = 0.25;

#[derive(Debug, Clone, Default, PartialEq)]
pub enum Selection {
    #[default]
    None,
    Single(Upload),
    Multiple(Vec<Upload>),
}

impl Selection {
    pub fn from_uploads(mut uploads: Vec<Upload>) -> Self {
        match uploads.len() {
            0 => Selection::None,
            1 => Selection::Single(uploads.remove(0)),
            _ => Selection::Multiple(uploads),
        }
    }

    pub fn uploads(&self) -> &[Upload] {
        match self {
            Selection::None => &[],
            Selection::Single(upload) => std::slice::from_ref(upload),
            Selection::Multiple(uploads) => uploads,
        }
    }

    pub fn filenames(&self) -> Vec<String> {
        self.uploads()
            .iter()
            .map(|upload| upload.filename.clone())
            .collect()
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.uploads().iter().any(|upload| upload.id == id)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Selection::None)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GalleryView {
    pub uploads: Vec<Upload>,
    pub selection: Selection,
    pub details_open: bool,
    pub loading: bool,
    pub ocr_text: String,
    pub top_words: Vec<WordCount>,
    pub selected_word: Option<String>,
    /// Typed search; takes precedence over the clicked word.
    pub search_term: Option<String>,
    pub image_preview_open: bool,
    pub preview_filename: Option<String>,
    pub zoom: f32,
    /// Bumped whenever the gallery should drop its multi-selection.
    pub clear_selection_signal: u64,
    error: Option<String>,
}

impl Default for GalleryView {
    fn default() -> Self {
        Self {
            uploads: Vec::new(),
            selection: Selection::None,
            details_open: false,
            loading: false,
            ocr_text: String::new(),
            top_words: Vec::new(),
            selected_word: None,
            search_term: None,
            image_preview_open: false,
            preview_filename: None,
            zoom: 1.0,
            clear_selection_signal: 0,
            error: None,
        }
    }
}

impl GalleryView {
    pub fn set_uploads(&mut self, uploads: Vec<Upload>) {
        self.uploads = uploads;
    }

    pub fn open_details(&mut self, selection: Selection) {
        self.details_open = !selection.is_empty();
        self.selection = selection;
        self.loading = self.details_open;
        self.selected_word = None;
        self.search_term = None;
        self.close_preview();
    }

    /// Stores the fetched results of the current selection. One image or
    /// many, the text and word table go through the same aggregation.
    pub fn apply_results(&mut self, results: &[OcrResult]) -> AggregatedResult {
        let aggregated = aggregate(results);
        self.ocr_text = aggregated.combined_text.clone();
        self.top_words = aggregated.combined_word_counts.clone();
        self.loading = false;
        aggregated
    }

    pub fn fail_loading(&mut self, message: impl Into<String>) {
        self.loading = false;
        self.set_error(message);
    }

    /// Selecting the highlighted word again clears it. The word is kept as
    /// given, surrounding whitespace included.
    pub fn select_word(&mut self, word: &str) {
        if word.is_empty() {
            self.selected_word = None;
            return;
        }
        let same = self
            .selected_word
            .as_deref()
            .map(|current| current.to_lowercase() == word.to_lowercase())
            .unwrap_or(false);
        self.selected_word = if same { None } else { Some(word.to_string()) };
    }

    pub fn set_search(&mut self, term: &str) {
        self.search_term = (!term.is_empty()).then(|| term.to_string());
    }

    pub fn highlight_term(&self) -> Option<&str> {
        self.search_term
            .as_deref()
            .filter(|term| !term.is_empty())
            .or(self.selected_word.as_deref())
    }

    pub fn document(&self) -> StructuredDocument {
        structure(&self.ocr_text, self.highlight_term())
    }

    pub fn close_details(&mut self) {
        self.details_open = false;
        self.loading = false;
        self.selection = Selection::None;
        self.ocr_text.clear();
        self.top_words.clear();
        self.selected_word = None;
        self.search_term = None;
        self.close_preview();
        self.clear_selection_signal = self.clear_selection_signal.wrapping_add(1);
    }

    /// Call after an upload was deleted on the backend.
    pub fn on_deleted(&mut self, id: &str) {
        self.uploads.retain(|upload| upload.id != id);
        if self.selection.contains_id(id) {
            self.close_details();
        }
    }

    /// Opens the enlarged image of one selected file at 100%. Files outside
    /// the selection are ignored.
    pub fn open_preview(&mut self, filename: &str) -> bool {
        if !self.selection.uploads().iter().any(|upload| upload.filename == filename) {
            return false;
        }
        self.image_preview_open = true;
        self.preview_filename = Some(filename.to_string());
        self.zoom = 1.0;
        true
    }

    pub fn close_preview(&mut self) {
        self.image_preview_open = false;
        self.preview_filename = None;
        self.zoom = 1.0;
    }

    pub fn preview(&self) -> Option<&str> {
        self.preview_filename
            .as_deref()
            .filter(|_| self.image_preview_open)
    }

    pub fn set_zoom(&mut self, zoom: f32) {
        self.zoom = if zoom.is_finite() {
            zoom.clamp(MIN_ZOOM, MAX_ZOOM)
        } else {
            1.0
        };
    }

    pub fn zoomed_in(&self) -> f32 {
        (self.zoom + ZOOM_STEP).min(MAX_ZOOM)
    }

    pub fn zoomed_out(&self) -> f32 {
        (self.zoom - ZOOM_STEP).max(MIN_ZOOM)
    }

    pub fn zoom_in(&mut self) {
        self.zoom = self.zoomed_in();
    }

    pub fn zoom_out(&mut self) {
        self.zoom = self.zoomed_out();
    }

    pub fn reset_zoom(&mut self) {
        self.zoom = 1.0;
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// The notification is shown once.
    pub fn take_error(&mut self) -> Option<String> {
        self.error.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(id: &str, filename: &str) -> Upload {
        Upload {
            id: id.to_string(),
            filename: filename.to_string(),
            ..Upload::default()
        }
    }

    #[test]
    fn selection_shape_follows_count() {
        assert_eq!(Selection::from_uploads(Vec::new()), Selection::None);
        assert!(matches!(
            Selection::from_uploads(vec![upload("1", "a.png")]),
            Selection::Single(_)
        ));
        let multi = Selection::from_uploads(vec![upload("1", "a.png"), upload("2", "b.png")]);
        assert_eq!(multi.filenames(), vec!["a.png", "b.png"]);
        assert!(multi.contains_id("2"));
    }

    #[test]
    fn details_lifecycle() {
        let mut view = GalleryView::default();
        view.set_uploads(vec![upload("1", "a.png"), upload("2", "b.png")]);
        view.open_details(Selection::Single(upload("1", "a.png")));
        assert!(view.details_open);
        assert!(view.loading);

        let aggregated = view.apply_results(&[OcrResult::new(
            "Hallo Welt",
            vec![WordCount::new("Hallo", 1)],
        )]);
        assert!(!view.loading);
        assert_eq!(view.ocr_text, "Hallo Welt");
        assert_eq!(aggregated.combined_word_counts, vec![WordCount::new("hallo", 1)]);

        view.select_word("hallo");
        assert_eq!(view.document().highlight_count(), 1);
        assert!(view.open_preview("a.png"));
        view.zoom_in();
        view.set_search("welt");

        view.close_details();
        assert!(!view.details_open);
        assert!(view.selection.is_empty());
        assert!(view.ocr_text.is_empty());
        assert!(view.top_words.is_empty());
        assert_eq!(view.selected_word, None);
        assert_eq!(view.search_term, None);
        assert!(!view.image_preview_open);
        assert_eq!(view.preview(), None);
        assert_eq!(view.zoom, 1.0);
        assert_eq!(view.clear_selection_signal, 1);
        assert_eq!(view.uploads.len(), 2);
    }

    #[test]
    fn selecting_same_word_twice_clears_it() {
        let mut view = GalleryView::default();
        view.select_word("Haus");
        assert_eq!(view.selected_word.as_deref(), Some("Haus"));
        view.select_word("haus");
        assert_eq!(view.selected_word, None);
        view.select_word("Tür");
        view.select_word("");
        assert_eq!(view.selected_word, None);
    }

    #[test]
    fn selected_word_is_kept_verbatim() {
        let mut view = GalleryView::default();
        view.apply_results(&[OcrResult::new("concat cat", Vec::new())]);
        view.select_word(" cat");
        assert_eq!(view.selected_word.as_deref(), Some(" cat"));
        assert_eq!(view.document().highlight_count(), 1);
        view.select_word(" ");
        assert_eq!(view.selected_word.as_deref(), Some(" "));
    }

    #[test]
    fn search_term_wins_over_selected_word() {
        let mut view = GalleryView::default();
        view.apply_results(&[OcrResult::new("Hund und Katze", Vec::new())]);
        view.select_word("hund");
        view.set_search("katze");
        assert_eq!(view.highlight_term(), Some("katze"));
        let text = crate::render::terminal(&view.document(), crate::render::Style::Plain);
        assert_eq!(text, "Hund und [Katze]");

        view.set_search("");
        assert_eq!(view.highlight_term(), Some("hund"));
        view.select_word("hund");
        assert_eq!(view.highlight_term(), None);
    }

    #[test]
    fn preview_only_opens_for_selected_files() {
        let mut view = GalleryView::default();
        view.open_details(Selection::from_uploads(vec![
            upload("1", "a.png"),
            upload("2", "b.png"),
        ]));
        assert!(!view.open_preview("c.png"));
        assert_eq!(view.preview(), None);
        assert!(view.open_preview("b.png"));
        assert_eq!(view.preview(), Some("b.png"));
        view.set_zoom(1.5);
        assert_eq!(view.zoomed_in(), 1.75);
        assert_eq!(view.zoomed_out(), 1.25);
        view.close_preview();
        assert_eq!(view.preview(), None);
        assert_eq!(view.zoom, 1.0);
    }

    #[test]
    fn deleting_selected_upload_closes_details() {
        let mut view = GalleryView::default();
        view.set_uploads(vec![upload("1", "a.png"), upload("2", "b.png")]);
        view.open_details(Selection::from_uploads(vec![
            upload("1", "a.png"),
            upload("2", "b.png"),
        ]));
        view.on_deleted("3");
        assert!(view.details_open);
        view.on_deleted("2");
        assert!(!view.details_open);
        assert_eq!(view.uploads, vec![upload("1", "a.png")]);
    }

    #[test]
    fn zoom_is_clamped() {
        let mut view = GalleryView::default();
        for _ in 0..20 {
            view.zoom_in();
        }
        assert_eq!(view.zoom, MAX_ZOOM);
        for _ in 0..20 {
            view.zoom_out();
        }
        assert_eq!(view.zoom, MIN_ZOOM);
        view.reset_zoom();
        assert_eq!(view.zoom, 1.0);
        view.set_zoom(10.0);
        assert_eq!(view.zoom, MAX_ZOOM);
        view.set_zoom(f32::NAN);
        assert_eq!(view.zoom, 1.0);
    }

    #[test]
    fn errors_are_taken_once() {
        let mut view = GalleryView::default();
        view.open_details(Selection::Single(upload("1", "a.png")));
        view.fail_loading("Failed to fetch details.");
        assert!(!view.loading);
        assert_eq!(view.error(), Some("Failed to fetch details."));
        assert_eq!(view.take_error().as_deref(), Some("Failed to fetch details."));
        assert_eq!(view.take_error(), None);
    }
}
