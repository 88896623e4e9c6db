//! Merging of OCR results from several images into one text and one
//! word-frequency table.

use serde::Serialize;
use std::collections::HashMap;

use crate::models::{OcrResult, WordCount};

const TEXT_SEPARATOR: &str = "\n\n";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AggregatedResult {
    pub combined_text: String,
    pub combined_word_counts: Vec<WordCount>,
}

impl AggregatedResult {
    pub fn top(&self, limit: usize) -> &[WordCount] {
        let end = limit.min(self.combined_word_counts.len());
        &self.combined_word_counts[..end]
    }

    pub fn count_of(&self, word: &str) -> Option<i64> {
        let key = word.to_lowercase();
        self.combined_word_counts
            .iter()
            .find(|entry| entry.word == key)
            .map(|entry| entry.count)
    }
}

pub fn aggregate(results: &[OcrResult]) -> AggregatedResult {
    let combined_text = results
        .iter()
        .map(|result| result.text.as_str())
        .collect::<Vec<_>>()
        .join(TEXT_SEPARATOR);

    let mut index: HashMap<String, usize> = HashMap::new();
    let mut counts: Vec<WordCount> = Vec::new();
    for entry in results.iter().flat_map(|result| result.top_words.iter()) {
        let key = entry.word.to_lowercase();
        match index.get(&key) {
            Some(&position) => {
                counts[position].count = counts[position].count.saturating_add(entry.count);
            }
            None => {
                index.insert(key.clone(), counts.len());
                counts.push(WordCount::new(key, entry.count));
            }
        }
    }
    // stable: equal counts keep first-seen order
    counts.sort_by(|a, b| b.count.cmp(&a.count));

    AggregatedResult {
        combined_text,
        combined_word_counts: counts,
    }
}
