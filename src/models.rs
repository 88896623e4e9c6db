use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// OCR output for one image as returned by `GET /ocr?filename=`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrResult {
    #[serde(deserialize_with = "null_as_empty")]
    pub text: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub top_words: Vec<WordCount>,
}

impl OcrResult {
    pub fn new(text: impl Into<String>, top_words: Vec<WordCount>) -> Self {
        Self {
            text: text.into(),
            top_words,
        }
    }
}

/// A `(word, count)` pair. Serialized as a two-element array, the shape the
/// backend uses for `top_words`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawWordCount", into = "(String, i64)")]
pub struct WordCount {
    pub word: String,
    pub count: i64,
}

impl WordCount {
    pub fn new(word: impl Into<String>, count: i64) -> Self {
        Self {
            word: word.into(),
            count,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawWordCount {
    Pair(String, Value),
    Entry {
        word: String,
        #[serde(default)]
        count: Value,
    },
}

impl From<RawWordCount> for WordCount {
    fn from(raw: RawWordCount) -> Self {
        let (word, count) = match raw {
            RawWordCount::Pair(word, count) => (word, count),
            RawWordCount::Entry { word, count } => (word, count),
        };
        Self {
            word,
            count: coerce_count(&count),
        }
    }
}

impl From<WordCount> for (String, i64) {
    fn from(value: WordCount) -> Self {
        (value.word, value.count)
    }
}

/// Numeric coercion for counts; anything that is not a number becomes zero.
pub fn coerce_count(value: &Value) -> i64 {
    match value {
        Value::Number(number) => {
            if let Some(count) = number.as_i64() {
                count
            } else if number.as_u64().is_some() {
                i64::MAX
            } else {
                number.as_f64().map(truncate_float).unwrap_or(0)
            }
        }
        Value::String(raw) => {
            let raw = raw.trim();
            if let Ok(count) = raw.parse::<i64>() {
                count
            } else {
                raw.parse::<f64>().map(truncate_float).unwrap_or(0)
            }
        }
        Value::Bool(flag) => i64::from(*flag),
        _ => 0,
    }
}

fn truncate_float(value: f64) -> i64 {
    if value.is_finite() { value.trunc() as i64 } else { 0 }
}

/// Gallery entry from `GET /uploads`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Upload {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub text: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub filename: String,
    pub created_at: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct UploadsResponse {
    #[serde(deserialize_with = "null_as_empty")]
    pub(crate) uploads: Vec<Upload>,
}

/// Response of `POST /ocr`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadResponse {
    #[serde(deserialize_with = "null_as_empty")]
    pub text: String,
}

/// Entry of the backend-wide `GET /top_words` ranking.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalWord {
    pub word: String,
    #[serde(deserialize_with = "lenient_count")]
    pub count: i64,
    #[serde(deserialize_with = "null_as_empty")]
    pub translation: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct GlobalWordsResponse {
    #[serde(deserialize_with = "null_as_empty")]
    pub(crate) top_words: Vec<GlobalWord>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct StatusResponse {
    pub(crate) status: Option<String>,
    pub(crate) error: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ErrorResponse {
    pub(crate) error: String,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn lenient_count<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(coerce_count(&Value::deserialize(deserializer)?))
}

fn id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(id) => id,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}
