//! Chat answers: the live shapes an agent produces and the one portable
//! shape that gets stored.
//!
//! [`normalize`] is the only way from [`Answer`] to [`StoredAnswer`]. Older
//! stored encodings are migrated once, when a history is deserialized.

use crate::normalize::AnalysisValue;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use image::ImageFormat;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::warn;

pub const CHART_PLACEHOLDER: &str = "[chart could not be rendered]";
pub const LEGACY_OBJECT_PLACEHOLDER: &str = "[chart from an older version is no longer available]";

/// A rendered chart held in memory for the duration of one interaction.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartImage {
    pub bytes: Vec<u8>,
}

/// What an agent hands back for one question.
#[derive(Debug, Clone, PartialEq)]
pub enum Answer {
    Text(String),
    /// Computed result, still carrying analysis-side numeric types.
    Value(AnalysisValue),
    /// Plotly-style figure description built from table data.
    Figure(AnalysisValue),
    ChartImage(ChartImage),
    /// Path to an image the agent wrote to disk.
    LegacyPath(PathBuf),
    /// The agent ran but could not answer.
    Fatal(String),
}

/// Canonical stored answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoredAnswer {
    Text { content: String },
    Base64Image { data: String },
    PlotlyJson { data: Value },
    Data { data: Value },
    Error { message: String },
}

impl StoredAnswer {
    pub fn text(content: impl Into<String>) -> Self {
        StoredAnswer::Text {
            content: content.into(),
        }
    }

    /// One-line description for conversational memory and logs.
    pub fn summary(&self) -> String {
        match self {
            StoredAnswer::Text { content } => content.clone(),
            StoredAnswer::Base64Image { .. } => "[chart image]".to_string(),
            StoredAnswer::PlotlyJson { data } => {
                let title = data
                    .pointer("/layout/title/text")
                    .and_then(Value::as_str)
                    .unwrap_or("untitled");
                format!("[chart: {}]", title)
            }
            StoredAnswer::Data { data } => match data {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            },
            StoredAnswer::Error { message } => format!("[error: {}]", message),
        }
    }

    /// Read any historical encoding of an answer.
    ///
    /// Tagged records load unchanged. A bare string is the oldest format: it
    /// is either text or the path of a chart image on disk. Any other shape
    /// is a dump of a live plot object and cannot be reconstructed.
    pub fn migrate(raw: Value) -> Self {
        if raw.get("type").is_some() {
            match serde_json::from_value::<StoredAnswer>(raw.clone()) {
                Ok(answer) => return answer,
                Err(err) => warn!(error = %err, "unrecognised tagged answer, replacing with placeholder"),
            }
        }
        match raw {
            Value::String(s) if looks_like_image_path(&s) && Path::new(&s).is_file() => {
                embed_image_file(Path::new(&s))
            }
            Value::String(s) => StoredAnswer::Text { content: s },
            Value::Null => StoredAnswer::text(""),
            Value::Object(_) => StoredAnswer::text(LEGACY_OBJECT_PLACEHOLDER),
            other => StoredAnswer::Data { data: other },
        }
    }
}

/// A question and its stored answer. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatEntry {
    pub question: String,
    #[serde(deserialize_with = "deserialize_migrating")]
    pub answer: StoredAnswer,
}

impl ChatEntry {
    pub fn new(question: impl Into<String>, answer: StoredAnswer) -> Self {
        Self {
            question: question.into(),
            answer,
        }
    }
}

fn deserialize_migrating<'de, D>(deserializer: D) -> Result<StoredAnswer, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    Ok(StoredAnswer::migrate(raw))
}

/// Turn a live answer into its portable form, consuming it.
///
/// Chart conversion failures degrade to a text placeholder.
pub fn normalize(answer: Answer) -> StoredAnswer {
    match answer {
        Answer::Text(content) => StoredAnswer::Text { content },
        Answer::Value(value) => StoredAnswer::Data {
            data: value.to_portable(),
        },
        Answer::Figure(figure) => StoredAnswer::PlotlyJson {
            data: figure.to_portable(),
        },
        Answer::ChartImage(chart) => match encode_png(&chart.bytes) {
            Ok(data) => StoredAnswer::Base64Image { data },
            Err(err) => {
                warn!(error = %err, "chart image conversion failed");
                StoredAnswer::text(CHART_PLACEHOLDER)
            }
        },
        Answer::LegacyPath(path) => embed_image_file(&path),
        Answer::Fatal(message) => StoredAnswer::Error { message },
    }
}

fn embed_image_file(path: &Path) -> StoredAnswer {
    let encoded = std::fs::read(path)
        .map_err(image::ImageError::IoError)
        .and_then(|bytes| encode_png(&bytes));
    match encoded {
        Ok(data) => StoredAnswer::Base64Image { data },
        Err(err) => {
            warn!(path = %path.display(), error = %err, "chart file could not be embedded");
            StoredAnswer::text(CHART_PLACEHOLDER)
        }
    }
}

/// Base64 of the image as PNG, re-encoding other raster formats.
fn encode_png(bytes: &[u8]) -> Result<String, image::ImageError> {
    let decoded = image::load_from_memory(bytes)?;
    if image::guess_format(bytes)? == ImageFormat::Png {
        return Ok(BASE64.encode(bytes));
    }
    let mut png = Cursor::new(Vec::new());
    decoded.write_to(&mut png, ImageFormat::Png)?;
    Ok(BASE64.encode(png.into_inner()))
}

fn looks_like_image_path(s: &str) -> bool {
    let lower = s.to_ascii_lowercase();
    [".png", ".jpg", ".jpeg"].iter().any(|ext| lower.ends_with(ext))
}
