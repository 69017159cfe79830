//! Inline and remote media references.
//!
//! Requests carry audio, images and background videos as plain strings:
//! either a `data:<mime>;base64,<payload>` URI or an http(s) URL.

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ModelError, ModelResult};

/// A decoded `data:` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    mime_type: String,
    bytes: Vec<u8>,
}

impl DataUri {
    /// Parse a base64 data URI (`data:audio/mpeg;base64,....`).
    pub fn parse(input: &str) -> ModelResult<Self> {
        let rest = input
            .trim()
            .strip_prefix("data:")
            .ok_or_else(|| ModelError::invalid_data_uri("missing 'data:' prefix"))?;

        let (meta, payload) = rest
            .split_once(',')
            .ok_or_else(|| ModelError::invalid_data_uri("missing ',' separator"))?;

        let mut params = meta.split(';');
        let mime_type = params.next().unwrap_or_default().trim().to_ascii_lowercase();
        if !params.any(|p| p.trim().eq_ignore_ascii_case("base64")) {
            return Err(ModelError::invalid_data_uri("only base64 payloads are supported"));
        }

        // Some encoders wrap long payloads
        let payload: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
        if payload.is_empty() {
            return Err(ModelError::invalid_data_uri("empty payload"));
        }

        let bytes = STANDARD
            .decode(payload.as_bytes())
            .map_err(|e| ModelError::invalid_data_uri(e.to_string()))?;

        Ok(Self {
            mime_type: if mime_type.is_empty() {
                "application/octet-stream".to_string()
            } else {
                mime_type
            },
            bytes,
        })
    }

    /// Build a data URI from raw bytes.
    pub fn from_bytes(mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            bytes,
        }
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// File extension matching the MIME type, if known.
    pub fn extension(&self) -> Option<&'static str> {
        extension_for_mime(&self.mime_type)
    }
}

impl fmt::Display for DataUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "data:{};base64,{}", self.mime_type, STANDARD.encode(&self.bytes))
    }
}

/// Reference to a media asset, either embedded or fetchable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum MediaSource {
    /// Inline bytes carried in the request
    Inline(DataUri),
    /// Remote http(s) resource
    Remote(Url),
}

impl MediaSource {
    /// Parse a data URI or an http(s) URL.
    pub fn parse(input: &str) -> ModelResult<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ModelError::unsupported_source("empty media reference"));
        }

        if trimmed.starts_with("data:") {
            return DataUri::parse(trimmed).map(Self::Inline);
        }

        let url = Url::parse(trimmed)
            .map_err(|e| ModelError::unsupported_source(format!("{}: {}", trimmed, e)))?;
        match url.scheme() {
            "http" | "https" => Ok(Self::Remote(url)),
            other => Err(ModelError::unsupported_source(format!(
                "scheme '{}' is not supported",
                other
            ))),
        }
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, MediaSource::Inline(_))
    }

    pub fn as_remote(&self) -> Option<&Url> {
        match self {
            MediaSource::Remote(url) => Some(url),
            MediaSource::Inline(_) => None,
        }
    }

    pub fn as_inline(&self) -> Option<&DataUri> {
        match self {
            MediaSource::Inline(data) => Some(data),
            MediaSource::Remote(_) => None,
        }
    }

    /// Short description for logs (never includes inline payloads).
    pub fn describe(&self) -> String {
        match self {
            MediaSource::Inline(data) => {
                format!("inline {} ({} bytes)", data.mime_type(), data.bytes().len())
            }
            MediaSource::Remote(url) => url.to_string(),
        }
    }
}

impl TryFrom<String> for MediaSource {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<MediaSource> for String {
    fn from(source: MediaSource) -> Self {
        match source {
            MediaSource::Inline(data) => data.to_string(),
            MediaSource::Remote(url) => url.into(),
        }
    }
}

impl JsonSchema for MediaSource {
    fn schema_name() -> String {
        "MediaSource".to_string()
    }

    fn json_schema(gen: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
        String::json_schema(gen)
    }
}

/// Map a MIME type to a file extension.
pub fn extension_for_mime(mime_type: &str) -> Option<&'static str> {
    let essence = mime_type.split(';').next().unwrap_or_default().trim();
    match essence.to_ascii_lowercase().as_str() {
        "audio/mpeg" | "audio/mp3" => Some("mp3"),
        "audio/wav" | "audio/x-wav" | "audio/wave" => Some("wav"),
        "audio/ogg" => Some("ogg"),
        "audio/aac" => Some("aac"),
        "audio/mp4" | "audio/x-m4a" => Some("m4a"),
        "image/png" => Some("png"),
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        "video/mp4" => Some("mp4"),
        _ => None,
    }
}
