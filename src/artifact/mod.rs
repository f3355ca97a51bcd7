//! React artifacts extracted from chat message text.
//!
//! DESIGN
//! ======
//! A `ReactArtifactCandidate` is the transient result of scanning a message
//! for a fenced code block. `build_artifact` turns a candidate into the
//! persisted `ReactArtifact`, whose id is derived from the originating
//! message so re-parsing the same message yields the same identity.

pub mod parse;

use serde::{Deserialize, Serialize};

pub use parse::{build_artifact, infer_title, parse_react_artifact};

/// Title used when the code declares no named function.
pub const FALLBACK_TITLE: &str = "React Artifact";

/// Source dialects accepted from fenced code blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactLanguage {
    Tsx,
    Jsx,
}

impl ArtifactLanguage {
    /// Map a fence language tag (first whitespace-delimited token,
    /// case-insensitive) to a supported dialect.
    #[must_use]
    pub fn from_fence_tag(tag: &str) -> Option<Self> {
        let token = tag.split_whitespace().next()?.to_ascii_lowercase();
        match token.as_str() {
            "tsx" | "react" => Some(Self::Tsx),
            "jsx" => Some(Self::Jsx),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tsx => "tsx",
            Self::Jsx => "jsx",
        }
    }
}

/// Ephemeral parse result. Never persisted directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactArtifactCandidate {
    pub code: String,
    pub language: ArtifactLanguage,
    pub title: Option<String>,
}

/// The persisted/working unit. Serialized as camelCase JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactArtifact {
    pub id: String,
    pub title: String,
    pub code: String,
    pub language: ArtifactLanguage,
    pub source_message_id: String,
    /// RFC 3339 timestamp, refreshed on every mutation.
    pub updated_at: String,
}

impl ReactArtifact {
    /// Replace the code and refresh `updated_at`.
    pub fn set_code(&mut self, code: impl Into<String>) {
        self.code = code.into();
        self.touch();
    }

    pub fn touch(&mut self) {
        self.updated_at = now_rfc3339();
    }
}

/// Current UTC time as an RFC 3339 string.
#[must_use]
pub fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default()
}
