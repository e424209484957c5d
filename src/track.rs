//! # Track Records
//!
//! A [`Track`] is the "currently playing" fact that flows through the
//! pipeline: produced by a source, optionally replaced by processors, and
//! handed to every sink.
//!
//! Tracks are value objects. Stages receive a shared borrow and, when they
//! want to change something, build a new `Track` (usually with one of the
//! `with_*` helpers below) instead of mutating the one they were given.
//!
//! ## Equivalence
//!
//! Two tracks are *equivalent* when their trimmed artist and title are equal.
//! Source id, image path and extras are ignored, so an enrichment step never
//! makes an unchanged song look new:
//!
//! ```
//! use nowplaying::track::{Track, equivalent};
//!
//! let a = Track::new("Muse", "Madness");
//! let b = Track::new("Muse", "Madness").with_image_path("/tmp/cover.jpg");
//!
//! assert!(equivalent(Some(&a), Some(&b)));
//! assert!(equivalent(None, None));
//! assert!(!equivalent(Some(&a), None));
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// What is playing right now.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Performing artist, empty when unknown
    pub artist: String,
    /// Song title
    pub title: String,
    /// Type name of the source that produced this track
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    /// Path of an associated image (cover art), if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
    /// Free-form annotations added by sources and processors
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
}

impl Track {
    pub fn new(artist: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            artist: artist.into(),
            title: title.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_source_id(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }

    #[must_use]
    pub fn with_image_path(mut self, image_path: impl Into<String>) -> Self {
        self.image_path = Some(image_path.into());
        self
    }

    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// A track is valid when both artist and title are non-blank.
    pub fn is_valid(&self) -> bool {
        !self.artist.trim().is_empty() && !self.title.trim().is_empty()
    }

    /// Same song as `other`, ignoring everything but artist and title.
    pub fn is_equivalent(&self, other: &Track) -> bool {
        self.artist.trim() == other.artist.trim() && self.title.trim() == other.title.trim()
    }

    /// String view of an extra value; non-string values are rendered as JSON.
    pub fn extra_str(&self, key: &str) -> Option<String> {
        self.extra.get(key).map(|value| match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.artist.trim(), self.title.trim())
    }
}

/// Equivalence over optional tracks; absent matches only absent.
pub fn equivalent(a: Option<&Track>, b: Option<&Track>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a.is_equivalent(b),
        _ => false,
    }
}

/// Drops invalid tracks, so callers only ever see "a valid track" or "nothing".
pub fn validated(track: Option<Track>) -> Option<Track> {
    track.filter(Track::is_valid)
}
