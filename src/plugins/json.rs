//! # JSON Source
//!
//! Polls an HTTP endpoint that describes the current track as JSON (radio
//! station "now playing" APIs, scrobbler proxies, home-made widgets) and picks
//! fields out with JSON pointers.
//!
//! ```toml
//! [inputs.json]
//! url = "https://radio.example/api/nowplaying"
//! artist = "/now_playing/song/artist"   # default "/artist"
//! title = "/now_playing/song/title"     # default "/title"
//! image = "/now_playing/song/art"       # optional, stored as extra.image_url
//! retries = 2                           # extra attempts on transient errors
//! retry_delay = 1.0                     # seconds between attempts
//!
//! [inputs.json.headers]
//! Authorization = "Bearer ..."
//! ```
//!
//! The last good answer is kept for [`Source::cached_track`].

use anyhow::{Context as _, Result};
use log::{debug, warn};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use crate::error::NetworkError;
use crate::plugin::{Context, PluginOptions, Source};
use crate::track::Track;

pub const NAME: &str = "json";

fn default_artist() -> String {
    "/artist".to_string()
}

fn default_title() -> String {
    "/title".to_string()
}

fn default_retries() -> u32 {
    2
}

fn default_retry_delay() -> f64 {
    1.0
}

#[derive(Debug, Deserialize)]
struct Options {
    url: String,
    #[serde(default = "default_artist")]
    artist: String,
    #[serde(default = "default_title")]
    title: String,
    image: Option<String>,
    #[serde(default)]
    headers: BTreeMap<String, String>,
    #[serde(default = "default_retries")]
    retries: u32,
    #[serde(default = "default_retry_delay")]
    retry_delay: f64,
}

pub struct JsonSource {
    options: Options,
    retry_delay: Duration,
    priority: i32,
    last: Mutex<Option<Track>>,
}

pub fn build(options: &PluginOptions) -> Result<Arc<dyn Source>> {
    let parsed: Options = options.parse()?;
    let retry_delay = Duration::try_from_secs_f64(parsed.retry_delay)
        .with_context(|| format!("invalid retry_delay {}", parsed.retry_delay))?;

    Ok(Arc::new(JsonSource {
        options: parsed,
        retry_delay,
        priority: options.priority()?,
        last: Mutex::new(None),
    }))
}

impl JsonSource {
    /// Fetch the document, retrying transient failures.
    fn fetch(&self, ctx: &Context) -> Result<Vec<u8>, NetworkError> {
        let headers: Vec<(&str, &str)> = self
            .options
            .headers
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
            .collect();

        let mut attempt = 0;
        loop {
            match ctx.downloader().fetch(self.options.url.as_str(), &headers) {
                Ok(body) => return Ok(body),
                Err(error) if error.is_transient() && attempt < self.options.retries => {
                    attempt += 1;
                    warn!(
                        "{error}; retrying ({attempt}/{}) in {:.1}s",
                        self.options.retries,
                        self.retry_delay.as_secs_f64()
                    );
                    thread::sleep(self.retry_delay);
                }
                Err(error) => return Err(error),
            }
        }
    }
}

impl Source for JsonSource {
    fn name(&self) -> &str {
        NAME
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn grab_current(&self, ctx: &Context) -> Result<Option<Track>> {
        let body = self.fetch(ctx)?;
        let document: Value = serde_json::from_slice(&body)
            .with_context(|| format!("{} did not return valid JSON", self.options.url))?;

        let track = extract(&document, &self.options);
        match &track {
            Some(track) if track.is_valid() => {
                *self.last.lock().unwrap_or_else(PoisonError::into_inner) = Some(track.clone());
            }
            _ => debug!("No track in response from {}", self.options.url),
        }
        Ok(track)
    }

    fn cached_track(&self, _ctx: &Context) -> Result<Option<Track>> {
        Ok(self.last.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }
}

fn extract(document: &Value, options: &Options) -> Option<Track> {
    let artist = text_at(document, &options.artist)?;
    let title = text_at(document, &options.title)?;

    let mut track = Track::new(artist, title).with_source_id(NAME);
    if let Some(image_url) = options.image.as_deref().and_then(|ptr| text_at(document, ptr)) {
        track = track.with_extra("image_url", image_url);
    }
    Some(track)
}

/// Strings as-is, numbers and booleans via their JSON form.
fn text_at(document: &Value, pointer: &str) -> Option<String> {
    match document.pointer(pointer)? {
        Value::String(text) => Some(text.clone()),
        value @ (Value::Number(_) | Value::Bool(_)) => Some(value.to_string()),
        _ => None,
    }
}
