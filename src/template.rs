//! # Templates
//!
//! Tiny placeholder language shared by the `file` and `command` sinks and the
//! `cover` processor.
//!
//! | Placeholder     | Value                                     |
//! |-----------------|-------------------------------------------|
//! | `{artist}`      | artist                                    |
//! | `{title}`       | title                                     |
//! | `{source}`      | source id, empty when unknown             |
//! | `{image}`       | image path, empty when unknown            |
//! | `{extra.KEY}`   | extra value `KEY`, empty when missing     |
//!
//! `{{` and `}}` produce literal braces. Anything else in braces is copied
//! through untouched, so shell snippets like `${HOME}` survive rendering.
//!
//! ```
//! use nowplaying::template::render;
//! use nowplaying::track::Track;
//!
//! let track = Track::new("Muse", "Madness").with_extra("year", 2012);
//! assert_eq!(render("{artist} - {title} ({extra.year})", &track), "Muse - Madness (2012)");
//! assert_eq!(render("{{artist}} {unknown}", &track), "{artist} {unknown}");
//! ```

use crate::track::Track;

/// Render `template` for `track`.
pub fn render(template: &str, track: &Track) -> String {
    let mut out = String::with_capacity(template.len() + 32);
    let mut rest = template;

    while let Some(pos) = rest.find(['{', '}']) {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        if tail.starts_with("{{") {
            out.push('{');
            rest = &tail[2..];
        } else if tail.starts_with("}}") {
            out.push('}');
            rest = &tail[2..];
        } else if tail.starts_with('{') {
            match tail.find('}') {
                Some(end) => {
                    let key = &tail[1..end];
                    match lookup(key, track) {
                        Some(value) => out.push_str(&value),
                        None => out.push_str(&tail[..=end]),
                    }
                    rest = &tail[end + 1..];
                }
                None => {
                    out.push_str(tail);
                    rest = "";
                }
            }
        } else {
            out.push('}');
            rest = &tail[1..];
        }
    }

    out.push_str(rest);
    out
}

fn lookup(key: &str, track: &Track) -> Option<String> {
    match key {
        "artist" => Some(track.artist.clone()),
        "title" => Some(track.title.clone()),
        "source" => Some(track.source_id.clone().unwrap_or_default()),
        "image" => Some(track.image_path.clone().unwrap_or_default()),
        _ => key
            .strip_prefix("extra.")
            .map(|name| track.extra_str(name).unwrap_or_default()),
    }
}
