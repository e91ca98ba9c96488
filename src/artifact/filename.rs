//! Local filename for a downloaded artifact

use std::path::Path;

use reqwest::Url;

use crate::error::{Error, Result};

const CONTENT_DISPOSITION_PARAM: &str = "response-content-disposition";

/// Filename to store the artifact at `href` under.
///
/// Pre-signed links usually carry a `response-content-disposition` query
/// value (`attachment; filename="game.zip"`); its `filename` wins over the
/// last path segment. Only the final path component is kept.
pub fn artifact_filename(href: &str) -> Result<String> {
    let url = Url::parse(href).map_err(|e| Error::Integrity(format!("invalid download link {}: {}", href, e)))?;

    let from_disposition = url
        .query_pairs()
        .find(|(k, _)| k == CONTENT_DISPOSITION_PARAM)
        .and_then(|(_, v)| disposition_filename(&v));

    let candidate = from_disposition.or_else(|| {
        url.path_segments()
            .and_then(|mut segments| segments.next_back().map(str::to_string))
    });

    candidate
        .as_deref()
        .and_then(|name| Path::new(name).file_name())
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty() && *name != "..")
        .map(str::to_string)
        .ok_or_else(|| Error::Integrity(format!("cannot derive a filename from {}", href)))
}

fn disposition_filename(disposition: &str) -> Option<String> {
    disposition.split(';').map(str::trim).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        if !name.trim().eq_ignore_ascii_case("filename") {
            return None;
        }
        let value = value.trim().trim_matches('"');
        (!value.is_empty()).then(|| value.to_string())
    })
}
