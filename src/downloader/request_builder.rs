// Download request builder
//
// Final assembly step: sanitized filename, per-request output path and the
// DownloadInstruction handed to the engine backend.

use std::path::{Path, PathBuf};

use regex::Regex;
use uuid::Uuid;

use super::models::{DownloadInstruction, MediaCatalog, PostProcessingPlan, SelectionResult};

lazy_static::lazy_static! {
    static ref UNSAFE_CHARS: Regex = Regex::new(r"[^A-Za-z0-9]").unwrap();
}

/// Stem used when the title has no characters at all
const EMPTY_TITLE_STEM: &str = "download";

/// Replace every character outside `[A-Za-z0-9]` with `_` and lowercase.
pub fn sanitize_title(title: &str) -> String {
    UNSAFE_CHARS.replace_all(title, "_").to_lowercase()
}

/// Client-visible filename: `<sanitized title>.<container>`
pub fn output_filename(title: &str, container: &str) -> String {
    let stem = sanitize_title(title);
    let stem = if stem.is_empty() {
        EMPTY_TITLE_STEM.to_string()
    } else {
        stem
    };
    format!("{}.{}", stem, container)
}

pub struct RequestBuilder {
    downloads_dir: PathBuf,
}

impl RequestBuilder {
    pub fn new(downloads_dir: impl Into<PathBuf>) -> Self {
        Self {
            downloads_dir: downloads_dir.into(),
        }
    }

    pub fn downloads_dir(&self) -> &Path {
        &self.downloads_dir
    }

    /// Build the engine instruction and the client filename for one request.
    ///
    /// The file lands in `<downloads_dir>/<request_id>/<filename>`.
    pub fn build(
        &self,
        url: &str,
        catalog: &MediaCatalog,
        selection: &SelectionResult,
        plan: PostProcessingPlan,
        request_id: Uuid,
    ) -> (DownloadInstruction, String) {
        let filename = output_filename(&catalog.title, &selection.output_container);
        let output_path = self
            .downloads_dir
            .join(request_id.to_string())
            .join(&filename);

        let merge_container = selection
            .mode
            .is_combined()
            .then(|| selection.output_container.clone());

        let instruction = DownloadInstruction {
            url: url.to_string(),
            output_path,
            format_expression: selection.format_expression.clone(),
            merge_container,
            output_container: selection.output_container.clone(),
            post_processing: plan,
        };

        (instruction, filename)
    }
}
