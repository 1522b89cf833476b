//! Utility functions for filenames and path manipulation

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Longest sanitized filename stem, in characters
pub const MAX_FILENAME_LEN: usize = 200;

/// Longest title substituted into a filename template, in characters
pub const MAX_TITLE_LEN: usize = 100;

/// Longest owner name substituted into a filename template, in characters
pub const MAX_OWNER_LEN: usize = 50;

/// Extension used when the URL does not carry one
pub const DEFAULT_EXTENSION: &str = ".jpg";

const WINDOWS_RESERVED: [&str; 22] = [
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

fn reserved_chars() -> &'static Regex {
    static RESERVED: OnceLock<Regex> = OnceLock::new();
    RESERVED.get_or_init(|| {
        #[allow(clippy::expect_used)]
        Regex::new(r#"[<>:"/\\|?*\x00-\x1f]"#).expect("reserved character pattern is valid")
    })
}

/// Make a string safe to use as a filename on every common filesystem
///
/// Reserved characters and control characters become `_`, leading and trailing
/// spaces and dots are stripped, Windows device names get a `_` prefix, and the
/// result is cut to [`MAX_FILENAME_LEN`] characters. Empty input yields `photo`.
///
/// # Examples
///
/// ```
/// use flickr_dl::utils::sanitize_filename;
///
/// assert_eq!(sanitize_filename("a/b:c?"), "a_b_c_");
/// assert_eq!(sanitize_filename(" ..hidden. "), "hidden");
/// assert_eq!(sanitize_filename("CON"), "_CON");
/// assert_eq!(sanitize_filename("   "), "photo");
/// ```
pub fn sanitize_filename(name: &str) -> String {
    let replaced = reserved_chars().replace_all(name, "_");
    let trimmed = replaced.trim_matches(|c| c == ' ' || c == '.');

    let mut clean = if WINDOWS_RESERVED.contains(&trimmed.to_ascii_uppercase().as_str()) {
        format!("_{trimmed}")
    } else {
        trimmed.to_string()
    };

    if clean.chars().count() > MAX_FILENAME_LEN {
        clean = truncate_chars(&clean, MAX_FILENAME_LEN).to_string();
    }

    if clean.is_empty() {
        "photo".to_string()
    } else {
        clean
    }
}

/// First `max` characters of `s`, never splitting a UTF-8 sequence
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// File extension (with the dot) of the last path segment of a URL
///
/// Falls back to [`DEFAULT_EXTENSION`] when the URL has none or cannot be parsed.
///
/// ```
/// use flickr_dl::utils::extension_from_url;
///
/// assert_eq!(extension_from_url("https://live.staticflickr.com/1/2_abc_b.png?x=1"), ".png");
/// assert_eq!(extension_from_url("https://example.com/photo"), ".jpg");
/// ```
pub fn extension_from_url(url: &str) -> String {
    let path = match url::Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_string(),
    };

    Path::new(&path)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.chars().all(char::is_alphanumeric))
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}

fn template_placeholders() -> &'static Regex {
    static PLACEHOLDERS: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDERS.get_or_init(|| {
        #[allow(clippy::expect_used)]
        Regex::new(r"\{(id|title|owner)\}").expect("placeholder pattern is valid")
    })
}

/// Fill a filename template and sanitize the result (without extension)
///
/// Supported placeholders are `{id}`, `{title}` and `{owner}`. Titles and owner
/// names are shortened before substitution; empty values become `untitled` and
/// `unknown`.
pub fn render_filename(template: &str, id: &str, title: &str, owner: &str) -> String {
    let title = match truncate_chars(title.trim(), MAX_TITLE_LEN) {
        "" => "untitled",
        t => t,
    };
    let owner = match truncate_chars(owner.trim(), MAX_OWNER_LEN) {
        "" => "unknown",
        o => o,
    };

    // one pass, so braces inside the values are never expanded
    let rendered = template_placeholders().replace_all(template, |caps: &regex::Captures<'_>| {
        match &caps[1] {
            "id" => id,
            "title" => title,
            _ => owner,
        }
    });

    sanitize_filename(&rendered)
}

/// Whether a filename refers to a JPEG image
pub fn is_jpeg(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg"))
}

/// Path of the staging directory for a job inside the work directory
pub fn staging_dir(work_dir: &Path, job_id: &str) -> PathBuf {
    work_dir.join(format!("job_{job_id}"))
}

/// Path of the finished archive for a job inside the work directory
pub fn archive_path(work_dir: &Path, job_id: &str) -> PathBuf {
    work_dir.join(archive_file_name(job_id))
}

/// Name under which an archive is offered for download
pub fn archive_file_name(job_id: &str) -> String {
    format!("flickr_photos_{job_id}.zip")
}
