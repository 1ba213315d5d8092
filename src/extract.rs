//! Per-file-type text extraction.
//!
//! Maps a file's extension to a loader capability and returns the extracted
//! (text, metadata) records. `.txt` files load as a single UTF-8 record;
//! `.pdf` files load one record per page with page-level metadata. Every
//! other extension has no loader and is reported as unsupported.

use serde_json::{Map, Value};
use std::path::Path;

use crate::models::SourceRecord;

pub const MIME_TEXT: &str = "text/plain";
pub const MIME_PDF: &str = "application/pdf";

pub const EXT_TXT: &str = ".txt";
pub const EXT_PDF: &str = ".pdf";

/// Extraction failure for a processing request.
#[derive(Debug)]
pub enum ExtractError {
    FileNotFound(String),
    UnsupportedFileType(String),
    Utf8(String),
    Pdf(String),
    Io(std::io::Error),
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::FileNotFound(path) => write!(f, "file not found: {}", path),
            ExtractError::UnsupportedFileType(ext) => {
                write!(f, "no loader for file type: {:?}", ext)
            }
            ExtractError::Utf8(e) => write!(f, "text file is not valid UTF-8: {}", e),
            ExtractError::Pdf(e) => write!(f, "PDF extraction failed: {}", e),
            ExtractError::Io(e) => write!(f, "io error: {}", e),
        }
    }
}

impl std::error::Error for ExtractError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExtractError::Io(e) => Some(e),
            _ => None,
        }
    }
}

/// Loader capability for a supported file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Loader {
    /// Whole-file UTF-8 text, one record.
    PlainText,
    /// Per-page PDF text with page metadata.
    Pdf,
}

/// Lowercase file extension including the leading dot, derived from the
/// final path segment. Files without an extension (including dotfiles like
/// `.gitignore`) yield an empty string.
pub fn extension_of(name: &str) -> String {
    let segment = name.rsplit(['/', '\\']).next().unwrap_or(name);
    match segment.rfind('.') {
        Some(pos) if pos > 0 => segment[pos..].to_ascii_lowercase(),
        _ => String::new(),
    }
}

/// Capability lookup: which loader, if any, handles this extension.
pub fn loader_for(extension: &str) -> Option<Loader> {
    match extension {
        EXT_TXT => Some(Loader::PlainText),
        EXT_PDF => Some(Loader::Pdf),
        _ => None,
    }
}

/// The content type a file with this extension is assumed to carry.
pub fn content_type_for(extension: &str) -> &'static str {
    match extension {
        EXT_PDF => MIME_PDF,
        _ => MIME_TEXT,
    }
}

/// Extracts the file's content as a sequence of records.
///
/// The existence check runs before loader resolution, so a missing file is
/// always `FileNotFound` regardless of its extension.
pub fn extract(path: &Path) -> Result<Vec<SourceRecord>, ExtractError> {
    if !path.exists() {
        return Err(ExtractError::FileNotFound(path.display().to_string()));
    }
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    match loader_for(&extension_of(&name)) {
        Some(Loader::PlainText) => extract_text_file(path),
        Some(Loader::Pdf) => extract_pdf(path),
        None => Err(ExtractError::UnsupportedFileType(extension_of(&name))),
    }
}

fn base_metadata(path: &Path) -> Map<String, Value> {
    let mut metadata = Map::new();
    metadata.insert(
        "source".to_string(),
        Value::String(path.display().to_string()),
    );
    metadata
}

fn extract_text_file(path: &Path) -> Result<Vec<SourceRecord>, ExtractError> {
    let bytes = std::fs::read(path).map_err(ExtractError::Io)?;
    let text = String::from_utf8(bytes).map_err(|e| ExtractError::Utf8(e.to_string()))?;
    Ok(vec![SourceRecord {
        text,
        metadata: base_metadata(path),
    }])
}

fn extract_pdf(path: &Path) -> Result<Vec<SourceRecord>, ExtractError> {
    let pages =
        pdf_extract::extract_text_by_pages(path).map_err(|e| ExtractError::Pdf(e.to_string()))?;
    Ok(pages
        .into_iter()
        .enumerate()
        .map(|(page, text)| {
            let mut metadata = base_metadata(path);
            metadata.insert("page".to_string(), Value::from(page as u64));
            SourceRecord { text, metadata }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn extension_is_lowercased_with_leading_dot() {
        assert_eq!(extension_of("report.TXT"), ".txt");
        assert_eq!(extension_of("a/b/slides.Pdf"), ".pdf");
        assert_eq!(extension_of("archive.tar.gz"), ".gz");
    }

    #[test]
    fn missing_extension_yields_empty_string() {
        assert_eq!(extension_of("README"), "");
        assert_eq!(extension_of(".gitignore"), "");
        assert_eq!(extension_of("dir.name/plain"), "");
    }

    #[test]
    fn loader_lookup_covers_supported_types_only() {
        assert_eq!(loader_for(".txt"), Some(Loader::PlainText));
        assert_eq!(loader_for(".pdf"), Some(Loader::Pdf));
        assert_eq!(loader_for(".docx"), None);
        assert_eq!(loader_for(""), None);
    }

    #[test]
    fn missing_file_is_file_not_found() {
        let err = extract(Path::new("/nonexistent/notes.txt")).unwrap_err();
        assert!(matches!(err, ExtractError::FileNotFound(_)));
    }

    #[test]
    fn unsupported_extension_is_reported() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data.csv");
        std::fs::write(&path, b"a,b,c").unwrap();

        let err = extract(&path).unwrap_err();
        assert!(matches!(err, ExtractError::UnsupportedFileType(ref ext) if ext == ".csv"));
    }

    #[test]
    fn text_file_loads_as_one_record() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("notes.txt");
        std::fs::write(&path, "hello world").unwrap();

        let records = extract(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].text, "hello world");
        let source = records[0].metadata.get("source").unwrap().as_str().unwrap();
        assert!(source.ends_with("notes.txt"));
    }

    #[test]
    fn invalid_utf8_text_fails() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.txt");
        std::fs::write(&path, [0xff, 0xfe, 0x00]).unwrap();

        let err = extract(&path).unwrap_err();
        assert!(matches!(err, ExtractError::Utf8(_)));
    }

    #[test]
    fn broken_pdf_fails_with_pdf_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("broken.pdf");
        std::fs::write(&path, b"not a pdf").unwrap();

        let err = extract(&path).unwrap_err();
        assert!(matches!(err, ExtractError::Pdf(_)));
    }
}
