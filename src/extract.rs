//! Text extraction for the document formats the indexer understands.
//!
//! [`extract_text`] maps a file path to normalized plain text by extension. [`scan_directory`]
//! walks a tree and yields every file that extracted cleanly; unsupported or unreadable files
//! are logged and skipped so one bad document never aborts an index build.

use std::io::Read;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use quick_xml::events::Event;
use thiserror::Error;
use walkdir::WalkDir;

/// Upper bound on the decompressed size of `word/document.xml`.
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Errors raised while turning a file into text.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// File extension is not mapped to any extractor.
    #[error("unsupported file type: {0}")]
    Unsupported(String),
    /// File could not be read from disk.
    #[error("could not read {path}: {source}")]
    Io {
        /// File that failed to open or read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// PDF parser rejected the document.
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    /// PDF is encrypted and cannot be opened with an empty password.
    #[error("skipping encrypted PDF: {0}")]
    EncryptedPdf(String),
    /// DOCX container or XML body was malformed.
    #[error("DOCX extraction failed: {0}")]
    Docx(String),
    /// Format is recognized but no extractor is available for it.
    #[error("no extraction backend available for {0} files")]
    MissingBackend(&'static str),
}

/// Document formats recognized by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    /// `.txt`
    Text,
    /// `.md`, `.markdown`
    Markdown,
    /// `.csv`
    Csv,
    /// `.pdf`
    Pdf,
    /// `.docx`
    Docx,
    /// `.doc` (legacy binary Word)
    LegacyDoc,
}

impl DocumentFormat {
    /// Resolve the format from a path's extension, case-insensitively.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "txt" => Some(Self::Text),
            "md" | "markdown" => Some(Self::Markdown),
            "csv" => Some(Self::Csv),
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "doc" => Some(Self::LegacyDoc),
            _ => None,
        }
    }
}

/// Extract normalized text from the file at `path`.
pub fn extract_text(path: &Path) -> Result<String, ExtractError> {
    let format = DocumentFormat::from_path(path).ok_or_else(|| {
        ExtractError::Unsupported(
            path.extension()
                .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
                .unwrap_or_else(|| "<none>".to_string()),
        )
    })?;

    let raw = match format {
        DocumentFormat::LegacyDoc => return Err(ExtractError::MissingBackend(".doc")),
        DocumentFormat::Text | DocumentFormat::Markdown => decode_lossy(&read_bytes(path)?),
        DocumentFormat::Csv => decode_lossy(&read_bytes(path)?).replace(['\n', ','], " "),
        DocumentFormat::Pdf => extract_pdf(&read_bytes(path)?)?,
        DocumentFormat::Docx => extract_docx(&read_bytes(path)?)?,
    };

    Ok(clean_text(&raw))
}

/// Collapse every whitespace run into a single space and trim both ends.
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Walk `directory` recursively and yield `(path, text)` for every file that extracted cleanly.
///
/// Entries are visited in file-name order so repeated builds see documents in the same order.
pub fn scan_directory(directory: &Path) -> impl Iterator<Item = (PathBuf, String)> {
    WalkDir::new(directory)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(error) => {
                tracing::warn!(error = %error, "Skipping unreadable directory entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let path = entry.into_path();
            match extract_text(&path) {
                Ok(text) => {
                    tracing::debug!(file = %path.display(), chars = text.len(), "Extracted text");
                    Some((path, text))
                }
                Err(ExtractError::Unsupported(ext)) => {
                    tracing::debug!(file = %path.display(), ext = %ext, "Skipping unsupported file type");
                    None
                }
                Err(error) => {
                    tracing::warn!(file = %path.display(), error = %error, "Skipping file");
                    None
                }
            }
        })
}

fn read_bytes(path: &Path) -> Result<Vec<u8>, ExtractError> {
    std::fs::read(path).map_err(|source| ExtractError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn decode_lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .chars()
        .filter(|c| *c != char::REPLACEMENT_CHARACTER)
        .collect()
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    // pdf-extract panics on some malformed inputs instead of returning an error.
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem(bytes)
    }))
    .map_err(|_| ExtractError::Pdf("parser panicked on malformed document".to_string()))?;

    outcome.map_err(|error| {
        let message = error.to_string();
        if message.to_lowercase().contains("encrypt") {
            ExtractError::EncryptedPdf(message)
        } else {
            ExtractError::Pdf(message)
        }
    })
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ExtractError::Docx(e.to_string()))?;
    let entry = archive
        .by_name("word/document.xml")
        .map_err(|e| ExtractError::Docx(format!("word/document.xml: {e}")))?;

    let mut xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut xml)
        .map_err(|e| ExtractError::Docx(e.to_string()))?;
    if xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(ExtractError::Docx(
            "word/document.xml exceeds size limit".to_string(),
        ));
    }

    docx_body_text(&xml)
}

/// Concatenate `w:t` runs, separating paragraphs, tabs, and breaks with spaces.
fn docx_body_text(xml: &[u8]) -> Result<String, ExtractError> {
    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::Text(text)) if in_text => {
                let value = text
                    .unescape()
                    .map_err(|e| ExtractError::Docx(e.to_string()))?;
                out.push_str(&value);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => out.push(' '),
                _ => {}
            },
            Ok(Event::Empty(e)) if matches!(e.local_name().as_ref(), b"tab" | b"br") => {
                out.push(' ')
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Docx(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, bytes).unwrap();
        path
    }

    fn docx_bytes(document_xml: &str) -> Vec<u8> {
        let mut cursor = std::io::Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut cursor);
            writer
                .start_file(
                    "word/document.xml",
                    zip::write::SimpleFileOptions::default(),
                )
                .unwrap();
            writer.write_all(document_xml.as_bytes()).unwrap();
            writer.finish().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn clean_text_collapses_whitespace() {
        assert_eq!(clean_text("  a\n\n b\t\tc  "), "a b c");
        assert_eq!(clean_text("\n\t "), "");
    }

    #[test]
    fn format_detection_is_case_insensitive() {
        assert_eq!(
            DocumentFormat::from_path(Path::new("Report.PDF")),
            Some(DocumentFormat::Pdf)
        );
        assert_eq!(
            DocumentFormat::from_path(Path::new("notes.md")),
            Some(DocumentFormat::Markdown)
        );
        assert_eq!(DocumentFormat::from_path(Path::new("image.png")), None);
        assert_eq!(DocumentFormat::from_path(Path::new("Makefile")), None);
    }

    #[test]
    fn text_files_drop_invalid_utf8_and_normalize() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "a.txt", b"hello\xff\n\n  world");
        assert_eq!(extract_text(&path).unwrap(), "hello world");
    }

    #[test]
    fn csv_rows_and_fields_become_spaces() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "table.csv", b"name,role\nada,engineer\n");
        assert_eq!(extract_text(&path).unwrap(), "name role ada engineer");
    }

    #[test]
    fn docx_paragraphs_are_space_separated() {
        let dir = TempDir::new().unwrap();
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p><w:r><w:t>Quarterly</w:t></w:r><w:r><w:t xml:space="preserve"> report</w:t></w:r></w:p>
    <w:p><w:r><w:t>Revenue &amp; costs</w:t></w:r></w:p>
  </w:body>
</w:document>"#;
        let path = write_file(&dir, "report.docx", &docx_bytes(xml));
        assert_eq!(extract_text(&path).unwrap(), "Quarterly report Revenue & costs");
    }

    #[test]
    fn broken_docx_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "broken.docx", b"not a zip");
        assert!(matches!(extract_text(&path), Err(ExtractError::Docx(_))));
    }

    #[test]
    fn invalid_pdf_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "broken.pdf", b"not a pdf");
        assert!(matches!(
            extract_text(&path),
            Err(ExtractError::Pdf(_) | ExtractError::EncryptedPdf(_))
        ));
    }

    #[test]
    fn legacy_doc_and_unknown_types_are_rejected() {
        let dir = TempDir::new().unwrap();
        let doc = write_file(&dir, "old.doc", b"\xd0\xcf\x11\xe0");
        let png = write_file(&dir, "pic.png", b"\x89PNG");
        assert!(matches!(
            extract_text(&doc),
            Err(ExtractError::MissingBackend(".doc"))
        ));
        assert!(matches!(
            extract_text(&png),
            Err(ExtractError::Unsupported(ext)) if ext == ".png"
        ));
    }

    #[test]
    fn scan_directory_yields_only_extractable_files_in_order() {
        let dir = TempDir::new().unwrap();
        write_file(&dir, "b.txt", b"second");
        write_file(&dir, "a.txt", b"first");
        write_file(&dir, "nested/c.md", b"# third");
        write_file(&dir, "skip.bin", b"\x00\x01");
        write_file(&dir, "bad.pdf", b"garbage");
        write_file(&dir, "old.doc", b"garbage");

        let found: Vec<(String, String)> = scan_directory(dir.path())
            .map(|(path, text)| {
                (
                    path.file_name().unwrap().to_string_lossy().into_owned(),
                    text,
                )
            })
            .collect();

        assert_eq!(
            found,
            vec![
                ("a.txt".to_string(), "first".to_string()),
                ("b.txt".to_string(), "second".to_string()),
                ("c.md".to_string(), "# third".to_string()),
            ]
        );
    }

    #[test]
    fn scan_directory_tolerates_missing_root() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        assert_eq!(scan_directory(&missing).count(), 0);
    }
}
