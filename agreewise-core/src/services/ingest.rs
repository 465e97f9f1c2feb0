//! services/ingest.rs
//! Document ingestor: validates an uploaded file, extracts its text through a
//! pluggable extractor, and never leaves the upload on disk.

use std::io::{self, Write};
use std::path::Path;
use std::process::Command;

use thiserror::Error;

use crate::config::IngestConfig;

/// An uploaded file as received from the transport.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self { filename: filename.into(), bytes }
    }
}

/// Text pulled out of a validated upload.
#[derive(Debug, Clone)]
pub struct IngestedDocument {
    /// Sanitized filename.
    pub filename: String,
    pub text: String,
    /// blake3 hex digest of the uploaded bytes.
    pub content_hash: String,
    pub size: usize,
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to run {bin}: {source}")]
    Spawn {
        bin: String,
        #[source]
        source: io::Error,
    },
    #[error("{bin} exited with {status}: {stderr}")]
    Failed {
        bin: String,
        status: String,
        stderr: String,
    },
    #[error("extracted text is not valid UTF-8")]
    Encoding,
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("no file selected")]
    NoFileSelected,
    #[error("invalid file type: {filename}")]
    InvalidFileType { filename: String },
    #[error("payload of {size} bytes exceeds limit of {limit} bytes")]
    PayloadTooLarge { size: usize, limit: usize },
    #[error("temporary storage failed: {0}")]
    TempFile(#[from] io::Error),
    #[error("text extraction failed: {0}")]
    Extraction(#[from] ExtractError),
}

/// Turns a PDF on disk into plain text.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, pdf_path: &Path) -> Result<String, ExtractError>;
}

/// Shells out to poppler's `pdftotext`, reading the text from stdout.
#[derive(Debug, Clone)]
pub struct PdftotextExtractor {
    bin: String,
}

impl PdftotextExtractor {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }
}

impl TextExtractor for PdftotextExtractor {
    fn extract(&self, pdf_path: &Path) -> Result<String, ExtractError> {
        let output = Command::new(&self.bin)
            .arg("-enc")
            .arg("UTF-8")
            .arg(pdf_path)
            .arg("-")
            .output()
            .map_err(|source| ExtractError::Spawn {
                bin: self.bin.clone(),
                source,
            })?;
        if !output.status.success() {
            return Err(ExtractError::Failed {
                bin: self.bin.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        String::from_utf8(output.stdout).map_err(|_| ExtractError::Encoding)
    }
}

pub struct DocumentIngestor {
    config: IngestConfig,
    extractor: Box<dyn TextExtractor>,
}

impl DocumentIngestor {
    pub fn new(config: IngestConfig, extractor: Box<dyn TextExtractor>) -> Self {
        Self { config, extractor }
    }

    pub fn from_config(config: &IngestConfig) -> Self {
        let extractor = PdftotextExtractor::new(config.pdftotext_bin.clone());
        Self::new(config.clone(), Box::new(extractor))
    }

    /// The part after the last `.` must be an allowed extension (case-insensitive).
    pub fn is_allowed(&self, filename: &str) -> bool {
        match filename.rsplit_once('.') {
            Some((_, ext)) => self
                .config
                .allowed_extensions
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(ext)),
            None => false,
        }
    }

    /// Validate, spool to a temp file, extract. The temp file is removed on
    /// every path, including extraction failure.
    pub fn ingest(&self, file: &UploadedFile) -> Result<IngestedDocument, IngestError> {
        if file.bytes.len() > self.config.max_upload_bytes {
            return Err(IngestError::PayloadTooLarge {
                size: file.bytes.len(),
                limit: self.config.max_upload_bytes,
            });
        }
        if file.filename.is_empty() {
            return Err(IngestError::NoFileSelected);
        }
        if !self.is_allowed(&file.filename) {
            return Err(IngestError::InvalidFileType {
                filename: file.filename.clone(),
            });
        }

        let filename = secure_filename(&file.filename);
        let content_hash = blake3::hash(&file.bytes).to_hex().to_string();

        let mut temp = tempfile::Builder::new()
            .prefix("agreewise-")
            .suffix(".pdf")
            .tempfile()?;
        temp.write_all(&file.bytes)?;
        temp.flush()?;

        let extracted = self.extractor.extract(temp.path());
        // NamedTempFile deletes on drop; close explicitly to surface errors in logs.
        if let Err(e) = temp.close() {
            tracing::warn!(error = %e, "failed to remove temporary upload");
        }
        let text = extracted?;

        tracing::debug!(
            filename = %filename,
            bytes = file.bytes.len(),
            chars = text.chars().count(),
            "extracted document text"
        );

        Ok(IngestedDocument {
            filename,
            text,
            content_hash,
            size: file.bytes.len(),
        })
    }
}

/// Reduce a client-supplied filename to a safe single path component.
///
/// Keeps ASCII alphanumerics, `.`, `-` and `_`; whitespace becomes `_`;
/// leading dots and underscores are stripped so the result is never hidden
/// or a relative path.
pub fn secure_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or("");
    let cleaned: String = base
        .chars()
        .filter_map(|c| match c {
            c if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') => Some(c),
            c if c.is_whitespace() => Some('_'),
            _ => None,
        })
        .collect();
    cleaned.trim_start_matches(['.', '_']).to_string()
}
