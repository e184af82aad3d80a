//! Upload intake: the CSV file candidate and its type/size validation.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Default upload ceiling (10 MB).
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

const CSV_MEDIA_TYPES: &[&str] = &["text/csv", "application/csv"];

/// A file offered for training, before validation. The size is always the
/// length of the content.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadCandidate {
    name: String,
    media_type: String,
    bytes: Vec<u8>,
}

impl UploadCandidate {
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            bytes,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn into_parts(self) -> (String, String, Vec<u8>) {
        (self.name, self.media_type, self.bytes)
    }
}

/// Failure to turn a path on disk into an upload candidate.
#[derive(Debug, Error)]
pub enum UploadReadError {
    #[error(transparent)]
    Rejected(#[from] UploadRejection),
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Reasons a candidate is refused before it enters the workflow.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum UploadRejection {
    #[error("`{name}` is not a CSV file (media type `{media_type}`)")]
    InvalidType { name: String, media_type: String },
    #[error("`{name}` is {size_bytes} bytes; the limit is {max_bytes} bytes")]
    TooLarge {
        name: String,
        size_bytes: u64,
        max_bytes: u64,
    },
}

/// A candidate that passed [`FileValidator::validate`].
///
/// Only the validator constructs this, so holding one proves the checks ran.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AcceptedUpload(UploadCandidate);

impl AcceptedUpload {
    pub fn name(&self) -> &str {
        self.0.name()
    }

    pub fn size_bytes(&self) -> u64 {
        self.0.size_bytes()
    }

    pub fn media_type(&self) -> &str {
        self.0.media_type()
    }

    pub fn into_inner(self) -> UploadCandidate {
        self.0
    }
}

/// Checks type and size of upload candidates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FileValidator {
    max_bytes: u64,
}

impl Default for FileValidator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_UPLOAD_BYTES)
    }
}

impl FileValidator {
    pub fn new(max_bytes: u64) -> Self {
        Self { max_bytes }
    }

    /// Accept the candidate or explain why it was refused. Type is checked first.
    pub fn validate(&self, candidate: UploadCandidate) -> Result<AcceptedUpload, UploadRejection> {
        check_type(&candidate.name, &candidate.media_type)?;
        self.check_size(&candidate.name, candidate.size_bytes())?;
        Ok(AcceptedUpload(candidate))
    }

    /// Read a candidate from disk, guessing the media type from the extension.
    ///
    /// Type and on-disk size are checked before any content is read, and the
    /// read stops one byte past the limit in case the file grew meanwhile.
    pub fn read_path(&self, path: &Path) -> Result<UploadCandidate, UploadReadError> {
        let io_error = |source| UploadReadError::Io {
            path: path.to_path_buf(),
            source,
        };
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let media_type = if has_csv_extension(&name) {
            "text/csv"
        } else {
            "application/octet-stream"
        };
        check_type(&name, media_type)?;
        let declared = std::fs::metadata(path).map_err(io_error)?.len();
        self.check_size(&name, declared)?;

        let mut bytes = Vec::new();
        File::open(path)
            .map_err(io_error)?
            .take(self.max_bytes.saturating_add(1))
            .read_to_end(&mut bytes)
            .map_err(io_error)?;
        self.check_size(&name, bytes.len() as u64)?;
        Ok(UploadCandidate::new(name, media_type, bytes))
    }

    fn check_size(&self, name: &str, size_bytes: u64) -> Result<(), UploadRejection> {
        if size_bytes > self.max_bytes {
            return Err(UploadRejection::TooLarge {
                name: name.to_string(),
                size_bytes,
                max_bytes: self.max_bytes,
            });
        }
        Ok(())
    }
}

fn check_type(name: &str, media_type: &str) -> Result<(), UploadRejection> {
    if is_csv_media_type(media_type) || has_csv_extension(name) {
        return Ok(());
    }
    Err(UploadRejection::InvalidType {
        name: name.to_string(),
        media_type: media_type.to_string(),
    })
}

fn is_csv_media_type(media_type: &str) -> bool {
    let essence = media_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    CSV_MEDIA_TYPES.contains(&essence.as_str())
}

fn has_csv_extension(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}

/// Human-readable size used in selection log entries, e.g. `5.00 KB`.
pub fn format_kilobytes(size_bytes: u64) -> String {
    format!("{:.2} KB", size_bytes as f64 / 1024.0)
}
