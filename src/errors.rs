//! Error types for binding resolution and the round-trip check.
//!
//! [`BindingError`] is fatal: `main` refuses to serve when the platform
//! hands us a broken binding.  [`CheckError`] only ends the current
//! `/ping` request; each variant knows the lines it contributes to the
//! plain-text report.

use std::path::PathBuf;
use thiserror::Error;

/// Problems found while resolving the blob service binding at startup.
#[derive(Debug, Error)]
pub enum BindingError {
    /// Services are bound, but none carries the wanted label.
    #[error("No {label} service found!!")]
    NoMatchingService { label: String },

    /// A required credential key is absent or empty.
    #[error("service '{service}' is missing credential '{key}'")]
    MissingCredential { service: String, key: &'static str },

    /// A credential value is not a string.
    #[error("service '{service}' has a non-string value for credential '{key}'")]
    InvalidCredential { service: String, key: &'static str },

    /// A platform environment variable holds malformed JSON.
    #[error("could not parse {var}: {source}")]
    MalformedEnv {
        var: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Why a round-trip check stopped early.
#[derive(Debug, Error)]
pub enum CheckError {
    /// No blob service is bound, so there is nothing to check.
    #[error("not bound to a blob service")]
    Unbound,

    /// The fixture could not be opened or the scratch file created.
    #[error("could not open local files {} and {}: {source}", input.display(), scratch.display())]
    OpenLocalFiles {
        input: PathBuf,
        scratch: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A local file could not be stat'ed.
    #[error("could not calculate the size of {}: {source}", path.display())]
    MeasureFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The fixture could not be read into memory.
    #[error("could not read {}: {source}", path.display())]
    ReadInput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// `put_object` failed.
    #[error("upload failed: {0:#}")]
    Upload(anyhow::Error),

    /// `get_object` failed, or its body could not be written locally.
    #[error("download failed: {0:#}")]
    Download(anyhow::Error),

    /// `delete_object` failed; the object stays in the bucket.
    #[error("delete failed: {0:#}")]
    Delete(anyhow::Error),
}

const UNTESTABLE: &str = "I can't test blob store until this is fixed :(";

impl CheckError {
    /// Lines written to the `/ping` response for this failure.
    pub fn report_lines(&self) -> Vec<String> {
        match self {
            CheckError::Unbound => vec![
                "Sorry, but I'm not bound to a Blob instance.  Please bind me!".to_string(),
            ],
            CheckError::OpenLocalFiles {
                input,
                scratch,
                source,
            } => vec![
                format!(
                    "Sorry, I could not open my test file to upload: {}, {}",
                    input.display(),
                    scratch.display()
                ),
                format!("Error: {source}"),
                UNTESTABLE.to_string(),
            ],
            CheckError::MeasureFile { path, source } => vec![
                format!(
                    "Sorry, I could not calculate the size of the file: {}",
                    path.display()
                ),
                format!("Error: {source}"),
                UNTESTABLE.to_string(),
            ],
            CheckError::ReadInput { path, source } => vec![
                format!("Sorry, I could not read my test file: {}", path.display()),
                format!("Error: {source}"),
                UNTESTABLE.to_string(),
            ],
            CheckError::Upload(err) => {
                vec![format!("I could not upload my file to the blobstore: {err:#}")]
            }
            CheckError::Download(err) => {
                vec![format!("I could not download my file from the blobstore: {err:#}")]
            }
            CheckError::Delete(err) => {
                vec![format!("I could not delete my file from the blobstore: {err:#}")]
            }
        }
    }

    /// Short label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            CheckError::Unbound => "unbound",
            CheckError::OpenLocalFiles { .. } => "open_local_files",
            CheckError::MeasureFile { .. } => "measure_file",
            CheckError::ReadInput { .. } => "read_input",
            CheckError::Upload(_) => "upload",
            CheckError::Download(_) => "download",
            CheckError::Delete(_) => "delete",
        }
    }
}
