//! Upload/download/delete round trip against the bound bucket.
//!
//! [`RoundTripChecker::check`] walks a fixed sequence of stages and stops
//! at the first failure:
//!
//! ```text
//! open fixture + scratch -> stat fixture -> upload -> settle (2s)
//!   -> download into scratch -> stat scratch -> compare sizes -> delete
//! ```
//!
//! Nothing is retried and nothing is rolled back: if the download fails
//! the uploaded object stays in the bucket.  The size comparison is the
//! only verification, so a same-length corrupted body still counts as a
//! match.  The scratch file is removed on every path once it exists.
//!
//! Unless `check.unique_object_key` is set, every invocation uses the
//! same object key and scratch file, so concurrent checks can trample
//! each other's objects.

use bytes::Bytes;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{error, info, warn};

use crate::config::CheckConfig;
use crate::errors::CheckError;
use crate::sniff::detect_content_type;
use crate::storage::backend::ObjectStore;

/// Pause between upload and download, for eventually consistent stores.
pub const SETTLE_DELAY: Duration = Duration::from_secs(2);

/// Last stage a check completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    Uploaded,
    Downloaded,
    SizeCompared,
    Deleted,
}

/// Size comparison between the uploaded and downloaded files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SizeOutcome {
    Match,
    /// The download is shorter than the upload.
    TooSmall,
    /// The download is longer than the upload.
    TooBig,
}

impl SizeOutcome {
    pub fn compare(input_size: u64, output_size: u64) -> Self {
        use std::cmp::Ordering;
        match input_size.cmp(&output_size) {
            Ordering::Equal => SizeOutcome::Match,
            Ordering::Greater => SizeOutcome::TooSmall,
            Ordering::Less => SizeOutcome::TooBig,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SizeOutcome::Match => "match",
            SizeOutcome::TooSmall => "too_small",
            SizeOutcome::TooBig => "too_big",
        }
    }
}

/// What one check found.
#[derive(Debug, Default)]
pub struct RoundTripResult {
    pub input_size: Option<u64>,
    pub output_size: Option<u64>,
    pub stage: Option<Stage>,
    pub outcome: Option<SizeOutcome>,
    pub error: Option<CheckError>,
}

impl RoundTripResult {
    /// Label for metrics: the size outcome, `unbound`, or `failed`.
    pub fn label(&self) -> &'static str {
        match (&self.error, self.outcome) {
            (Some(CheckError::Unbound), _) => "unbound",
            (Some(_), _) => "failed",
            (None, Some(outcome)) => outcome.as_str(),
            (None, None) => "failed",
        }
    }
}

/// The narrative written back to the caller, plus the typed result.
#[derive(Debug, Default)]
pub struct RoundTripReport {
    pub result: RoundTripResult,
    lines: Vec<String>,
}

impl RoundTripReport {
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// The report as the plain-text response body.
    pub fn text(&self) -> String {
        let mut text = self.lines.join("\n");
        text.push('\n');
        text
    }

    /// Completed every stage and sizes matched.
    pub fn is_success(&self) -> bool {
        self.result.error.is_none()
            && self.result.stage == Some(Stage::Deleted)
            && self.result.outcome == Some(SizeOutcome::Match)
    }

    fn line(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    fn fail(&mut self, err: CheckError) {
        self.lines.extend(err.report_lines());
        self.result.error = Some(err);
    }
}

/// Runs the round trip against a shared store handle.
pub struct RoundTripChecker {
    /// `None` when no blob service is bound.
    store: Option<Arc<dyn ObjectStore>>,
    settings: CheckConfig,
}

/// Scratch file that is removed when dropped.
struct ScratchFile {
    file: File,
    path: PathBuf,
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), "Could not remove scratch file: {}", e);
            }
        }
    }
}

impl RoundTripChecker {
    pub fn new(store: Option<Arc<dyn ObjectStore>>, settings: CheckConfig) -> Self {
        Self { store, settings }
    }

    pub fn is_bound(&self) -> bool {
        self.store.is_some()
    }

    /// Run one round trip and describe what happened.
    pub async fn check(&self) -> RoundTripReport {
        let mut report = RoundTripReport::default();
        if let Err(err) = self.run(&mut report).await {
            match &err {
                CheckError::Unbound => warn!("Round trip skipped: {}", err),
                _ => error!(kind = err.kind(), "Round trip failed: {}", err),
            }
            report.fail(err);
        }
        report
    }

    async fn run(&self, report: &mut RoundTripReport) -> Result<(), CheckError> {
        let store = self.store.as_ref().ok_or(CheckError::Unbound)?;
        let (key, scratch_path) = self.names();
        let fixture_path = self.settings.fixture_path.as_path();

        let open_error = |source| CheckError::OpenLocalFiles {
            input: fixture_path.to_path_buf(),
            scratch: scratch_path.clone(),
            source,
        };
        let mut input = File::open(fixture_path).await.map_err(open_error)?;
        let mut scratch = ScratchFile {
            file: File::create(&scratch_path).await.map_err(open_error)?,
            path: scratch_path.clone(),
        };

        let input_size = measure(&input, fixture_path).await?;
        report.result.input_size = Some(input_size);
        info!("Input file {} is {} bytes", fixture_path.display(), input_size);

        let mut data = Vec::with_capacity(input_size as usize);
        input
            .read_to_end(&mut data)
            .await
            .map_err(|source| CheckError::ReadInput {
                path: fixture_path.to_path_buf(),
                source,
            })?;
        let content_type = detect_content_type(&data);

        store
            .put_object(&key, Bytes::from(data), content_type)
            .await
            .map_err(CheckError::Upload)?;
        report.result.stage = Some(Stage::Uploaded);
        info!(key = %key, content_type, "Uploaded {} bytes", input_size);
        report.line(format!("I uploaded my file to the blobstore: {key}"));

        tokio::time::sleep(SETTLE_DELAY).await;

        {
            let mut body = store.get_object(&key).await.map_err(CheckError::Download)?;
            tokio::io::copy(&mut body, &mut scratch.file)
                .await
                .map_err(|e| download_io_error(e, "reading object body"))?;
            scratch
                .file
                .flush()
                .await
                .map_err(|e| download_io_error(e, "writing scratch file"))?;
        }
        report.result.stage = Some(Stage::Downloaded);

        let output_size = measure(&scratch.file, &scratch.path).await?;
        report.result.output_size = Some(output_size);

        let outcome = SizeOutcome::compare(input_size, output_size);
        report.result.outcome = Some(outcome);
        report.result.stage = Some(Stage::SizeCompared);
        match outcome {
            SizeOutcome::Match => {
                info!(
                    "File sizes match: {} bytes in, and {} bytes out!!",
                    input_size, output_size
                );
                report.line(format!(
                    "File sizes match: {input_size} bytes in, and {output_size} bytes out!!"
                ));
            }
            SizeOutcome::TooSmall => {
                warn!("File sizes do not match: in: {}, out: {}", input_size, output_size);
                report.line("Downloaded file is too small!");
            }
            SizeOutcome::TooBig => {
                warn!("File sizes do not match: in: {}, out: {}", input_size, output_size);
                report.line("Downloaded file is too big!");
            }
        }

        info!(key = %key, "About to delete the object from the blobstore");
        store
            .delete_object(&key)
            .await
            .map_err(CheckError::Delete)?;
        report.result.stage = Some(Stage::Deleted);
        info!("Deleted {} from Blob successfully", key);
        report.line(format!("Deleted {key} from Blob successfully!!"));
        report.line(":tada: Everything is fine!!");

        Ok(())
    }

    /// Object key and scratch path for one invocation.
    fn names(&self) -> (String, PathBuf) {
        let base_key = file_name(&self.settings.fixture_path);
        if !self.settings.unique_object_key {
            return (base_key, self.settings.scratch_path.clone());
        }

        let id = uuid::Uuid::new_v4();
        let scratch_name = format!("{id}-{}", file_name(&self.settings.scratch_path));
        (
            format!("{id}/{base_key}"),
            self.settings.scratch_path.with_file_name(scratch_name),
        )
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

fn download_io_error(err: std::io::Error, context: &'static str) -> CheckError {
    CheckError::Download(anyhow::Error::new(err).context(context))
}

async fn measure(file: &File, path: &Path) -> Result<u64, CheckError> {
    file.metadata()
        .await
        .map(|meta| meta.len())
        .map_err(|source| CheckError::MeasureFile {
            path: path.to_path_buf(),
            source,
        })
}
