//! File Intake
//!
//! Takes archives picked by the user, hands each one to the worker and
//! reports progress as short notifications. Files are loaded one at a time
//! and independently: one bad archive never stops the others.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;

use spingen_core::{ArchiveFile, ArchiveKind, ClientError, LoadSummary, SpingenClient};

/// Progress of one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// Sent to the worker
    Loading {
        /// File name
        file: String,
    },
    /// Every entity in the file was reported
    Loaded {
        /// File name
        file: String,
        /// What the file contained
        summary: LoadSummary,
    },
    /// The worker rejected the file, or it could not be read
    Failed {
        /// File name
        file: String,
        /// Reason, as reported
        error: String,
    },
    /// Not a `.pk3` or `.wad`
    Skipped {
        /// File name
        file: String,
    },
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loading { file } => write!(f, "Loading file {file}"),
            Self::Loaded { file, .. } => write!(f, "Loaded file {file}"),
            Self::Failed { file, error } => write!(f, "Failed to load file {file}: {error}"),
            Self::Skipped { file } => write!(
                f,
                "Skipped {file}: expected one of {}",
                ArchiveKind::EXTENSIONS.join(", ")
            ),
        }
    }
}

/// Where notifications go
pub trait Notifier: Send + Sync {
    /// Show one notification
    fn notify(&self, notification: &Notification);
}

/// Notifier that writes to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: &Notification) {
        match notification {
            Notification::Failed { file, error } => {
                tracing::warn!(%file, %error, "{notification}");
            }
            Notification::Skipped { file } => tracing::warn!(%file, "{notification}"),
            Notification::Loaded { file, summary } => {
                tracing::info!(%file, %summary, "{notification}");
            }
            Notification::Loading { file } => tracing::info!(%file, "{notification}"),
        }
    }
}

/// Feeds archives to the worker
#[derive(Clone)]
pub struct FileIntake {
    client: SpingenClient,
    notifier: Arc<dyn Notifier>,
}

impl fmt::Debug for FileIntake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileIntake")
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}

impl FileIntake {
    /// Intake reporting through `tracing`
    #[must_use]
    pub fn new(client: SpingenClient) -> Self {
        Self::with_notifier(client, Arc::new(TracingNotifier))
    }

    /// Intake reporting through `notifier`
    #[must_use]
    pub fn with_notifier(client: SpingenClient, notifier: Arc<dyn Notifier>) -> Self {
        Self { client, notifier }
    }

    /// Load one archive
    ///
    /// Returns `None` for files that are not archives; they are reported as
    /// skipped and never reach the worker.
    ///
    /// # Errors
    ///
    /// Whatever the worker reported for this file.
    pub async fn load(&self, file: ArchiveFile) -> Result<Option<LoadSummary>, ClientError> {
        let name = file.name.clone();
        if file.kind().is_none() {
            self.notifier.notify(&Notification::Skipped { file: name });
            return Ok(None);
        }

        self.notifier
            .notify(&Notification::Loading { file: name.clone() });
        match self.client.load_file(file).await {
            Ok(summary) => {
                self.notifier
                    .notify(&Notification::Loaded { file: name, summary });
                Ok(Some(summary))
            }
            Err(e) => {
                self.notifier.notify(&Notification::Failed {
                    file: name,
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Load several archives one after another, results in input order
    pub async fn load_all(
        &self,
        files: Vec<ArchiveFile>,
    ) -> Vec<Result<Option<LoadSummary>, ClientError>> {
        let mut results = Vec::with_capacity(files.len());
        for file in files {
            results.push(self.load(file).await);
        }
        results
    }

    /// Read an archive from disk and load it
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or the worker rejects it.
    pub async fn load_path(&self, path: impl AsRef<Path>) -> anyhow::Result<Option<LoadSummary>> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .with_context(|| format!("{} has no file name", path.display()))?;

        if ArchiveKind::from_file_name(&name).is_none() {
            self.notifier.notify(&Notification::Skipped { file: name });
            return Ok(None);
        }

        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                self.notifier.notify(&Notification::Failed {
                    file: name,
                    error: e.to_string(),
                });
                return Err(e).with_context(|| format!("Failed to read {}", path.display()));
            }
        };

        let summary = self
            .load(ArchiveFile::new(name, bytes))
            .await
            .with_context(|| format!("Failed to load {}", path.display()))?;
        Ok(summary)
    }
}
