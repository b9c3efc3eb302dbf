//! Result persistence
//!
//! The unique records always land in the output file, even after a failed or
//! cancelled session. Duplicates from the final pass get a side file only when
//! there are any. Files are written to a temp sibling, synced, then renamed.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::domain::{DedupOutcome, TransactionRecord};

/// Paths actually written by a sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WrittenFiles {
    pub output: PathBuf,
    pub duplicates: Option<PathBuf>,
}

#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn persist(&self, outcome: &DedupOutcome) -> Result<WrittenFiles>;
}

/// JSON arrays with 4-space indentation.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    output: PathBuf,
    duplicates: PathBuf,
}

impl JsonFileSink {
    pub fn new(output: impl Into<PathBuf>, duplicates: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
            duplicates: duplicates.into(),
        }
    }

    pub fn output_path(&self) -> &Path {
        &self.output
    }
}

#[async_trait]
impl ResultSink for JsonFileSink {
    async fn persist(&self, outcome: &DedupOutcome) -> Result<WrittenFiles> {
        write_json_atomic(&self.output, &outcome.unique).await?;
        info!("💾 {} records written to {}", outcome.unique.len(), self.output.display());

        let duplicates = if outcome.duplicated.is_empty() {
            None
        } else {
            write_json_atomic(&self.duplicates, &outcome.duplicated).await?;
            info!(
                "💾 {} duplicates written to {}",
                outcome.duplicated.len(),
                self.duplicates.display()
            );
            Some(self.duplicates.clone())
        };

        Ok(WrittenFiles {
            output: self.output.clone(),
            duplicates,
        })
    }
}

/// Pretty JSON with the 4-space indent of the expected output format.
pub fn to_pretty_json(records: &[TransactionRecord]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut serializer = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    records
        .serialize(&mut serializer)
        .context("Failed to serialize records")?;
    Ok(buf)
}

async fn write_json_atomic(path: &Path, records: &[TransactionRecord]) -> Result<()> {
    let content = to_pretty_json(records)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "result.json".to_string());
    let temp_path = path.with_file_name(format!(".{file_name}.tmp"));

    {
        let mut file = tokio::fs::File::create(&temp_path)
            .await
            .with_context(|| format!("Failed to create {}", temp_path.display()))?;
        file.write_all(&content).await?;
        file.sync_all().await?;
    }

    tokio::fs::rename(&temp_path, path)
        .await
        .with_context(|| format!("Failed to move {} into place", path.display()))?;
    debug!("Wrote {} bytes to {}", content.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::records;

    #[test]
    fn test_four_space_indent() {
        let json = String::from_utf8(to_pretty_json(&records(0, 1)).unwrap()).unwrap();
        assert!(json.starts_with("[\n    {\n        \"account\": \"Checking\""));
        assert!(json.contains("\"transaction\": \"Transaction 0\""));
    }

    #[test]
    fn test_empty_list_is_an_empty_array() {
        assert_eq!(to_pretty_json(&[]).unwrap(), b"[]");
    }
}
