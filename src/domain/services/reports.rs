#[cfg(test)]
#[path = "reports_test.rs"]
mod tests;

use std::path;
use std::sync::Arc;

use anyhow::bail;
use anyhow::Result;
use chrono::NaiveDate;
use chrono::Utc;
use dashmap::DashMap;
use tokio::fs;
use tokio::io::AsyncWriteExt;

pub const MEDICAL_REPORT_KEY: &str = "medicalReport";

/// Ephemeral storage that outlives a consultation for the lifetime of the
/// process. Clones share the same entries.
#[derive(Clone, Default)]
pub struct ReportStore {
    entries: Arc<DashMap<String, String>>,
}

impl ReportStore {
    pub fn store(&self, report: &str) {
        self.entries
            .insert(MEDICAL_REPORT_KEY.to_string(), report.to_string());
    }

    pub fn get(&self) -> Option<String> {
        return self
            .entries
            .get(MEDICAL_REPORT_KEY)
            .map(|e| return e.value().to_string());
    }

    pub fn file_name(date: NaiveDate) -> String {
        return format!(
            "medical_consultation_report_{}.txt",
            date.format("%Y-%m-%d")
        );
    }

    /// Writes the stored report to `dir` using today's UTC date in the file
    /// name.
    pub async fn download(&self, dir: &path::Path) -> Result<path::PathBuf> {
        return self.download_dated(dir, Utc::now().date_naive()).await;
    }

    pub async fn download_dated(
        &self,
        dir: &path::Path,
        date: NaiveDate,
    ) -> Result<path::PathBuf> {
        let report = match self.get() {
            Some(report) => report,
            None => bail!("No report has been generated yet"),
        };

        if !dir.exists() {
            fs::create_dir_all(dir).await?;
        }

        let file_path = dir.join(ReportStore::file_name(date));
        let mut file = fs::File::create(&file_path).await?;
        file.write_all(report.as_bytes()).await?;
        file.flush().await?;

        tracing::info!(path = ?file_path, "Saved medical report");

        return Ok(file_path);
    }
}
