// Append-only record of what each edge request sent to and got back from the LLM

use std::path::PathBuf;

use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tracing::warn;

#[derive(Clone, Debug, Default)]
pub struct Transcript {
    path: Option<PathBuf>,
}

impl Transcript {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    /// Never fails the caller; write problems are only logged.
    pub async fn record(&self, message: &str) {
        let Some(path) = &self.path else {
            return;
        };

        if let Err(e) = append(path, message).await {
            warn!("Transcript write to {} failed: {}", path.display(), e);
        }
    }
}

async fn append(path: &PathBuf, message: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;

    let line = format!("{} {}\n", Utc::now().to_rfc3339(), message);
    file.write_all(line.as_bytes()).await?;
    file.flush().await
}
