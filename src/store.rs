use crate::schema::{WorkflowDocument, UNTITLED_WORKFLOW};
use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use std::path::PathBuf;
use std::sync::OnceLock;

/// Destination for normalized workflow documents.
#[async_trait]
pub trait WorkflowSink: Send + Sync {
    /// Persist `document`, returning where it was written.
    async fn save(&self, document: &WorkflowDocument) -> Result<PathBuf>;
}

/// Writes each document as pretty JSON into a directory, one file per
/// workflow name. A later save under the same name overwrites the file.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, document: &WorkflowDocument) -> PathBuf {
        let name = document.name_str().unwrap_or(UNTITLED_WORKFLOW);
        self.dir.join(format!("{}.json", file_stem(name)))
    }
}

#[async_trait]
impl WorkflowSink for FileStore {
    async fn save(&self, document: &WorkflowDocument) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create output dir: {}", self.dir.display()))?;

        let path = self.path_for(document);
        let content =
            serde_json::to_string_pretty(document).context("Failed to serialize workflow")?;
        tokio::fs::write(&path, content.as_bytes())
            .await
            .with_context(|| format!("Failed to write file: {}", path.display()))?;

        log::info!("Workflow saved to: {}", path.display());
        Ok(path)
    }
}

/// File-safe stem: word characters, whitespace and `-` survive, spaces
/// become underscores.
pub fn file_stem(name: &str) -> String {
    static UNSAFE: OnceLock<Regex> = OnceLock::new();
    let unsafe_chars = UNSAFE.get_or_init(|| Regex::new(r"[^\w\s-]").expect("valid regex"));

    let stem = unsafe_chars
        .replace_all(name, "")
        .trim()
        .replace(' ', "_");
    if stem.is_empty() {
        "workflow".to_string()
    } else {
        stem
    }
}
