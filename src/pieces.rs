use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const INDEX_FILE_NAME: &str = "pieces_index.json";
pub const PIECE_NAMESPACE: &str = "@activepieces/piece-";

/// Actions and triggers offered by one piece.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct PieceEntry {
    #[serde(default)]
    pub actions: Vec<String>,
    #[serde(default)]
    pub triggers: Vec<String>,
}

impl PieceEntry {
    pub fn has_content(&self) -> bool {
        !self.actions.is_empty() || !self.triggers.is_empty()
    }
}

/// Read-only registry of known pieces, keyed by `<namespace>/<piece-name>`.
///
/// Loaded once at startup and shared behind an `Arc`; nothing mutates it
/// afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct PieceIndex {
    pieces: BTreeMap<String, PieceEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PieceSummary {
    pub total_pieces: usize,
    pub pieces_with_content: usize,
    pub total_actions: usize,
    pub total_triggers: usize,
}

impl PieceIndex {
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, PieceEntry)>,
        S: Into<String>,
    {
        Self {
            pieces: entries.into_iter().map(|(id, entry)| (id.into(), entry)).collect(),
        }
    }

    /// Small index used when no index file can be found.
    pub fn builtin() -> Self {
        let entry = |actions: &[&str], triggers: &[&str]| PieceEntry {
            actions: actions.iter().map(|s| s.to_string()).collect(),
            triggers: triggers.iter().map(|s| s.to_string()).collect(),
        };
        Self::from_entries([
            ("@activepieces/piece-gmail", entry(&["gmail_send_email"], &["new_email"])),
            ("@activepieces/piece-google-sheets", entry(&["insert_row"], &[])),
            ("@activepieces/piece-http", entry(&["send_request"], &[])),
        ])
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Could not read piece index `{}`", path.display()))?;
        let index: PieceIndex = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse piece index `{}`", path.display()))?;
        log::info!("Loaded {} pieces from {}", index.len(), path.display());
        Ok(index)
    }

    /// Load the index from `explicit`, or from the first default location
    /// that exists, falling back to the built-in set.
    pub async fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path).await;
        }

        for candidate in default_locations() {
            if tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
                return Self::load(&candidate).await;
            }
        }

        log::warn!("{} not found. Using minimal set.", INDEX_FILE_NAME);
        Ok(Self::builtin())
    }

    pub fn len(&self) -> usize {
        self.pieces.len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: &str) -> Option<&PieceEntry> {
        self.pieces.get(id)
    }

    /// Look a piece up by full id or by short name (`gmail`).
    pub fn resolve(&self, name: &str) -> Option<(&str, &PieceEntry)> {
        let full = if name.contains('/') {
            name.to_string()
        } else {
            format!("{}{}", PIECE_NAMESPACE, name)
        };
        self.pieces
            .get_key_value(full.as_str())
            .map(|(id, entry)| (id.as_str(), entry))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PieceEntry)> {
        self.pieces.iter().map(|(id, entry)| (id.as_str(), entry))
    }

    pub fn summary(&self) -> PieceSummary {
        PieceSummary {
            total_pieces: self.pieces.len(),
            pieces_with_content: self.pieces.values().filter(|e| e.has_content()).count(),
            total_actions: self.pieces.values().map(|e| e.actions.len()).sum(),
            total_triggers: self.pieces.values().map(|e| e.triggers.len()).sum(),
        }
    }

    /// Piece listing for the generator instructions. Pieces with neither
    /// actions nor triggers are left out.
    pub fn describe(&self) -> String {
        self.iter()
            .filter(|(_, entry)| entry.has_content())
            .map(|(id, entry)| {
                format!(
                    "{}:\n  - actions: {}\n  - triggers: {}",
                    id,
                    join_or_none(&entry.actions),
                    join_or_none(&entry.triggers)
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

fn join_or_none(names: &[String]) -> String {
    if names.is_empty() {
        "none".to_string()
    } else {
        names.join(", ")
    }
}

fn default_locations() -> Vec<PathBuf> {
    let mut locations = vec![PathBuf::from(INDEX_FILE_NAME)];
    if let Some(dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        locations.push(dir.join(INDEX_FILE_NAME));
    }
    locations
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn sample() -> PieceIndex {
        PieceIndex::from_entries([
            (
                "@activepieces/piece-slack",
                PieceEntry {
                    actions: vec!["send_message".into(), "send_approval_message".into()],
                    triggers: vec![],
                },
            ),
            ("@activepieces/piece-empty", PieceEntry::default()),
            (
                "@activepieces/piece-webhook",
                PieceEntry {
                    actions: vec!["return_response".into()],
                    triggers: vec!["catch_webhook".into()],
                },
            ),
        ])
    }

    #[test]
    fn summary_counts_entries() {
        let summary = sample().summary();
        assert_eq!(
            summary,
            PieceSummary {
                total_pieces: 3,
                pieces_with_content: 2,
                total_actions: 3,
                total_triggers: 1,
            }
        );
    }

    #[test]
    fn describe_skips_pieces_without_content() {
        let text = sample().describe();
        assert_eq!(
            text,
            "@activepieces/piece-slack:\n  - actions: send_message, send_approval_message\n  - triggers: none\n\n\
             @activepieces/piece-webhook:\n  - actions: return_response\n  - triggers: catch_webhook"
        );
    }

    #[test]
    fn resolve_accepts_short_and_full_names() {
        let index = sample();
        assert_eq!(index.resolve("slack").map(|(id, _)| id), Some("@activepieces/piece-slack"));
        assert_eq!(
            index.resolve("@activepieces/piece-webhook").map(|(id, _)| id),
            Some("@activepieces/piece-webhook")
        );
        assert!(index.resolve("discord").is_none());
    }

    #[test]
    fn builtin_contains_the_minimal_set() {
        let index = PieceIndex::builtin();
        assert_eq!(index.len(), 3);
        assert!(index.contains("@activepieces/piece-gmail"));
        assert_eq!(
            index.get("@activepieces/piece-gmail").unwrap().triggers,
            vec!["new_email".to_string()]
        );
    }

    #[tokio::test]
    async fn load_reads_index_file_with_missing_lists() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "@activepieces/piece-delay": {{"actions": ["delayFor"]}},
                "@activepieces/piece-schedule": {{"triggers": ["every_day"]}}
            }}"#
        )
        .unwrap();

        let index = PieceIndex::load(file.path()).await.unwrap();
        assert_eq!(index.len(), 2);
        assert!(index.get("@activepieces/piece-delay").unwrap().triggers.is_empty());
        assert_eq!(
            index.get("@activepieces/piece-schedule").unwrap().triggers,
            vec!["every_day".to_string()]
        );
    }

    #[tokio::test]
    async fn load_reports_malformed_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "[1, 2, 3]").unwrap();

        let err = PieceIndex::load(file.path()).await.unwrap_err();
        assert!(err.to_string().contains("Failed to parse piece index"));
    }

    #[tokio::test]
    async fn discover_propagates_missing_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        assert!(PieceIndex::discover(Some(&missing)).await.is_err());
    }
}
