use crate::drafter::DEFAULT_MODEL;
use crate::normalizer::DEFAULT_MAX_CHAIN_LENGTH;
use anyhow::{Context, Result};
use std::path::PathBuf;

pub const PIECES_INDEX_PATH: &str = "PIECES_INDEX_PATH";
pub const WORKFLOW_OUTPUT_DIR: &str = "WORKFLOW_OUTPUT_DIR";
pub const WORKFLOW_MAX_CHAIN_LENGTH: &str = "WORKFLOW_MAX_CHAIN_LENGTH";
pub const OPENAI_MODEL: &str = "OPENAI_MODEL";

/// Runtime settings, read from the environment (after `.env` is loaded).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub piece_index_path: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub max_chain_length: usize,
    pub model: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            piece_index_path: None,
            output_dir: PathBuf::from("."),
            max_chain_length: DEFAULT_MAX_CHAIN_LENGTH,
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let max_chain_length = match non_empty(WORKFLOW_MAX_CHAIN_LENGTH) {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .with_context(|| format!("{} must be a positive integer, got `{}`", WORKFLOW_MAX_CHAIN_LENGTH, raw))?,
            None => defaults.max_chain_length,
        };
        if max_chain_length == 0 {
            anyhow::bail!("{} must be at least 1", WORKFLOW_MAX_CHAIN_LENGTH);
        }

        Ok(Self {
            piece_index_path: non_empty(PIECES_INDEX_PATH).map(PathBuf::from),
            output_dir: non_empty(WORKFLOW_OUTPUT_DIR)
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            max_chain_length,
            model: non_empty(OPENAI_MODEL).unwrap_or(defaults.model),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.max_chain_length, 64);
        assert_eq!(config.model, "gpt-4-turbo");
    }

    #[test]
    fn reads_every_variable() {
        let config = Config::from_lookup(lookup(&[
            (PIECES_INDEX_PATH, "/etc/pieces.json"),
            (WORKFLOW_OUTPUT_DIR, "out"),
            (WORKFLOW_MAX_CHAIN_LENGTH, " 12 "),
            (OPENAI_MODEL, "gpt-4o"),
        ]))
        .unwrap();

        assert_eq!(config.piece_index_path, Some(PathBuf::from("/etc/pieces.json")));
        assert_eq!(config.output_dir, PathBuf::from("out"));
        assert_eq!(config.max_chain_length, 12);
        assert_eq!(config.model, "gpt-4o");
    }

    #[test]
    fn blank_values_are_ignored() {
        let config = Config::from_lookup(lookup(&[(PIECES_INDEX_PATH, "  "), (OPENAI_MODEL, "")])).unwrap();
        assert_eq!(config.piece_index_path, None);
        assert_eq!(config.model, DEFAULT_MODEL);
    }

    #[test]
    fn invalid_chain_length_is_an_error() {
        let err = Config::from_lookup(lookup(&[(WORKFLOW_MAX_CHAIN_LENGTH, "lots")])).unwrap_err();
        assert!(err.to_string().contains(WORKFLOW_MAX_CHAIN_LENGTH));

        assert!(Config::from_lookup(lookup(&[(WORKFLOW_MAX_CHAIN_LENGTH, "0")])).is_err());
    }
}
