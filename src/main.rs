mod config;
mod drafter;
mod error;
mod normalizer;
mod pieces;
mod schema;
mod store;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::Config;
use normalizer::{Normalized, Normalizer};
use pieces::PieceIndex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use store::{FileStore, WorkflowSink};
use tokio::io::AsyncReadExt;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the piece index JSON file
    #[arg(long, value_name = "FILE", global = true)]
    pieces_index: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Normalize a generated workflow document and save it
    Normalize {
        /// Generator output to read (`-` or omitted for stdin)
        #[arg(value_name = "FILE")]
        input: Option<PathBuf>,

        /// Directory the normalized workflow is written to
        #[arg(short, long, value_name = "DIR")]
        out_dir: Option<PathBuf>,

        /// Longest accepted trigger + action chain
        #[arg(long)]
        max_chain_length: Option<usize>,

        /// Also print the normalized document
        #[arg(long)]
        print: bool,
    },
    /// Print the generator instructions for a workflow description
    Prompt {
        /// What the workflow should do
        description: String,

        /// Print the full chat-completions request body instead
        #[arg(long)]
        request: bool,

        /// Model named in the request body
        #[arg(long)]
        model: Option<String>,
    },
    /// Show the piece index summary, or one piece's actions and triggers
    Pieces {
        /// Full id or short name, e.g. `gmail`
        name: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists
    dotenv::dotenv().ok();

    env_logger::init();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    let index_path = cli.pieces_index.or_else(|| config.piece_index_path.clone());
    let index = Arc::new(PieceIndex::discover(index_path.as_deref()).await?);

    match cli.command {
        Command::Normalize {
            input,
            out_dir,
            max_chain_length,
            print,
        } => {
            let text = read_input(input.as_deref()).await?;
            let normalizer = Normalizer::new(index)
                .with_max_chain_length(max_chain_length.unwrap_or(config.max_chain_length));
            let store = FileStore::new(out_dir.unwrap_or(config.output_dir));

            let (normalized, path) = normalize_and_save(&text, &normalizer, &store).await?;

            for piece in &normalized.dropped_pieces {
                println!("⚠️  Unknown piece {} - removed from list", piece);
            }
            println!("✅ Workflow saved to: {}", path.display());
            for (i, step) in normalized.document.template.steps().enumerate() {
                let label = step
                    .display_name
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| step.display_name.to_string());
                println!("   {}. [{}] {}", i + 1, step.step_type.as_wire(), label);
            }
            if print {
                println!();
                println!("{}", serde_json::to_string_pretty(&normalized.document)?);
            }
        }
        Command::Prompt {
            description,
            request,
            model,
        } => {
            if request {
                let model = model.unwrap_or(config.model);
                let body = drafter::CompletionRequest::for_description(&index, &model, &description);
                println!("{}", serde_json::to_string_pretty(&body)?);
            } else {
                println!("{}", drafter::system_prompt(&index));
            }
        }
        Command::Pieces { name: Some(name) } => {
            let (id, entry) = index
                .resolve(&name)
                .with_context(|| format!("Piece '{}' not found", name))?;
            println!("🧩 {}", id);
            println!("   actions:  {}", entry.actions.join(", "));
            println!("   triggers: {}", entry.triggers.join(", "));
        }
        Command::Pieces { name: None } => {
            let summary = index.summary();
            println!("📊 Pieces Summary:");
            println!("   Total pieces available: {}", summary.total_pieces);
            println!("   Pieces with actions/triggers: {}", summary.pieces_with_content);
            println!("   Total actions: {}", summary.total_actions);
            println!("   Total triggers: {}", summary.total_triggers);
        }
    }

    Ok(())
}

async fn read_input(input: Option<&Path>) -> Result<String> {
    match input {
        Some(path) if path != Path::new("-") => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Could not read file `{}`", path.display())),
        _ => {
            let mut text = String::new();
            tokio::io::stdin()
                .read_to_string(&mut text)
                .await
                .context("Failed to read stdin")?;
            Ok(text)
        }
    }
}

/// Decode raw generator output, normalize it and hand it to `sink`.
async fn normalize_and_save(
    text: &str,
    normalizer: &Normalizer,
    sink: &dyn WorkflowSink,
) -> Result<(Normalized, PathBuf)> {
    let raw = drafter::decode_completion(text).context("Failed to decode generated workflow")?;
    let normalized = normalizer
        .normalize(raw)
        .context("Generated workflow does not fit the schema")?;
    let path = sink.save(&normalized.document).await?;
    Ok((normalized, path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use crate::error::SchemaError;
    use serde_json::Value;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_normalize_with_global_index_flag() {
        let cli = Cli::try_parse_from([
            "workflow-generator",
            "normalize",
            "draft.json",
            "--out-dir",
            "out",
            "--pieces-index",
            "pieces.json",
            "--print",
        ])
        .unwrap();

        assert_eq!(cli.pieces_index, Some(PathBuf::from("pieces.json")));
        match cli.command {
            Command::Normalize {
                input,
                out_dir,
                max_chain_length,
                print,
            } => {
                assert_eq!(input, Some(PathBuf::from("draft.json")));
                assert_eq!(out_dir, Some(PathBuf::from("out")));
                assert_eq!(max_chain_length, None);
                assert!(print);
            }
            _ => panic!("expected normalize"),
        }
    }

    #[tokio::test]
    async fn normalize_and_save_writes_fenced_generator_output() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::new(tmp.path());
        let normalizer = Normalizer::new(Arc::new(PieceIndex::builtin()));
        let text = r#"```json
{
  "name": "New mail alert",
  "pieces": ["@activepieces/piece-gmail", "@activepieces/piece-unknown"],
  "template": {
    "trigger": {
      "name": "trigger",
      "settings": { "pieceName": "@activepieces/piece-gmail", "triggerName": "new_email" },
      "nextAction": {
        "name": "step_1",
        "settings": { "pieceName": "@activepieces/piece-http", "actionName": "send_request" }
      }
    }
  }
}
```"#;

        let (normalized, path) = normalize_and_save(text, &normalizer, &store).await.unwrap();
        assert_eq!(normalized.dropped_pieces, vec!["@activepieces/piece-unknown"]);
        assert_eq!(path, tmp.path().join("New_mail_alert.json"));

        let written: Value =
            serde_json::from_str(&tokio::fs::read_to_string(&path).await.unwrap()).unwrap();
        assert_eq!(written["template"]["trigger"]["type"], "PIECE_TRIGGER");
        assert_eq!(written["template"]["trigger"]["nextAction"]["type"], "PIECE");
        assert_eq!(written["pieces"], serde_json::json!(["@activepieces/piece-gmail"]));
    }

    #[tokio::test]
    async fn normalize_and_save_rejects_non_mapping_document() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::new(tmp.path());
        let normalizer = Normalizer::new(Arc::new(PieceIndex::builtin()));

        let err = normalize_and_save("[1, 2]", &normalizer, &store).await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<SchemaError>(),
            Some(&SchemaError::NotAMapping)
        );
        assert!(std::fs::read_dir(tmp.path()).unwrap().next().is_none());
    }
}
