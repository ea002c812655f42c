use crate::error::SchemaError;
use crate::pieces::PieceIndex;
use crate::schema::{
    DocumentKind, ErrorHandlingOptions, Link, SchemaVersion, Settings, Step, StepType, Template,
    WorkflowDocument, DEFAULT_PACKAGE_TYPE, DEFAULT_PIECE_TYPE, DEFAULT_PIECE_VERSION,
    UNNAMED_STEP, UNTITLED_WORKFLOW,
};
use serde_json::{Map, Value};
use std::sync::Arc;

pub const DEFAULT_MAX_CHAIN_LENGTH: usize = 64;

/// Result of a normalization pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub document: WorkflowDocument,
    /// Entries removed from `pieces` because the index does not know them.
    /// Non-string entries are reported by their JSON text.
    pub dropped_pieces: Vec<String>,
}

/// Turns an untrusted, loosely shaped document into one that satisfies the
/// workflow schema.
#[derive(Debug, Clone)]
pub struct Normalizer {
    index: Arc<PieceIndex>,
    max_chain_length: usize,
}

impl Normalizer {
    pub fn new(index: Arc<PieceIndex>) -> Self {
        Self {
            index,
            max_chain_length: DEFAULT_MAX_CHAIN_LENGTH,
        }
    }

    /// Longest accepted trigger + action chain. Clamped to at least one step.
    pub fn with_max_chain_length(mut self, limit: usize) -> Self {
        self.max_chain_length = limit.max(1);
        self
    }

    pub fn normalize(&self, raw: Value) -> Result<Normalized, SchemaError> {
        let timestamp = chrono::Utc::now().timestamp_millis().to_string();
        self.normalize_at(raw, &timestamp)
    }

    /// Same as [`normalize`](Self::normalize) with a caller-supplied
    /// timestamp for `created`/`updated` defaults.
    pub fn normalize_at(&self, raw: Value, timestamp: &str) -> Result<Normalized, SchemaError> {
        let Value::Object(mut doc) = raw else {
            return Err(SchemaError::NotAMapping);
        };

        let created = doc
            .remove("created")
            .unwrap_or_else(|| Value::from(timestamp));
        let updated = doc
            .remove("updated")
            .unwrap_or_else(|| Value::from(timestamp));
        let description = doc.remove("description").unwrap_or_else(|| Value::from(""));
        let tags = doc.remove("tags").unwrap_or_else(|| Value::Array(Vec::new()));
        let blog_url = doc.remove("blogUrl").unwrap_or_else(|| Value::from(""));
        doc.remove("type");

        let name = doc.remove("name");
        let (pieces, dropped_pieces) = self.filter_pieces(doc.remove("pieces"));
        let template = self.normalize_template(doc.remove("template"), name.as_ref())?;

        log::debug!(
            "Normalized workflow with {} piece(s), {} step(s)",
            pieces.len(),
            template.steps().count()
        );

        Ok(Normalized {
            document: WorkflowDocument {
                created,
                updated,
                name,
                description,
                tags,
                blog_url,
                kind: DocumentKind::Workflow,
                pieces,
                template,
                extra: doc,
            },
            dropped_pieces,
        })
    }

    /// Keep the pieces the index knows, in order. A non-sequence value is
    /// discarded without a report.
    fn filter_pieces(&self, raw: Option<Value>) -> (Vec<String>, Vec<String>) {
        let Some(Value::Array(items)) = raw else {
            return (Vec::new(), Vec::new());
        };

        let mut kept = Vec::with_capacity(items.len());
        let mut dropped = Vec::new();
        for item in items {
            match item {
                Value::String(id) if self.index.contains(&id) => kept.push(id),
                Value::String(id) => {
                    log::warn!("Unknown piece {} - removing from list", id);
                    dropped.push(id);
                }
                other => {
                    let text = other.to_string();
                    log::warn!("Unknown piece {} - removing from list", text);
                    dropped.push(text);
                }
            }
        }
        (kept, dropped)
    }

    fn normalize_template(
        &self,
        raw: Option<Value>,
        name: Option<&Value>,
    ) -> Result<Template, SchemaError> {
        let mut template = match raw {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };

        template.remove("schemaVersion");
        template.remove("valid");
        template.remove("displayName");
        let display_name = name
            .cloned()
            .unwrap_or_else(|| Value::from(UNTITLED_WORKFLOW));
        let connection_ids = match template.remove("connectionIds") {
            Some(Value::Array(ids)) => ids,
            _ => Vec::new(),
        };
        let trigger = match template.remove("trigger") {
            Some(head) => Some(self.normalize_chain(head)?),
            None => None,
        };

        Ok(Template {
            display_name,
            trigger,
            connection_ids,
            schema_version: SchemaVersion::V2,
            valid: true,
            extra: template,
        })
    }

    /// Walk the `nextAction` chain iteratively, then patch and relink the
    /// steps from the tail up.
    fn normalize_chain(&self, head: Value) -> Result<Link, SchemaError> {
        let mut head = match head {
            Value::Object(map) => map,
            other => return Ok(Link::Opaque(other)),
        };

        let mut rest = Vec::new();
        let mut terminator = None;
        let mut cursor = head.remove("nextAction");
        while let Some(value) = cursor.take() {
            let mut step = match value {
                Value::Object(map) => map,
                other => {
                    terminator = Some(other);
                    break;
                }
            };
            cursor = step.remove("nextAction");
            rest.push(step);
            if rest.len() + 1 > self.max_chain_length {
                return Err(SchemaError::ChainTooLong {
                    limit: self.max_chain_length,
                });
            }
        }

        let next = rest
            .into_iter()
            .rev()
            .fold(terminator.map(Link::Opaque), |next, step| {
                Some(Link::Step(Box::new(patch_step(step, next))))
            });
        Ok(Link::Step(Box::new(patch_step(head, next))))
    }
}

/// Apply the per-step rules. `step` must already have its `nextAction`
/// removed; the patched successor is passed in as `next`.
fn patch_step(mut step: Map<String, Value>, next: Option<Link>) -> Step {
    let settings = match step.remove("settings") {
        Some(Value::Object(settings)) => settings,
        Some(other) => {
            log::warn!("Step settings is not a mapping ({}), replacing it", other);
            Map::new()
        }
        None => Map::new(),
    };

    let declared = step.remove("type");
    let step_type = if settings.contains_key("triggerName") {
        StepType::PieceTrigger
    } else {
        declared
            .as_ref()
            .and_then(Value::as_str)
            .and_then(StepType::from_wire)
            .unwrap_or(StepType::Piece)
    };

    let name = step.remove("name");
    let valid = step.remove("valid").unwrap_or(Value::Bool(true));
    let display_name = step
        .remove("displayName")
        .or_else(|| name.clone())
        .unwrap_or_else(|| Value::from(UNNAMED_STEP));

    Step {
        name,
        step_type,
        valid,
        display_name,
        settings: patch_settings(settings, step_type),
        next_action: next,
        extra: step,
    }
}

fn patch_settings(mut settings: Map<String, Value>, step_type: StepType) -> Settings {
    let piece_name = settings.remove("pieceName");
    let has_piece = piece_name.is_some();
    let mut registry_default = |key: &str, default: &str| {
        let value = settings.remove(key);
        if has_piece {
            Some(value.unwrap_or_else(|| Value::from(default)))
        } else {
            value
        }
    };
    let piece_version = registry_default("pieceVersion", DEFAULT_PIECE_VERSION);
    let piece_type = registry_default("pieceType", DEFAULT_PIECE_TYPE);
    let package_type = registry_default("packageType", DEFAULT_PACKAGE_TYPE);

    let error_handling_options = settings.remove("errorHandlingOptions");
    let error_handling_options = match step_type {
        StepType::Piece => Some(
            error_handling_options
                .unwrap_or_else(|| ErrorHandlingOptions::default().to_value()),
        ),
        _ => error_handling_options,
    };

    Settings {
        piece_name,
        trigger_name: settings.remove("triggerName"),
        action_name: settings.remove("actionName"),
        piece_version,
        piece_type,
        package_type,
        input: settings.remove("input"),
        input_ui_info: settings
            .remove("inputUiInfo")
            .unwrap_or_else(|| Value::Object(Map::new())),
        error_handling_options,
        extra: settings,
    }
}
