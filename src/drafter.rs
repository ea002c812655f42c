use crate::error::DraftError;
use crate::pieces::PieceIndex;
use serde::Serialize;
use serde_json::Value;

pub const DEFAULT_MODEL: &str = "gpt-4-turbo";
const TEMPERATURE: f64 = 0.1;
const MAX_TOKENS: u32 = 4000;

const DOCUMENT_SKELETON: &str = r#"{
  "created": "<timestamp_ms>",
  "updated": "<timestamp_ms>",
  "name": "Workflow Name",
  "description": "",
  "tags": [],
  "pieces": ["@activepieces/piece-name1", "@activepieces/piece-name2"],
  "template": {
    "displayName": "Workflow Name",
    "trigger": {
      "name": "trigger",
      "valid": true,
      "displayName": "Trigger Display Name",
      "type": "PIECE_TRIGGER",
      "settings": {
        "pieceName": "@activepieces/piece-name",
        "triggerName": "trigger_name",
        "pieceVersion": "~0.1.0",
        "pieceType": "OFFICIAL",
        "packageType": "REGISTRY",
        "input": {
          "auth": "{{connections['connection-id']}}"
        },
        "inputUiInfo": {}
      },
      "nextAction": {
        "name": "step_1",
        "valid": true,
        "displayName": "Action Display Name",
        "type": "PIECE",
        "settings": {
          "pieceName": "@activepieces/piece-name",
          "actionName": "action_name",
          "pieceVersion": "~0.1.0",
          "pieceType": "OFFICIAL",
          "packageType": "REGISTRY",
          "input": {},
          "inputUiInfo": {},
          "errorHandlingOptions": {
            "retryOnFailure": {"value": false},
            "continueOnFailure": {"value": false}
          }
        }
      }
    },
    "connectionIds": ["connection-id1", "connection-id2"],
    "schemaVersion": "2",
    "valid": true
  },
  "blogUrl": "",
  "type": "workflow"
}"#;

const RULES: &str = "CRITICAL RULES:
1. There is NO \"steps\" array. Chain actions through nested \"nextAction\" objects.
2. Every action's settings MUST carry pieceName, actionName (snake_case), pieceVersion \"~0.1.0\", pieceType \"OFFICIAL\" and packageType \"REGISTRY\".
3. The trigger type MUST be \"PIECE_TRIGGER\".
4. Action types MUST be \"PIECE\".
5. Variables use the {{varname}} format.
6. Connection IDs are plain strings such as [\"gmail\", \"sheets\"].
7. Auth inside input uses \"auth\": \"{{connections['connection-name']}}\".";

const CONVENTIONS: &str = "Naming conventions:
- Use snake_case for every action and trigger name (send_email, new_row_added).
- Gmail: triggerName \"new_email\", actionName \"gmail_send_email\".
- Google Sheets: actionName \"insert_row\", \"find_rows\", \"update_row\".
- HTTP: pieceName \"@activepieces/piece-http\", actionName \"send_request\".
- Schedule triggers: \"every_day\", \"every_hour\", \"cron_expression\".
- Webhook: triggerName \"catch_webhook\", actionName \"return_response\".
- Delay: actionName \"delayFor\", \"delay_until\".

Piece hints:
- AI / ChatGPT / GPT: @activepieces/piece-openai
- storage / S3: @activepieces/piece-amazon-s3
- database: postgres, mysql, mongodb or supabase pieces
- email: gmail, smtp, sendgrid or mailchimp
- messaging: slack, discord, telegram-bot or whatsapp
- schedule / cron / timer: @activepieces/piece-schedule
- wait / delay / pause: @activepieces/piece-delay
- approve / approval: @activepieces/piece-approval

Return ONLY valid JSON, no markdown or comments.";

/// Instructions handed to the completion service ahead of the user's
/// description.
pub fn system_prompt(index: &PieceIndex) -> String {
    format!(
        "You are a professional Activepieces workflow builder.\n\
         Generate a valid Activepieces workflow JSON with this EXACT structure:\n\n\
         {}\n\n{}\n\nAvailable pieces and their actions/triggers:\n{}\n\n{}\n",
        DOCUMENT_SKELETON,
        RULES,
        index.describe(),
        CONVENTIONS
    )
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub kind: &'static str,
}

/// Chat-completions request body asking for a JSON workflow document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub response_format: ResponseFormat,
    pub messages: Vec<ChatMessage>,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, system: String, user: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            response_format: ResponseFormat { kind: "json_object" },
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user.into(),
                },
            ],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        }
    }

    pub fn for_description(index: &PieceIndex, model: &str, description: &str) -> Self {
        Self::new(model, system_prompt(index), description)
    }
}

/// Decode generator output into a raw document.
///
/// Accepts the bare document text, the same text wrapped in a markdown code
/// fence, or a whole chat-completion response whose first choice carries the
/// document as its message content.
pub fn decode_completion(text: &str) -> Result<Value, DraftError> {
    let value = parse_json(text)?;
    match value["choices"][0]["message"]["content"].as_str() {
        Some(content) => {
            log::debug!("Unwrapping chat completion response");
            parse_json(content)
        }
        None => Ok(value),
    }
}

fn parse_json(text: &str) -> Result<Value, DraftError> {
    let body = strip_code_fence(text.trim());
    if body.is_empty() {
        return Err(DraftError::Empty);
    }
    Ok(serde_json::from_str(body)?)
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let Some(rest) = rest.strip_suffix("```") else {
        return text;
    };
    // drop the info string (```json)
    match rest.find('\n') {
        Some(newline) => rest[newline + 1..].trim(),
        None => rest.trim(),
    }
}
