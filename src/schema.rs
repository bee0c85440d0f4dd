use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;

pub const MAX_MESSAGE_LENGTH: usize = 10_000;
pub const MAX_PROMPT_LENGTH: usize = 5_000;
pub const ALLOWED_CONTENT_TYPES: &[&str] = &["blog", "social", "ideas", "email", "general"];

// Request types

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub conversation_id: Option<Uuid>,
    #[serde(default = "default_stream")]
    pub stream: bool,
    #[serde(default = "default_content_type")]
    pub content_type: String,
}

#[derive(Debug, Deserialize)]
pub struct QuickGenerateRequest {
    pub prompt: String,
    #[serde(default = "default_content_type")]
    pub content_type: String,
    #[serde(default)]
    pub max_length: Option<usize>,
}

fn default_stream() -> bool {
    true
}

fn default_content_type() -> String {
    "general".to_string()
}

// Response types

#[derive(Debug, Serialize, Deserialize)]
pub struct ContentResponse {
    pub success: bool,
    pub content: String,
    pub message: String,
}

/// One SSE frame of a streamed generation.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamFrame {
    #[serde(rename = "type")]
    pub kind: FrameKind,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameKind {
    Start,
    Chunk,
    End,
    Error,
}

impl StreamFrame {
    pub fn start() -> Self {
        Self {
            kind: FrameKind::Start,
            content: String::new(),
        }
    }

    pub fn chunk(content: String) -> Self {
        Self {
            kind: FrameKind::Chunk,
            content,
        }
    }

    pub fn end() -> Self {
        Self {
            kind: FrameKind::End,
            content: String::new(),
        }
    }
}

// Validation

/// Trims the message and checks the length bounds. Returns the trimmed text
/// the pipeline should see.
pub fn validate_message(message: &str) -> Result<&str, ApiError> {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        return Err(ApiError::Validation(
            "Message cannot be empty or just whitespace".to_string(),
        ));
    }
    if message.chars().count() > MAX_MESSAGE_LENGTH {
        return Err(ApiError::Validation(format!(
            "Message cannot exceed {} characters",
            MAX_MESSAGE_LENGTH
        )));
    }
    Ok(trimmed)
}

pub fn validate_prompt(prompt: &str) -> Result<&str, ApiError> {
    let trimmed = prompt.trim();
    if trimmed.is_empty() {
        return Err(ApiError::Validation("Prompt cannot be empty".to_string()));
    }
    if prompt.chars().count() > MAX_PROMPT_LENGTH {
        return Err(ApiError::Validation(format!(
            "Prompt cannot exceed {} characters",
            MAX_PROMPT_LENGTH
        )));
    }
    Ok(trimmed)
}

pub fn validate_content_type(content_type: &str) -> Result<(), ApiError> {
    if ALLOWED_CONTENT_TYPES.contains(&content_type) {
        Ok(())
    } else {
        Err(ApiError::Validation(format!(
            "Content type must be one of: {}",
            ALLOWED_CONTENT_TYPES.join(", ")
        )))
    }
}

// Conversation persistence is out of scope; these types mirror the planned
// surface and are not served by any route.

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub role: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationResponse {
    pub id: Uuid,
    pub title: String,
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_archived: bool,
    #[serde(default)]
    pub message_count: Option<u64>,
    #[serde(default)]
    pub last_message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationDetailResponse {
    #[serde(flatten)]
    pub conversation: ConversationResponse,
    #[serde(default)]
    pub messages: Vec<MessageResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationListResponse {
    pub conversations: Vec<ConversationResponse>,
    pub total_count: u64,
    #[serde(default)]
    pub has_more: bool,
}
