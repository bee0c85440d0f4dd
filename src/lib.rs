mod backend;
mod content;
mod gemini;
mod length;
mod llm;
mod local;
mod normalize;
mod schema;

pub mod cli;
pub mod config;
pub mod error;
pub mod server;

pub use backend::{
    AlwaysRemote, BackendPolicy, GenerationBackend, GenerationConfig, PreferLocal,
    TextFragmentStream,
};
pub use content::{CharacterStream, ContentService};
pub use gemini::GeminiBackend;
pub use length::{parse_length_requirement, rewrite_prompt, LengthRequirement};
pub use local::{LocalBackend, ModelState};
pub use normalize::normalize_output;
pub use schema::{
    ChatRequest, ContentResponse, ConversationDetailResponse, ConversationListResponse,
    ConversationResponse, FrameKind, MessageResponse, QuickGenerateRequest, StreamFrame,
};
pub use server::{create_router, AppState, Server};
