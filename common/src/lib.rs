//! Upcycle AI Common Library
//!
//! CLIとライブラリで共有される型・プロンプト・状態同期ロジック

pub mod types;
pub mod error;
pub mod parser;
pub mod prompts;
pub mod data_url;
pub mod sync;

pub use types::{
    AnalysisResult, ChatMessage, ChatRole, Difficulty, Feedback, GeneratedIdea, IdeaRequest,
    IdeaResponse, ImageGenerationState, ImageInput, JournalEntry, NegativeExample, ProjectRecord,
    Source, Vote,
};
pub use error::{Error, Result};
pub use parser::{extract_json, parse_idea_response};
pub use prompts::{
    build_analysis_prompt, build_project_chat_greeting, build_project_chat_instruction,
    GENERAL_CHAT_GREETING, GENERAL_CHAT_INSTRUCTION,
};
pub use data_url::{build_data_url, extract_base64_from_data_url, extract_mime_type_from_data_url};
pub use sync::{ProjectCollections, Touched};
