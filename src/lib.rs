pub mod analyzer;
pub mod config;
pub mod context;
pub mod data_assistant;
pub mod error;
pub mod export;
pub mod keywords;
pub mod mock_data;
pub mod results;
pub mod schema;
pub mod session;
pub mod sql_compiler;
pub mod synthesizer;

pub use analyzer::{Clarification, QueryAnalysis, QueryAnalyzer};
pub use context::ConversationContext;
pub use data_assistant::{AssistantResponse, DataAssistant, ResponseType};
pub use error::{AssistantError, Result};
pub use sql_compiler::SqlStatement;
pub use synthesizer::SqlSynthesizer;
