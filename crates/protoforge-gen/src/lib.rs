pub mod engine;
pub mod mock;
pub mod parse;
pub mod pipeline;
pub mod prompt;

pub use engine::{from_settings, ChatPrompt, LlmError, OllamaClient, TextGenerator};
pub use mock::ScriptedGenerator;
pub use pipeline::{
    GenError, Generated, JdlOutput, Pipeline, ProjectLocks, ProjectSummary, Source, Suggestion,
    DEFAULT_PORT, DEFAULT_RECORDS,
};
