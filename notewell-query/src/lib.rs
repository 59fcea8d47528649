pub mod bootstrap;
pub mod llm;
pub mod prompt;
pub mod retriever;
pub mod runtime;
pub mod session;

pub use bootstrap::{LiveSession, StartupError, bootstrap};
pub use llm::{LanguageModel, LlmError, OllamaModel};
pub use prompt::PromptTemplate;
pub use retriever::{Retrieve, RetrieveError, Retriever};
pub use session::{Answer, Command, QueryError, QuerySession, SessionEnd, SessionState};
