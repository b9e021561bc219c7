pub mod cache;
pub mod engine;
pub mod openai;
pub mod semantic;
pub mod service;
pub mod settings;

pub use cache::{CacheFile, CacheLoadStatus};
pub use engine::{CatalogTarget, MatchReport, MatchSummary, MatchingEngine};
pub use openai::OpenAiClient;
pub use semantic::SemanticMatcher;
pub use service::{CompletionService, RunStatus};
pub use settings::{MatchSettings, SettingsOverrides};
