pub mod completion;
pub mod config;
pub mod db;
pub mod error;
pub mod interpret;
pub mod models;
pub mod store;

pub use completion::{ChatCompletionClient, CompletionBackend, CompletionError, CompletionSettings};
pub use config::ProspectConfig;
pub use error::ProspectError;
pub use interpret::{InterpretError, Interpreter};
pub use models::{ChatExchange, FailureCause, InterpretationResult};
pub use store::{create_store, ExchangeStore, MemoryExchangeStore, PgExchangeStore};
