pub mod assembler;
pub mod context;
pub mod controller;
pub mod database;
pub mod generation;
pub mod parser;
pub mod persistence;
pub mod store;

pub use context::SessionContext;
pub use controller::SessionController;
pub use database::Database;
pub use generation::GenerationClient;
pub use persistence::Persistence;
pub use store::ConversationStore;
