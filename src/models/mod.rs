pub mod chat;
pub mod message;

pub use chat::Chat;
pub use message::{now_millis, Message, Sender};
