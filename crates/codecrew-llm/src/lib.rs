pub mod cache;
pub mod chat;
pub mod oracle;

pub use cache::{client_for, oracle_for};
pub use chat::{ChatClient, ChatTurn};
pub use oracle::LlmOracle;
