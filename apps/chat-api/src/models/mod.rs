pub mod chat_message;
pub mod reaction;
pub mod user;
