pub mod candidate;
pub mod chat_message;
pub mod company;
pub mod record_point;
pub mod validation;
