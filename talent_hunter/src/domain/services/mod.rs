pub mod huggingface_embedding;
pub mod record_adapter;
pub mod talent_store;
