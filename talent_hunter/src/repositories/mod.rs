pub mod chat_model_openai_repository;
pub mod record_point_qdrant_repository;
