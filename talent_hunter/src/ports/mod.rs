pub mod chat_model;
pub mod embeddings_service;
pub mod record_point_repository;
