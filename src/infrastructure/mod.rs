pub mod config;
pub mod credential_store;
pub mod error;
pub mod event_mapper;
pub mod event_repository;
pub mod explain_client;
pub mod kv_store;
pub mod profile_repository;
pub mod storage;
