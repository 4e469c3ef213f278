/// Document store contract and its file/in-memory implementations.
pub mod document_store;
/// Serialized document shapes.
pub mod models;
/// Storage error types shared by every backend.
pub mod storage;
