/// Club data storage and realtime subscriptions.
pub mod club_store;
/// Database model definitions.
pub mod models;
/// Storage abstraction layer for database operations.
pub mod storage;
