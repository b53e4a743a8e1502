/// State management module
///
/// This module handles all application state, including:
/// - Key-value storage backend over SQLite (storage.rs)
/// - The image reference store, the single source of truth
///   for the persisted photo list (store.rs)

pub mod storage;
pub mod store;
