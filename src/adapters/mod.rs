// Adapters layer: concrete implementations for external systems (file storage, CSV tables).

pub mod storage;
pub mod table;
