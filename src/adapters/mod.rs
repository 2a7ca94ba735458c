// Adapters layer: concrete implementations of the domain ports (storage, scoring, time).

pub mod clock;
pub mod csv_import;
pub mod http_scorer;
pub mod json_store;
pub mod memory_store;
