pub mod json_table_store;

pub use json_table_store::JsonTableStore;
