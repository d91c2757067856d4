pub mod config;
#[cfg(test)]
pub mod memory;
pub mod row_store;
pub mod schema_store;
