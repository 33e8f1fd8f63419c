/// Database connection and schema management
pub mod database;

/// Settings loading from the TOML file
pub mod settings;
