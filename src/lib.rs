pub mod config;
pub mod console;
pub mod error;
pub mod models;
pub mod protocol;
pub mod sources;
pub mod state;
