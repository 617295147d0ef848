pub mod bot;
pub mod commands;
pub mod config;
pub mod logging;
pub mod providers;
pub mod telegram;

pub use bot::Bot;

// Always expose testing module (integration tests need it)
pub mod testing;
