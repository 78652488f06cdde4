pub mod bot;
pub mod commands;
pub mod config;
pub mod database;
pub mod llm;
pub mod persona;
pub mod providers;
pub mod serving;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used items
pub use config::AppConfig;
pub use llm::Assistant;
pub use persona::AdvisorPersona;
