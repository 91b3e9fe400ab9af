pub mod collaborator;
pub mod config;
pub mod errors;
pub mod export;
pub mod orchestrator;
pub mod store;
pub mod ui;
