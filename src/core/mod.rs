pub mod errors;
pub mod events;
pub mod models;
pub mod orchestrator;
pub mod state;

pub use orchestrator::ScanOrchestrator;
