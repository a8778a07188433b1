pub mod printer;
pub mod progress;
pub mod table;

pub use progress::ProgressManager;
