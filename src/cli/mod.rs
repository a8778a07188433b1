pub mod args;
pub mod targets;

pub use targets::TargetList;
