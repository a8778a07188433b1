pub mod writer;

pub use writer::BatchReport;
