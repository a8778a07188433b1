pub mod banner_scan;
pub mod descriptor;
pub mod path_probe;

pub use banner_scan::BannerScanner;
pub use descriptor::{DescriptorLookup, NoDescriptorLookup};
pub use path_probe::PathProber;
