pub mod catalog;
pub mod loader;
pub mod proxy;
pub mod types;

pub use loader::ConfigLoader;
pub use proxy::ProxyConfig;
pub use types::ScanSettings;
