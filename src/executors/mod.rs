pub mod http;
pub mod socks;
pub mod tls;
