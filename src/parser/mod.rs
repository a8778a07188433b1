pub mod crypto;
pub mod document;
pub mod exif;
pub mod extractor;
pub mod fingerprint;

pub use extractor::ArtifactExtractor;
pub use fingerprint::fingerprint;
