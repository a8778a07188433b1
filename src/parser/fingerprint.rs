use sha1::{Digest, Sha1};

/// SHA-1 of the page as UTF-8. Invalid sequences are replaced first so the
/// same page always hashes the same way.
pub fn fingerprint(html: &[u8]) -> String {
    let normalized = String::from_utf8_lossy(html);
    hex::encode(Sha1::digest(normalized.as_bytes()))
}
