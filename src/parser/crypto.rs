const P2PKH_VERSION: u8 = 0x00;
const P2SH_VERSION: u8 = 0x05;

/// Legacy base58check address: version byte plus 20-byte hash, with a
/// valid double-SHA-256 checksum.
pub fn is_valid_base58_address(candidate: &str) -> bool {
    match bs58::decode(candidate).with_check(None).into_vec() {
        Ok(payload) => payload.len() == 21 && matches!(payload[0], P2PKH_VERSION | P2SH_VERSION),
        Err(_) => false,
    }
}

/// Mainnet segwit address (bech32 for v0, bech32m for v1+).
pub fn is_valid_segwit_address(candidate: &str) -> bool {
    match bech32::segwit::decode(candidate) {
        Ok((prefix, _, _)) => prefix.as_str().eq_ignore_ascii_case("bc"),
        Err(_) => false,
    }
}

pub fn is_valid_bitcoin_address(candidate: &str) -> bool {
    if candidate.get(..3).is_some_and(|prefix| prefix.eq_ignore_ascii_case("bc1")) {
        is_valid_segwit_address(candidate)
    } else {
        is_valid_base58_address(candidate)
    }
}
