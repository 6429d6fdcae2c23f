//! Per-class URI resolution with base-URI fallback

use std::collections::BTreeMap;

use tessera_core::TokenId;

/// Resolves a token class URI: the override wins if one exists, otherwise
/// the base URI concatenated with the decimal form of the class id.
pub fn resolve_uri(overrides: &BTreeMap<TokenId, String>, base_uri: &str, id: TokenId) -> String {
    match overrides.get(&id) {
        Some(uri) => uri.clone(),
        None => format!("{}{}", base_uri, decimal_string(id)),
    }
}

/// Renders a 256-bit class id as a decimal string, interpreting the bytes
/// as a big-endian unsigned integer. Long division by 10, no bignum crate.
pub fn decimal_string(id: TokenId) -> String {
    let mut scratch = id;
    let mut digits = Vec::new();
    loop {
        let mut rem: u32 = 0;
        let mut nonzero = false;
        for byte in scratch.iter_mut() {
            let acc = (rem << 8) | *byte as u32;
            *byte = (acc / 10) as u8;
            rem = acc % 10;
            if *byte != 0 {
                nonzero = true;
            }
        }
        digits.push(rem as u8);
        if !nonzero {
            break;
        }
    }
    digits.iter().rev().map(|d| (b'0' + d) as char).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::types::token_id_from_u64;

    #[test]
    fn zero_renders_as_single_digit() {
        assert_eq!(decimal_string(token_id_from_u64(0)), "0");
    }

    #[test]
    fn small_values_match_u64_rendering() {
        for n in [1u64, 7, 10, 42, 255, 256, 1_000_000, u64::MAX] {
            assert_eq!(decimal_string(token_id_from_u64(n)), n.to_string());
        }
    }

    #[test]
    fn max_value_renders_all_78_digits() {
        let expected = "115792089237316195423570985008687907853269984665640564039457584007913129639935";
        assert_eq!(decimal_string([0xff; 32]), expected);
    }

    #[test]
    fn fallback_appends_decimal_id() {
        let overrides = BTreeMap::new();
        let uri = resolve_uri(&overrides, "https://meta.example/", token_id_from_u64(42));
        assert_eq!(uri, "https://meta.example/42");
    }

    #[test]
    fn override_wins_over_fallback() {
        let mut overrides = BTreeMap::new();
        overrides.insert(token_id_from_u64(42), "X".to_string());
        let uri = resolve_uri(&overrides, "https://meta.example/", token_id_from_u64(42));
        assert_eq!(uri, "X");
    }
}
