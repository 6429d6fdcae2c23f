pub type Address = [u8; 32];
pub type TokenId = [u8; 32];
pub type Amount = u64;

/// Sentinel identity: the implicit origin of mint and destination of burn.
/// No balance is ever credited to it through the public API.
pub const NULL_ACCOUNT: Address = [0u8; 32];

/// Builds an address from a small integer, big-endian in the trailing bytes.
/// Intended for tests and tooling; `n` must be non-zero to avoid the null
/// account.
pub fn address_from_u64(n: u64) -> Address {
    let mut out = [0u8; 32];
    out[24..].copy_from_slice(&n.to_be_bytes());
    out
}

/// Builds a token class id from a small integer, big-endian in the trailing
/// bytes.
pub fn token_id_from_u64(n: u64) -> TokenId {
    let mut out = [0u8; 32];
    out[24..].copy_from_slice(&n.to_be_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_constructors_fill_trailing_bytes() {
        let addr = address_from_u64(1);
        assert_eq!(addr[31], 1);
        assert_eq!(&addr[..31], &[0u8; 31]);

        let id = token_id_from_u64(0x0102);
        assert_eq!(id[30], 1);
        assert_eq!(id[31], 2);
    }

    #[test]
    fn zero_is_the_null_account() {
        assert_eq!(address_from_u64(0), NULL_ACCOUNT);
    }
}
