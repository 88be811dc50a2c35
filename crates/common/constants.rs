use ethereum_types::U256;
use std::sync::LazyLock;

// Order of the secp256k1 curve group, n
pub static SECP256K1_ORDER: LazyLock<U256> =
    LazyLock::new(|| U256::from_big_endian(&secp256k1::constants::CURVE_ORDER));

/// Offset added to the recovery id of a legacy signature without chain id.
/// Defined in the Ethereum yellow paper, appendix F.
pub const LEGACY_V_OFFSET: u64 = 27;

/// Offset added to the recovery id of a replay protected legacy signature.
/// Defined in [EIP-155](https://eips.ethereum.org/EIPS/eip-155)
pub const EIP155_V_OFFSET: u64 = 35;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn curve_order_matches_secp256k1_n() {
        let expected = U256::from_str_radix(
            "fffffffffffffffffffffffffffffffebaaedce6af48a03bbfd25e8cd0364141",
            16,
        )
        .unwrap();
        assert_eq!(*SECP256K1_ORDER, expected);
        assert!(!SECP256K1_ORDER.is_zero());
    }
}
