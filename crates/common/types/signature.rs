use ethereum_types::{Address, H256, Signature, U256};
use secp256k1::{Message, SECP256K1, SecretKey, ecdsa::RecoveryId};
use sha3::{Digest, Keccak256};

use crate::constants::{EIP155_V_OFFSET, LEGACY_V_OFFSET, SECP256K1_ORDER};

/// Returns whether `v` binds a chain id.
/// For more information check out [EIP-155](https://github.com/ethereum/EIPs/blob/master/EIPS/eip-155.md)
pub fn is_protected_v(v: U256) -> bool {
    if v.bits() <= 8 {
        let v = v.as_u64();
        return v != 27 && v != 28 && v != 1 && v != 0;
    }
    true
}

/// Chain id bound by a legacy `v`, or `None` for a pre EIP-155 signature.
pub fn derive_legacy_chain_id(v: U256) -> Option<u64> {
    if v.bits() > 64 {
        return None;
    }
    let v = v.as_u64();
    if v < EIP155_V_OFFSET {
        return None;
    }
    Some((v - EIP155_V_OFFSET) / 2)
}

/// Checks the shape of a signature triple.
///
/// `maybe_protected` is only set for legacy transactions, whose `v` may either
/// carry the legacy offset or bind a chain id. Every other kind must carry the
/// bare recovery id in `v`.
pub fn sanity_check_signature(v: U256, r: U256, s: U256, maybe_protected: bool) -> bool {
    let protected = is_protected_v(v);
    if protected && !maybe_protected {
        return false;
    }
    if v.bits() > 64 {
        return false;
    }
    let v = v.as_u64();
    let plain_v = if protected {
        let Some(chain_id) = derive_legacy_chain_id(U256::from(v)) else {
            return false;
        };
        v.checked_sub(EIP155_V_OFFSET + 2 * chain_id)
    } else if maybe_protected {
        v.checked_sub(LEGACY_V_OFFSET)
    } else {
        Some(v)
    };
    let Some(plain_v) = plain_v else {
        return false;
    };
    validate_signature_values(plain_v, r, s)
}

/// `r` and `s` must lie in `[1, n)` and the recovery id must be 0 or 1.
pub fn validate_signature_values(recovery_id: u64, r: U256, s: U256) -> bool {
    if r.is_zero() || s.is_zero() {
        return false;
    }
    r < *SECP256K1_ORDER && s < *SECP256K1_ORDER && (recovery_id == 0 || recovery_id == 1)
}

/// Packs `r || s || y_parity` into a recoverable signature.
pub(crate) fn compact_signature(r: U256, s: U256, y_parity: bool) -> Signature {
    let mut sig = [0u8; 65];
    sig[..32].copy_from_slice(&r.to_big_endian());
    sig[32..64].copy_from_slice(&s.to_big_endian());
    sig[64] = y_parity as u8;
    Signature::from_slice(&sig)
}

/// Signs `hash` and returns `(y_parity, r, s)`.
pub(crate) fn sign_hash(hash: H256, private_key: &SecretKey) -> (U256, U256, U256) {
    let msg = Message::from_digest(hash.0);
    let (recovery_id, signature) = SECP256K1
        .sign_ecdsa_recoverable(&msg, private_key)
        .serialize_compact();
    (
        U256::from(i32::from(recovery_id) as u64),
        U256::from_big_endian(&signature[..32]),
        U256::from_big_endian(&signature[32..]),
    )
}

pub fn recover_address_from_message(
    signature: Signature,
    message: &[u8],
) -> Result<Address, secp256k1::Error> {
    // Hash message
    let payload: [u8; 32] = Keccak256::new_with_prefix(message).finalize().into();
    recover_address(signature, H256::from_slice(&payload))
}

pub fn recover_address(signature: Signature, payload: H256) -> Result<Address, secp256k1::Error> {
    // Create signature
    let signature_bytes = signature.to_fixed_bytes();
    let signature = secp256k1::ecdsa::RecoverableSignature::from_compact(
        &signature_bytes[..64],
        RecoveryId::try_from(signature_bytes[64] as i32)?,
    )?;
    // Recover public key
    let public =
        SECP256K1.recover_ecdsa(&Message::from_digest(payload.to_fixed_bytes()), &signature)?;
    // Hash public key to obtain address
    let hash = Keccak256::new_with_prefix(&public.serialize_uncompressed()[1..]).finalize();
    Ok(Address::from_slice(&hash[12..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one() -> U256 {
        U256::one()
    }

    #[test]
    fn protected_v_detection() {
        for v in [0u64, 1, 27, 28] {
            assert!(!is_protected_v(U256::from(v)));
        }
        for v in [2u64, 26, 29, 37, 38, 255] {
            assert!(is_protected_v(U256::from(v)));
        }
        assert!(is_protected_v(U256::from(1) << 8));
    }

    #[test]
    fn legacy_chain_id_is_derived_from_v() {
        assert_eq!(derive_legacy_chain_id(U256::from(27)), None);
        assert_eq!(derive_legacy_chain_id(U256::from(28)), None);
        assert_eq!(derive_legacy_chain_id(U256::from(37)), Some(1));
        assert_eq!(derive_legacy_chain_id(U256::from(38)), Some(1));
        assert_eq!(derive_legacy_chain_id(U256::from(2 * 1337 + 36)), Some(1337));
        assert_eq!(derive_legacy_chain_id(U256::MAX), None);
    }

    #[test]
    fn typed_signatures_must_carry_recovery_id() {
        assert!(sanity_check_signature(U256::zero(), one(), one(), false));
        assert!(sanity_check_signature(one(), one(), one(), false));
        // 27 is not protected but is not a recovery id either
        assert!(!sanity_check_signature(U256::from(27), one(), one(), false));
        assert!(!sanity_check_signature(U256::from(37), one(), one(), false));
    }

    #[test]
    fn legacy_signatures_may_be_protected() {
        assert!(sanity_check_signature(U256::from(27), one(), one(), true));
        assert!(sanity_check_signature(U256::from(28), one(), one(), true));
        assert!(sanity_check_signature(U256::from(37), one(), one(), true));
        assert!(sanity_check_signature(U256::from(38), one(), one(), true));
        assert!(!sanity_check_signature(U256::from(0), one(), one(), true));
        assert!(!sanity_check_signature(U256::from(30), one(), one(), true));
    }

    #[test]
    fn r_and_s_must_be_in_curve_order_range() {
        let n = *SECP256K1_ORDER;
        assert!(!sanity_check_signature(U256::zero(), U256::zero(), one(), false));
        assert!(!sanity_check_signature(U256::zero(), one(), U256::zero(), false));
        assert!(!sanity_check_signature(U256::zero(), n, one(), false));
        assert!(!sanity_check_signature(U256::zero(), one(), n, false));
        assert!(sanity_check_signature(U256::zero(), n - 1, n - 1, false));
    }

    #[test]
    fn signed_hash_recovers_signer() {
        let private_key = SecretKey::from_slice(&[0x11; 32]).unwrap();
        let expected = Address::from(crate::utils::keccak(
            &private_key.public_key(SECP256K1).serialize_uncompressed()[1..],
        ));
        let hash = crate::utils::keccak(b"batch");
        let (v, r, s) = sign_hash(hash, &private_key);
        assert!(sanity_check_signature(v, r, s, false));
        let recovered = recover_address(compact_signature(r, s, !v.is_zero()), hash).unwrap();
        assert_eq!(recovered, expected);
    }
}
