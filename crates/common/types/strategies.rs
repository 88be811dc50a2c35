//! proptest strategies for the encrypted mempool transaction kinds.

use bytes::Bytes;
use ethereum_types::{Address, U256};
use proptest::{collection::vec, prelude::*};

use super::{BatchContextTransaction, BatchTransaction, DecryptedPayload, ShutterTransaction, TxKind};

pub fn bytes(max_len: usize) -> impl Strategy<Value = Bytes> {
    vec(any::<u8>(), 0..max_len).prop_map(Bytes::from)
}

pub fn u256() -> impl Strategy<Value = U256> {
    any::<[u8; 32]>().prop_map(|raw| U256::from_big_endian(&raw))
}

// the zero address is drawn on its own so it is set against `Create` often
pub fn tx_kind() -> impl Strategy<Value = TxKind> {
    prop_oneof![
        Just(TxKind::Create),
        Just(TxKind::Call(Address::zero())),
        any::<[u8; 20]>().prop_map(|raw| TxKind::Call(Address::from(raw))),
    ]
}

pub fn payload() -> impl Strategy<Value = DecryptedPayload> {
    (tx_kind(), bytes(256), u256()).prop_map(|(to, data, value)| DecryptedPayload {
        to,
        data,
        value,
    })
}

/// Shutter transactions as they come off the wire, without a payload.
pub fn shutter_tx() -> impl Strategy<Value = ShutterTransaction> {
    (
        (any::<u64>(), any::<u64>(), any::<u64>(), any::<u64>(), any::<u64>()),
        (bytes(256), any::<u64>(), any::<u64>()),
        (u256(), u256(), u256()),
    )
        .prop_map(
            |(
                (chain_id, nonce, max_priority_fee_per_gas, max_fee_per_gas, gas),
                (encrypted_payload, batch_index, l1_block_number),
                (v, r, s),
            )| ShutterTransaction {
                chain_id,
                nonce,
                max_priority_fee_per_gas,
                max_fee_per_gas,
                gas,
                encrypted_payload,
                batch_index,
                l1_block_number,
                payload: None,
                v,
                r,
                s,
            },
        )
}

pub fn batch_tx() -> impl Strategy<Value = BatchTransaction> {
    (
        (any::<u64>(), vec(bytes(128), 0..8), u256(), bytes(96)),
        (any::<u64>(), any::<u64>()),
        (u256(), u256(), u256()),
    )
        .prop_map(
            |(
                (chain_id, transactions, timestamp, decryption_key),
                (batch_index, l1_block_number),
                (v, r, s),
            )| BatchTransaction {
                chain_id,
                transactions,
                timestamp,
                decryption_key,
                batch_index,
                l1_block_number,
                v,
                r,
                s,
            },
        )
}

pub fn batch_context_tx() -> impl Strategy<Value = BatchContextTransaction> {
    (any::<u64>(), bytes(96), bytes(40)).prop_map(|(chain_id, decryption_key, batch_index)| {
        BatchContextTransaction {
            chain_id,
            decryption_key,
            batch_index,
        }
    })
}

/// Same bytes with every bit flipped, or a single byte when empty.
pub fn flipped(bytes: &Bytes) -> Bytes {
    if bytes.is_empty() {
        return Bytes::from_static(&[0xff]);
    }
    bytes.iter().map(|b| !b).collect::<Vec<u8>>().into()
}
