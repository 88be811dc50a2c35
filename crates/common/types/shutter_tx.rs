use bytes::Bytes;
use ethereum_types::{H256, U256};
use ethrex_rlp::{
    decode::RLPDecode,
    encode::RLPEncode,
    error::RLPDecodeError,
    structs::{Decoder, Encoder},
};
use secp256k1::SecretKey;

use super::{DecryptedPayload, TxExtension, TxKind, TxType, signature::sign_hash};
use crate::utils::{copy_bytes, keccak};

/// A transaction whose call is encrypted until the key of its batch is
/// released.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct ShutterTransaction {
    pub chain_id: u64,
    pub nonce: u64,
    pub max_priority_fee_per_gas: u64,
    pub max_fee_per_gas: u64,
    pub gas: u64,
    pub encrypted_payload: Bytes,
    pub batch_index: u64,
    pub l1_block_number: u64,
    /// Decrypted call, attached once the batch key is known.
    /// Never part of the encoding nor of the hash.
    pub payload: Option<DecryptedPayload>,
    pub v: U256,
    pub r: U256,
    pub s: U256,
}

impl RLPEncode for ShutterTransaction {
    fn encode(&self, buf: &mut dyn bytes::BufMut) {
        Encoder::new(buf)
            .encode_field(&self.chain_id)
            .encode_field(&self.nonce)
            .encode_field(&self.max_priority_fee_per_gas)
            .encode_field(&self.max_fee_per_gas)
            .encode_field(&self.gas)
            .encode_field(&self.encrypted_payload)
            .encode_field(&self.batch_index)
            .encode_field(&self.l1_block_number)
            .encode_field(&self.v)
            .encode_field(&self.r)
            .encode_field(&self.s)
            .finish();
    }
}

impl RLPDecode for ShutterTransaction {
    fn decode_unfinished(rlp: &[u8]) -> Result<(ShutterTransaction, &[u8]), RLPDecodeError> {
        let decoder = Decoder::new(rlp)?;
        let (chain_id, decoder) = decoder.decode_field("chain_id")?;
        let (nonce, decoder) = decoder.decode_field("nonce")?;
        let (max_priority_fee_per_gas, decoder) =
            decoder.decode_field("max_priority_fee_per_gas")?;
        let (max_fee_per_gas, decoder) = decoder.decode_field("max_fee_per_gas")?;
        let (gas, decoder) = decoder.decode_field("gas")?;
        let (encrypted_payload, decoder) = decoder.decode_field("encrypted_payload")?;
        let (batch_index, decoder) = decoder.decode_field("batch_index")?;
        let (l1_block_number, decoder) = decoder.decode_field("l1_block_number")?;
        let (v, decoder) = decoder.decode_field("v")?;
        let (r, decoder) = decoder.decode_field("r")?;
        let (s, decoder) = decoder.decode_field("s")?;

        let tx = ShutterTransaction {
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
        };
        Ok((tx, decoder.finish()?))
    }
}

impl TxExtension for ShutterTransaction {
    fn encrypted_payload(&self) -> Option<&Bytes> {
        Some(&self.encrypted_payload)
    }

    fn batch_index(&self) -> u64 {
        self.batch_index
    }

    fn l1_block_number(&self) -> u64 {
        self.l1_block_number
    }
}

impl ShutterTransaction {
    /// Call data of the decrypted payload, empty while still encrypted.
    pub fn data(&self) -> &Bytes {
        static EMPTY_DATA: Bytes = Bytes::new();
        self.payload.as_ref().map_or(&EMPTY_DATA, |p| &p.data)
    }

    pub fn value(&self) -> U256 {
        self.payload.as_ref().map_or(U256::zero(), |p| p.value)
    }

    pub fn to(&self) -> TxKind {
        self.payload
            .as_ref()
            .map_or(TxKind::Create, |p| p.to.clone())
    }

    /// `0x50 || rlp(fields without signature)`
    pub fn signing_payload(&self) -> Vec<u8> {
        let mut buf = vec![TxType::Shutter as u8];
        Encoder::new(&mut buf)
            .encode_field(&self.chain_id)
            .encode_field(&self.nonce)
            .encode_field(&self.max_priority_fee_per_gas)
            .encode_field(&self.max_fee_per_gas)
            .encode_field(&self.gas)
            .encode_field(&self.encrypted_payload)
            .encode_field(&self.batch_index)
            .encode_field(&self.l1_block_number)
            .finish();
        buf
    }

    pub fn signing_hash(&self) -> H256 {
        keccak(self.signing_payload())
    }

    /// Returns a signed copy, `v` holds the y parity.
    pub fn sign(&self, private_key: &SecretKey) -> Self {
        let (v, r, s) = sign_hash(self.signing_hash(), private_key);
        ShutterTransaction {
            v,
            r,
            s,
            ..self.deep_copy()
        }
    }

    pub fn with_payload(&self, payload: &DecryptedPayload) -> Self {
        ShutterTransaction {
            payload: Some(payload.deep_copy()),
            ..self.deep_copy()
        }
    }

    pub fn deep_copy(&self) -> Self {
        ShutterTransaction {
            chain_id: self.chain_id,
            nonce: self.nonce,
            max_priority_fee_per_gas: self.max_priority_fee_per_gas,
            max_fee_per_gas: self.max_fee_per_gas,
            gas: self.gas,
            encrypted_payload: copy_bytes(&self.encrypted_payload),
            batch_index: self.batch_index,
            l1_block_number: self.l1_block_number,
            payload: self.payload.as_ref().map(DecryptedPayload::deep_copy),
            v: self.v,
            r: self.r,
            s: self.s,
        }
    }
}
