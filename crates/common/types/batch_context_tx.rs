use bytes::Bytes;
use ethrex_rlp::{
    decode::RLPDecode,
    encode::RLPEncode,
    error::RLPDecodeError,
    structs::{Decoder, Encoder},
};

use super::TxExtension;
use crate::utils::{copy_bytes, u64_from_big_endian};

/// Publishes the decryption key of one batch.
///
/// Carries no call, no fees and no signature: it is inserted by the sequencer
/// and its signature values always read as zero.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct BatchContextTransaction {
    pub chain_id: u64,
    pub decryption_key: Bytes,
    /// Big endian index of the batch this key unlocks.
    pub batch_index: Bytes,
}

impl RLPEncode for BatchContextTransaction {
    fn encode(&self, buf: &mut dyn bytes::BufMut) {
        Encoder::new(buf)
            .encode_field(&self.chain_id)
            .encode_field(&self.decryption_key)
            .encode_field(&self.batch_index)
            .finish();
    }
}

impl RLPDecode for BatchContextTransaction {
    fn decode_unfinished(rlp: &[u8]) -> Result<(BatchContextTransaction, &[u8]), RLPDecodeError> {
        let decoder = Decoder::new(rlp)?;
        let (chain_id, decoder) = decoder.decode_field("chain_id")?;
        let (decryption_key, decoder) = decoder.decode_field("decryption_key")?;
        let (batch_index, decoder) = decoder.decode_field("batch_index")?;

        let tx = BatchContextTransaction {
            chain_id,
            decryption_key,
            batch_index,
        };
        Ok((tx, decoder.finish()?))
    }
}

impl TxExtension for BatchContextTransaction {
    fn decryption_key(&self) -> Option<&Bytes> {
        Some(&self.decryption_key)
    }

    /// Indexes wider than 64 bits read as 0 here, use the raw field instead.
    fn batch_index(&self) -> u64 {
        u64_from_big_endian(&self.batch_index).unwrap_or_default()
    }
}

impl BatchContextTransaction {
    /// Whether this key belongs to batch `batch_index`.
    pub fn unlocks(&self, batch_index: u64) -> bool {
        u64_from_big_endian(&self.batch_index) == Some(batch_index)
    }

    pub fn deep_copy(&self) -> Self {
        BatchContextTransaction {
            chain_id: self.chain_id,
            decryption_key: copy_bytes(&self.decryption_key),
            batch_index: copy_bytes(&self.batch_index),
        }
    }
}
