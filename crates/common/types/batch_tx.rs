use bytes::Bytes;
use ethereum_types::{H256, U256};
use ethrex_rlp::{
    decode::RLPDecode,
    encode::RLPEncode,
    error::RLPDecodeError,
    structs::{Decoder, Encoder},
};
use secp256k1::SecretKey;
use tracing::debug;

use super::{Transaction, TxExtension, TxType, signature::sign_hash};
use crate::utils::{copy_bytes, keccak};

/// Ordered list of transactions submitted together with the key that
/// decrypts them.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct BatchTransaction {
    pub chain_id: u64,
    /// Canonical encodings of the bundled transactions.
    pub transactions: Vec<Bytes>,
    pub timestamp: U256,
    pub decryption_key: Bytes,
    pub batch_index: u64,
    pub l1_block_number: u64,
    pub v: U256,
    pub r: U256,
    pub s: U256,
}

impl RLPEncode for BatchTransaction {
    fn encode(&self, buf: &mut dyn bytes::BufMut) {
        Encoder::new(buf)
            .encode_field(&self.chain_id)
            .encode_field(&self.transactions)
            .encode_field(&self.timestamp)
            .encode_field(&self.decryption_key)
            .encode_field(&self.batch_index)
            .encode_field(&self.l1_block_number)
            .encode_field(&self.v)
            .encode_field(&self.r)
            .encode_field(&self.s)
            .finish();
    }
}

impl RLPDecode for BatchTransaction {
    fn decode_unfinished(rlp: &[u8]) -> Result<(BatchTransaction, &[u8]), RLPDecodeError> {
        let decoder = Decoder::new(rlp)?;
        let (chain_id, decoder) = decoder.decode_field("chain_id")?;
        let (transactions, decoder) = decoder.decode_field("transactions")?;
        let (timestamp, decoder) = decoder.decode_field("timestamp")?;
        let (decryption_key, decoder) = decoder.decode_field("decryption_key")?;
        let (batch_index, decoder) = decoder.decode_field("batch_index")?;
        let (l1_block_number, decoder) = decoder.decode_field("l1_block_number")?;
        let (v, decoder) = decoder.decode_field("v")?;
        let (r, decoder) = decoder.decode_field("r")?;
        let (s, decoder) = decoder.decode_field("s")?;

        let tx = BatchTransaction {
            chain_id,
            transactions,
            timestamp,
            decryption_key,
            batch_index,
            l1_block_number,
            v,
            r,
            s,
        };
        Ok((tx, decoder.finish()?))
    }
}

impl TxExtension for BatchTransaction {
    fn decryption_key(&self) -> Option<&Bytes> {
        Some(&self.decryption_key)
    }

    fn batch_index(&self) -> u64 {
        self.batch_index
    }

    fn l1_block_number(&self) -> u64 {
        self.l1_block_number
    }

    fn timestamp(&self) -> Option<U256> {
        Some(self.timestamp)
    }

    fn sub_transactions(&self) -> &[Bytes] {
        &self.transactions
    }
}

impl BatchTransaction {
    /// Decodes every bundled transaction from its canonical encoding.
    /// Fails on the first element that does not decode.
    pub fn decode_transactions(&self) -> Result<Vec<Transaction>, RLPDecodeError> {
        self.transactions
            .iter()
            .enumerate()
            .map(|(index, raw)| {
                Transaction::decode_canonical(raw).inspect_err(|err| {
                    debug!(
                        batch_index = self.batch_index,
                        index, "Failed to decode batched transaction: {err}"
                    )
                })
            })
            .collect()
    }

    /// `0x51 || rlp(fields without signature)`
    pub fn signing_payload(&self) -> Vec<u8> {
        let mut buf = vec![TxType::Batch as u8];
        Encoder::new(&mut buf)
            .encode_field(&self.chain_id)
            .encode_field(&self.transactions)
            .encode_field(&self.timestamp)
            .encode_field(&self.decryption_key)
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
        BatchTransaction {
            v,
            r,
            s,
            ..self.deep_copy()
        }
    }

    pub fn deep_copy(&self) -> Self {
        BatchTransaction {
            chain_id: self.chain_id,
            transactions: self.transactions.iter().map(copy_bytes).collect(),
            timestamp: self.timestamp,
            decryption_key: copy_bytes(&self.decryption_key),
            batch_index: self.batch_index,
            l1_block_number: self.l1_block_number,
            v: self.v,
            r: self.r,
            s: self.s,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BatchContextTransaction, EIP1559Transaction, TxKind};
    use crate::Address;
    use crate::types::strategies::{self, flipped};
    use proptest::{prelude::*, proptest};

    fn batch_of(transactions: &[Transaction]) -> BatchTransaction {
        BatchTransaction {
            chain_id: 10200,
            transactions: transactions
                .iter()
                .map(|tx| Bytes::from(tx.encode_canonical_to_vec()))
                .collect(),
            timestamp: U256::from(1_700_000_000u64),
            decryption_key: Bytes::from_static(&[0x99; 48]),
            batch_index: 7,
            l1_block_number: 19_000_001,
            ..Default::default()
        }
    }

    fn bundled() -> Vec<Transaction> {
        vec![
            Transaction::BatchContextTransaction(BatchContextTransaction {
                chain_id: 10200,
                decryption_key: Bytes::from_static(&[0x99; 48]),
                batch_index: Bytes::from_static(&[0x07]),
            }),
            Transaction::EIP1559Transaction(EIP1559Transaction {
                chain_id: 10200,
                nonce: 1,
                max_priority_fee_per_gas: 1,
                max_fee_per_gas: 10,
                gas_limit: 21_000,
                to: TxKind::Call(Address::repeat_byte(0x33)),
                value: U256::from(100),
                ..Default::default()
            }),
        ]
    }

    #[test]
    fn encode_decode_batch() {
        let batch = batch_of(&bundled());
        let decoded = BatchTransaction::decode(&batch.encode_to_vec()).unwrap();
        assert_eq!(decoded, batch);
    }

    #[test]
    fn decode_bundled_transactions() {
        let txs = bundled();
        let batch = batch_of(&txs);
        assert_eq!(batch.sub_transactions().len(), 2);
        assert_eq!(batch.decode_transactions().unwrap(), txs);

        let mut broken = batch.clone();
        broken.transactions.push(Bytes::from_static(&[0x50, 0xc0]));
        assert!(broken.decode_transactions().is_err());
    }

    #[test]
    fn capabilities_expose_batch_fields() {
        let batch = batch_of(&[]);
        assert_eq!(batch.decryption_key(), Some(&batch.decryption_key));
        assert_eq!(TxExtension::batch_index(&batch), 7);
        assert_eq!(TxExtension::l1_block_number(&batch), 19_000_001);
        assert_eq!(batch.timestamp(), Some(U256::from(1_700_000_000u64)));
        assert_eq!(batch.encrypted_payload(), None);
    }

    #[test]
    fn deep_copy_does_not_alias_buffers() {
        let batch = batch_of(&bundled());
        let copy = batch.deep_copy();
        assert_eq!(copy, batch);
        for (original, copied) in batch.transactions.iter().zip(&copy.transactions) {
            assert_ne!(original.as_ptr(), copied.as_ptr());
        }
        assert_ne!(copy.decryption_key.as_ptr(), batch.decryption_key.as_ptr());
    }

    #[test]
    fn signing_payload_starts_with_type_byte() {
        let batch = batch_of(&[]);
        assert_eq!(batch.signing_payload()[0], 0x51);
        let signed = batch.sign(&SecretKey::from_slice(&[0x07; 32]).unwrap());
        assert_eq!(signed.signing_hash(), batch.signing_hash());
        assert_ne!(signed.encode_to_vec(), batch.encode_to_vec());
    }

    proptest! {
        #[test]
        fn proptest_batch_encoding_round_trip(batch in strategies::batch_tx()) {
            assert_eq!(BatchTransaction::decode(&batch.encode_to_vec()).unwrap(), batch);
        }

        #[test]
        fn proptest_batch_deep_copy_is_independent(batch in strategies::batch_tx()) {
            let original = batch.clone();
            let mut copy = batch.deep_copy();
            assert_eq!(copy, batch);

            copy.transactions.iter_mut().for_each(|raw| *raw = flipped(raw));
            copy.transactions.push(Bytes::from_static(&[0x01]));
            copy.decryption_key = flipped(&copy.decryption_key);
            copy.timestamp = !copy.timestamp;
            copy.batch_index = copy.batch_index.wrapping_add(1);
            assert_eq!(batch, original);
            assert_ne!(copy, batch);
        }
    }
}
