use std::fmt::Display;

use bytes::Bytes;
use ethereum_types::{Address, H256, U256};
use ethrex_rlp::{
    constants::RLP_NULL,
    decode::{RLPDecode, get_rlp_bytes_item_payload, is_encoded_as_bytes},
    encode::RLPEncode,
    error::RLPDecodeError,
    structs::{Decoder, Encoder},
};

use super::{
    AccessList, BatchContextTransaction, BatchTransaction, ShutterTransaction, SignerError,
    TxExtension,
    signature::{
        compact_signature, derive_legacy_chain_id, is_protected_v, recover_address,
        recover_address_from_message,
    },
};
use crate::constants::{EIP155_V_OFFSET, LEGACY_V_OFFSET};
use crate::utils::copy_bytes;

static EMPTY_DATA: Bytes = Bytes::new();
static EMPTY_ACCESS_LIST: AccessList = Vec::new();

/// Every transaction kind the chain accepts.
///
/// Serialization goes through the flat JSON record defined in
/// [`TransactionData`](super::TransactionData), keyed by the `type` field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transaction {
    LegacyTransaction(LegacyTransaction),
    EIP2930Transaction(EIP2930Transaction),
    EIP1559Transaction(EIP1559Transaction),
    ShutterTransaction(ShutterTransaction),
    BatchTransaction(BatchTransaction),
    BatchContextTransaction(BatchContextTransaction),
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct LegacyTransaction {
    pub nonce: u64,
    pub gas_price: u64,
    pub gas: u64,
    /// The recipient of the transaction.
    /// Create transactions contain a [`null`](RLP_NULL) value in this field.
    pub to: TxKind,
    pub value: U256,
    pub data: Bytes,
    pub v: U256,
    pub r: U256,
    pub s: U256,
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct EIP2930Transaction {
    pub chain_id: u64,
    pub nonce: u64,
    pub gas_price: u64,
    pub gas_limit: u64,
    pub to: TxKind,
    pub value: U256,
    pub data: Bytes,
    pub access_list: AccessList,
    pub signature_y_parity: bool,
    pub signature_r: U256,
    pub signature_s: U256,
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct EIP1559Transaction {
    pub chain_id: u64,
    pub nonce: u64,
    pub max_priority_fee_per_gas: u64,
    pub max_fee_per_gas: u64,
    pub gas_limit: u64,
    pub to: TxKind,
    pub value: U256,
    pub data: Bytes,
    pub access_list: AccessList,
    pub signature_y_parity: bool,
    pub signature_r: U256,
    pub signature_s: U256,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TxType {
    #[default]
    Legacy = 0x00,
    EIP2930 = 0x01,
    EIP1559 = 0x02,
    /// Encrypted commitment to a call, decrypted once its batch key is released
    Shutter = 0x50,
    /// Batch of transactions submitted by the sequencer
    Batch = 0x51,
    /// Release of the decryption key of a batch
    BatchContext = 0x52,
}

impl From<TxType> for u8 {
    fn from(val: TxType) -> Self {
        match val {
            TxType::Legacy => 0x00,
            TxType::EIP2930 => 0x01,
            TxType::EIP1559 => 0x02,
            TxType::Shutter => 0x50,
            TxType::Batch => 0x51,
            TxType::BatchContext => 0x52,
        }
    }
}

impl Display for TxType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TxType::Legacy => write!(f, "Legacy"),
            TxType::EIP2930 => write!(f, "EIP2930"),
            TxType::EIP1559 => write!(f, "EIP1559"),
            TxType::Shutter => write!(f, "Shutter"),
            TxType::Batch => write!(f, "Batch"),
            TxType::BatchContext => write!(f, "BatchContext"),
        }
    }
}

impl TxType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::Legacy),
            0x01 => Some(Self::EIP2930),
            0x02 => Some(Self::EIP1559),
            0x50 => Some(Self::Shutter),
            0x51 => Some(Self::Batch),
            0x52 => Some(Self::BatchContext),
            _ => None,
        }
    }
}

impl RLPEncode for Transaction {
    /// Transactions can be encoded in the following formats:
    /// A) Legacy transactions: rlp(LegacyTransaction)
    /// B) Non legacy transactions: rlp(Bytes) where Bytes represents the canonical encoding for the transaction as a bytes object.
    /// Checkout [Transaction::encode_canonical] for more information
    fn encode(&self, buf: &mut dyn bytes::BufMut) {
        match self {
            Transaction::LegacyTransaction(t) => t.encode(buf),
            tx => Bytes::from(tx.encode_canonical_to_vec()).encode(buf),
        };
    }
}

impl RLPDecode for Transaction {
    /// Transactions can be encoded in the following formats:
    /// A) Legacy transactions: rlp(LegacyTransaction)
    /// B) Non legacy transactions: rlp(Bytes) where Bytes represents the canonical encoding for the transaction as a bytes object.
    /// Checkout [Transaction::decode_canonical] for more information
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        if is_encoded_as_bytes(rlp)? {
            // Adjust the encoding to get the payload
            let payload = get_rlp_bytes_item_payload(rlp)?;
            let tx = Transaction::decode_canonical(payload)?;
            // The item was a byte string, skip it entirely
            let (_, rest) = <Bytes as RLPDecode>::decode_unfinished(rlp)?;
            Ok((tx, rest))
        } else {
            // LegacyTransaction
            LegacyTransaction::decode_unfinished(rlp)
                .map(|(tx, rem)| (Transaction::LegacyTransaction(tx), rem))
        }
    }
}

/// The transaction's kind: call or create.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum TxKind {
    Call(Address),
    #[default]
    Create,
}

impl RLPEncode for TxKind {
    fn encode(&self, buf: &mut dyn bytes::BufMut) {
        match self {
            Self::Call(address) => address.encode(buf),
            Self::Create => buf.put_u8(RLP_NULL),
        }
    }
}

impl RLPDecode for TxKind {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let first_byte = rlp.first().ok_or(RLPDecodeError::InvalidLength)?;
        if *first_byte == RLP_NULL {
            return Ok((Self::Create, &rlp[1..]));
        }
        Address::decode_unfinished(rlp).map(|(t, rest)| (Self::Call(t), rest))
    }
}

impl RLPEncode for LegacyTransaction {
    fn encode(&self, buf: &mut dyn bytes::BufMut) {
        Encoder::new(buf)
            .encode_field(&self.nonce)
            .encode_field(&self.gas_price)
            .encode_field(&self.gas)
            .encode_field(&self.to)
            .encode_field(&self.value)
            .encode_field(&self.data)
            .encode_field(&self.v)
            .encode_field(&self.r)
            .encode_field(&self.s)
            .finish();
    }
}

impl RLPEncode for EIP2930Transaction {
    fn encode(&self, buf: &mut dyn bytes::BufMut) {
        Encoder::new(buf)
            .encode_field(&self.chain_id)
            .encode_field(&self.nonce)
            .encode_field(&self.gas_price)
            .encode_field(&self.gas_limit)
            .encode_field(&self.to)
            .encode_field(&self.value)
            .encode_field(&self.data)
            .encode_field(&self.access_list)
            .encode_field(&self.signature_y_parity)
            .encode_field(&self.signature_r)
            .encode_field(&self.signature_s)
            .finish()
    }
}

impl RLPEncode for EIP1559Transaction {
    fn encode(&self, buf: &mut dyn bytes::BufMut) {
        Encoder::new(buf)
            .encode_field(&self.chain_id)
            .encode_field(&self.nonce)
            .encode_field(&self.max_priority_fee_per_gas)
            .encode_field(&self.max_fee_per_gas)
            .encode_field(&self.gas_limit)
            .encode_field(&self.to)
            .encode_field(&self.value)
            .encode_field(&self.data)
            .encode_field(&self.access_list)
            .encode_field(&self.signature_y_parity)
            .encode_field(&self.signature_r)
            .encode_field(&self.signature_s)
            .finish()
    }
}

impl RLPDecode for LegacyTransaction {
    fn decode_unfinished(rlp: &[u8]) -> Result<(LegacyTransaction, &[u8]), RLPDecodeError> {
        let decoder = Decoder::new(rlp)?;
        let (nonce, decoder) = decoder.decode_field("nonce")?;
        let (gas_price, decoder) = decoder.decode_field("gas_price")?;
        let (gas, decoder) = decoder.decode_field("gas")?;
        let (to, decoder) = decoder.decode_field("to")?;
        let (value, decoder) = decoder.decode_field("value")?;
        let (data, decoder) = decoder.decode_field("data")?;
        let (v, decoder) = decoder.decode_field("v")?;
        let (r, decoder) = decoder.decode_field("r")?;
        let (s, decoder) = decoder.decode_field("s")?;

        let tx = LegacyTransaction {
            nonce,
            gas_price,
            gas,
            to,
            value,
            data,
            v,
            r,
            s,
        };
        Ok((tx, decoder.finish()?))
    }
}

impl RLPDecode for EIP2930Transaction {
    fn decode_unfinished(rlp: &[u8]) -> Result<(EIP2930Transaction, &[u8]), RLPDecodeError> {
        let decoder = Decoder::new(rlp)?;
        let (chain_id, decoder) = decoder.decode_field("chain_id")?;
        let (nonce, decoder) = decoder.decode_field("nonce")?;
        let (gas_price, decoder) = decoder.decode_field("gas_price")?;
        let (gas_limit, decoder) = decoder.decode_field("gas_limit")?;
        let (to, decoder) = decoder.decode_field("to")?;
        let (value, decoder) = decoder.decode_field("value")?;
        let (data, decoder) = decoder.decode_field("data")?;
        let (access_list, decoder) = decoder.decode_field("access_list")?;
        let (signature_y_parity, decoder) = decoder.decode_field("signature_y_parity")?;
        let (signature_r, decoder) = decoder.decode_field("signature_r")?;
        let (signature_s, decoder) = decoder.decode_field("signature_s")?;

        let tx = EIP2930Transaction {
            chain_id,
            nonce,
            gas_price,
            gas_limit,
            to,
            value,
            data,
            access_list,
            signature_y_parity,
            signature_r,
            signature_s,
        };
        Ok((tx, decoder.finish()?))
    }
}

impl RLPDecode for EIP1559Transaction {
    fn decode_unfinished(rlp: &[u8]) -> Result<(EIP1559Transaction, &[u8]), RLPDecodeError> {
        let decoder = Decoder::new(rlp)?;
        let (chain_id, decoder) = decoder.decode_field("chain_id")?;
        let (nonce, decoder) = decoder.decode_field("nonce")?;
        let (max_priority_fee_per_gas, decoder) =
            decoder.decode_field("max_priority_fee_per_gas")?;
        let (max_fee_per_gas, decoder) = decoder.decode_field("max_fee_per_gas")?;
        let (gas_limit, decoder) = decoder.decode_field("gas_limit")?;
        let (to, decoder) = decoder.decode_field("to")?;
        let (value, decoder) = decoder.decode_field("value")?;
        let (data, decoder) = decoder.decode_field("data")?;
        let (access_list, decoder) = decoder.decode_field("access_list")?;
        let (signature_y_parity, decoder) = decoder.decode_field("signature_y_parity")?;
        let (signature_r, decoder) = decoder.decode_field("signature_r")?;
        let (signature_s, decoder) = decoder.decode_field("signature_s")?;

        let tx = EIP1559Transaction {
            chain_id,
            nonce,
            max_priority_fee_per_gas,
            max_fee_per_gas,
            gas_limit,
            to,
            value,
            data,
            access_list,
            signature_y_parity,
            signature_r,
            signature_s,
        };
        Ok((tx, decoder.finish()?))
    }
}

// Host transactions carry none of the encrypted mempool fields
impl TxExtension for LegacyTransaction {}
impl TxExtension for EIP2930Transaction {}
impl TxExtension for EIP1559Transaction {}

impl TxExtension for Transaction {
    fn encrypted_payload(&self) -> Option<&Bytes> {
        self.extension().encrypted_payload()
    }

    fn decryption_key(&self) -> Option<&Bytes> {
        self.extension().decryption_key()
    }

    fn batch_index(&self) -> u64 {
        self.extension().batch_index()
    }

    fn l1_block_number(&self) -> u64 {
        self.extension().l1_block_number()
    }

    fn timestamp(&self) -> Option<U256> {
        self.extension().timestamp()
    }

    fn sub_transactions(&self) -> &[Bytes] {
        self.extension().sub_transactions()
    }
}

impl Transaction {
    pub fn tx_type(&self) -> TxType {
        match self {
            Transaction::LegacyTransaction(_) => TxType::Legacy,
            Transaction::EIP2930Transaction(_) => TxType::EIP2930,
            Transaction::EIP1559Transaction(_) => TxType::EIP1559,
            Transaction::ShutterTransaction(_) => TxType::Shutter,
            Transaction::BatchTransaction(_) => TxType::Batch,
            Transaction::BatchContextTransaction(_) => TxType::BatchContext,
        }
    }

    fn extension(&self) -> &dyn TxExtension {
        match self {
            Transaction::LegacyTransaction(tx) => tx,
            Transaction::EIP2930Transaction(tx) => tx,
            Transaction::EIP1559Transaction(tx) => tx,
            Transaction::ShutterTransaction(tx) => tx,
            Transaction::BatchTransaction(tx) => tx,
            Transaction::BatchContextTransaction(tx) => tx,
        }
    }

    pub fn sender(&self) -> Result<Address, SignerError> {
        match self {
            Transaction::LegacyTransaction(tx) => {
                let chain_id = self.chain_id();
                let offset = match chain_id {
                    Some(chain_id) => EIP155_V_OFFSET + chain_id * 2,
                    None => LEGACY_V_OFFSET,
                };
                let signature_y_parity = match tx.v.bits() {
                    0..=64 => match tx.v.as_u64().checked_sub(offset) {
                        Some(0) => false,
                        Some(1) => true,
                        _ => return Err(SignerError::InvalidSignature),
                    },
                    _ => return Err(SignerError::InvalidSignature),
                };
                let mut buf = vec![];
                match chain_id {
                    None => Encoder::new(&mut buf)
                        .encode_field(&tx.nonce)
                        .encode_field(&tx.gas_price)
                        .encode_field(&tx.gas)
                        .encode_field(&tx.to)
                        .encode_field(&tx.value)
                        .encode_field(&tx.data)
                        .finish(),
                    Some(chain_id) => Encoder::new(&mut buf)
                        .encode_field(&tx.nonce)
                        .encode_field(&tx.gas_price)
                        .encode_field(&tx.gas)
                        .encode_field(&tx.to)
                        .encode_field(&tx.value)
                        .encode_field(&tx.data)
                        .encode_field(&chain_id)
                        .encode_field(&0u8)
                        .encode_field(&0u8)
                        .finish(),
                }
                let signature = compact_signature(tx.r, tx.s, signature_y_parity);
                Ok(recover_address_from_message(signature, &buf)?)
            }
            Transaction::EIP2930Transaction(tx) => {
                let mut buf = vec![self.tx_type() as u8];
                Encoder::new(&mut buf)
                    .encode_field(&tx.chain_id)
                    .encode_field(&tx.nonce)
                    .encode_field(&tx.gas_price)
                    .encode_field(&tx.gas_limit)
                    .encode_field(&tx.to)
                    .encode_field(&tx.value)
                    .encode_field(&tx.data)
                    .encode_field(&tx.access_list)
                    .finish();
                let signature =
                    compact_signature(tx.signature_r, tx.signature_s, tx.signature_y_parity);
                Ok(recover_address_from_message(signature, &buf)?)
            }
            Transaction::EIP1559Transaction(tx) => {
                let mut buf = vec![self.tx_type() as u8];
                Encoder::new(&mut buf)
                    .encode_field(&tx.chain_id)
                    .encode_field(&tx.nonce)
                    .encode_field(&tx.max_priority_fee_per_gas)
                    .encode_field(&tx.max_fee_per_gas)
                    .encode_field(&tx.gas_limit)
                    .encode_field(&tx.to)
                    .encode_field(&tx.value)
                    .encode_field(&tx.data)
                    .encode_field(&tx.access_list)
                    .finish();
                let signature =
                    compact_signature(tx.signature_r, tx.signature_s, tx.signature_y_parity);
                Ok(recover_address_from_message(signature, &buf)?)
            }
            Transaction::ShutterTransaction(tx) => {
                let signature = compact_signature(tx.r, tx.s, y_parity(tx.v)?);
                Ok(recover_address(signature, tx.signing_hash())?)
            }
            Transaction::BatchTransaction(tx) => {
                let signature = compact_signature(tx.r, tx.s, y_parity(tx.v)?);
                Ok(recover_address(signature, tx.signing_hash())?)
            }
            // Key releases are never signed
            Transaction::BatchContextTransaction(_) => Err(SignerError::InvalidSignature),
        }
    }

    pub fn gas_limit(&self) -> u64 {
        match self {
            Transaction::LegacyTransaction(tx) => tx.gas,
            Transaction::EIP2930Transaction(tx) => tx.gas_limit,
            Transaction::EIP1559Transaction(tx) => tx.gas_limit,
            Transaction::ShutterTransaction(tx) => tx.gas,
            Transaction::BatchTransaction(_) => 0,
            Transaction::BatchContextTransaction(_) => 0,
        }
    }

    pub fn gas_price(&self) -> u64 {
        match self {
            Transaction::LegacyTransaction(tx) => tx.gas_price,
            Transaction::EIP2930Transaction(tx) => tx.gas_price,
            Transaction::EIP1559Transaction(tx) => tx.max_fee_per_gas,
            Transaction::ShutterTransaction(tx) => tx.max_fee_per_gas,
            Transaction::BatchTransaction(_) => 0,
            Transaction::BatchContextTransaction(_) => 0,
        }
    }

    pub fn to(&self) -> TxKind {
        match self {
            Transaction::LegacyTransaction(tx) => tx.to.clone(),
            Transaction::EIP2930Transaction(tx) => tx.to.clone(),
            Transaction::EIP1559Transaction(tx) => tx.to.clone(),
            Transaction::ShutterTransaction(tx) => tx.to(),
            Transaction::BatchTransaction(_) => TxKind::Create,
            Transaction::BatchContextTransaction(_) => TxKind::Create,
        }
    }

    pub fn value(&self) -> U256 {
        match self {
            Transaction::LegacyTransaction(tx) => tx.value,
            Transaction::EIP2930Transaction(tx) => tx.value,
            Transaction::EIP1559Transaction(tx) => tx.value,
            Transaction::ShutterTransaction(tx) => tx.value(),
            Transaction::BatchTransaction(_) => U256::zero(),
            Transaction::BatchContextTransaction(_) => U256::zero(),
        }
    }

    pub fn max_priority_fee(&self) -> Option<u64> {
        match self {
            Transaction::LegacyTransaction(_tx) => None,
            Transaction::EIP2930Transaction(_tx) => None,
            Transaction::EIP1559Transaction(tx) => Some(tx.max_priority_fee_per_gas),
            Transaction::ShutterTransaction(tx) => Some(tx.max_priority_fee_per_gas),
            Transaction::BatchTransaction(_tx) => None,
            Transaction::BatchContextTransaction(_tx) => None,
        }
    }

    pub fn max_fee_per_gas(&self) -> Option<u64> {
        match self {
            Transaction::LegacyTransaction(_tx) => None,
            Transaction::EIP2930Transaction(_tx) => None,
            Transaction::EIP1559Transaction(tx) => Some(tx.max_fee_per_gas),
            Transaction::ShutterTransaction(tx) => Some(tx.max_fee_per_gas),
            Transaction::BatchTransaction(_tx) => None,
            Transaction::BatchContextTransaction(_tx) => None,
        }
    }

    pub fn chain_id(&self) -> Option<u64> {
        match self {
            Transaction::LegacyTransaction(tx) => derive_legacy_chain_id(tx.v),
            Transaction::EIP2930Transaction(tx) => Some(tx.chain_id),
            Transaction::EIP1559Transaction(tx) => Some(tx.chain_id),
            Transaction::ShutterTransaction(tx) => Some(tx.chain_id),
            Transaction::BatchTransaction(tx) => Some(tx.chain_id),
            Transaction::BatchContextTransaction(tx) => Some(tx.chain_id),
        }
    }

    pub fn access_list(&self) -> &AccessList {
        match self {
            Transaction::EIP2930Transaction(tx) => &tx.access_list,
            Transaction::EIP1559Transaction(tx) => &tx.access_list,
            _ => &EMPTY_ACCESS_LIST,
        }
    }

    pub fn nonce(&self) -> u64 {
        match self {
            Transaction::LegacyTransaction(tx) => tx.nonce,
            Transaction::EIP2930Transaction(tx) => tx.nonce,
            Transaction::EIP1559Transaction(tx) => tx.nonce,
            Transaction::ShutterTransaction(tx) => tx.nonce,
            Transaction::BatchTransaction(_) => 0,
            Transaction::BatchContextTransaction(_) => 0,
        }
    }

    pub fn data(&self) -> &Bytes {
        match self {
            Transaction::LegacyTransaction(tx) => &tx.data,
            Transaction::EIP2930Transaction(tx) => &tx.data,
            Transaction::EIP1559Transaction(tx) => &tx.data,
            Transaction::ShutterTransaction(tx) => tx.data(),
            Transaction::BatchTransaction(_) => &EMPTY_DATA,
            Transaction::BatchContextTransaction(_) => &EMPTY_DATA,
        }
    }

    pub fn gas_tip_cap(&self) -> u64 {
        self.max_priority_fee().unwrap_or(self.gas_price())
    }

    pub fn gas_fee_cap(&self) -> u64 {
        self.max_fee_per_gas().unwrap_or(self.gas_price())
    }

    pub fn hash(&self) -> H256 {
        keccak_hash::keccak(self.encode_canonical_to_vec())
    }

    /// Returns whether the transaction is replay-protected.
    /// For more information check out [EIP-155](https://github.com/ethereum/EIPs/blob/master/EIPS/eip-155.md)
    pub fn protected(&self) -> bool {
        match self {
            Transaction::LegacyTransaction(tx) => is_protected_v(tx.v),
            _ => true,
        }
    }

    /// Raw `(v, r, s)`. Typed transactions report the y parity as `v`, key
    /// releases always report zeros.
    pub fn signature_values(&self) -> (U256, U256, U256) {
        match self {
            Transaction::LegacyTransaction(tx) => (tx.v, tx.r, tx.s),
            Transaction::EIP2930Transaction(tx) => (
                U256::from(tx.signature_y_parity as u8),
                tx.signature_r,
                tx.signature_s,
            ),
            Transaction::EIP1559Transaction(tx) => (
                U256::from(tx.signature_y_parity as u8),
                tx.signature_r,
                tx.signature_s,
            ),
            Transaction::ShutterTransaction(tx) => (tx.v, tx.r, tx.s),
            Transaction::BatchTransaction(tx) => (tx.v, tx.r, tx.s),
            Transaction::BatchContextTransaction(_) => (U256::zero(), U256::zero(), U256::zero()),
        }
    }

    /// Returns a copy carrying the given signature values. The chain id is
    /// replaced too on kinds that store it next to the signature. Key releases
    /// carry no signature and are returned unchanged.
    pub fn with_signature_values(&self, chain_id: u64, v: U256, r: U256, s: U256) -> Transaction {
        match self.deep_copy() {
            Transaction::LegacyTransaction(tx) => {
                Transaction::LegacyTransaction(LegacyTransaction { v, r, s, ..tx })
            }
            Transaction::EIP2930Transaction(tx) => {
                Transaction::EIP2930Transaction(EIP2930Transaction {
                    chain_id,
                    signature_y_parity: !v.is_zero(),
                    signature_r: r,
                    signature_s: s,
                    ..tx
                })
            }
            Transaction::EIP1559Transaction(tx) => {
                Transaction::EIP1559Transaction(EIP1559Transaction {
                    chain_id,
                    signature_y_parity: !v.is_zero(),
                    signature_r: r,
                    signature_s: s,
                    ..tx
                })
            }
            Transaction::ShutterTransaction(tx) => {
                Transaction::ShutterTransaction(ShutterTransaction {
                    chain_id,
                    v,
                    r,
                    s,
                    ..tx
                })
            }
            Transaction::BatchTransaction(tx) => Transaction::BatchTransaction(BatchTransaction {
                chain_id,
                v,
                r,
                s,
                ..tx
            }),
            tx @ Transaction::BatchContextTransaction(_) => tx,
        }
    }

    /// Copy whose byte buffers are freshly allocated.
    pub fn deep_copy(&self) -> Transaction {
        match self {
            Transaction::LegacyTransaction(tx) => Transaction::LegacyTransaction(LegacyTransaction {
                data: copy_bytes(&tx.data),
                ..tx.clone()
            }),
            Transaction::EIP2930Transaction(tx) => {
                Transaction::EIP2930Transaction(EIP2930Transaction {
                    data: copy_bytes(&tx.data),
                    ..tx.clone()
                })
            }
            Transaction::EIP1559Transaction(tx) => {
                Transaction::EIP1559Transaction(EIP1559Transaction {
                    data: copy_bytes(&tx.data),
                    ..tx.clone()
                })
            }
            Transaction::ShutterTransaction(tx) => Transaction::ShutterTransaction(tx.deep_copy()),
            Transaction::BatchTransaction(tx) => Transaction::BatchTransaction(tx.deep_copy()),
            Transaction::BatchContextTransaction(tx) => {
                Transaction::BatchContextTransaction(tx.deep_copy())
            }
        }
    }
}

/// Typed transactions store the bare recovery id in `v`.
fn y_parity(v: U256) -> Result<bool, SignerError> {
    match v {
        v if v.is_zero() => Ok(false),
        v if v == U256::one() => Ok(true),
        _ => Err(SignerError::InvalidSignature),
    }
}

/// Canonical Transaction Encoding
/// Based on [EIP-2718]
/// Transactions can be encoded in the following formats:
/// A) `TransactionType || Transaction` (Where Transaction type is an 8-bit number between 0 and 0x7f, and Transaction is an rlp encoded transaction of type TransactionType)
/// B) `LegacyTransaction` (An rlp encoded LegacyTransaction)
mod canonic_encoding {
    use super::*;

    impl Transaction {
        /// Decodes a single transaction in canonical format
        /// Based on [EIP-2718]
        /// Transactions can be encoded in the following formats:
        /// A) `TransactionType || Transaction` (Where Transaction type is an 8-bit number between 0 and 0x7f, and Transaction is an rlp encoded transaction of type TransactionType)
        /// B) `LegacyTransaction` (An rlp encoded LegacyTransaction)
        pub fn decode_canonical(bytes: &[u8]) -> Result<Self, RLPDecodeError> {
            // Look at the first byte to check if it corresponds to a TransactionType
            match bytes.first() {
                // First byte is a valid TransactionType
                Some(tx_type) if *tx_type < 0x7f => {
                    // Decode tx based on type
                    let tx_bytes = &bytes[1..];
                    match TxType::from_u8(*tx_type) {
                        Some(TxType::Legacy) => {
                            LegacyTransaction::decode(tx_bytes).map(Transaction::LegacyTransaction)
                        }
                        Some(TxType::EIP2930) => EIP2930Transaction::decode(tx_bytes)
                            .map(Transaction::EIP2930Transaction),
                        Some(TxType::EIP1559) => EIP1559Transaction::decode(tx_bytes)
                            .map(Transaction::EIP1559Transaction),
                        Some(TxType::Shutter) => ShutterTransaction::decode(tx_bytes)
                            .map(Transaction::ShutterTransaction),
                        Some(TxType::Batch) => {
                            BatchTransaction::decode(tx_bytes).map(Transaction::BatchTransaction)
                        }
                        Some(TxType::BatchContext) => BatchContextTransaction::decode(tx_bytes)
                            .map(Transaction::BatchContextTransaction),
                        None => Err(RLPDecodeError::Custom(format!(
                            "Invalid transaction type: {tx_type}"
                        ))),
                    }
                }
                // LegacyTransaction
                _ => LegacyTransaction::decode(bytes).map(Transaction::LegacyTransaction),
            }
        }

        /// Encodes a transaction in canonical format
        /// Based on [EIP-2718]
        /// Transactions can be encoded in the following formats:
        /// A) `TransactionType || Transaction` (Where Transaction type is an 8-bit number between 0 and 0x7f, and Transaction is an rlp encoded transaction of type TransactionType)
        /// B) `LegacyTransaction` (An rlp encoded LegacyTransaction)
        pub fn encode_canonical(&self, buf: &mut dyn bytes::BufMut) {
            match self {
                // Legacy transactions don't have a prefix
                Transaction::LegacyTransaction(_) => {}
                _ => buf.put_u8(self.tx_type() as u8),
            }
            match self {
                Transaction::LegacyTransaction(t) => t.encode(buf),
                Transaction::EIP2930Transaction(t) => t.encode(buf),
                Transaction::EIP1559Transaction(t) => t.encode(buf),
                Transaction::ShutterTransaction(t) => t.encode(buf),
                Transaction::BatchTransaction(t) => t.encode(buf),
                Transaction::BatchContextTransaction(t) => t.encode(buf),
            };
        }

        /// Encodes a transaction in canonical format into a newly created buffer
        pub fn encode_canonical_to_vec(&self) -> Vec<u8> {
            let mut buf = Vec::new();
            self.encode_canonical(&mut buf);
            buf
        }
    }
}

mod serde_impl {
    use serde::{Deserialize, Deserializer, Serialize, Serializer, de::Error};
    use std::str::FromStr;

    use super::*;
    use crate::types::TransactionData;

    impl Serialize for TxKind {
        fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match self {
                TxKind::Call(address) => serializer.serialize_str(&format!("{address:#x}")),
                TxKind::Create => serializer.serialize_none(),
            }
        }
    }

    impl<'de> Deserialize<'de> for TxKind {
        fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where
            D: Deserializer<'de>,
        {
            let str_option = Option::<String>::deserialize(deserializer)?;
            match str_option {
                Some(str) if !str.is_empty() => Ok(TxKind::Call(
                    Address::from_str(str.trim_start_matches("0x")).map_err(|_| {
                        D::Error::custom(format!("Failed to deserialize hex value {str}"))
                    })?,
                )),
                _ => Ok(TxKind::Create),
            }
        }
    }

    impl Serialize for Transaction {
        fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            TransactionData::from(self).serialize(serializer)
        }
    }

    impl<'de> Deserialize<'de> for Transaction {
        fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where
            D: Deserializer<'de>,
        {
            let data = TransactionData::deserialize(deserializer)?;
            Transaction::try_from(data).map_err(D::Error::custom)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DecryptedPayload, LatestSigner, Signer};
    use hex_literal::hex;
    use secp256k1::{SECP256K1, SecretKey};
    use crate::types::strategies;
    use proptest::{prelude::*, proptest};

    fn shutter_tx() -> ShutterTransaction {
        ShutterTransaction {
            chain_id: 10200,
            nonce: 9,
            max_priority_fee_per_gas: 2,
            max_fee_per_gas: 30,
            gas: 100_000,
            encrypted_payload: Bytes::from_static(&[0xab; 64]),
            batch_index: 12,
            l1_block_number: 6_000_000,
            ..Default::default()
        }
    }

    fn address_of(private_key: &SecretKey) -> Address {
        Address::from(crate::utils::keccak(
            &private_key.public_key(SECP256K1).serialize_uncompressed()[1..],
        ))
    }

    #[test]
    fn test_compute_hash() {
        // taken from Hive
        let tx_eip2930 = EIP2930Transaction {
            chain_id: 3503995874084926u64,
            nonce: 7,
            gas_price: 0x2dbf1f9a,
            gas_limit: 0x186A0,
            to: TxKind::Call(hex!("7dcd17433742f4c0ca53122ab541d0ba67fc27df").into()),
            value: 2.into(),
            data: Bytes::from(&b"\xdbS\x06$\x8e\x03\x13\xe7emit"[..]),
            access_list: vec![(
                hex!("7dcd17433742f4c0ca53122ab541d0ba67fc27df").into(),
                vec![
                    hex!("0000000000000000000000000000000000000000000000000000000000000000").into(),
                    hex!("a3d07a7d68fbd49ec2f8e6befdd86c885f86c272819f6f345f365dec35ae6707").into(),
                ],
            )],
            signature_y_parity: false,
            signature_r: U256::from_dec_str(
                "75813812796588349127366022588733264074091236448495248199152066031778895768879",
            )
            .unwrap(),
            signature_s: U256::from_dec_str(
                "25476208226281085290728123165613764315157904411823916642262684106502155457829",
            )
            .unwrap(),
        };
        let tx = Transaction::EIP2930Transaction(tx_eip2930);

        let expected_hash =
            hex!("a0762610d794acddd2dca15fb7c437ada3611c886f3bea675d53d8da8a6c41b2");
        assert_eq!(tx.hash(), expected_hash.into());
    }

    #[test]
    fn legacy_tx_rlp_decode() {
        let encoded_tx = "f86d80843baa0c4082f618946177843db3138ae69679a54b95cf345ed759450d870aa87bee538000808360306ba0151ccc02146b9b11adf516e6787b59acae3e76544fdcd75e77e67c6b598ce65da064c5dd5aae2fbb535830ebbdad0234975cd7ece3562013b63ea18cc0df6c97d4";
        let encoded_tx_bytes = hex::decode(encoded_tx).unwrap();
        let tx = LegacyTransaction::decode(&encoded_tx_bytes).unwrap();
        let expected_tx = LegacyTransaction {
            nonce: 0,
            gas_price: 1001000000,
            gas: 63000,
            to: TxKind::Call(Address::from_slice(
                &hex::decode("6177843db3138ae69679A54b95cf345ED759450d").unwrap(),
            )),
            value: 3000000000000000_u64.into(),
            data: Bytes::new(),
            r: U256::from_str_radix(
                "151ccc02146b9b11adf516e6787b59acae3e76544fdcd75e77e67c6b598ce65d",
                16,
            )
            .unwrap(),
            s: U256::from_str_radix(
                "64c5dd5aae2fbb535830ebbdad0234975cd7ece3562013b63ea18cc0df6c97d4",
                16,
            )
            .unwrap(),
            v: 6303851.into(),
        };
        assert_eq!(tx, expected_tx);
        // v = 35 + 2 * 3151908
        assert_eq!(
            Transaction::LegacyTransaction(tx).chain_id(),
            Some(3151908)
        );
    }

    #[test]
    fn canonical_encoding_of_new_kinds() {
        let key_release = Transaction::BatchContextTransaction(BatchContextTransaction {
            chain_id: 1,
            decryption_key: Bytes::from_static(&[0xaa, 0xbb]),
            batch_index: Bytes::from_static(&[0x01]),
        });
        assert_eq!(key_release.encode_canonical_to_vec(), hex!("52c50182aabb01"));

        let txs = [
            key_release,
            Transaction::ShutterTransaction(shutter_tx()),
            Transaction::BatchTransaction(BatchTransaction {
                chain_id: 10200,
                transactions: vec![Bytes::from(
                    Transaction::ShutterTransaction(shutter_tx()).encode_canonical_to_vec(),
                )],
                timestamp: U256::from(1_700_000_000u64),
                decryption_key: Bytes::from_static(&[0x01, 0x02]),
                batch_index: 12,
                l1_block_number: 6_000_000,
                ..Default::default()
            }),
        ];
        for tx in txs {
            let encoded = tx.encode_canonical_to_vec();
            assert_eq!(encoded[0], u8::from(tx.tx_type()));
            assert_eq!(Transaction::decode_canonical(&encoded).unwrap(), tx);
            // block body form
            let wrapped = tx.encode_to_vec();
            assert_eq!(Transaction::decode(&wrapped).unwrap(), tx);
        }
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut encoded = Transaction::ShutterTransaction(shutter_tx()).encode_canonical_to_vec();
        encoded.push(0x00);
        assert!(Transaction::decode_canonical(&encoded).is_err());
        assert!(Transaction::decode_canonical(&[0x53, 0xc0]).is_err());
        assert!(Transaction::decode_canonical(&[]).is_err());
    }

    #[test]
    fn payload_does_not_change_the_hash() {
        let plain = Transaction::ShutterTransaction(shutter_tx());
        let decrypted = Transaction::ShutterTransaction(shutter_tx().with_payload(
            &DecryptedPayload {
                to: TxKind::Call(Address::repeat_byte(0x44)),
                data: Bytes::from_static(&[0x01, 0x02]),
                value: U256::from(10),
            },
        ));
        assert_ne!(plain, decrypted);
        assert_eq!(plain.hash(), decrypted.hash());
        assert_eq!(decrypted.value(), U256::from(10));
        assert_eq!(decrypted.data().as_ref(), &[0x01, 0x02]);
    }

    #[test]
    fn capabilities_are_dispatched_to_the_inner_kind() {
        let legacy = Transaction::LegacyTransaction(LegacyTransaction::default());
        assert_eq!(legacy.encrypted_payload(), None);
        assert_eq!(legacy.decryption_key(), None);
        assert_eq!(legacy.batch_index(), 0);
        assert_eq!(legacy.l1_block_number(), 0);
        assert_eq!(legacy.timestamp(), None);
        assert!(legacy.sub_transactions().is_empty());

        let shutter = Transaction::ShutterTransaction(shutter_tx());
        assert_eq!(shutter.encrypted_payload().map(|p| p.len()), Some(64));
        assert_eq!(shutter.decryption_key(), None);
        assert_eq!(shutter.batch_index(), 12);
        assert_eq!(shutter.l1_block_number(), 6_000_000);

        let key_release = Transaction::BatchContextTransaction(BatchContextTransaction {
            chain_id: 1,
            decryption_key: Bytes::from_static(&[0xaa]),
            batch_index: Bytes::from_static(&[0x01, 0x00]),
        });
        assert_eq!(key_release.batch_index(), 256);
        assert_eq!(key_release.decryption_key().map(|k| k.as_ref()), Some(&[0xaa][..]));
        assert_eq!(key_release.to(), TxKind::Create);
        assert_eq!(key_release.value(), U256::zero());
        assert_eq!(key_release.gas_limit(), 0);
        assert!(key_release.access_list().is_empty());
        assert!(key_release.protected());
    }

    #[test]
    fn batch_kinds_carry_no_spend() {
        let key_release = Transaction::BatchContextTransaction(BatchContextTransaction {
            chain_id: 1,
            decryption_key: Bytes::from_static(&[0xaa; 48]),
            batch_index: Bytes::from_static(&[0x07]),
        });
        let batch = Transaction::BatchTransaction(BatchTransaction {
            chain_id: 1,
            transactions: vec![Bytes::from(key_release.encode_canonical_to_vec())],
            timestamp: U256::from(1_700_000_000u64),
            decryption_key: Bytes::from_static(&[0xaa; 48]),
            batch_index: 7,
            l1_block_number: 19_000_001,
            v: U256::one(),
            r: U256::from(3),
            s: U256::from(4),
        });

        for tx in [key_release, batch] {
            assert!(tx.data().is_empty(), "{}", tx.tx_type());
            assert_eq!(tx.nonce(), 0);
            assert_eq!(tx.gas_limit(), 0);
            assert_eq!(tx.gas_price(), 0);
            assert_eq!(tx.max_fee_per_gas(), None);
            assert_eq!(tx.max_priority_fee(), None);
            assert_eq!(tx.gas_tip_cap(), 0);
            assert_eq!(tx.gas_fee_cap(), 0);
            assert_eq!(tx.value(), U256::zero());
            assert_eq!(tx.to(), TxKind::Create);
            assert!(tx.access_list().is_empty());
        }
    }

    #[test]
    fn key_release_ignores_signature_values() {
        let tx = Transaction::BatchContextTransaction(BatchContextTransaction {
            chain_id: 1,
            ..Default::default()
        });
        let resigned = tx.with_signature_values(5, U256::one(), U256::one(), U256::one());
        assert_eq!(resigned, tx);
        assert_eq!(
            resigned.signature_values(),
            (U256::zero(), U256::zero(), U256::zero())
        );
        assert!(matches!(tx.sender(), Err(SignerError::InvalidSignature)));
    }

    #[test]
    fn with_signature_values_returns_a_copy() {
        let tx = Transaction::ShutterTransaction(shutter_tx());
        let signed = tx.with_signature_values(77, U256::one(), U256::from(2), U256::from(3));
        assert_eq!(tx.signature_values(), (U256::zero(), U256::zero(), U256::zero()));
        assert_eq!(
            signed.signature_values(),
            (U256::one(), U256::from(2), U256::from(3))
        );
        assert_eq!(signed.chain_id(), Some(77));
    }

    #[test]
    fn shutter_sender_recovery() {
        let private_key = SecretKey::from_slice(&[0x5a; 32]).unwrap();
        let tx = Transaction::ShutterTransaction(shutter_tx().sign(&private_key));
        assert_eq!(tx.sender().unwrap(), address_of(&private_key));

        let signer = LatestSigner::new(10200);
        assert_eq!(signer.sender(&tx).unwrap(), address_of(&private_key));
        assert!(matches!(
            LatestSigner::new(1).sender(&tx),
            Err(SignerError::InvalidChainId {
                expected: 1,
                got: 10200
            })
        ));
    }

    #[test]
    fn batch_sender_recovery() {
        let private_key = SecretKey::from_slice(&[0x6b; 32]).unwrap();
        let batch = BatchTransaction {
            chain_id: 10200,
            timestamp: U256::from(1),
            batch_index: 3,
            ..Default::default()
        };
        let tx = Transaction::BatchTransaction(batch.sign(&private_key));
        assert_eq!(tx.sender().unwrap(), address_of(&private_key));
    }

    #[test]
    fn materialized_message_has_no_fees() {
        let private_key = SecretKey::from_slice(&[0x5a; 32]).unwrap();
        let payload = DecryptedPayload {
            to: TxKind::Call(Address::repeat_byte(0x55)),
            data: Bytes::from_static(&[0xfe]),
            value: U256::from(1_000),
        };
        let tx = Transaction::ShutterTransaction(
            shutter_tx().with_payload(&payload).sign(&private_key),
        );

        let message = payload.as_message(&tx, &LatestSigner::new(10200)).unwrap();
        assert_eq!(message.from, address_of(&private_key));
        assert_eq!(message.to, payload.to);
        assert_eq!(message.value, payload.value);
        assert_eq!(message.data, payload.data);
        assert_eq!(message.nonce, 9);
        assert_eq!(message.gas_limit, 100_000);
        assert!(message.gas_price.is_zero());
        assert!(message.gas_fee_cap.is_zero());
        assert!(message.gas_tip_cap.is_zero());
        assert!(message.access_list.is_empty());
        assert!(!message.is_fake);

        assert!(
            payload
                .as_message(&tx, &LatestSigner::new(1))
                .is_err()
        );
    }

    #[test]
    fn deep_copy_of_host_transaction() {
        let tx = Transaction::EIP1559Transaction(EIP1559Transaction {
            chain_id: 1,
            data: Bytes::from_static(&[0x01, 0x02, 0x03]),
            ..Default::default()
        });
        let copy = tx.deep_copy();
        assert_eq!(copy, tx);
        assert_ne!(copy.data().as_ptr(), tx.data().as_ptr());
    }

    fn new_kind() -> impl Strategy<Value = Transaction> {
        prop_oneof![
            strategies::shutter_tx().prop_map(Transaction::ShutterTransaction),
            strategies::batch_tx().prop_map(Transaction::BatchTransaction),
            strategies::batch_context_tx().prop_map(Transaction::BatchContextTransaction),
        ]
    }

    proptest! {
        #[test]
        fn proptest_canonical_and_block_body_round_trip(tx in new_kind()) {
            let canonical = tx.encode_canonical_to_vec();
            assert_eq!(canonical[0], u8::from(tx.tx_type()));
            assert_eq!(Transaction::decode_canonical(&canonical).unwrap(), tx);
            assert_eq!(Transaction::decode(&tx.encode_to_vec()).unwrap(), tx);
            assert_eq!(tx.deep_copy().hash(), tx.hash());
        }
    }
}
