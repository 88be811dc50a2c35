use bytes::Bytes;
use ethereum_types::{Address, H256, U256};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    AccessList, AccessListEntry, BatchContextTransaction, BatchTransaction, DecryptedPayload,
    EIP1559Transaction, EIP2930Transaction, LegacyTransaction, ShutterTransaction, Transaction,
    TxKind, TxType, signature::sanity_check_signature,
};
use crate::serde_utils::hex_text;

/// Flat JSON record shared by every transaction kind.
///
/// Only the fields of the concrete kind are populated on output. On input the
/// `type` field selects the kind and the fields that must be present, see
/// [`Transaction::try_from`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionData {
    #[serde(rename = "type", with = "crate::serde_utils::u64::hex_str")]
    pub tx_type: u64,
    /// Ignored when decoding.
    #[serde(default)]
    pub hash: H256,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "crate::serde_utils::u64::hex_str_opt"
    )]
    pub nonce: Option<u64>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "crate::serde_utils::u64::hex_str_opt"
    )]
    pub gas: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_priority_fee_per_gas: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_fee_per_gas: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<U256>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "crate::serde_utils::bytes::opt"
    )]
    pub input: Option<Bytes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_list: Option<Vec<AccessListEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<U256>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "crate::serde_utils::bytes::opt"
    )]
    pub encrypted_payload: Option<Bytes>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "crate::serde_utils::bytes::opt"
    )]
    pub decryption_key: Option<Bytes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<U256>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "crate::serde_utils::bytes::vec_opt"
    )]
    pub transactions: Option<Vec<Bytes>>,
    /// Hex quantity, except for key releases where it is hex data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_index: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "crate::serde_utils::u64::hex_str_opt"
    )]
    pub l1_block_number: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_hash: Option<H256>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "crate::serde_utils::u64::hex_str_opt"
    )]
    pub block_number: Option<u64>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "crate::serde_utils::u64::hex_str_opt"
    )]
    pub transaction_index: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub v: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<U256>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TransactionDataError {
    #[error("required fields are nil: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),
    #[error("'{0}' is required when any decrypted payload field is set")]
    MissingNestedField(&'static str),
    #[error("transaction type {0:#x} not supported")]
    UnsupportedType(u64),
    #[error("invalid transaction v, r, s values")]
    InvalidSignature,
    #[error("'{0}' does not fit in 64 bits")]
    FieldOverflow(&'static str),
    #[error("'{field}' is malformed: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

type Presence = fn(&TransactionData) -> bool;

const LEGACY_FIELDS: &[(&str, Presence)] = &[
    ("nonce", |d| d.nonce.is_some()),
    ("gasPrice", |d| d.gas_price.is_some()),
    ("gas", |d| d.gas.is_some()),
    ("value", |d| d.value.is_some()),
    ("input", |d| d.input.is_some()),
    ("v", |d| d.v.is_some()),
    ("r", |d| d.r.is_some()),
    ("s", |d| d.s.is_some()),
];

const ACCESS_LIST_FIELDS: &[(&str, Presence)] = &[
    ("chainId", |d| d.chain_id.is_some()),
    ("nonce", |d| d.nonce.is_some()),
    ("gasPrice", |d| d.gas_price.is_some()),
    ("gas", |d| d.gas.is_some()),
    ("value", |d| d.value.is_some()),
    ("input", |d| d.input.is_some()),
    ("v", |d| d.v.is_some()),
    ("r", |d| d.r.is_some()),
    ("s", |d| d.s.is_some()),
];

const DYNAMIC_FEE_FIELDS: &[(&str, Presence)] = &[
    ("chainId", |d| d.chain_id.is_some()),
    ("nonce", |d| d.nonce.is_some()),
    ("maxPriorityFeePerGas", |d| d.max_priority_fee_per_gas.is_some()),
    ("maxFeePerGas", |d| d.max_fee_per_gas.is_some()),
    ("gas", |d| d.gas.is_some()),
    ("value", |d| d.value.is_some()),
    ("input", |d| d.input.is_some()),
    ("v", |d| d.v.is_some()),
    ("r", |d| d.r.is_some()),
    ("s", |d| d.s.is_some()),
];

const SHUTTER_FIELDS: &[(&str, Presence)] = &[
    ("chainId", |d| d.chain_id.is_some()),
    ("nonce", |d| d.nonce.is_some()),
    ("maxPriorityFeePerGas", |d| d.max_priority_fee_per_gas.is_some()),
    ("maxFeePerGas", |d| d.max_fee_per_gas.is_some()),
    ("gas", |d| d.gas.is_some()),
    ("l1BlockNumber", |d| d.l1_block_number.is_some()),
    ("encryptedPayload", |d| d.encrypted_payload.is_some()),
    ("batchIndex", |d| d.batch_index.is_some()),
    ("v", |d| d.v.is_some()),
    ("r", |d| d.r.is_some()),
    ("s", |d| d.s.is_some()),
];

const BATCH_FIELDS: &[(&str, Presence)] = &[
    ("chainId", |d| d.chain_id.is_some()),
    ("timestamp", |d| d.timestamp.is_some()),
    ("transactions", |d| d.transactions.is_some()),
    ("l1BlockNumber", |d| d.l1_block_number.is_some()),
    ("batchIndex", |d| d.batch_index.is_some()),
    ("v", |d| d.v.is_some()),
    ("r", |d| d.r.is_some()),
    ("s", |d| d.s.is_some()),
];

const BATCH_CONTEXT_FIELDS: &[(&str, Presence)] = &[
    ("chainId", |d| d.chain_id.is_some()),
    ("decryptionKey", |d| d.decryption_key.is_some()),
    ("batchIndex", |d| d.batch_index.is_some()),
];

impl TxType {
    fn required_fields(&self) -> &'static [(&'static str, Presence)] {
        match self {
            TxType::Legacy => LEGACY_FIELDS,
            TxType::EIP2930 => ACCESS_LIST_FIELDS,
            TxType::EIP1559 => DYNAMIC_FEE_FIELDS,
            TxType::Shutter => SHUTTER_FIELDS,
            TxType::Batch => BATCH_FIELDS,
            TxType::BatchContext => BATCH_CONTEXT_FIELDS,
        }
    }
}

impl TransactionData {
    /// Record of a transaction included in a block.
    pub fn included(tx: &Transaction, block_hash: H256, block_number: u64, index: u64) -> Self {
        TransactionData {
            block_hash: Some(block_hash),
            block_number: Some(block_number),
            transaction_index: Some(index),
            ..TransactionData::from(tx)
        }
    }

    /// Names of the required fields missing for `tx_type`, in table order.
    fn missing_fields(&self, tx_type: TxType) -> Vec<&'static str> {
        tx_type
            .required_fields()
            .iter()
            .filter(|(_, present)| !present(self))
            .map(|(name, _)| *name)
            .collect()
    }

    /// Unwraps a field already checked against the required field table.
    fn required<T: Clone>(
        field: &Option<T>,
        name: &'static str,
    ) -> Result<T, TransactionDataError> {
        field
            .clone()
            .ok_or(TransactionDataError::MissingFields(vec![name]))
    }

    fn signature(&self) -> Result<(U256, U256, U256), TransactionDataError> {
        Ok((
            Self::required(&self.v, "v")?,
            Self::required(&self.r, "r")?,
            Self::required(&self.s, "s")?,
        ))
    }

    fn chain_id_u64(&self) -> Result<u64, TransactionDataError> {
        to_u64(Self::required(&self.chain_id, "chainId")?, "chainId")
    }

    fn to_kind(&self) -> TxKind {
        self.to.map(TxKind::Call).unwrap_or_default()
    }

    fn batch_index_quantity(&self) -> Result<u64, TransactionDataError> {
        let text = Self::required(&self.batch_index, "batchIndex")?;
        hex_text::parse_quantity(&text).map_err(|reason| TransactionDataError::InvalidField {
            field: "batchIndex",
            reason,
        })
    }

    fn batch_index_data(&self) -> Result<Bytes, TransactionDataError> {
        let text = Self::required(&self.batch_index, "batchIndex")?;
        hex_text::parse_data(&text).map_err(|reason| TransactionDataError::InvalidField {
            field: "batchIndex",
            reason,
        })
    }

    /// Attached when any call field is present, `value` is then mandatory.
    fn decrypted_payload(&self) -> Result<Option<DecryptedPayload>, TransactionDataError> {
        if self.to.is_none() && self.value.is_none() && self.input.is_none() {
            return Ok(None);
        }
        let value = self
            .value
            .ok_or(TransactionDataError::MissingNestedField("value"))?;
        Ok(Some(DecryptedPayload {
            to: self.to_kind(),
            data: self.input.clone().unwrap_or_default(),
            value,
        }))
    }

    fn into_transaction(self) -> Result<Transaction, TransactionDataError> {
        let tx_type = u8::try_from(self.tx_type)
            .ok()
            .and_then(TxType::from_u8)
            .ok_or(TransactionDataError::UnsupportedType(self.tx_type))?;

        let missing = self.missing_fields(tx_type);
        if !missing.is_empty() {
            return Err(TransactionDataError::MissingFields(missing));
        }

        let payload = match tx_type {
            TxType::Shutter => self.decrypted_payload()?,
            _ => None,
        };

        if tx_type != TxType::BatchContext {
            let (v, r, s) = self.signature()?;
            let unsigned = v.is_zero() && r.is_zero() && s.is_zero();
            if !unsigned && !sanity_check_signature(v, r, s, tx_type == TxType::Legacy) {
                return Err(TransactionDataError::InvalidSignature);
            }
        }

        let tx = match tx_type {
            TxType::Legacy => {
                let (v, r, s) = self.signature()?;
                Transaction::LegacyTransaction(LegacyTransaction {
                    nonce: Self::required(&self.nonce, "nonce")?,
                    gas_price: to_u64(Self::required(&self.gas_price, "gasPrice")?, "gasPrice")?,
                    gas: Self::required(&self.gas, "gas")?,
                    to: self.to_kind(),
                    value: Self::required(&self.value, "value")?,
                    data: Self::required(&self.input, "input")?,
                    v,
                    r,
                    s,
                })
            }
            TxType::EIP2930 => {
                let (v, r, s) = self.signature()?;
                Transaction::EIP2930Transaction(EIP2930Transaction {
                    chain_id: self.chain_id_u64()?,
                    nonce: Self::required(&self.nonce, "nonce")?,
                    gas_price: to_u64(Self::required(&self.gas_price, "gasPrice")?, "gasPrice")?,
                    gas_limit: Self::required(&self.gas, "gas")?,
                    to: self.to_kind(),
                    value: Self::required(&self.value, "value")?,
                    data: Self::required(&self.input, "input")?,
                    access_list: self.access_list_items(),
                    signature_y_parity: !v.is_zero(),
                    signature_r: r,
                    signature_s: s,
                })
            }
            TxType::EIP1559 => {
                let (v, r, s) = self.signature()?;
                Transaction::EIP1559Transaction(EIP1559Transaction {
                    chain_id: self.chain_id_u64()?,
                    nonce: Self::required(&self.nonce, "nonce")?,
                    max_priority_fee_per_gas: to_u64(
                        Self::required(&self.max_priority_fee_per_gas, "maxPriorityFeePerGas")?,
                        "maxPriorityFeePerGas",
                    )?,
                    max_fee_per_gas: to_u64(
                        Self::required(&self.max_fee_per_gas, "maxFeePerGas")?,
                        "maxFeePerGas",
                    )?,
                    gas_limit: Self::required(&self.gas, "gas")?,
                    to: self.to_kind(),
                    value: Self::required(&self.value, "value")?,
                    data: Self::required(&self.input, "input")?,
                    access_list: self.access_list_items(),
                    signature_y_parity: !v.is_zero(),
                    signature_r: r,
                    signature_s: s,
                })
            }
            TxType::Shutter => {
                let (v, r, s) = self.signature()?;
                Transaction::ShutterTransaction(ShutterTransaction {
                    chain_id: self.chain_id_u64()?,
                    nonce: Self::required(&self.nonce, "nonce")?,
                    max_priority_fee_per_gas: to_u64(
                        Self::required(&self.max_priority_fee_per_gas, "maxPriorityFeePerGas")?,
                        "maxPriorityFeePerGas",
                    )?,
                    max_fee_per_gas: to_u64(
                        Self::required(&self.max_fee_per_gas, "maxFeePerGas")?,
                        "maxFeePerGas",
                    )?,
                    gas: Self::required(&self.gas, "gas")?,
                    encrypted_payload: Self::required(&self.encrypted_payload, "encryptedPayload")?,
                    batch_index: self.batch_index_quantity()?,
                    l1_block_number: Self::required(&self.l1_block_number, "l1BlockNumber")?,
                    payload,
                    v,
                    r,
                    s,
                })
            }
            TxType::Batch => {
                let (v, r, s) = self.signature()?;
                Transaction::BatchTransaction(BatchTransaction {
                    chain_id: self.chain_id_u64()?,
                    transactions: Self::required(&self.transactions, "transactions")?,
                    timestamp: Self::required(&self.timestamp, "timestamp")?,
                    decryption_key: self.decryption_key.clone().unwrap_or_default(),
                    batch_index: self.batch_index_quantity()?,
                    l1_block_number: Self::required(&self.l1_block_number, "l1BlockNumber")?,
                    v,
                    r,
                    s,
                })
            }
            TxType::BatchContext => {
                Transaction::BatchContextTransaction(BatchContextTransaction {
                    chain_id: self.chain_id_u64()?,
                    decryption_key: Self::required(&self.decryption_key, "decryptionKey")?,
                    batch_index: self.batch_index_data()?,
                })
            }
        };
        Ok(tx)
    }

    fn access_list_items(&self) -> AccessList {
        self.access_list
            .iter()
            .flatten()
            .cloned()
            .map(Into::into)
            .collect()
    }
}

fn to_u64(value: U256, field: &'static str) -> Result<u64, TransactionDataError> {
    if value.bits() > 64 {
        return Err(TransactionDataError::FieldOverflow(field));
    }
    Ok(value.as_u64())
}

impl TryFrom<TransactionData> for Transaction {
    type Error = TransactionDataError;

    /// Decodes a record into the kind named by its `type` field.
    ///
    /// Every required field missing for that kind is reported in a single
    /// [`TransactionDataError::MissingFields`]. A non zero signature must pass
    /// [`sanity_check_signature`]. The `hash` and inclusion fields are ignored.
    fn try_from(data: TransactionData) -> Result<Self, Self::Error> {
        let tx_type = data.tx_type;
        data.into_transaction()
            .inspect_err(|err| debug!(tx_type, "Rejected transaction record: {err}"))
    }
}

impl From<&Transaction> for TransactionData {
    fn from(tx: &Transaction) -> Self {
        let (v, r, s) = tx.signature_values();
        let record = TransactionData {
            tx_type: u8::from(tx.tx_type()) as u64,
            hash: tx.hash(),
            v: Some(v),
            r: Some(r),
            s: Some(s),
            ..Default::default()
        };
        match tx {
            Transaction::LegacyTransaction(tx) => TransactionData {
                chain_id: super::signature::derive_legacy_chain_id(tx.v).map(U256::from),
                nonce: Some(tx.nonce),
                gas_price: Some(tx.gas_price.into()),
                gas: Some(tx.gas),
                to: call_target(&tx.to),
                value: Some(tx.value),
                input: Some(tx.data.clone()),
                ..record
            },
            Transaction::EIP2930Transaction(tx) => TransactionData {
                chain_id: Some(tx.chain_id.into()),
                nonce: Some(tx.nonce),
                gas_price: Some(tx.gas_price.into()),
                gas: Some(tx.gas_limit),
                to: call_target(&tx.to),
                value: Some(tx.value),
                input: Some(tx.data.clone()),
                access_list: Some(tx.access_list.iter().map(AccessListEntry::from).collect()),
                ..record
            },
            Transaction::EIP1559Transaction(tx) => TransactionData {
                chain_id: Some(tx.chain_id.into()),
                nonce: Some(tx.nonce),
                max_priority_fee_per_gas: Some(tx.max_priority_fee_per_gas.into()),
                max_fee_per_gas: Some(tx.max_fee_per_gas.into()),
                gas: Some(tx.gas_limit),
                to: call_target(&tx.to),
                value: Some(tx.value),
                input: Some(tx.data.clone()),
                access_list: Some(tx.access_list.iter().map(AccessListEntry::from).collect()),
                ..record
            },
            Transaction::ShutterTransaction(tx) => {
                let payload = tx.payload.as_ref();
                TransactionData {
                    chain_id: Some(tx.chain_id.into()),
                    nonce: Some(tx.nonce),
                    max_priority_fee_per_gas: Some(tx.max_priority_fee_per_gas.into()),
                    max_fee_per_gas: Some(tx.max_fee_per_gas.into()),
                    gas: Some(tx.gas),
                    encrypted_payload: Some(tx.encrypted_payload.clone()),
                    batch_index: Some(hex_text::from_quantity(tx.batch_index)),
                    l1_block_number: Some(tx.l1_block_number),
                    to: payload.and_then(|p| call_target(&p.to)),
                    value: payload.map(|p| p.value),
                    input: payload.map(|p| p.data.clone()),
                    ..record
                }
            }
            Transaction::BatchTransaction(tx) => TransactionData {
                chain_id: Some(tx.chain_id.into()),
                timestamp: Some(tx.timestamp),
                transactions: Some(tx.transactions.clone()),
                decryption_key: Some(tx.decryption_key.clone()),
                batch_index: Some(hex_text::from_quantity(tx.batch_index)),
                l1_block_number: Some(tx.l1_block_number),
                ..record
            },
            Transaction::BatchContextTransaction(tx) => TransactionData {
                chain_id: Some(tx.chain_id.into()),
                decryption_key: Some(tx.decryption_key.clone()),
                batch_index: Some(hex_text::from_data(&tx.batch_index)),
                ..record
            },
        }
    }
}

fn call_target(to: &TxKind) -> Option<Address> {
    match to {
        TxKind::Call(address) => Some(*address),
        TxKind::Create => None,
    }
}
