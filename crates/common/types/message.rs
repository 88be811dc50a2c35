use bytes::Bytes;
use ethereum_types::{Address, U256};

use super::{AccessList, Transaction, TxKind};

/// A call ready to be handed to the execution layer.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Message {
    pub from: Address,
    pub to: TxKind,
    pub nonce: u64,
    pub value: U256,
    pub gas_limit: u64,
    pub gas_price: U256,
    pub gas_fee_cap: U256,
    pub gas_tip_cap: U256,
    pub data: Bytes,
    pub access_list: AccessList,
    /// Set for simulated calls that skip nonce and balance checks.
    pub is_fake: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    #[error("invalid chain id for signer: have {got}, want {expected}")]
    InvalidChainId { expected: u64, got: u64 },
    #[error("invalid transaction v, r, s values")]
    InvalidSignature,
    #[error("failed to recover sender: {0}")]
    Recovery(#[from] secp256k1::Error),
}

/// Recovers the account that signed a transaction.
pub trait Signer {
    fn sender(&self, tx: &Transaction) -> Result<Address, SignerError>;
}

/// Accepts every transaction kind bound to its chain id, plus unprotected
/// legacy transactions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LatestSigner {
    chain_id: u64,
}

impl LatestSigner {
    pub fn new(chain_id: u64) -> Self {
        Self { chain_id }
    }
}

impl Signer for LatestSigner {
    fn sender(&self, tx: &Transaction) -> Result<Address, SignerError> {
        match tx.chain_id() {
            Some(got) if got != self.chain_id => Err(SignerError::InvalidChainId {
                expected: self.chain_id,
                got,
            }),
            _ => tx.sender(),
        }
    }
}
