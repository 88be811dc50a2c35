use bytes::Bytes;
use ethereum_types::U256;

/// Accessors for the encrypted mempool fields.
///
/// Every transaction kind implements this trait. Kinds that carry none of
/// these fields (legacy, access list and dynamic fee transactions) rely on the
/// default implementations, which report the zero value of each field.
pub trait TxExtension {
    /// Ciphertext of the call this transaction commits to.
    fn encrypted_payload(&self) -> Option<&Bytes> {
        None
    }

    /// Key that unlocks every ciphertext of a batch.
    fn decryption_key(&self) -> Option<&Bytes> {
        None
    }

    fn batch_index(&self) -> u64 {
        0
    }

    fn l1_block_number(&self) -> u64 {
        0
    }

    fn timestamp(&self) -> Option<U256> {
        None
    }

    /// Raw canonical encodings of the transactions bundled in a batch.
    fn sub_transactions(&self) -> &[Bytes] {
        &[]
    }
}
