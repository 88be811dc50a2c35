use bytes::Bytes;
use ethereum_types::U256;
use ethrex_rlp::{
    decode::RLPDecode,
    encode::RLPEncode,
    error::RLPDecodeError,
    structs::{Decoder, Encoder},
};
use serde::{Deserialize, Serialize};

use super::{Message, Signer, SignerError, Transaction, TxKind};
use crate::utils::copy_bytes;

/// Plaintext call hidden inside the ciphertext of a [`ShutterTransaction`](super::ShutterTransaction).
///
/// Encodes as the RLP list `[to, data, value]`. A contract creation encodes
/// `to` as the RLP null marker, so it never collides with the zero address.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DecryptedPayload {
    #[serde(default)]
    pub to: TxKind,
    #[serde(with = "crate::serde_utils::bytes")]
    pub data: Bytes,
    pub value: U256,
}

impl RLPEncode for DecryptedPayload {
    fn encode(&self, buf: &mut dyn bytes::BufMut) {
        Encoder::new(buf)
            .encode_field(&self.to)
            .encode_field(&self.data)
            .encode_field(&self.value)
            .finish();
    }
}

impl RLPDecode for DecryptedPayload {
    fn decode_unfinished(rlp: &[u8]) -> Result<(DecryptedPayload, &[u8]), RLPDecodeError> {
        let decoder = Decoder::new(rlp)?;
        let (to, decoder) = decoder.decode_field("to")?;
        let (data, decoder) = decoder.decode_field("data")?;
        let (value, decoder) = decoder.decode_field("value")?;

        let payload = DecryptedPayload { to, data, value };
        Ok((payload, decoder.finish()?))
    }
}

impl DecryptedPayload {
    /// Copy that shares no buffer with `self`.
    pub fn deep_copy(&self) -> Self {
        DecryptedPayload {
            to: self.to.clone(),
            data: copy_bytes(&self.data),
            value: self.value,
        }
    }

    /// Builds the call executed on behalf of `tx` once its ciphertext has been
    /// decrypted into `self`.
    ///
    /// Encrypted transactions pay no gas price for the decrypted call, so every
    /// fee field of the message is zero.
    pub fn as_message(
        &self,
        tx: &Transaction,
        signer: &dyn Signer,
    ) -> Result<Message, SignerError> {
        let from = signer.sender(tx)?;
        Ok(Message {
            from,
            to: self.to.clone(),
            nonce: tx.nonce(),
            value: self.value,
            gas_limit: tx.gas_limit(),
            gas_price: U256::zero(),
            gas_fee_cap: U256::zero(),
            gas_tip_cap: U256::zero(),
            data: copy_bytes(&self.data),
            access_list: Vec::new(),
            is_fake: false,
        })
    }
}
