mod batch_context_tx;
mod batch_tx;
mod decrypted_payload;
mod message;
mod shutter_tx;
pub mod signature;
#[cfg(test)]
mod strategies;
mod transaction;
mod tx_data;
mod tx_extension;
mod tx_fields;

pub use batch_context_tx::*;
pub use batch_tx::*;
pub use decrypted_payload::*;
pub use message::*;
pub use shutter_tx::*;
pub use transaction::*;
pub use tx_data::*;
pub use tx_extension::*;
pub use tx_fields::*;
