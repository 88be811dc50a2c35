use crate::{Address, H256};
use serde::{Deserialize, Serialize};

pub type AccessList = Vec<AccessListItem>;
pub type AccessListItem = (Address, Vec<H256>);

/// JSON shape of an access list item: `{"address": .., "storageKeys": [..]}`
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AccessListEntry {
    pub address: Address,
    pub storage_keys: Vec<H256>,
}

impl From<&AccessListItem> for AccessListEntry {
    fn from(value: &AccessListItem) -> AccessListEntry {
        AccessListEntry {
            address: value.0,
            storage_keys: value.1.clone(),
        }
    }
}

impl From<AccessListEntry> for AccessListItem {
    fn from(entry: AccessListEntry) -> AccessListItem {
        (entry.address, entry.storage_keys)
    }
}
