use serde::{Deserialize, Deserializer, Serializer, de::Error, ser::SerializeSeq};

pub mod u64 {
    use super::*;

    pub mod hex_str {
        use super::*;

        pub fn deserialize<'de, D>(d: D) -> Result<u64, D::Error>
        where
            D: Deserializer<'de>,
        {
            let value = String::deserialize(d)?;
            u64::from_str_radix(value.trim_start_matches("0x"), 16)
                .map_err(|_| D::Error::custom("Failed to deserialize u64 value"))
        }

        pub fn serialize<S>(value: &u64, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            serializer.serialize_str(&format!("{value:#x}"))
        }
    }

    pub mod hex_str_opt {
        use serde::Serialize;

        use super::*;

        pub fn serialize<S>(value: &Option<u64>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            Option::<String>::serialize(&value.map(|v| format!("{v:#x}")), serializer)
        }

        pub fn deserialize<'de, D>(d: D) -> Result<Option<u64>, D::Error>
        where
            D: Deserializer<'de>,
        {
            let value = Option::<String>::deserialize(d)?;
            match value {
                Some(s) if !s.is_empty() => u64::from_str_radix(s.trim_start_matches("0x"), 16)
                    .map_err(|_| D::Error::custom("Failed to deserialize u64 value"))
                    .map(Some),
                _ => Ok(None),
            }
        }
    }
}

/// Serializes to and deserializes from 0x prefixed hex string
pub mod bytes {
    use ::bytes::Bytes;

    use super::*;

    pub fn deserialize<'de, D>(d: D) -> Result<Bytes, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(d)?;
        let bytes = hex::decode(value.trim_start_matches("0x"))
            .map_err(|e| D::Error::custom(e.to_string()))?;
        Ok(Bytes::from(bytes))
    }

    pub fn serialize<S>(value: &Bytes, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("0x{value:x}"))
    }

    pub mod opt {
        use super::*;

        pub fn deserialize<'de, D>(d: D) -> Result<Option<Bytes>, D::Error>
        where
            D: Deserializer<'de>,
        {
            let Some(value) = Option::<String>::deserialize(d)? else {
                return Ok(None);
            };
            let bytes = hex::decode(value.trim_start_matches("0x"))
                .map_err(|e| D::Error::custom(e.to_string()))?;
            Ok(Some(Bytes::from(bytes)))
        }

        pub fn serialize<S>(value: &Option<Bytes>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match value {
                Some(bytes) => serializer.serialize_str(&format!("0x{bytes:x}")),
                None => serializer.serialize_none(),
            }
        }
    }

    pub mod vec_opt {
        use super::*;

        pub fn deserialize<'de, D>(d: D) -> Result<Option<Vec<Bytes>>, D::Error>
        where
            D: Deserializer<'de>,
        {
            let Some(value) = Option::<Vec<String>>::deserialize(d)? else {
                return Ok(None);
            };
            let mut output = Vec::with_capacity(value.len());
            for str in value {
                let bytes = hex::decode(str.trim_start_matches("0x"))
                    .map_err(|e| D::Error::custom(e.to_string()))?;
                output.push(Bytes::from(bytes));
            }
            Ok(Some(output))
        }

        pub fn serialize<S>(value: &Option<Vec<Bytes>>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match value {
                Some(value) => serialize_vec_of_hex_encodables(value, serializer),
                None => serializer.serialize_none(),
            }
        }
    }
}

/// Hex strings whose interpretation depends on context: either an integer
/// quantity (`0x1a`) or a byte string (`0x001a`).
pub mod hex_text {
    use ::bytes::Bytes;

    pub fn from_quantity(value: u64) -> String {
        format!("{value:#x}")
    }

    pub fn from_data(value: &[u8]) -> String {
        format!("0x{}", hex::encode(value))
    }

    pub fn parse_quantity(text: &str) -> Result<u64, String> {
        let digits = text
            .strip_prefix("0x")
            .ok_or_else(|| format!("hex quantity `{text}` is missing the 0x prefix"))?;
        if digits.is_empty() {
            return Err("empty hex quantity".to_string());
        }
        u64::from_str_radix(digits, 16).map_err(|e| e.to_string())
    }

    pub fn parse_data(text: &str) -> Result<Bytes, String> {
        let digits = text
            .strip_prefix("0x")
            .ok_or_else(|| format!("hex data `{text}` is missing the 0x prefix"))?;
        hex::decode(digits)
            .map(Bytes::from)
            .map_err(|e| e.to_string())
    }
}

fn serialize_vec_of_hex_encodables<S: Serializer, T: std::convert::AsRef<[u8]>>(
    value: &Vec<T>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let mut seq_serializer = serializer.serialize_seq(Some(value.len()))?;
    for encoded in value {
        seq_serializer.serialize_element(&format!("0x{}", hex::encode(encoded)))?;
    }
    seq_serializer.end()
}
