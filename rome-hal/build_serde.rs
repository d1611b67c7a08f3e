use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

// ---------- data/nvm/*.yaml ----------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NvmTable {
    pub revision: String,
    pub tags: Vec<NvmTag>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NvmTag {
    pub tag: u8,
    pub value: HexBytes,
}

/// Byte string written as whitespace-separated hex pairs, e.g. `"0F 00 03"`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HexBytes(pub Vec<u8>);

impl<'de> Deserialize<'de> for HexBytes {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct HexBytesVisitor;

        impl<'de> Visitor<'de> for HexBytesVisitor {
            type Value = HexBytes;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a string of whitespace-separated hex bytes")
            }

            fn visit_str<E>(self, value: &str) -> Result<HexBytes, E>
            where
                E: de::Error,
            {
                value
                    .split_whitespace()
                    .map(|pair| {
                        u8::from_str_radix(pair, 16)
                            .map_err(|_| E::custom(format!("invalid hex byte `{}`", pair)))
                    })
                    .collect::<Result<Vec<u8>, E>>()
                    .map(HexBytes)
            }
        }

        deserializer.deserialize_str(HexBytesVisitor)
    }
}
