use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

macro_rules! impl_fixed_bytes_id {
    ($name:ident, $len:expr) => {
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name([u8; $len]);

        impl $name {
            pub const LEN: usize = $len;

            pub const fn new(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            pub fn from_slice(bytes: &[u8]) -> Result<Self, ValidationError> {
                if bytes.len() != Self::LEN {
                    return Err(ValidationError::InvalidLength {
                        kind: stringify!($name),
                        expected: Self::LEN,
                        actual: bytes.len(),
                    });
                }
                let mut out = [0u8; Self::LEN];
                out.copy_from_slice(bytes);
                Ok(Self(out))
            }

            pub fn from_hex(hex_str: &str) -> Result<Self, ValidationError> {
                let bytes = hex::decode(hex_str)
                    .map_err(|err| ValidationError::InvalidHex(err.to_string()))?;
                Self::from_slice(&bytes)
            }

            pub const fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl From<[u8; $len]> for $name {
            fn from(value: [u8; $len]) -> Self {
                Self::new(value)
            }
        }
    };
}

// Cardano-sized identifiers: 32-byte transaction hashes, 28-byte
// blake2b-224 script/key hashes. Displayed as bare hex, no 0x prefix.
impl_fixed_bytes_id!(TxHash, 32);
impl_fixed_bytes_id!(PolicyId, 28);
impl_fixed_bytes_id!(KeyHash, 28);

macro_rules! impl_entity_id {
    ($name:ident) => {
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
                let value = value.into();
                if value.is_empty() {
                    return Err(ValidationError::EmptyId(stringify!($name)));
                }
                Ok(Self(value))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

// Entity rows in the relational collaborator are keyed by opaque string ids
// assigned on insert; the only local invariant is non-emptiness.
impl_entity_id!(UserId);
impl_entity_id!(SchoolId);
impl_entity_id!(StudentId);
impl_entity_id!(TemplateId);
impl_entity_id!(DiplomaId);

/// Content address returned by the pinning collaborator, always carried in
/// `ipfs://<cid>` URI form.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentAddress(String);

impl ContentAddress {
    pub const SCHEME: &'static str = "ipfs://";

    pub fn from_uri(uri: impl Into<String>) -> Result<Self, ValidationError> {
        let uri = uri.into();
        match uri.strip_prefix(Self::SCHEME) {
            Some(cid) if !cid.is_empty() => Ok(Self(uri)),
            _ => Err(ValidationError::InvalidContentAddress(uri)),
        }
    }

    pub fn from_cid(cid: &str) -> Result<Self, ValidationError> {
        Self::from_uri(format!("{}{cid}", Self::SCHEME))
    }

    pub fn as_uri(&self) -> &str {
        &self.0
    }

    pub fn cid(&self) -> &str {
        &self.0[Self::SCHEME.len()..]
    }
}

impl fmt::Display for ContentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ContentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentAddress({})", self.0)
    }
}
