//! Hashes-related data structures and functions.

use core::fmt;
use core::str::FromStr;
use derive_more::{AsRef, Deref, Display, From, Into};
#[cfg(feature = "serde")]
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// BLAKE3 hash output transparent wrapper
#[derive(Default, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, From, Into, AsRef, Deref)]
#[repr(C)]
pub struct Blake3Hash([u8; Blake3Hash::SIZE]);

impl fmt::Debug for Blake3Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Blake3Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl FromStr for Blake3Hash {
    type Err = hex::FromHexError;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut hash = Self::default();
        hex::decode_to_slice(s, &mut hash.0)?;

        Ok(hash)
    }
}

#[cfg(feature = "serde")]
#[derive(Serialize, Deserialize)]
#[serde(transparent)]
struct Blake3HashBinary([u8; Blake3Hash::SIZE]);

#[cfg(feature = "serde")]
#[derive(Serialize, Deserialize)]
#[serde(transparent)]
struct Blake3HashHex(#[serde(with = "hex")] [u8; Blake3Hash::SIZE]);

#[cfg(feature = "serde")]
impl Serialize for Blake3Hash {
    #[inline]
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if serializer.is_human_readable() {
            Blake3HashHex(self.0).serialize(serializer)
        } else {
            Blake3HashBinary(self.0).serialize(serializer)
        }
    }
}

#[cfg(feature = "serde")]
impl<'de> Deserialize<'de> for Blake3Hash {
    #[inline]
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Self(if deserializer.is_human_readable() {
            Blake3HashHex::deserialize(deserializer)?.0
        } else {
            Blake3HashBinary::deserialize(deserializer)?.0
        }))
    }
}

impl From<blake3::Hash> for Blake3Hash {
    #[inline(always)]
    fn from(value: blake3::Hash) -> Self {
        Self(value.into())
    }
}

impl Blake3Hash {
    /// Size in bytes
    pub const SIZE: usize = blake3::OUT_LEN;

    /// Create a new instance
    #[inline(always)]
    pub const fn new(hash: [u8; Self::SIZE]) -> Self {
        Self(hash)
    }

    /// Get internal representation
    #[inline(always)]
    pub const fn as_bytes(&self) -> &[u8; Self::SIZE] {
        &self.0
    }
}

/// BLAKE3 hashing of a single value
#[inline]
pub fn blake3_hash(data: &[u8]) -> Blake3Hash {
    Blake3Hash::from(blake3::hash(data))
}

/// Content hash of a consensus message (block or ballot).
///
/// Eras are identified by the `MessageHash` of their key block.
#[derive(
    Debug,
    Display,
    Default,
    Copy,
    Clone,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    From,
    Into,
    AsRef,
    Deref,
)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
#[repr(C)]
pub struct MessageHash(Blake3Hash);

impl MessageHash {
    /// Size in bytes
    pub const SIZE: usize = Blake3Hash::SIZE;

    /// Create new instance
    #[inline(always)]
    pub const fn new(hash: Blake3Hash) -> Self {
        Self(hash)
    }
}

impl FromStr for MessageHash {
    type Err = hex::FromHexError;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Blake3Hash::from_str(s).map(Self)
    }
}
