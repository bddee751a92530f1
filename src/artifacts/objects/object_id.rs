//! Object identifier (SHA-1 digest)
//!
//! Object ids are the 20-byte SHA-1 digest of an object's canonical encoding.
//! They are displayed as 40 lowercase hexadecimal characters and are the only
//! way objects refer to each other: sharing is by hash, never by pointer.
//!
//! ## Storage
//!
//! Loose objects live at `.git/objects/<first-2-chars>/<remaining-38-chars>`.

use crate::artifacts::objects::{OBJECT_ID_BYTES, OBJECT_ID_LENGTH};
use std::io;
use std::path::PathBuf;
use std::str::FromStr;

/// Object identifier
///
/// Stored as raw digest bytes so it is `Copy` and cheap to hash; ordering is
/// the byte-wise (and therefore hex-wise) ordering of the digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct ObjectId([u8; OBJECT_ID_BYTES]);

impl ObjectId {
    pub fn from_bytes(bytes: [u8; OBJECT_ID_BYTES]) -> Self {
        Self(bytes)
    }

    /// Parse and validate an object id from its 40-character hex form
    pub fn try_parse(id: impl AsRef<str>) -> anyhow::Result<Self> {
        let id = id.as_ref();
        if id.len() != OBJECT_ID_LENGTH {
            anyhow::bail!("Invalid object ID length: {}", id.len());
        }
        if !id.chars().all(|c| c.is_ascii_hexdigit()) {
            anyhow::bail!("Invalid object ID characters: {}", id);
        }

        let mut bytes = [0u8; OBJECT_ID_BYTES];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&id[i * 2..i * 2 + 2], 16)?;
        }

        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; OBJECT_ID_BYTES] {
        &self.0
    }

    /// Write the raw 20-byte digest, as embedded in tree entries
    pub fn write_raw_to<W: io::Write>(&self, writer: &mut W) -> anyhow::Result<()> {
        writer.write_all(&self.0)?;
        Ok(())
    }

    /// Read a raw 20-byte digest, as embedded in tree entries
    pub fn read_raw_from<R: io::Read + ?Sized>(reader: &mut R) -> anyhow::Result<Self> {
        let mut bytes = [0u8; OBJECT_ID_BYTES];
        reader.read_exact(&mut bytes)?;
        Ok(Self(bytes))
    }

    /// Split the hex form as `XX/YYYYYY...` for loose object storage
    pub fn to_path(&self) -> PathBuf {
        let hex = self.to_string();
        let (dir, file) = hex.split_at(2);
        PathBuf::from(dir).join(file)
    }

    /// First 7 characters of the hex form
    pub fn to_short_oid(&self) -> String {
        let mut hex = self.to_string();
        hex.truncate(7);
        hex
    }

    /// Whether the hex form starts with the given (possibly odd-length) prefix
    pub fn starts_with_hex(&self, prefix: &str) -> bool {
        self.to_string().starts_with(&prefix.to_ascii_lowercase())
    }
}

impl FromStr for ObjectId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_parse(s)
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ObjectId({})", self.to_short_oid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn parses_lowercase_and_uppercase_hex() {
        let lower = ObjectId::try_parse("e69de29bb2d1d6434b8b29ae775ad8c2e48c5391").unwrap();
        let upper = ObjectId::try_parse("E69DE29BB2D1D6434B8B29AE775AD8C2E48C5391").unwrap();

        assert_eq!(lower, upper);
        assert_eq!(lower.to_string(), "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391");
        assert_eq!(lower.to_short_oid(), "e69de29");
        assert_eq!(
            lower.to_path(),
            PathBuf::from("e6").join("9de29bb2d1d6434b8b29ae775ad8c2e48c5391")
        );
    }

    #[test]
    fn rejects_bad_length_and_characters() {
        assert!(ObjectId::try_parse("abc").is_err());
        assert!(ObjectId::try_parse("z69de29bb2d1d6434b8b29ae775ad8c2e48c5391").is_err());
    }

    proptest! {
        #[test]
        fn hex_form_parses_back(bytes in proptest::array::uniform20(any::<u8>())) {
            let oid = ObjectId::from_bytes(bytes);
            prop_assert_eq!(ObjectId::try_parse(oid.to_string()).unwrap(), oid);
        }

        #[test]
        fn raw_form_reads_back(bytes in proptest::array::uniform20(any::<u8>())) {
            let oid = ObjectId::from_bytes(bytes);
            let mut raw = Vec::new();
            oid.write_raw_to(&mut raw).unwrap();
            prop_assert_eq!(ObjectId::read_raw_from(&mut raw.as_slice()).unwrap(), oid);
        }
    }
}
