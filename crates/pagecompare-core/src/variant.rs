//! Variant descriptors and their content-derived identifiers.
//!
//! A variant is one combination of rendering parameters (output type
//! and, for the HTML family, raster width). Reference and comparison
//! artifacts for the same variant land in folders named by the
//! variant's [`HashId`], so the identifier must be a pure function of
//! the descriptor's canonical form.

use std::fmt::{self, Write as _};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::types::OutputType;

/// One combination of rendering parameters.
///
/// Ordering and equality follow the canonical field order: output type
/// first, then width.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VariantDescriptor {
    /// Output format.
    #[serde(rename = "Type")]
    pub output: OutputType,

    /// Raster width in pixels. Present only for HTML-family formats.
    ///
    /// Persisted as a decimal string; numbers are accepted on load.
    #[serde(
        rename = "Width",
        default,
        skip_serializing_if = "Option::is_none",
        with = "width_serde"
    )]
    pub width: Option<u32>,
}

impl VariantDescriptor {
    /// Create a descriptor, dropping the width for formats that are not
    /// rasterized at a configurable width.
    #[must_use]
    pub const fn new(output: OutputType, width: Option<u32>) -> Self {
        let width = if output.is_html_family() { width } else { None };
        Self { output, width }
    }

    /// The canonical serialization that feeds the fingerprint.
    ///
    /// Compact JSON with fixed key order and the width as a string, e.g.
    /// `{"Type":"pdf"}` or `{"Type":"html","Width":"1280"}`. Identical to
    /// the `serde_json` serialization of the descriptor.
    #[must_use]
    pub fn canonical(&self) -> String {
        match self.width {
            Some(width) => format!(r#"{{"Type":"{}","Width":"{width}"}}"#, self.output),
            None => format!(r#"{{"Type":"{}"}}"#, self.output),
        }
    }

    /// The content-derived identifier of this descriptor.
    #[must_use]
    pub fn hash_id(&self) -> HashId {
        HashId::of(self)
    }
}

impl fmt::Display for VariantDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.width {
            Some(width) => write!(f, "{} @ {width}px", self.output),
            None => write!(f, "{}", self.output),
        }
    }
}

/// Serde support for the width as a decimal string.
mod width_serde {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawWidth {
        Text(String),
        Number(u32),
    }

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(width: &Option<u32>, serializer: S) -> Result<S::Ok, S::Error> {
        match width {
            Some(w) => serializer.serialize_str(&w.to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
        match Option::<RawWidth>::deserialize(deserializer)? {
            None => Ok(None),
            Some(RawWidth::Number(n)) => Ok(Some(n)),
            Some(RawWidth::Text(s)) => s
                .trim()
                .parse()
                .map(Some)
                .map_err(|e| serde::de::Error::custom(format!("invalid width {s:?}: {e}"))),
        }
    }
}

/// Number of digest bytes kept in a [`HashId`] (128 bits).
const HASH_BYTES: usize = 16;

/// Fixed-length lowercase hex fingerprint of a [`VariantDescriptor`].
///
/// The first 128 bits of SHA-256 over [`VariantDescriptor::canonical`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HashId(String);

impl HashId {
    /// Length of the hex string.
    pub const LEN: usize = HASH_BYTES * 2;

    /// Fingerprint a descriptor.
    #[must_use]
    pub fn of(descriptor: &VariantDescriptor) -> Self {
        let digest = Sha256::digest(descriptor.canonical().as_bytes());
        let mut out = String::with_capacity(Self::LEN);
        for byte in &digest[..HASH_BYTES] {
            let _ = write!(out, "{byte:02x}");
        }
        Self(out)
    }

    /// The identifier as a string slice (usable as a folder name).
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HashId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<std::path::Path> for HashId {
    fn as_ref(&self) -> &std::path::Path {
        std::path::Path::new(&self.0)
    }
}

impl TryFrom<String> for HashId {
    type Error = InvalidHashId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let well_formed = value.len() == Self::LEN
            && value
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if well_formed {
            Ok(Self(value))
        } else {
            Err(InvalidHashId(value))
        }
    }
}

impl From<HashId> for String {
    fn from(id: HashId) -> Self {
        id.0
    }
}

/// A string that is not a well-formed [`HashId`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid variant hash {0:?}: expected {len} lowercase hex digits", len = HashId::LEN)]
pub struct InvalidHashId(pub String);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::fmt::Write as _;

    use super::*;

    #[test]
    fn canonical_matches_serde_json() {
        let descriptors = [
            VariantDescriptor::new(OutputType::Pdf, None),
            VariantDescriptor::new(OutputType::Html, Some(1280)),
            VariantDescriptor::new(OutputType::SingleHtml, Some(640)),
            VariantDescriptor::new(OutputType::Epub, Some(800)),
        ];
        for d in &descriptors {
            assert_eq!(d.canonical(), serde_json::to_string(d).unwrap());
        }
    }

    #[test]
    fn pdf_drops_width() {
        let d = VariantDescriptor::new(OutputType::Pdf, Some(1280));
        assert_eq!(d.width, None);
        assert_eq!(d.canonical(), r#"{"Type":"pdf"}"#);
    }

    #[test]
    fn hash_is_deterministic_and_fixed_length() {
        let a = VariantDescriptor::new(OutputType::Html, Some(1280)).hash_id();
        let b = VariantDescriptor::new(OutputType::Html, Some(1280)).hash_id();
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), HashId::LEN);
        assert!(HashId::try_from(a.to_string()).is_ok());
    }

    #[test]
    fn distinct_descriptors_get_distinct_hashes() {
        let mut seen = std::collections::BTreeSet::new();
        for t in OutputType::ALL {
            for w in [None, Some(320), Some(1280), Some(1920)] {
                seen.insert(VariantDescriptor::new(t, w));
            }
        }
        let hashes: std::collections::BTreeSet<HashId> =
            seen.iter().map(VariantDescriptor::hash_id).collect();
        assert_eq!(hashes.len(), seen.len());
    }

    #[test]
    fn pdf_hash_is_sha256_prefix_of_canonical_form() {
        // The id is the hex of the leading 16 digest bytes.
        let expected = Sha256::digest(br#"{"Type":"pdf"}"#);
        let id = VariantDescriptor::new(OutputType::Pdf, None).hash_id();
        let mut hex = String::new();
        for byte in &expected[..16] {
            write!(hex, "{byte:02x}").unwrap();
        }
        assert_eq!(id.as_str(), hex);
    }

    #[test]
    fn width_accepts_string_or_number() {
        let from_str: VariantDescriptor =
            serde_json::from_str(r#"{"Type":"html","Width":"1280"}"#).unwrap();
        let from_num: VariantDescriptor =
            serde_json::from_str(r#"{"Type":"html","Width":1280}"#).unwrap();
        assert_eq!(from_str, from_num);
        assert_eq!(from_str.width, Some(1280));

        let pdf: VariantDescriptor = serde_json::from_str(r#"{"Type":"pdf"}"#).unwrap();
        assert_eq!(pdf.width, None);
    }

    #[test]
    fn malformed_hash_ids_are_rejected() {
        assert!(HashId::try_from("abc".to_string()).is_err());
        assert!(HashId::try_from("A".repeat(HashId::LEN)).is_err());
        assert!(HashId::try_from("0".repeat(HashId::LEN)).is_ok());
    }
}
