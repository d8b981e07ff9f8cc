//! Hash engine, algorithm registry, text encodings and digests.
//!
//! Hash domain separation (security mode, on by default):
//! - Leaf digests:   `hash(0x00 || record_bytes)`
//! - Parent digests: `hash(0x01 || left || right)`
//!
//! The 0x00/0x01 domain tags prevent second-preimage attacks where a crafted
//! record could produce the same digest as an internal combination. With
//! security mode off no tag is applied; the attack then succeeds, which is
//! demonstrated (not just asserted) in the test suite.

use std::{collections::BTreeMap, fmt, sync::Arc};

use bincode::{Decode, Encode};

use crate::{Error, Result};

/// Domain tag prepended to leaf inputs: `hash(LEAF_TAG || record)`.
const LEAF_TAG: u8 = 0x00;
/// Domain tag prepended to parent inputs: `hash(INTERNAL_TAG || left ||
/// right)`.
const INTERNAL_TAG: u8 = 0x01;

/// A hash function capability: arbitrary bytes in, fixed-width digest out.
pub type HashFn = Arc<dyn Fn(&[u8]) -> Vec<u8> + Send + Sync>;

// ── Digest ──────────────────────────────────────────────────────────────

/// A fixed-width digest produced by the configured hash algorithm.
///
/// Width is a property of the algorithm (32 bytes for sha256/blake3, 64
/// for sha512, ...), so digests are held as owned byte vectors rather than
/// a fixed array. Equality is exact byte equality.
#[derive(Clone, Default, PartialEq, Eq, Hash, Encode, Decode)]
pub struct Digest(Vec<u8>);

impl Digest {
    /// Wrap raw digest bytes.
    pub fn new(bytes: Vec<u8>) -> Self {
        Digest(bytes)
    }

    /// Copy raw digest bytes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Digest(bytes.to_vec())
    }

    /// Parse a digest from a hex string.
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        let bytes = hex::decode(hex_str)
            .map_err(|e| Error::InvalidDigest(format!("bad hex: {}", e)))?;
        Ok(Digest(bytes))
    }

    /// The raw digest bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The digest width in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the digest holds no bytes (the placeholder used
    /// by a consistency proof over the empty prefix).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Hex representation of the digest.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

// ── Records and encodings ───────────────────────────────────────────────

/// One record to be ingested: either opaque bytes or text.
///
/// Text is always converted with the engine's configured [`Encoding`]
/// before hashing. Bytes pass through untouched in raw-bytes mode; with
/// raw-bytes off they must be well-formed under the configured encoding.
#[derive(Debug, Clone, Copy)]
pub enum Record<'a> {
    /// An opaque byte sequence.
    Bytes(&'a [u8]),
    /// A text record, converted with the configured encoding.
    Text(&'a str),
}

impl<'a> From<&'a str> for Record<'a> {
    fn from(text: &'a str) -> Self {
        Record::Text(text)
    }
}

impl<'a> From<&'a String> for Record<'a> {
    fn from(text: &'a String) -> Self {
        Record::Text(text)
    }
}

impl<'a> From<&'a [u8]> for Record<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        Record::Bytes(bytes)
    }
}

impl<'a> From<&'a Vec<u8>> for Record<'a> {
    fn from(bytes: &'a Vec<u8>) -> Self {
        Record::Bytes(bytes)
    }
}

impl<'a, const N: usize> From<&'a [u8; N]> for Record<'a> {
    fn from(bytes: &'a [u8; N]) -> Self {
        Record::Bytes(bytes)
    }
}

/// Text encoding applied to records before hashing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Encode, Decode)]
pub enum Encoding {
    /// UTF-8 (the default).
    #[default]
    Utf8,
    /// UTF-16, big-endian code units.
    Utf16Be,
    /// UTF-16, little-endian code units.
    Utf16Le,
    /// 7-bit ASCII.
    Ascii,
}

impl Encoding {
    /// The canonical identifier of this encoding.
    pub fn as_str(&self) -> &'static str {
        match self {
            Encoding::Utf8 => "utf-8",
            Encoding::Utf16Be => "utf-16-be",
            Encoding::Utf16Le => "utf-16-le",
            Encoding::Ascii => "ascii",
        }
    }

    /// Convert text to its byte representation under this encoding.
    pub fn encode(&self, text: &str) -> Result<Vec<u8>> {
        match self {
            Encoding::Utf8 => Ok(text.as_bytes().to_vec()),
            Encoding::Utf16Be => {
                Ok(text.encode_utf16().flat_map(|unit| unit.to_be_bytes()).collect())
            }
            Encoding::Utf16Le => {
                Ok(text.encode_utf16().flat_map(|unit| unit.to_le_bytes()).collect())
            }
            Encoding::Ascii => {
                if text.is_ascii() {
                    Ok(text.as_bytes().to_vec())
                } else {
                    Err(Error::Encoding {
                        encoding: *self,
                        detail: "text contains non-ASCII characters".into(),
                    })
                }
            }
        }
    }

    /// Check that a byte sequence is well-formed under this encoding.
    ///
    /// Used for byte records when raw-bytes mode is off.
    pub fn validate(&self, bytes: &[u8]) -> Result<()> {
        match self {
            Encoding::Utf8 => std::str::from_utf8(bytes).map(|_| ()).map_err(|e| {
                Error::Encoding {
                    encoding: *self,
                    detail: e.to_string(),
                }
            }),
            Encoding::Utf16Be | Encoding::Utf16Le => {
                if bytes.len() % 2 != 0 {
                    return Err(Error::Encoding {
                        encoding: *self,
                        detail: format!("odd byte length {}", bytes.len()),
                    });
                }
                let units = bytes.chunks_exact(2).map(|pair| {
                    let unit = [pair[0], pair[1]];
                    match self {
                        Encoding::Utf16Be => u16::from_be_bytes(unit),
                        _ => u16::from_le_bytes(unit),
                    }
                });
                char::decode_utf16(units)
                    .collect::<core::result::Result<Vec<_>, _>>()
                    .map(|_| ())
                    .map_err(|e| Error::Encoding {
                        encoding: *self,
                        detail: e.to_string(),
                    })
            }
            Encoding::Ascii => {
                if bytes.is_ascii() {
                    Ok(())
                } else {
                    Err(Error::Encoding {
                        encoding: *self,
                        detail: "bytes contain non-ASCII values".into(),
                    })
                }
            }
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Algorithm registry ──────────────────────────────────────────────────

#[derive(Clone)]
pub(crate) struct Algorithm {
    pub(crate) digest_width: usize,
    pub(crate) function: HashFn,
}

/// A caller-constructed table of hash function capabilities.
///
/// The registry is explicit rather than process-global so that tests can
/// inject deterministic fakes. Identifiers are normalized (lowercased,
/// separators stripped), so `"SHA-256"` and `"sha256"` name the same
/// entry.
#[derive(Clone)]
pub struct AlgorithmRegistry {
    algorithms: BTreeMap<String, Algorithm>,
}

fn canonical(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '-' && *c != '_')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

impl AlgorithmRegistry {
    /// An empty registry with no algorithms.
    pub fn empty() -> Self {
        AlgorithmRegistry {
            algorithms: BTreeMap::new(),
        }
    }

    /// A registry pre-populated with sha224, sha256, sha384, sha512 and
    /// blake3.
    pub fn standard() -> Self {
        use sha2::Digest as _;

        let mut registry = Self::empty();
        registry.register("sha224", 28, |data| sha2::Sha224::digest(data).to_vec());
        registry.register("sha256", 32, |data| sha2::Sha256::digest(data).to_vec());
        registry.register("sha384", 48, |data| sha2::Sha384::digest(data).to_vec());
        registry.register("sha512", 64, |data| sha2::Sha512::digest(data).to_vec());
        registry.register("blake3", 32, |data| blake3::hash(data).as_bytes().to_vec());
        registry
    }

    /// Register a hash function under an identifier.
    ///
    /// `digest_width` is the fixed output width in bytes; the function
    /// must always produce exactly that many.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        digest_width: usize,
        function: impl Fn(&[u8]) -> Vec<u8> + Send + Sync + 'static,
    ) {
        self.algorithms.insert(
            canonical(&name.into()),
            Algorithm {
                digest_width,
                function: Arc::new(function),
            },
        );
    }

    /// Returns `true` if an algorithm is registered under this identifier.
    pub fn contains(&self, name: &str) -> bool {
        self.algorithms.contains_key(&canonical(name))
    }

    /// The digest width of a registered algorithm, if present.
    pub fn digest_width(&self, name: &str) -> Option<usize> {
        self.algorithms.get(&canonical(name)).map(|a| a.digest_width)
    }

    /// The canonical identifiers of all registered algorithms.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.algorithms.keys().map(|k| k.as_str())
    }

    pub(crate) fn get(&self, name: &str) -> Option<&Algorithm> {
        self.algorithms.get(&canonical(name))
    }
}

impl Default for AlgorithmRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

// ── Engine ──────────────────────────────────────────────────────────────

/// Hash engine configuration, fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashConfig {
    /// Identifier of the hash algorithm, resolved through the registry.
    pub algorithm: String,
    /// Text encoding for records.
    pub encoding: Encoding,
    /// If on, byte records are consumed as opaque bytes; if off, they
    /// must be well-formed under `encoding`.
    pub raw_bytes: bool,
    /// Second-preimage defense (0x00/0x01 domain tags). On by default;
    /// turning it off is only meant for interoperating with legacy trees.
    pub security: bool,
}

impl Default for HashConfig {
    fn default() -> Self {
        HashConfig {
            algorithm: "sha256".into(),
            encoding: Encoding::Utf8,
            raw_bytes: true,
            security: true,
        }
    }
}

/// Computes leaf digests from records and parent digests from child
/// pairs.
///
/// Every hashing operation of the tree and of proof validation routes
/// through one engine so that domain tags, encoding and algorithm are
/// applied identically on both sides. Engines are immutable after
/// construction.
#[derive(Clone)]
pub struct HashEngine {
    config: HashConfig,
    digest_width: usize,
    function: HashFn,
}

impl HashEngine {
    /// Build an engine from a configuration, resolving the algorithm
    /// through the registry.
    pub fn new(config: HashConfig, registry: &AlgorithmRegistry) -> Result<Self> {
        let algorithm = registry
            .get(&config.algorithm)
            .ok_or_else(|| Error::UnsupportedAlgorithm(config.algorithm.clone()))?;
        Ok(HashEngine {
            digest_width: algorithm.digest_width,
            function: algorithm.function.clone(),
            config,
        })
    }

    /// The engine's configuration.
    pub fn config(&self) -> &HashConfig {
        &self.config
    }

    /// The fixed digest width of the configured algorithm, in bytes.
    pub fn digest_width(&self) -> usize {
        self.digest_width
    }

    /// Compute the digest of one record: `hash(0x00 || bytes)` in
    /// security mode, `hash(bytes)` otherwise.
    pub fn leaf_digest<'r>(&self, record: impl Into<Record<'r>>) -> Result<Digest> {
        let payload = match record.into() {
            Record::Text(text) => self.config.encoding.encode(text)?,
            Record::Bytes(bytes) => {
                if !self.config.raw_bytes {
                    self.config.encoding.validate(bytes)?;
                }
                bytes.to_vec()
            }
        };
        Ok(self.hash_tagged(LEAF_TAG, &payload))
    }

    /// Combine two sibling digests into their parent digest:
    /// `hash(0x01 || left || right)` in security mode,
    /// `hash(left || right)` otherwise.
    pub fn parent_digest(&self, left: &Digest, right: &Digest) -> Digest {
        let mut payload = Vec::with_capacity(left.len() + right.len());
        payload.extend_from_slice(left.as_bytes());
        payload.extend_from_slice(right.as_bytes());
        self.hash_tagged(INTERNAL_TAG, &payload)
    }

    fn hash_tagged(&self, tag: u8, payload: &[u8]) -> Digest {
        if self.config.security {
            let mut input = Vec::with_capacity(1 + payload.len());
            input.push(tag);
            input.extend_from_slice(payload);
            Digest::new((self.function)(&input))
        } else {
            Digest::new((self.function)(payload))
        }
    }
}

impl fmt::Debug for HashEngine {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("HashEngine")
            .field("config", &self.config)
            .field("digest_width", &self.digest_width)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(config: HashConfig) -> HashEngine {
        HashEngine::new(config, &AlgorithmRegistry::standard()).expect("build engine")
    }

    #[test]
    fn test_leaf_digest_uses_domain_tag() {
        use sha2::Digest as _;

        let engine = engine(HashConfig::default());
        let digest = engine.leaf_digest(b"test value").expect("leaf digest");

        let mut input = vec![0x00];
        input.extend_from_slice(b"test value");
        let expected = sha2::Sha256::digest(&input).to_vec();
        assert_eq!(digest.as_bytes(), expected, "leaf digest should use 0x00 tag");

        let plain = sha2::Sha256::digest(b"test value" as &[u8]).to_vec();
        assert_ne!(
            digest.as_bytes(),
            plain,
            "leaf digest must differ from untagged hash"
        );
    }

    #[test]
    fn test_parent_digest_uses_domain_tag() {
        use sha2::Digest as _;

        let engine = engine(HashConfig::default());
        let left = Digest::new(vec![0xAA; 32]);
        let right = Digest::new(vec![0xBB; 32]);
        let parent = engine.parent_digest(&left, &right);

        let mut input = vec![0x01];
        input.extend_from_slice(left.as_bytes());
        input.extend_from_slice(right.as_bytes());
        let expected = sha2::Sha256::digest(&input).to_vec();
        assert_eq!(parent.as_bytes(), expected, "parent digest should use 0x01 tag");

        let reversed = engine.parent_digest(&right, &left);
        assert_ne!(parent, reversed, "parent digest must be order-sensitive");
    }

    #[test]
    fn test_security_off_drops_tags() {
        use sha2::Digest as _;

        let engine = engine(HashConfig {
            security: false,
            ..HashConfig::default()
        });
        let digest = engine.leaf_digest(b"payload").expect("leaf digest");
        let plain = sha2::Sha256::digest(b"payload" as &[u8]).to_vec();
        assert_eq!(digest.as_bytes(), plain);
    }

    #[test]
    fn test_unknown_algorithm_rejected() {
        let result = HashEngine::new(
            HashConfig {
                algorithm: "md6".into(),
                ..HashConfig::default()
            },
            &AlgorithmRegistry::standard(),
        );
        assert!(matches!(result, Err(Error::UnsupportedAlgorithm(name)) if name == "md6"));
    }

    #[test]
    fn test_algorithm_identifiers_normalized() {
        let registry = AlgorithmRegistry::standard();
        assert!(registry.contains("SHA-256"));
        assert!(registry.contains("sha_512"));
        assert_eq!(registry.digest_width("SHA-512"), Some(64));

        let engine = HashEngine::new(
            HashConfig {
                algorithm: "SHA-256".into(),
                ..HashConfig::default()
            },
            &registry,
        )
        .expect("build engine");
        assert_eq!(engine.digest_width(), 32);
    }

    #[test]
    fn test_registry_accepts_deterministic_fake() {
        let mut registry = AlgorithmRegistry::empty();
        registry.register("xor4", 4, |data| {
            let mut out = [0u8; 4];
            for (i, byte) in data.iter().enumerate() {
                out[i % 4] ^= byte;
            }
            out.to_vec()
        });

        let engine = HashEngine::new(
            HashConfig {
                algorithm: "xor4".into(),
                ..HashConfig::default()
            },
            &registry,
        )
        .expect("build engine");
        assert_eq!(engine.digest_width(), 4);
        let a = engine.leaf_digest(b"abc").expect("leaf digest");
        let b = engine.leaf_digest(b"abc").expect("leaf digest");
        assert_eq!(a, b);
        assert_eq!(a.len(), 4);
    }

    #[test]
    fn test_text_records_use_configured_encoding() {
        let utf8 = engine(HashConfig::default());
        let utf16 = engine(HashConfig {
            encoding: Encoding::Utf16Be,
            ..HashConfig::default()
        });
        let a8 = utf8.leaf_digest("text").expect("leaf digest");
        let a16 = utf16.leaf_digest("text").expect("leaf digest");
        assert_ne!(a8, a16, "different encodings must yield different digests");

        // UTF-16BE of "text" spelled out by hand.
        let bytes: Vec<u8> = "text".encode_utf16().flat_map(|u| u.to_be_bytes()).collect();
        assert_eq!(bytes, vec![0x00, b't', 0x00, b'e', 0x00, b'x', 0x00, b't']);
        let from_bytes = utf16.leaf_digest(bytes.as_slice()).expect("leaf digest");
        assert_eq!(a16, from_bytes);
    }

    #[test]
    fn test_ascii_rejects_non_ascii_text() {
        let engine = engine(HashConfig {
            encoding: Encoding::Ascii,
            ..HashConfig::default()
        });
        let result = engine.leaf_digest("héllo");
        assert!(matches!(
            result,
            Err(Error::Encoding {
                encoding: Encoding::Ascii,
                ..
            })
        ));
    }

    #[test]
    fn test_raw_bytes_off_validates_byte_records() {
        let checked = engine(HashConfig {
            raw_bytes: false,
            ..HashConfig::default()
        });
        // 0xFF 0xFE is not valid UTF-8.
        let result = checked.leaf_digest(&[0xFFu8, 0xFE][..]);
        assert!(matches!(result, Err(Error::Encoding { .. })));

        // The same bytes pass untouched in raw-bytes mode.
        let raw = engine(HashConfig::default());
        assert!(raw.leaf_digest(&[0xFFu8, 0xFE][..]).is_ok());
    }

    #[test]
    fn test_utf16_validation_checks_pairing_and_surrogates() {
        let encoding = Encoding::Utf16Be;
        assert!(encoding.validate(&[0x00, b'a', 0x00, b'b']).is_ok());
        // Odd byte count.
        assert!(encoding.validate(&[0x00, b'a', 0x00]).is_err());
        // Unpaired high surrogate 0xD800.
        assert!(encoding.validate(&[0xD8, 0x00]).is_err());
    }

    #[test]
    fn test_digest_hex_roundtrip() {
        let digest = Digest::new(vec![0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(digest.to_hex(), "deadbeef");
        assert_eq!(format!("{}", digest), "deadbeef");
        let parsed = Digest::from_hex("deadbeef").expect("parse hex");
        assert_eq!(parsed, digest);
        assert!(matches!(
            Digest::from_hex("not hex"),
            Err(Error::InvalidDigest(_))
        ));
    }
}
