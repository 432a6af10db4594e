//! SHA-256 digests for downloaded artifacts.
//!
//! GitHub publishes a `sha256:<hex>` digest for each release asset. The
//! acquirer hashes what it downloaded and discards files that do not match.

use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::io::{self, Read};
use std::path::Path;
use thiserror::Error;

/// Expected length of a hex-encoded SHA-256 digest.
const DIGEST_HEX_LEN: usize = 64;

/// Prefix GitHub uses for SHA-256 asset digests.
const GITHUB_DIGEST_PREFIX: &str = "sha256:";

/// Rejected digest strings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid SHA-256 digest: {reason}")]
pub struct InvalidDigest {
    /// Description of the validation failure.
    pub reason: String,
}

/// A validated, lowercase hex-encoded SHA-256 digest.
///
/// # Examples
///
/// ```
/// use revanced_assist::digest::Sha256Digest;
///
/// let hex = "a".repeat(64);
/// let digest = Sha256Digest::try_from(hex.as_str()).expect("valid digest");
/// assert_eq!(digest.as_str().len(), 64);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Sha256Digest(String);

impl Sha256Digest {
    /// Parse a GitHub asset digest of the form `sha256:<hex>`.
    ///
    /// Returns `None` for other algorithms or malformed values; callers
    /// treat that as "no digest published".
    #[must_use]
    pub fn from_github(value: &str) -> Option<Self> {
        let hex = value.strip_prefix(GITHUB_DIGEST_PREFIX)?;
        Self::try_from(hex.to_ascii_lowercase()).ok()
    }

    /// Return the digest as a hex string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for Sha256Digest {
    type Error = InvalidDigest;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        validate_sha256(value)?;
        Ok(Self(value.to_owned()))
    }
}

impl TryFrom<String> for Sha256Digest {
    type Error = InvalidDigest;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        validate_sha256(&value)?;
        Ok(Self(value))
    }
}

impl fmt::Display for Sha256Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compute the SHA-256 digest of the file at `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn compute_sha256(path: &Path) -> io::Result<Sha256Digest> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }
    // sha2 output formatted with {:x} is always 64 lowercase hex characters.
    Ok(Sha256Digest(format!("{:x}", hasher.finalize())))
}

fn validate_sha256(value: &str) -> Result<(), InvalidDigest> {
    if value.len() != DIGEST_HEX_LEN {
        return Err(InvalidDigest {
            reason: format!(
                "expected {DIGEST_HEX_LEN} hex characters, got {}",
                value.len()
            ),
        });
    }
    if let Some(bad) = value.chars().find(|c| !c.is_ascii_hexdigit()) {
        return Err(InvalidDigest {
            reason: format!("non-hex character '{bad}'"),
        });
    }
    if value.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(InvalidDigest {
            reason: "digest must be lowercase".to_owned(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    /// SHA-256 of the empty input.
    const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    #[rstest]
    #[case::too_short("abcdef")]
    #[case::too_long(&"a".repeat(65))]
    #[case::non_hex(&format!("{}g", "a".repeat(63)))]
    #[case::uppercase(&"A".repeat(64))]
    fn rejects_malformed_digests(#[case] value: &str) {
        assert!(Sha256Digest::try_from(value).is_err());
    }

    #[test]
    fn github_digest_prefix_is_stripped() {
        let digest = Sha256Digest::from_github(&format!("sha256:{EMPTY_SHA256}"))
            .expect("valid GitHub digest");
        assert_eq!(digest.as_str(), EMPTY_SHA256);
    }

    #[test]
    fn github_digest_with_other_algorithm_is_ignored() {
        assert!(Sha256Digest::from_github("sha512:abcd").is_none());
    }

    #[test]
    fn compute_sha256_hashes_file_contents() {
        let file = tempfile::NamedTempFile::new().expect("temp file");
        let digest = compute_sha256(file.path()).expect("hash");
        assert_eq!(digest.as_str(), EMPTY_SHA256);
    }
}
