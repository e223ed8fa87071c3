use std::fmt::Display;

use data_encoding::{BASE64, BASE64_NOPAD, HEXLOWER};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// SHA-256 digest of a face image, as lowercase hex.
///
/// Matching is exact equality of digests: the same bytes always match and
/// any change at all (re-encoding, lighting, cropping) never does. That is
/// only acceptable because the images are simulation inputs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FaceDigest(String);

impl FaceDigest {
    /// Digest raw image bytes.
    pub fn of(image: &[u8]) -> Self {
        Self(HEXLOWER.encode(&Sha256::digest(image)))
    }

    /// Digest a base64 image payload, with or without a data URI header
    /// such as `data:image/png;base64,`.
    pub fn from_image_payload(payload: &str) -> Result<Self> {
        let encoded = match payload.split_once(',') {
            Some((_header, data)) => data,
            None => payload,
        }
        .trim();
        let image = BASE64
            .decode(encoded.as_bytes())
            .or_else(|_| BASE64_NOPAD.decode(encoded.as_bytes()))
            .map_err(|err| Error::InvalidInput(format!("Invalid base64 image: {err}")))?;
        Ok(Self::of(&image))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for FaceDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_uri_header_is_ignored() {
        let raw = FaceDigest::from_image_payload("aGVsbG8=").unwrap();
        let with_header = FaceDigest::from_image_payload("data:image/png;base64,aGVsbG8=").unwrap();
        assert_eq!(raw, with_header);
        assert_eq!(FaceDigest::of(b"hello"), raw);
    }

    #[test]
    fn padding_is_optional() {
        assert_eq!(
            FaceDigest::from_image_payload("aGVsbG8=").unwrap(),
            FaceDigest::from_image_payload("aGVsbG8").unwrap()
        );
    }

    #[test]
    fn digest_is_sha256_hex() {
        assert_eq!(
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824",
            FaceDigest::of(b"hello").as_str()
        );
    }

    #[test]
    fn different_bytes_differ() {
        assert_ne!(FaceDigest::of(b"face-a"), FaceDigest::of(b"face-b"));
    }

    #[test]
    fn malformed_payload_is_invalid_input() {
        assert!(matches!(
            FaceDigest::from_image_payload("data:image/png;base64,@@not base64@@"),
            Err(Error::InvalidInput(_))
        ));
    }
}
