//! Proof-image fingerprint helpers.
//!
//! A fingerprint is the SHA-256 digest of the submitted proof image. The
//! guard keys on `(account_id, digest)`, so reuse is detected per account
//! regardless of which action kind the image was submitted for.
//!
//! Image validation here is deliberately shallow: non-empty and a known
//! container magic. Anything deeper belongs to the external classifier.

use sha2::{Digest, Sha256};

/// 32-byte proof fingerprint.
pub type ProofDigest = [u8; 32];

/// Compute the SHA-256 fingerprint of a proof image.
#[must_use]
pub fn digest(image: &[u8]) -> ProofDigest {
    let mut hasher = Sha256::new();
    hasher.update(image);
    hasher.finalize().into()
}

/// Lowercase hex form of a digest, used in log fields.
#[must_use]
pub fn digest_hex(digest: &ProofDigest) -> String {
    hex::encode(digest)
}

/// Returns true when `image` starts with a recognized image container magic.
///
/// Accepted: PNG, JPEG, GIF (87a/89a), WebP (RIFF....WEBP).
#[must_use]
pub fn looks_like_image(image: &[u8]) -> bool {
    if image.len() < 12 {
        return false;
    }
    if image.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        return true; // PNG
    }
    if image.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return true; // JPEG
    }
    if image.starts_with(b"GIF87a") || image.starts_with(b"GIF89a") {
        return true;
    }
    // RIFF container with WEBP fourcc
    image.starts_with(b"RIFF") && &image[8..12] == b"WEBP"
}

/// Validate a submitted proof image before any external call is made.
///
/// Rejects empty payloads and unrecognized containers with a validation
/// error; the classifier is never invoked for invalid input.
pub fn validate_proof_image(image: &[u8]) -> crate::Result<()> {
    if image.is_empty() {
        return Err(crate::LedgerError::Validation(
            "proof image is empty".to_string(),
        ));
    }
    if !looks_like_image(image) {
        return Err(crate::LedgerError::Validation(
            "proof image is not a recognized image format".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes() -> Vec<u8> {
        let mut v = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        v.extend_from_slice(&[0u8; 16]);
        v
    }

    #[test]
    fn test_digest_deterministic() {
        let img = png_bytes();
        assert_eq!(digest(&img), digest(&img));
        assert_eq!(digest_hex(&digest(&img)).len(), 64);
        assert_eq!(digest_hex(&digest(&img)), hex::encode(digest(&img)));
    }

    #[test]
    fn test_digest_differs_per_content() {
        let a = png_bytes();
        let mut b = png_bytes();
        b.push(1);
        assert_ne!(digest(&a), digest(&b));
    }

    #[test]
    fn test_validate_accepts_known_formats() {
        assert!(validate_proof_image(&png_bytes()).is_ok());

        let mut jpeg = vec![0xFF, 0xD8, 0xFF, 0xE0];
        jpeg.extend_from_slice(&[0u8; 16]);
        assert!(validate_proof_image(&jpeg).is_ok());

        let mut gif = b"GIF89a".to_vec();
        gif.extend_from_slice(&[0u8; 16]);
        assert!(validate_proof_image(&gif).is_ok());

        let mut webp = b"RIFF".to_vec();
        webp.extend_from_slice(&[0u8; 4]);
        webp.extend_from_slice(b"WEBP");
        webp.extend_from_slice(&[0u8; 8]);
        assert!(validate_proof_image(&webp).is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_and_garbage() {
        assert!(validate_proof_image(&[]).is_err());
        assert!(validate_proof_image(b"not an image at all").is_err());
        // Too short even if the prefix matches.
        assert!(validate_proof_image(&[0xFF, 0xD8, 0xFF]).is_err());
    }
}
