//! Public link hashing and verification.
//!
//! A public link grants unauthenticated access to a file through a keyed hash
//! of its id: `base64url(HMAC-SHA256(key = salt, msg = file_id))`. Rotating
//! the salt invalidates every previously issued link. Verification decodes
//! the presented hash and compares it against the freshly computed tag in
//! constant time.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Compute the link hash for a file id under the given salt.
pub fn public_link_hash(file_id: &str, salt: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(salt.as_bytes()).expect("HMAC accepts any key size");
    mac.update(file_id.as_bytes());
    URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
}

/// Verify a presented hash against the current salt.
pub fn verify_public_link_hash(presented: &str, file_id: &str, salt: &str) -> bool {
    let Ok(decoded) = URL_SAFE_NO_PAD.decode(presented) else {
        return false;
    };

    let mut mac = HmacSha256::new_from_slice(salt.as_bytes()).expect("HMAC accepts any key size");
    mac.update(file_id.as_bytes());
    let expected = mac.finalize().into_bytes();

    // ct_eq on slices of differing length reports inequality without
    // revealing where they diverge.
    bool::from(expected.as_slice().ct_eq(&decoded))
}

/// Full public URL for a file.
pub fn public_link_url(site_url: &str, file_id: &str, salt: &str) -> String {
    format!(
        "{}/files/{}/public?h={}",
        site_url.trim_end_matches('/'),
        file_id,
        public_link_hash(file_id, salt)
    )
}
