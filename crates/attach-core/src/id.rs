//! File and entity id generation.
//!
//! Ids are 26-character lowercase base32 tokens derived from UUIDv4 bytes.
//! They are generated server-side only and validated on every path parameter
//! before any store lookup.

use uuid::Uuid;

/// Length of every generated id.
pub const ID_LENGTH: usize = 26;

const ALPHABET: &[u8; 32] = b"abcdefghijklmnopqrstuvwxyz123456";

/// Generate a new 26-character id.
pub fn new_id() -> String {
    encode_base32(Uuid::new_v4().as_bytes())
}

/// Check that `s` is a well-formed id produced by [`new_id`].
pub fn is_valid_id(s: &str) -> bool {
    s.len() == ID_LENGTH && s.bytes().all(|b| ALPHABET.contains(&b))
}

/// Generate a random token of `len` characters from the id alphabet.
/// Used for things like the public link salt.
pub fn new_random_string(len: usize) -> String {
    let mut out = String::with_capacity(len);
    while out.len() < len {
        out.push_str(&encode_base32(Uuid::new_v4().as_bytes()));
    }
    out.truncate(len);
    out
}

// 16 bytes => ceil(128 / 5) = 26 characters.
fn encode_base32(bytes: &[u8; 16]) -> String {
    let mut out = String::with_capacity(ID_LENGTH);
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    for &b in bytes {
        acc = (acc << 8) | u32::from(b);
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(ALPHABET[((acc >> bits) & 31) as usize] as char);
        }
    }
    if bits > 0 {
        out.push(ALPHABET[((acc << (5 - bits)) & 31) as usize] as char);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_id_shape() {
        for _ in 0..100 {
            let id = new_id();
            assert_eq!(id.len(), ID_LENGTH);
            assert!(is_valid_id(&id), "generated id failed validation: {}", id);
        }
    }

    #[test]
    fn test_ids_are_unique() {
        let a = new_id();
        let b = new_id();
        assert_ne!(a, b);
    }

    #[test]
    fn test_is_valid_id_rejects_garbage() {
        assert!(!is_valid_id(""));
        assert!(!is_valid_id("short"));
        assert!(!is_valid_id(&"A".repeat(26)));
        assert!(!is_valid_id(&"a".repeat(25)));
        assert!(!is_valid_id(&"a".repeat(27)));
        assert!(!is_valid_id(&"../../../../../../etc/passwd"[..26]));
    }

    #[test]
    fn test_new_random_string_length() {
        assert_eq!(new_random_string(32).len(), 32);
        assert_eq!(new_random_string(5).len(), 5);
    }
}
