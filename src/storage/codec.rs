//! Reversible encoding for tokens kept in the session tier.
//!
//! This is obfuscation, not encryption: anyone holding the stored value can
//! recover the token with a plain base64 decode. It only keeps raw bearer
//! strings out of a less trusted store. Values written by earlier releases use
//! the same salt, so the format must stay exactly as it is.

use base64::{Engine, engine::general_purpose::STANDARD};

/// Fixed salt appended to the value before encoding.
const SALT: &str = "secure_key_for_token_storage";

/// Encodes a token for storage in the session tier.
pub fn encode(value: &str) -> String {
    STANDARD.encode(format!("{}{}", value, SALT))
}

/// Decodes a value produced by [`encode`].
///
/// Never fails: anything that is not valid base64 of UTF-8 text is returned
/// unchanged, which also covers raw tokens stored before encoding existed.
pub fn decode(stored: &str) -> String {
    let Ok(bytes) = STANDARD.decode(stored) else {
        return stored.to_string();
    };
    let Ok(text) = String::from_utf8(bytes) else {
        return stored.to_string();
    };

    match text.strip_suffix(SALT) {
        Some(value) => value.to_string(),
        None => text.replacen(SALT, "", 1),
    }
}
