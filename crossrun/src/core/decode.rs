//! Decoding captured bytes into text.

use std::borrow::Cow;
use std::collections::TryReserveError;

/// Decode captured output as UTF-8, falling back to Latin-1.
///
/// Every byte sequence is valid Latin-1, so content never makes decoding fail.
/// The only error is an allocation failure while building the fallback text,
/// which callers treat as resource exhaustion.
pub fn decode_output(bytes: &[u8]) -> Result<Cow<'_, str>, TryReserveError> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Ok(Cow::Borrowed(text)),
        Err(_) => decode_latin1(bytes).map(Cow::Owned),
    }
}

/// Map every byte to the code point of the same value.
pub fn decode_latin1(bytes: &[u8]) -> Result<String, TryReserveError> {
    // Bytes >= 0x80 take two bytes in UTF-8.
    let wide = bytes.iter().filter(|byte| **byte >= 0x80).count();
    let mut text = String::new();
    text.try_reserve_exact(bytes.len() + wide)?;
    text.extend(bytes.iter().copied().map(char::from));
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_utf8_is_borrowed() {
        let decoded = decode_output("héllo\n".as_bytes()).expect("decode");
        assert!(matches!(decoded, Cow::Borrowed("héllo\n")));
    }

    #[test]
    fn invalid_utf8_falls_back_to_latin1() {
        let decoded = decode_output(b"caf\xe9\n").expect("decode");
        assert_eq!(decoded, "café\n");
    }

    #[test]
    fn truncated_multibyte_sequence_decodes() {
        // "é" cut after its first byte, as a crash cap can produce.
        let decoded = decode_output(b"ok \xc3").expect("decode");
        assert_eq!(decoded, "ok \u{c3}");
    }
}
