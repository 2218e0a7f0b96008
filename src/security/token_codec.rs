use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use crate::error::AppError;

/// Encodes bytes into the URL-safe, padding-free text form used for token
/// sections. Safe to carry in headers and cookies without escaping.
pub fn encode(data: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(data)
}

/// Decodes one token section. Malformed input is rejected with the distinct
/// malformed-token error rather than panicking on partial data.
pub fn decode(text: &str) -> Result<Vec<u8>, AppError> {
    URL_SAFE_NO_PAD
        .decode(text.as_bytes())
        .map_err(|_| AppError::MalformedToken)
}
