// Pagination token codec
//
// Continuation tokens are opaque bytes issued by the backend. Externally they
// travel as base64 strings (the `nextPageToken` query parameter and response
// field). The bytes are never interpreted here: a token that the backend
// rejects surfaces as a backend error, not a local one.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Lenient decoder: padding optional, trailing bits tolerated.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Opaque continuation token issued by the backend.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct PageToken(Vec<u8>);

impl PageToken {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Transport form of the token
    pub fn encode(&self) -> String {
        encode(&self.0)
    }
}

impl fmt::Debug for PageToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PageToken({})", self.encode())
    }
}

impl From<Vec<u8>> for PageToken {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

/// Base64-encode raw token bytes unchanged.
pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode an optional transport token.
///
/// Absent or empty input, or input that decodes to no bytes, means "first
/// page" and yields `None`, never an empty-but-present token. Decoding never fails: characters outside the
/// base64 alphabet are dropped, URL-safe characters are accepted, and a
/// space is read back as the `+` that form decoding turned it into.
pub fn decode(token: Option<&str>) -> Option<PageToken> {
    let raw = token?;
    if raw.is_empty() {
        return None;
    }

    let mut normalized: String = raw
        .chars()
        .filter_map(|c| match c {
            'A'..='Z' | 'a'..='z' | '0'..='9' | '+' | '/' => Some(c),
            ' ' | '-' => Some('+'),
            '_' => Some('/'),
            _ => None,
        })
        .collect();

    // A lone trailing sextet cannot carry a byte
    if normalized.len() % 4 == 1 {
        normalized.pop();
    }

    let bytes = LENIENT.decode(normalized.as_bytes()).unwrap_or_default();
    if bytes.is_empty() {
        return None;
    }
    Some(PageToken(bytes))
}

impl Serialize for PageToken {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for PageToken {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(decode(Some(&raw)).unwrap_or_default())
    }
}

/// Deserialize an optional token field where `null`, `""` and a missing
/// field all mean "no continuation".
///
/// Use with `#[serde(default, deserialize_with = "...")]`.
pub fn deserialize_optional<'de, D>(deserializer: D) -> Result<Option<PageToken>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(decode(raw.as_deref()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_encode_preserves_bytes() {
        let samples: [&[u8]; 5] = [
            b"",
            b"\x00",
            b"\xff\xfe\x00\x01binary",
            b"{\"not\":\"text\"}",
            &[0u8, 159, 146, 150, 10, 13, 255],
        ];
        for bytes in samples {
            let token = decode(Some(&encode(bytes)));
            if bytes.is_empty() {
                // encode(b"") is "", which is the absent form
                assert_eq!(token, None);
            } else {
                assert_eq!(token.unwrap().as_bytes(), bytes);
            }
        }
    }

    #[test]
    fn test_absent_and_empty_mean_first_page() {
        assert_eq!(decode(None), None);
        assert_eq!(decode(Some("")), None);
    }

    #[test]
    fn test_decode_tolerates_form_encoded_plus() {
        let bytes = [0xfb, 0xef, 0xbe];
        let encoded = encode(&bytes);
        assert_eq!(encoded, "++++");
        let mangled = encoded.replace('+', " ");
        assert_eq!(decode(Some(&mangled)).unwrap().as_bytes(), &bytes);
    }

    #[test]
    fn test_decode_accepts_missing_padding_and_url_safe() {
        assert_eq!(decode(Some("aGk")).unwrap().as_bytes(), b"hi");
        assert_eq!(decode(Some("-_-_")).unwrap(), decode(Some("+/+/")).unwrap());
    }

    #[test]
    fn test_malformed_token_is_passed_through() {
        // Not valid base64, but decoding must not fail locally
        let token = decode(Some("%%%not-a-token%%%"));
        assert!(token.is_some());
    }

    #[test]
    fn test_token_without_payload_is_absent() {
        assert_eq!(decode(Some("%%%")), None);
        assert_eq!(decode(Some("=")), None);
        assert_eq!(decode(Some("A")), None);
    }

    #[derive(Deserialize)]
    struct Page {
        #[serde(default, deserialize_with = "deserialize_optional")]
        next_page_token: Option<PageToken>,
    }

    #[test]
    fn test_deserialize_optional_field() {
        let page: Page = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(page.next_page_token, None);

        let page: Page = serde_json::from_str(r#"{"next_page_token": null}"#).unwrap();
        assert_eq!(page.next_page_token, None);

        let page: Page = serde_json::from_str(r#"{"next_page_token": ""}"#).unwrap();
        assert_eq!(page.next_page_token, None);

        let page: Page = serde_json::from_str(r#"{"next_page_token": "AAE="}"#).unwrap();
        assert_eq!(page.next_page_token.unwrap().as_bytes(), &[0, 1]);
    }

    #[test]
    fn test_serialize_as_base64_string() {
        let token = PageToken::new(vec![0u8, 1, 2]);
        assert_eq!(serde_json::to_string(&token).unwrap(), "\"AAEC\"");
    }
}
