//! Embedded payload (`data:` URI) encoding and decoding.

use std::sync::OnceLock;

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::{Engine as _, engine::general_purpose};
use percent_encoding::percent_decode_str;
use regex::Regex;

use crate::models::{OriginKind, ResolvedResource};

/// Prefix shared by every embedded payload.
pub const PAYLOAD_PREFIX: &str = "data:";

// Accepts padded and unpadded input; payloads found in the wild are not always padded.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
  &alphabet::STANDARD,
  GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

fn payload_pattern() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| {
    Regex::new(r"(?is)^data:([^;,]+)(?:;charset=[^;,]+)?(;base64)?,(.*)$")
      .expect("invalid data URI regex")
  })
}

/// Encode bytes as a base64 `data:` URI.
pub fn encode_payload(media_type: &str, bytes: &[u8]) -> String {
  format!(
    "{PAYLOAD_PREFIX}{media_type};base64,{}",
    general_purpose::STANDARD.encode(bytes)
  )
}

/// Decode a `data:` URI back into its media type and bytes.
///
/// Returns `None` for anything malformed so callers can pass the payload through untouched.
pub fn decode_payload(payload: &str) -> Option<ResolvedResource> {
  let captures = payload_pattern().captures(payload)?;
  let media_type = captures.get(1)?.as_str().trim().to_ascii_lowercase();
  let is_base64 = captures.get(2).is_some();
  let data = captures.get(3).map(|m| m.as_str()).unwrap_or_default();

  let unescaped: Vec<u8> = percent_decode_str(data).collect();
  let bytes = if is_base64 {
    let compact: Vec<u8> = unescaped
      .into_iter()
      .filter(|byte| !byte.is_ascii_whitespace())
      .collect();
    LENIENT_BASE64.decode(compact).ok()?
  } else {
    unescaped
  };

  Some(ResolvedResource {
    media_type,
    bytes,
    origin: OriginKind::EmbeddedPayload,
  })
}
