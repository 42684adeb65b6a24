use base64::prelude::*;
use hmac::{Hmac, Mac as _};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use sha1::Sha1;

/// Everything but the RFC 3986 unreserved characters is encoded.
const RFC3986: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Percent-encodes `input` the way the cloud API signatures expect (upper-case hex, `%20` for
/// space).
pub(crate) fn percent_encode(input: &str) -> String {
    utf8_percent_encode(input, RFC3986).to_string()
}

/// Base64 of the HMAC-SHA1 of `data` under `key`.
pub(crate) fn hmac_sha1_base64(key: &[u8], data: &[u8]) -> String {
    let mut mac = Hmac::<Sha1>::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    BASE64_STANDARD.encode(mac.finalize().into_bytes())
}
