//! Request signing.
//!
//! The signature is `"$1$"` followed by the lowercase hex SHA-1 of
//! `secret+consumer_key+METHOD+url+body+timestamp`. The prefix names the
//! scheme version and is part of the wire format.

use sha1::{Digest, Sha1};

use crate::http::HttpMethod;

/// Version tag prepended to every signature.
pub const SIGNATURE_VERSION: &str = "$1$";

/// Build the string that gets hashed. `body` is empty when there is no
/// payload.
pub fn pre_image(
    application_secret: &str,
    consumer_key: &str,
    method: HttpMethod,
    url: &str,
    body: &str,
    timestamp: i64,
) -> String {
    format!(
        "{application_secret}+{consumer_key}+{}+{url}+{body}+{timestamp}",
        method.as_str()
    )
}

/// Compute the `X-Ovh-Signature` value for one request.
pub fn sign(
    application_secret: &str,
    consumer_key: &str,
    method: HttpMethod,
    url: &str,
    body: &str,
    timestamp: i64,
) -> String {
    let pre_image = pre_image(application_secret, consumer_key, method, url, body, timestamp);
    let digest = Sha1::digest(pre_image.as_bytes());
    format!("{SIGNATURE_VERSION}{}", hex::encode(digest))
}
