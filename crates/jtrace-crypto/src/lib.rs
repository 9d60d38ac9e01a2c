/// JTrace Crypto Library
///
/// - `signature`: HMAC-SHA256 signed, time-limited file access URLs.
/// - `map_token`: map provider configuration sealed into a short-lived JWT
///   before it is handed to the browser.

pub mod map_token;
pub mod signature;

pub use signature::{SignatureError, Signer, FILE_ROUTE_PREFIX};
