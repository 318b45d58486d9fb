use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::trace;

use crate::TokenDecoder;

/// Claims carried by a session token.
///
/// Only `iat` and `exp` are interpreted (both in epoch seconds); anything
/// else is kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Issued-at time.
    pub iat: i64,
    /// Expiry time.
    pub exp: i64,
    /// Remaining claims.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Claims {
    pub fn new(iat: i64, exp: i64) -> Self {
        Self {
            iat,
            exp,
            extra: Map::new(),
        }
    }

    /// Token lifetime in seconds.
    pub fn lifetime_secs(&self) -> i64 {
        self.exp - self.iat
    }
}

/// Decodes the payload segment of a JWT without verifying its signature.
///
/// Verification is the server's job; the client only needs the timing
/// claims to schedule a refresh.
#[derive(Debug, Clone, Copy, Default)]
pub struct JwtDecoder;

impl JwtDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl TokenDecoder for JwtDecoder {
    fn decode(&self, token: &str) -> Option<Claims> {
        let mut parts = token.split('.');
        let (Some(_header), Some(payload), Some(_sig), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            trace!("token is not a three-part JWT");
            return None;
        };

        // Some issuers pad the segment even though RFC 7515 says not to.
        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .ok()?;
        match serde_json::from_slice::<Claims>(&bytes) {
            Ok(claims) => Some(claims),
            Err(e) => {
                trace!(error = %e, "JWT payload lacks usable iat/exp");
                None
            }
        }
    }
}
