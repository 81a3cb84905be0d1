//! API token credential for the PBS `Authorization` header

use std::fmt;

/// Pre-built `Authorization` header value, attached to every upstream call.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    username: String,
    token_name: String,
    header: String,
}

impl Credential {
    /// Build the `PBSAPIToken=<user>!<tokenname>:<secret>` header value.
    /// No part is validated.
    pub fn api_token(username: &str, token_name: &str, secret: &str) -> Self {
        Self {
            username: username.to_string(),
            token_name: token_name.to_string(),
            header: format!("PBSAPIToken={username}!{token_name}:{secret}"),
        }
    }

    pub fn header_value(&self) -> &str {
        &self.header
    }
}

// The secret must never end up in logs.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("token_name", &self.token_name)
            .field("secret", &"<redacted>")
            .finish()
    }
}
