use serde::{Deserialize, Serialize};

/// Claims carried inside a signed session token.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject (the authenticated principal)
    pub sub: String,
    /// Federated external identity
    pub ext: String,
    /// Issued at (as UTC timestamp)
    pub iat: i64,
    /// Expiration time (as UTC timestamp)
    pub exp: i64,
}
