//! Connection capability descriptors.

/// Refresh-token re-authentication flows a connection may support.
///
/// Different SDK generations of the upstream provider expose different
/// refresh entry points. The session manager tries the advertised flows
/// in the order they appear in [`ConnectionCapabilities::refresh_flows`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RefreshFlow {
    /// Exchange a long-lived refresh token for a fresh session.
    RefreshToken,
    /// Re-validate an existing session token.
    SessionToken,
    /// Renew the access token in place without a full login.
    AccessTokenRenewal,
}

impl std::fmt::Display for RefreshFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RefreshToken => write!(f, "refresh_token"),
            Self::SessionToken => write!(f, "session_token"),
            Self::AccessTokenRenewal => write!(f, "access_token_renewal"),
        }
    }
}

/// Describes what a provider connection can do.
///
/// Decided once when the connection is constructed; callers consult this
/// instead of probing operations and catching "not supported" failures.
#[derive(Clone, Debug)]
pub struct ConnectionCapabilities {
    /// Refresh flows supported, in the order they should be attempted.
    pub refresh_flows: &'static [RefreshFlow],

    /// Whether the connection can list the full instrument master.
    pub supports_instrument_dump: bool,

    /// Whether the connection implements live scrip search.
    pub supports_search: bool,
}

impl Default for ConnectionCapabilities {
    fn default() -> Self {
        Self {
            refresh_flows: &[],
            supports_instrument_dump: false,
            supports_search: false,
        }
    }
}
