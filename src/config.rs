//! Provider credentials, loaded from the environment.
//!
//! Every field is optional: the session manager only attempts the login
//! strategies whose credentials are actually configured.

/// API credentials for the upstream market-data provider.
///
/// Which login strategies the [`SessionManager`](crate::SessionManager)
/// attempts is decided entirely by which of these fields are non-empty.
#[derive(Clone, Debug, Default)]
pub struct Credentials {
    /// Provider API key. Required for any session at all.
    pub api_key: Option<String>,
    /// Client (account) identifier for interactive logins.
    pub client_id: Option<String>,
    /// Long-lived refresh token for non-interactive re-authentication.
    pub refresh_token: Option<String>,
    /// Streaming feed token, passed through to consumers that need it.
    pub feed_token: Option<String>,
    /// Base32-encoded TOTP secret for the second login factor.
    pub totp_secret: Option<String>,
    /// Account password, used with a TOTP code.
    pub password: Option<String>,
    /// Account PIN, used with a TOTP code when password login is disallowed.
    pub mpin: Option<String>,
}

impl Credentials {
    /// Load credentials from the environment (and `.env`, if present).
    ///
    /// Blank values are treated as absent.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self {
            api_key: non_empty_var("ANGEL_API_KEY"),
            client_id: non_empty_var("ANGEL_CLIENT_ID"),
            refresh_token: non_empty_var("ANGEL_REFRESH_TOKEN"),
            feed_token: non_empty_var("ANGEL_FEED_TOKEN"),
            totp_secret: non_empty_var("ANGEL_TOTP_SECRET"),
            password: non_empty_var("ANGEL_PASSWORD"),
            mpin: non_empty_var("ANGEL_MPIN"),
        }
    }

    /// True when refresh-token re-authentication can be attempted.
    pub fn can_refresh(&self) -> bool {
        self.refresh_token.is_some()
    }

    /// True when password + TOTP login can be attempted.
    pub fn can_password_totp(&self) -> bool {
        self.client_id.is_some() && self.password.is_some() && self.totp_secret.is_some()
    }

    /// True when PIN + TOTP login can be attempted.
    pub fn can_pin_totp(&self) -> bool {
        self.client_id.is_some() && self.mpin.is_some() && self.totp_secret.is_some()
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with(fields: &[(&str, &str)]) -> Credentials {
        let mut creds = Credentials::default();
        for (key, value) in fields {
            let value = Some(value.to_string());
            match *key {
                "api_key" => creds.api_key = value,
                "client_id" => creds.client_id = value,
                "refresh_token" => creds.refresh_token = value,
                "totp_secret" => creds.totp_secret = value,
                "password" => creds.password = value,
                "mpin" => creds.mpin = value,
                other => panic!("unknown field {other}"),
            }
        }
        creds
    }

    #[test]
    fn test_empty_credentials_enable_nothing() {
        let creds = Credentials::default();
        assert!(!creds.can_refresh());
        assert!(!creds.can_password_totp());
        assert!(!creds.can_pin_totp());
    }

    #[test]
    fn test_password_totp_requires_all_three() {
        let creds = with(&[("client_id", "C123"), ("password", "hunter2")]);
        assert!(!creds.can_password_totp());

        let creds = with(&[
            ("client_id", "C123"),
            ("password", "hunter2"),
            ("totp_secret", "GEZDGNBVGY3TQOJQ"),
        ]);
        assert!(creds.can_password_totp());
    }

    #[test]
    fn test_pin_and_password_strategies_are_independent() {
        let creds = with(&[
            ("client_id", "C123"),
            ("mpin", "4321"),
            ("totp_secret", "GEZDGNBVGY3TQOJQ"),
        ]);
        assert!(creds.can_pin_totp());
        assert!(!creds.can_password_totp());
    }
}
