use secrecy::SecretString;

/// Google OAuth credentials, present only when sign-in with Google is configured.
#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: SecretString,
    pub redirect_url: String,
}

/// Server settings resolved from the command line / environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub session_ttl_seconds: i64,
    pub secure_cookies: bool,
    pub google: Option<GoogleConfig>,
}

impl ServerConfig {
    #[must_use]
    pub fn new(session_ttl_seconds: i64, secure_cookies: bool) -> Self {
        Self {
            session_ttl_seconds,
            secure_cookies,
            google: None,
        }
    }

    pub fn set_google(&mut self, google: GoogleConfig) {
        self.google = Some(google);
    }
}
