use anyhow::{anyhow, Result};
use secrecy::SecretString;

/// Cross-cutting configuration handed to the server: the session-token
/// signing secret and its time to live.
#[derive(Debug, Clone)]
pub struct GlobalArgs {
    pub session_secret: SecretString,
    pub session_ttl_seconds: u64,
}

impl GlobalArgs {
    #[must_use]
    pub const fn new(session_secret: SecretString, session_ttl_seconds: u64) -> Self {
        Self {
            session_secret,
            session_ttl_seconds,
        }
    }

    /// # Errors
    /// Returns an error if a required argument is missing.
    pub fn from_matches(matches: &clap::ArgMatches) -> Result<Self> {
        let secret = matches
            .get_one::<String>("session-secret")
            .map(|s| SecretString::from(s.clone()))
            .ok_or_else(|| anyhow!("missing required argument: --session-secret"))?;

        let ttl = matches
            .get_one::<u64>("session-ttl")
            .copied()
            .unwrap_or(86_400);

        Ok(Self::new(secret, ttl))
    }
}
