// ── Bearer token sources ──
//
// The tracker never stores credentials itself. It asks a `TokenSource`
// every time it opens the socket or fetches the fleet, so a token rotated
// in durable storage is picked up on the next (re)connect.

use std::fmt;

use secrecy::{ExposeSecret, SecretString};

/// Supplies the current bearer token, if any.
pub trait TokenSource: Send + Sync + 'static {
    /// Read the token now. `None` means the user is not signed in.
    fn token(&self) -> Option<SecretString>;

    /// [`token`](Self::token) with a blank value treated as absent.
    fn bearer(&self) -> Option<SecretString> {
        self.token().filter(|t| !t.expose_secret().trim().is_empty())
    }
}

/// A fixed token (or none), for tests and `--token` overrides.
#[derive(Clone, Default)]
pub struct StaticToken(Option<SecretString>);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Some(SecretString::from(token.into())))
    }

    /// A source that never has a token.
    pub fn none() -> Self {
        Self(None)
    }
}

impl fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StaticToken")
            .field(&self.0.as_ref().map(|_| "***"))
            .finish()
    }
}

impl TokenSource for StaticToken {
    fn token(&self) -> Option<SecretString> {
        self.0.clone()
    }
}

impl<F> TokenSource for F
where
    F: Fn() -> Option<SecretString> + Send + Sync + 'static,
{
    fn token(&self) -> Option<SecretString> {
        self()
    }
}
