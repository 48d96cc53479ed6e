// Errors returned by the client. Each variant maps to one failure class:
// signing/config, transport, remote rejection, or response decoding.

use thiserror::Error;

use crate::auth::SignerError;
use crate::config::ConfigError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),

    /// The signer could not produce a signed auth event.
    #[error("signing failed: {0}")]
    Signer(#[from] SignerError),

    #[error("http method must not be empty")]
    InvalidMethod,

    /// The system clock reads earlier than the Unix epoch.
    #[error("system clock is before the unix epoch: {0}")]
    Clock(#[source] std::time::SystemTimeError),

    /// A delete URL that parses but has no file name to delete.
    #[error("no asset file name in `{0}`")]
    MissingAssetName(String),

    #[error("failed to encode auth event: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("malformed authorization header: {0}")]
    InvalidAuthorization(String),

    /// Connection, DNS or request construction failure. Never retried.
    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),

    /// The call's timeout elapsed and the in-flight request was aborted.
    #[error("request timed out: {0}")]
    Timeout(#[source] reqwest::Error),

    /// Non-200 answer. `body` is the raw response text, unparsed.
    #[error("server returned {status}: {body}")]
    Remote { status: u16, body: String },

    #[error("failed to decode response: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("upload response contained no media")]
    MissingAssets,
}

impl Error {
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::Timeout(_))
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Error::Remote { .. })
    }

    pub fn is_decode(&self) -> bool {
        matches!(self, Error::Decode(_) | Error::MissingAssets)
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Timeout(err)
        } else {
            Error::Transport(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_error_keeps_body_verbatim() {
        let err = Error::Remote { status: 404, body: "not found".into() };
        assert!(err.is_remote());
        assert!(!err.is_decode());
        assert!(!err.is_transport());
        assert_eq!(err.to_string(), "server returned 404: not found");
    }

    #[test]
    fn decode_errors_are_classified() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(Error::Decode(json_err).is_decode());
        assert!(Error::MissingAssets.is_decode());
        assert!(!Error::MissingAssets.is_remote());
    }
}
