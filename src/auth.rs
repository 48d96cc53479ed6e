// Assertion builder: binds one outbound request to a freshly signed Nostr
// HTTP auth event (kind 27235) and encodes it as an `Authorization` header.
//
// An event is built per request and never cached: its `u` tag, `method`
// tag and `created_at` only make sense for the request it was built for.

use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;

use crate::error::{Error, Result};
use crate::keys::KeyError;

/// Event kind reserved for HTTP auth.
pub const KIND_HTTP_AUTH: u16 = 27235;

/// Scheme label in front of the base64 event in the header value.
pub const AUTH_SCHEME: &str = "Nostr";

pub const URL_TAG: &str = "u";
pub const METHOD_TAG: &str = "method";

/// A Nostr event. Field order matches the wire format.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub pubkey: String,
    pub created_at: u64,
    pub kind: u16,
    pub tags: Vec<Vec<String>>,
    pub content: String,
    pub sig: String,
}

impl Event {
    /// Unsigned HTTP auth event for `method` on `url`.
    pub fn http_auth(method: &str, url: &str, created_at: u64) -> Self {
        let mut event = Event {
            created_at,
            kind: KIND_HTTP_AUTH,
            ..Event::default()
        };
        event.append_unique_tag(vec![URL_TAG.to_string(), url.to_string()]);
        event.append_unique_tag(vec![METHOD_TAG.to_string(), method.to_string()]);
        event
    }

    /// Appends `tag` unless a tag with the same name and value is present.
    pub fn append_unique_tag(&mut self, tag: Vec<String>) {
        let duplicate = self
            .tags
            .iter()
            .any(|t| t.len() >= 2 && tag.len() >= 2 && t[..2] == tag[..2]);
        if !duplicate {
            self.tags.push(tag);
        }
    }

    /// Values of every tag named `name`.
    pub fn tag_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.tags
            .iter()
            .filter(move |t| t.first().map(String::as_str) == Some(name))
            .filter_map(|t| t.get(1).map(String::as_str))
    }

    pub fn first_tag(&self, name: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|t| t.first().map(String::as_str) == Some(name))
            .and_then(|t| t.get(1))
            .map(String::as_str)
    }

    /// SHA-256 over `[0, pubkey, created_at, kind, tags, content]`.
    pub fn digest(&self) -> [u8; 32] {
        let canonical = serde_json::json!([
            0,
            self.pubkey,
            self.created_at,
            self.kind,
            self.tags,
            self.content,
        ]);
        let mut out = [0u8; 32];
        out.copy_from_slice(&Sha256::digest(canonical.to_string().as_bytes()));
        out
    }

    pub fn is_signed(&self) -> bool {
        !self.id.is_empty() && !self.pubkey.is_empty() && !self.sig.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum SignerError {
    #[error(transparent)]
    Key(#[from] KeyError),

    #[error("{0}")]
    Other(String),
}

/// Fills in `pubkey`, `id` and `sig` of an event it is handed.
///
/// Implemented by [`crate::Keys`] and by any
/// `Fn(&mut Event) -> Result<(), SignerError>`.
pub trait Signer {
    fn sign_event(&self, event: &mut Event) -> std::result::Result<(), SignerError>;
}

impl<F> Signer for F
where
    F: Fn(&mut Event) -> std::result::Result<(), SignerError>,
{
    fn sign_event(&self, event: &mut Event) -> std::result::Result<(), SignerError> {
        self(event)
    }
}

/// Seconds since the Unix epoch.
pub fn unix_now() -> Result<u64> {
    unix_seconds(SystemTime::now())
}

fn unix_seconds(at: SystemTime) -> Result<u64> {
    at.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(Error::Clock)
}

/// Builds and signs an HTTP auth event for `method` on `url`.
///
/// Fails without producing an event if the signer fails, leaves the event
/// unsigned, or rewrites the `u`/`method` binding.
pub fn build_assertion(method: &str, url: &str, signer: &dyn Signer) -> Result<Event> {
    if method.trim().is_empty() {
        return Err(Error::InvalidMethod);
    }

    let mut event = Event::http_auth(method, url, unix_now()?);
    signer.sign_event(&mut event)?;

    if !event.is_signed() {
        return Err(SignerError::Other("signer returned an unsigned event".into()).into());
    }
    let bound = event.tag_values(URL_TAG).eq([url])
        && event.tag_values(METHOD_TAG).eq([method]);
    if !bound {
        return Err(SignerError::Other("signer altered the request binding".into()).into());
    }

    debug!(method, url, created_at = event.created_at, "built http auth event");
    Ok(event)
}

/// `Nostr <base64 of the event JSON>`.
pub fn encode_authorization(event: &Event) -> Result<String> {
    let json = serde_json::to_vec(event).map_err(Error::Encode)?;
    Ok(format!("{} {}", AUTH_SCHEME, STANDARD.encode(json)))
}

/// Reverses [`encode_authorization`].
pub fn decode_authorization(header: &str) -> Result<Event> {
    let encoded = header
        .strip_prefix(AUTH_SCHEME)
        .and_then(|rest| rest.strip_prefix(' '))
        .ok_or_else(|| Error::InvalidAuthorization(format!("missing `{}` scheme", AUTH_SCHEME)))?;
    let json = STANDARD
        .decode(encoded.trim())
        .map_err(|e| Error::InvalidAuthorization(e.to_string()))?;
    serde_json::from_slice(&json).map_err(|e| Error::InvalidAuthorization(e.to_string()))
}

/// Builds, signs and encodes the header value in one step.
pub fn authorization_header(method: &str, url: &str, signer: &dyn Signer) -> Result<String> {
    let event = build_assertion(method, url, signer)?;
    encode_authorization(&event)
}
