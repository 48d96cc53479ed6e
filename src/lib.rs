// Library root
// -----------
// This crate exposes the nostr.build client used by the `nbcmd` binary.
//
// Module responsibilities:
// - `auth`: builds the kind 27235 HTTP auth event that binds a request's
//   method and URL, and encodes it as an `Authorization` header.
// - `keys`: decodes `nsec` secrets and signs events (BIP-340 Schnorr).
// - `api`: the blocking HTTP client (upload, delete) and the response types.
// - `config`: client settings with environment overrides.
// - `error`: the typed errors every client call returns.
// - `ui`: terminal flows used by the binary (prompts, spinner, printing).
//
// The library never reads the signing secret itself; callers hand a
// `Signer` to each call, or `None` to send the request unauthenticated.
pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod keys;
pub mod ui;

pub use api::{CallOptions, DeleteResult, Dimensions, MediaAsset, NostrBuildClient, UploadResult};
pub use auth::{Event, Signer, SignerError, KIND_HTTP_AUTH};
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use keys::{KeyError, Keys};
