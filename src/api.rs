// API client module: a small blocking HTTP client for the nostr.build
// upload and delete endpoints. Every call optionally signs a fresh HTTP
// auth event and returns a typed result or a typed error.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::blocking::{multipart, Client, RequestBuilder};
use reqwest::header::AUTHORIZATION;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::auth::{self, Signer};
use crate::config::ClientConfig;
use crate::error::{Error, Result};

pub const UPLOAD_PATH: &str = "/api/v2/upload/files";
pub const DELETE_PATH: &str = "/api/v2/nip96/upload";

/// Multipart field (and file name) the upload endpoint expects.
pub const UPLOAD_FIELD: &str = "fileToUpload";

/// Per-call overrides.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Aborts the call once elapsed; surfaces as [`Error::Timeout`].
    pub timeout: Option<Duration>,
}

impl CallOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout: Some(timeout) }
    }
}

/// Blocking client for the nostr.build media API.
///
/// Holds no per-request state: clones share the connection pool and calls
/// may run concurrently from several threads.
#[derive(Clone)]
pub struct NostrBuildClient {
    client: Client,
    base_url: Url,
}

/// Pixel size of an asset.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Dimensions {
    #[serde(default, deserialize_with = "nullable")]
    pub width: u64,
    #[serde(default, deserialize_with = "nullable")]
    pub height: u64,
}

/// One stored media object. Only `url` is interpreted by this crate; the
/// rest is passed through as the service returned it.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct MediaAsset {
    pub url: String,
    #[serde(default, deserialize_with = "nullable")]
    pub sha256: String,
    #[serde(default, deserialize_with = "nullable")]
    pub original_sha256: String,
    #[serde(default, deserialize_with = "nullable")]
    pub size: u64,
    #[serde(default, deserialize_with = "nullable")]
    pub mime: String,
    #[serde(rename = "type", default, deserialize_with = "nullable")]
    pub media_type: String,
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub input_name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub blurhash: String,
    #[serde(default, deserialize_with = "nullable")]
    pub dimensions: Dimensions,
    #[serde(rename = "dimensionsString", default, deserialize_with = "nullable")]
    pub dimensions_string: String,
    #[serde(default, deserialize_with = "nullable")]
    pub thumbnail: String,
    /// Size label (e.g. `"720p"`) to URL.
    #[serde(default, deserialize_with = "nullable")]
    pub responsive: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "nullable")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

/// Successful upload. `data` is never empty when returned by the client.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct UploadResult {
    #[serde(default, deserialize_with = "nullable")]
    pub status: String,
    #[serde(default, deserialize_with = "nullable")]
    pub message: String,
    #[serde(default, deserialize_with = "nullable")]
    pub data: Vec<MediaAsset>,
}

impl UploadResult {
    /// URL of the first asset, the one to show a user.
    pub fn primary_url(&self) -> Option<&str> {
        self.data.first().map(|asset| asset.url.as_str())
    }
}

/// Successful delete.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct DeleteResult {
    #[serde(default, deserialize_with = "nullable")]
    pub status: String,
    #[serde(default, deserialize_with = "nullable")]
    pub message: String,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub data: Vec<MediaAsset>,
}

// The service sends `null` for fields it has no value for.
fn nullable<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Delete target for `asset_url`: the service base with the path replaced
/// by the delete endpoint and the asset's basename. Query and fragment are
/// kept. Input that does not parse as a URL is returned unchanged; a URL
/// that parses but names no file is rejected, since the request may only
/// go to the service host.
pub fn rewrite_delete_url(asset_url: &str, base_url: &Url) -> Result<String> {
    let Ok(parsed) = Url::parse(asset_url) else {
        return Ok(asset_url.to_string());
    };
    let basename = parsed
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .map(str::to_owned)
        .ok_or_else(|| Error::MissingAssetName(asset_url.to_string()))?;

    let mut target = base_url.clone();
    target.set_path(&format!("{}/{}", DELETE_PATH, basename));
    target.set_query(parsed.query());
    target.set_fragment(parsed.fragment());
    Ok(target.to_string())
}

impl NostrBuildClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let base_url = config.parsed_base_url()?;
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent)
            .build()
            .map_err(Error::Client)?;
        Ok(Self { client, base_url })
    }

    /// Client configured from `NBCMD_BASE_URL` / `NBCMD_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env()?)
    }

    pub fn upload_url(&self) -> String {
        let mut url = self.base_url.clone();
        url.set_path(UPLOAD_PATH);
        url.set_query(None);
        url.set_fragment(None);
        url.to_string()
    }

    pub fn delete_url(&self, asset_url: &str) -> Result<String> {
        rewrite_delete_url(asset_url, &self.base_url)
    }

    /// Upload one file. `None` for `signer` sends the request without an
    /// `Authorization` header.
    pub fn upload(&self, file: Vec<u8>, signer: Option<&dyn Signer>) -> Result<UploadResult> {
        self.upload_with(file, signer, &CallOptions::default())
    }

    pub fn upload_with(
        &self,
        file: Vec<u8>,
        signer: Option<&dyn Signer>,
        options: &CallOptions,
    ) -> Result<UploadResult> {
        let target = self.upload_url();
        debug!(url = %target, bytes = file.len(), "uploading file");

        let part = multipart::Part::bytes(file)
            .file_name(UPLOAD_FIELD)
            .mime_str("application/octet-stream")?;
        let form = multipart::Form::new().part(UPLOAD_FIELD, part);

        let req = self.client.post(&target).multipart(form);
        let req = authorize(req, &Method::POST, &target, signer)?;
        let body = send(req, options)?;

        let result: UploadResult = decode(&body)?;
        if result.data.is_empty() {
            return Err(Error::MissingAssets);
        }
        Ok(result)
    }

    /// Delete the asset behind `asset_url` (see [`rewrite_delete_url`]).
    pub fn delete(&self, asset_url: &str, signer: Option<&dyn Signer>) -> Result<DeleteResult> {
        self.delete_with(asset_url, signer, &CallOptions::default())
    }

    pub fn delete_with(
        &self,
        asset_url: &str,
        signer: Option<&dyn Signer>,
        options: &CallOptions,
    ) -> Result<DeleteResult> {
        // The signed `u` tag and the request target must be the same string.
        let target = self.delete_url(asset_url)?;
        debug!(url = %target, original = asset_url, "deleting asset");

        let req = self.client.request(Method::DELETE, target.as_str());
        let req = authorize(req, &Method::DELETE, &target, signer)?;
        let body = send(req, options)?;
        decode(&body)
    }
}

fn authorize(
    req: RequestBuilder,
    method: &Method,
    target: &str,
    signer: Option<&dyn Signer>,
) -> Result<RequestBuilder> {
    match signer {
        Some(signer) => {
            let header = auth::authorization_header(method.as_str(), target, signer)?;
            Ok(req.header(AUTHORIZATION, header))
        }
        None => {
            debug!(url = target, "sending unauthenticated request");
            Ok(req)
        }
    }
}

/// Sends once and returns the body of a 200 response. Any other status is
/// an [`Error::Remote`] carrying the body text as-is.
fn send(req: RequestBuilder, options: &CallOptions) -> Result<String> {
    let req = match options.timeout {
        Some(timeout) => req.timeout(timeout),
        None => req,
    };
    let res = req.send()?;
    let status = res.status();
    let body = res.text()?;

    if status != StatusCode::OK {
        warn!(status = status.as_u16(), "request rejected by server");
        return Err(Error::Remote {
            status: status.as_u16(),
            body,
        });
    }
    debug!(status = status.as_u16(), bytes = body.len(), "request accepted");
    Ok(body)
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T> {
    serde_json::from_str(body).map_err(Error::Decode)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nostr_build() -> Url {
        Url::parse("https://nostr.build").unwrap()
    }

    #[test]
    fn delete_url_keeps_only_the_basename() {
        assert_eq!(
            rewrite_delete_url("https://otherhost/a/b/c/image123.png", &nostr_build()).unwrap(),
            "https://nostr.build/api/v2/nip96/upload/image123.png"
        );
        assert_eq!(
            rewrite_delete_url("https://image.nostr.build/resp/240p/abc.jpg", &nostr_build()).unwrap(),
            "https://nostr.build/api/v2/nip96/upload/abc.jpg"
        );
    }

    #[test]
    fn delete_url_takes_scheme_and_port_from_base() {
        let base = Url::parse("http://127.0.0.1:8080").unwrap();
        assert_eq!(
            rewrite_delete_url("https://nostr.build/i/x.gif", &base).unwrap(),
            "http://127.0.0.1:8080/api/v2/nip96/upload/x.gif"
        );
    }

    #[test]
    fn delete_url_ignores_trailing_slash_and_keeps_query() {
        assert_eq!(
            rewrite_delete_url("https://x/i/photo.webp/?v=2", &nostr_build()).unwrap(),
            "https://nostr.build/api/v2/nip96/upload/photo.webp?v=2"
        );
    }

    #[test]
    fn unparsable_delete_url_is_used_verbatim() {
        assert_eq!(rewrite_delete_url("not a url", &nostr_build()).unwrap(), "not a url");
        assert_eq!(rewrite_delete_url("image123.png", &nostr_build()).unwrap(), "image123.png");
    }

    #[test]
    fn parsed_url_without_file_name_is_rejected() {
        for input in ["https://evil.example/", "https://otherhost", "mailto:x"] {
            let err = rewrite_delete_url(input, &nostr_build()).unwrap_err();
            assert!(
                matches!(err, Error::MissingAssetName(ref url) if url == input),
                "{input}: {err:?}"
            );
        }
    }

    #[test]
    fn upload_url_is_versioned_endpoint() {
        let client = NostrBuildClient::new(ClientConfig::default()).unwrap();
        assert_eq!(client.upload_url(), "https://nostr.build/api/v2/upload/files");
    }

    #[test]
    fn upload_result_decodes_full_asset() {
        let body = r#"{
            "status": "success",
            "message": "Upload successful.",
            "data": [{
                "input_name": "APIv2",
                "name": "d4b2.png",
                "url": "https://image.nostr.build/d4b2.png",
                "thumbnail": "https://image.nostr.build/thumb/d4b2.png",
                "responsive": {
                    "240p": "https://image.nostr.build/resp/240p/d4b2.png",
                    "1080p": "https://image.nostr.build/resp/1080p/d4b2.png"
                },
                "blurhash": "LEHV6nWB2yk8",
                "sha256": "d4b2",
                "original_sha256": "ffee",
                "type": "picture",
                "mime": "image/png",
                "size": 1234,
                "metadata": {"date:create": "2023-10-01T00:00:00+00:00", "png:IHDR.bit_depth": "8"},
                "dimensions": {"width": 640, "height": 480},
                "dimensionsString": "640x480"
            }]
        }"#;
        let result: UploadResult = decode(body).unwrap();
        assert_eq!(result.primary_url(), Some("https://image.nostr.build/d4b2.png"));

        let asset = &result.data[0];
        assert_eq!(asset.media_type, "picture");
        assert_eq!(asset.dimensions, Dimensions { width: 640, height: 480 });
        assert_eq!(asset.dimensions_string, "640x480");
        assert_eq!(asset.responsive["240p"], "https://image.nostr.build/resp/240p/d4b2.png");
        assert_eq!(asset.metadata["png:IHDR.bit_depth"], "8");
    }

    #[test]
    fn null_fields_fall_back_to_defaults() {
        let body = r#"{"status":"success","message":null,"data":[
            {"url":"https://x/y.mp4","blurhash":null,"dimensions":null,"responsive":null,"size":null}
        ]}"#;
        let result: UploadResult = decode(body).unwrap();
        assert_eq!(result.message, "");
        assert_eq!(result.data[0].blurhash, "");
        assert_eq!(result.data[0].dimensions, Dimensions::default());
        assert!(result.data[0].responsive.is_empty());
    }

    #[test]
    fn asset_without_url_is_a_decode_error() {
        let err = decode::<UploadResult>(r#"{"status":"success","data":[{"sha256":"abc"}]}"#).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn delete_result_omits_missing_data() {
        let result: DeleteResult = decode(r#"{"status":"success","message":"Deleted"}"#).unwrap();
        assert_eq!(result.message, "Deleted");
        assert!(result.data.is_empty());
        assert_eq!(
            serde_json::to_string(&result).unwrap(),
            r#"{"status":"success","message":"Deleted"}"#
        );
    }
}
