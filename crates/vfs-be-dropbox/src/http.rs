//! The hyper-backed Dropbox API client.
//!
//! RPC endpoints take JSON bodies; content endpoints carry the JSON
//! argument in the `Dropbox-API-Arg` header next to an octet-stream
//! body. Transient failures (429 and 5xx) are retried with exponential
//! backoff up to `retry_count` times.

use crate::api::{DbxClient, EntryDto, ListFolderDto, ObjectInfo, SessionDto};
use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{Method, Request, StatusCode, header};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use libvfs::{Error, ErrorKind, Operation, Result, Secret};
use serde_json::{Value, json};
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

const API_BASE: &str = "https://api.dropboxapi.com";
const CONTENT_BASE: &str = "https://content.dropboxapi.com";

/// The authenticated HTTP client.
pub struct HyperDbxClient {
    client: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
    token: Secret,
    retry_count: u32,
    api_base: String,
    content_base: String,
}

impl fmt::Debug for HyperDbxClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HyperDbxClient").field("api_base", &self.api_base).finish()
    }
}

impl HyperDbxClient {
    /// Creates a client against the production API endpoints.
    pub fn new(token: Secret, retry_count: u32) -> Result<HyperDbxClient> {
        HyperDbxClient::with_bases(token, retry_count, API_BASE, CONTENT_BASE)
    }

    /// Creates a client against custom endpoints, for test rigs.
    pub fn with_bases(token: Secret, retry_count: u32, api_base: &str, content_base: &str) -> Result<HyperDbxClient> {
        let https = hyper_rustls::HttpsConnectorBuilder::new()
            .with_native_roots()
            .map_err(|e| Error::new(Operation::Connect, ErrorKind::Connection, e))?
            .https_or_http()
            .enable_http1()
            .build();
        Ok(HyperDbxClient {
            client: Client::builder(TokioExecutor::new()).build(https),
            token,
            retry_count,
            api_base: api_base.to_string(),
            content_base: content_base.to_string(),
        })
    }

    async fn send(&self, op: Operation, uri: String, arg: Option<Value>, body: Option<Value>, data: Bytes) -> Result<Bytes> {
        let mut attempt: u32 = 0;
        loop {
            let mut builder = Request::builder()
                .method(Method::POST)
                .uri(uri.clone())
                .header(header::AUTHORIZATION, format!("Bearer {}", self.token.reveal()));
            let payload = match (&arg, &body) {
                (Some(arg), _) => {
                    builder = builder
                        .header("Dropbox-API-Arg", escape_non_ascii(&arg.to_string()))
                        .header(header::CONTENT_TYPE, mime::APPLICATION_OCTET_STREAM.as_ref());
                    Full::new(data.clone())
                }
                (None, Some(body)) => {
                    builder = builder.header(header::CONTENT_TYPE, mime::APPLICATION_JSON.as_ref());
                    Full::new(Bytes::from(body.to_string()))
                }
                (None, None) => Full::new(Bytes::new()),
            };
            let request = builder.body(payload).map_err(|e| Error::new(op, ErrorKind::Protocol, e))?;

            let response = self
                .client
                .request(request)
                .await
                .map_err(|e| Error::new(op, ErrorKind::Connection, e))?;
            let status = response.status();
            let bytes = response
                .into_body()
                .collect()
                .await
                .map_err(|e| Error::new(op, ErrorKind::Io, e))?
                .to_bytes();

            if status.is_success() {
                return Ok(bytes);
            }

            let err = classify(op, status, &bytes);
            if err.is_transient() && attempt < self.retry_count {
                attempt += 1;
                let backoff = Duration::from_millis(250u64 << attempt.min(6));
                warn!(%status, attempt, ?backoff, "transient api failure, retrying");
                tokio::time::sleep(backoff).await;
                continue;
            }
            return Err(err);
        }
    }

    async fn rpc(&self, op: Operation, endpoint: &str, body: Value) -> Result<Bytes> {
        let uri = format!("{}{endpoint}", self.api_base);
        self.send(op, uri, None, Some(body), Bytes::new()).await
    }

    async fn content(&self, op: Operation, endpoint: &str, arg: Value, data: Bytes) -> Result<Bytes> {
        let uri = format!("{}{endpoint}", self.content_base);
        self.send(op, uri, Some(arg), None, data).await
    }
}

fn classify(op: Operation, status: StatusCode, body: &[u8]) -> Error {
    let text = String::from_utf8_lossy(body).into_owned();
    let kind = if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        ErrorKind::Transient
    } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        ErrorKind::Permission
    } else if status == StatusCode::CONFLICT && text.contains("not_found") {
        ErrorKind::NotFound
    } else {
        ErrorKind::Protocol
    };
    debug!(%status, "api error response");
    Error::new(op, kind, format!("{status}: {text}"))
}

/// HTTP header values are ASCII; non-ASCII JSON is `\u` escaped the way
/// the API documents.
fn escape_non_ascii(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c.is_ascii() {
            out.push(c);
        } else {
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                out.push_str(&format!("\\u{unit:04x}"));
            }
        }
    }
    out
}

/// The API addresses the root as the empty string.
fn api_path(path: &str) -> &str {
    if path == "/" { "" } else { path.trim_end_matches('/') }
}

fn parse<T: serde::de::DeserializeOwned>(op: Operation, bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| Error::new(op, ErrorKind::Protocol, e))
}

#[async_trait]
impl DbxClient for HyperDbxClient {
    async fn metadata(&self, path: &str) -> Result<ObjectInfo> {
        let body = self
            .rpc(Operation::Exists, "/2/files/get_metadata", json!({"path": api_path(path)}))
            .await?;
        parse::<EntryDto>(Operation::Exists, &body).map(EntryDto::into_info)
    }

    async fn list_folder(&self, path: &str) -> Result<Vec<ObjectInfo>> {
        let body = self
            .rpc(Operation::List, "/2/files/list_folder", json!({"path": api_path(path)}))
            .await?;
        let mut page: ListFolderDto = parse(Operation::List, &body)?;
        let mut entries: Vec<ObjectInfo> = page.entries.drain(..).map(EntryDto::into_info).collect();
        while page.has_more {
            let body = self
                .rpc(Operation::List, "/2/files/list_folder/continue", json!({"cursor": page.cursor}))
                .await?;
            page = parse(Operation::List, &body)?;
            entries.extend(page.entries.drain(..).map(EntryDto::into_info));
        }
        Ok(entries)
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>> {
        let bytes = self
            .content(Operation::Read, "/2/files/download", json!({"path": api_path(path)}), Bytes::new())
            .await?;
        Ok(bytes.to_vec())
    }

    async fn upload(&self, path: &str, data: Vec<u8>) -> Result<()> {
        let arg = json!({"path": api_path(path), "mode": "overwrite", "mute": true});
        self.content(Operation::Write, "/2/files/upload", arg, Bytes::from(data)).await.map(|_| ())
    }

    async fn upload_start(&self, chunk: Vec<u8>) -> Result<String> {
        let body = self
            .content(Operation::Write, "/2/files/upload_session/start", json!({"close": false}), Bytes::from(chunk))
            .await?;
        parse::<SessionDto>(Operation::Write, &body).map(|dto| dto.session_id)
    }

    async fn upload_append(&self, session: &str, offset: u64, chunk: Vec<u8>) -> Result<()> {
        let arg = json!({"cursor": {"session_id": session, "offset": offset}, "close": false});
        self.content(Operation::Write, "/2/files/upload_session/append_v2", arg, Bytes::from(chunk))
            .await
            .map(|_| ())
    }

    async fn upload_finish(&self, session: &str, offset: u64, path: &str, chunk: Vec<u8>) -> Result<()> {
        let arg = json!({
            "cursor": {"session_id": session, "offset": offset},
            "commit": {"path": api_path(path), "mode": "overwrite", "mute": true}
        });
        self.content(Operation::Close, "/2/files/upload_session/finish", arg, Bytes::from(chunk))
            .await
            .map(|_| ())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.rpc(Operation::Delete, "/2/files/delete_v2", json!({"path": api_path(path)}))
            .await
            .map(|_| ())
    }

    async fn copy_entry(&self, from: &str, to: &str) -> Result<()> {
        self.rpc(
            Operation::CopyToFile,
            "/2/files/copy_v2",
            json!({"from_path": api_path(from), "to_path": api_path(to)}),
        )
        .await
        .map(|_| ())
    }

    async fn move_entry(&self, from: &str, to: &str) -> Result<()> {
        self.rpc(
            Operation::MoveToFile,
            "/2/files/move_v2",
            json!({"from_path": api_path(from), "to_path": api_path(to)}),
        )
        .await
        .map(|_| ())
    }

    async fn create_folder(&self, path: &str) -> Result<()> {
        self.rpc(
            Operation::Mkdir,
            "/2/files/create_folder_v2",
            json!({"path": api_path(path), "autorename": false}),
        )
        .await
        .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn header_escaping() {
        assert_eq!(escape_non_ascii(r#"{"path":"/plain.txt"}"#), r#"{"path":"/plain.txt"}"#);
        assert_eq!(escape_non_ascii("/r\u{e9}sum\u{e9}.txt"), "/r\\u00e9sum\\u00e9.txt");
        assert_eq!(escape_non_ascii("\u{1f600}"), "\\ud83d\\ude00");
    }

    #[test]
    fn root_maps_to_empty_path() {
        assert_eq!(api_path("/"), "");
        assert_eq!(api_path("/a/b/"), "/a/b");
        assert_eq!(api_path("/a/b.txt"), "/a/b.txt");
    }
}
