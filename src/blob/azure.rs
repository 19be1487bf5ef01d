//! Azure Blob Storage backend.
//!
//! Talks to the Blob service REST API directly with Shared Key
//! authorization. Requests are signed with HMAC-SHA256 (`hmac` + `sha2`)
//! over the canonical string-to-sign, so no Azure SDK is required.
//! Works against Azure and the Azurite emulator.
//!
//! # Configuration
//!
//! ```toml
//! [storage]
//! container = "knowledge-base-direct"
//! connection_string_env = "AZURE_STORAGE_CONNECTION_STRING"
//! ```
//!
//! The connection string is the standard one shown in the Azure portal:
//!
//! ```text
//! DefaultEndpointsProtocol=https;AccountName=acme;AccountKey=...;EndpointSuffix=core.windows.net
//! ```
//!
//! `BlobEndpoint=...` overrides the endpoint, and `UseDevelopmentStorage=true`
//! selects the Azurite defaults.
//!
//! # Operation mapping
//!
//! | Operation | REST call | Status handling |
//! |-----------|-----------|-----------------|
//! | `list` | `GET ?restype=container&comp=list` | follows `NextMarker` |
//! | `read` | `GET /<container>/<path>` | 404 → `NotFound` |
//! | `write` | `PUT /<container>/<path>` (BlockBlob) | 409/412 → `AlreadyExists` |
//! | `delete` | `DELETE /<container>/<path>` | 404 → `false` |
//!
//! Any transport failure, 401/403, or unexpected status is reported as
//! `BackendUnavailable`. Nothing is retried here.

use std::fmt;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{Method, StatusCode};
use sha2::Sha256;

use super::{content_sha256, BlobObject, BlobStore};
use crate::error::BlobError;
use crate::models::ArtifactFormat;

type HmacSha256 = Hmac<Sha256>;

/// REST API version sent with every request.
const API_VERSION: &str = "2021-08-06";

/// Azurite's published development account.
const DEV_ACCOUNT_NAME: &str = "devstoreaccount1";
const DEV_ACCOUNT_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";
const DEV_BLOB_ENDPOINT: &str = "http://127.0.0.1:10000/devstoreaccount1";

// ============ Credentials ============

/// Storage account credentials parsed from a connection string.
///
/// `Debug` never prints the account key.
#[derive(Clone)]
pub struct AzureCredentials {
    account_name: String,
    account_key: Vec<u8>,
    blob_endpoint: String,
}

impl fmt::Debug for AzureCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureCredentials")
            .field("account_name", &self.account_name)
            .field("account_key", &"<redacted>")
            .field("blob_endpoint", &self.blob_endpoint)
            .finish()
    }
}

impl AzureCredentials {
    /// Parse an Azure Storage connection string.
    ///
    /// Errors name the missing or malformed field but never echo values.
    pub fn from_connection_string(conn: &str) -> Result<Self> {
        let mut protocol = "https".to_string();
        let mut account_name = None;
        let mut account_key = None;
        let mut suffix = "core.windows.net".to_string();
        let mut blob_endpoint = None;

        for part in conn.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let Some((key, value)) = part.split_once('=') else {
                bail!("malformed connection string segment (expected Key=Value)");
            };
            match key.trim() {
                "DefaultEndpointsProtocol" => protocol = value.trim().to_string(),
                "AccountName" => account_name = Some(value.trim().to_string()),
                "AccountKey" => account_key = Some(value.trim().to_string()),
                "EndpointSuffix" => suffix = value.trim().to_string(),
                "BlobEndpoint" => blob_endpoint = Some(value.trim().to_string()),
                "UseDevelopmentStorage" if value.trim().eq_ignore_ascii_case("true") => {
                    account_name.get_or_insert_with(|| DEV_ACCOUNT_NAME.to_string());
                    account_key.get_or_insert_with(|| DEV_ACCOUNT_KEY.to_string());
                    blob_endpoint.get_or_insert_with(|| DEV_BLOB_ENDPOINT.to_string());
                }
                _ => {}
            }
        }

        let account_name = account_name.context("connection string is missing AccountName")?;
        let account_key = account_key.context("connection string is missing AccountKey")?;
        let account_key = BASE64
            .decode(account_key.as_bytes())
            .map_err(|_| anyhow::anyhow!("AccountKey in connection string is not valid base64"))?;

        let blob_endpoint = blob_endpoint
            .unwrap_or_else(|| format!("{}://{}.blob.{}", protocol, account_name, suffix))
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            account_name,
            account_key,
            blob_endpoint,
        })
    }

    pub fn account_name(&self) -> &str {
        &self.account_name
    }

    pub fn blob_endpoint(&self) -> &str {
        &self.blob_endpoint
    }
}

// ============ Store ============

/// [`BlobStore`] backed by a single Azure Blob Storage container.
pub struct AzureBlobStore {
    creds: AzureCredentials,
    container: String,
    client: reqwest::Client,
}

/// One outgoing request before signing.
struct BlobRequest<'a> {
    method: Method,
    /// Blob path inside the container; `None` targets the container itself.
    blob: Option<&'a str>,
    query: Vec<(&'static str, String)>,
    body: Vec<u8>,
    content_type: &'static str,
    if_none_match: Option<&'static str>,
    ms_headers: Vec<(String, String)>,
}

impl<'a> BlobRequest<'a> {
    fn new(method: Method, blob: Option<&'a str>) -> Self {
        Self {
            method,
            blob,
            query: Vec::new(),
            body: Vec::new(),
            content_type: "",
            if_none_match: None,
            ms_headers: Vec::new(),
        }
    }
}

impl AzureBlobStore {
    /// Create a store for `container`.
    ///
    /// `timeout` bounds each HTTP request; there is no retry.
    pub fn new(creds: AzureCredentials, container: &str, timeout: Duration) -> Result<Self> {
        validate_container_name(container)?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            creds,
            container: container.to_string(),
            client,
        })
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    /// Create the container if it does not exist yet.
    ///
    /// Returns `true` when the container was created by this call.
    pub async fn ensure_container(&self) -> Result<bool, BlobError> {
        let mut req = BlobRequest::new(Method::PUT, None);
        req.query.push(("restype", "container".to_string()));
        let resp = self.send(req, "create container").await?;
        match resp.status() {
            StatusCode::CREATED => {
                tracing::info!(container = %self.container, "created container");
                Ok(true)
            }
            StatusCode::CONFLICT => {
                tracing::debug!(container = %self.container, "container already exists");
                Ok(false)
            }
            status => Err(unavailable("create container", &self.container, status, &resp)),
        }
    }

    /// Sign and send a request, mapping transport failures to
    /// `BackendUnavailable`.
    async fn send(&self, req: BlobRequest<'_>, op: &str) -> Result<reqwest::Response, BlobError> {
        let encoded_path = match req.blob {
            Some(blob) => format!(
                "/{}/{}",
                uri_encode(&self.container),
                blob.split('/').map(uri_encode).collect::<Vec<_>>().join("/")
            ),
            None => format!("/{}", uri_encode(&self.container)),
        };

        let mut query = req.query.clone();
        query.sort_by(|a, b| a.0.cmp(b.0));
        let query_string = query
            .iter()
            .map(|(k, v)| format!("{}={}", k, uri_encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        let mut url = format!("{}{}", self.creds.blob_endpoint, encoded_path);
        if !query_string.is_empty() {
            url.push('?');
            url.push_str(&query_string);
        }

        let mut ms_headers = req.ms_headers.clone();
        ms_headers.push((
            "x-ms-date".to_string(),
            Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
        ));
        ms_headers.push(("x-ms-version".to_string(), API_VERSION.to_string()));
        ms_headers.push((
            "x-ms-client-request-id".to_string(),
            uuid::Uuid::new_v4().to_string(),
        ));
        ms_headers.sort_by(|a, b| a.0.cmp(&b.0));

        let resource_path = format!("{}{}", endpoint_path(&self.creds.blob_endpoint), encoded_path);
        let string_to_sign = string_to_sign(
            req.method.as_str(),
            req.body.len(),
            req.content_type,
            req.if_none_match.unwrap_or(""),
            &ms_headers,
            &self.creds.account_name,
            &resource_path,
            &query,
        );
        let signature = BASE64.encode(hmac_sha256(&self.creds.account_key, string_to_sign.as_bytes()));
        let authorization = format!("SharedKey {}:{}", self.creds.account_name, signature);

        let mut builder = self
            .client
            .request(req.method.clone(), &url)
            .header("Authorization", authorization);
        for (name, value) in &ms_headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !req.content_type.is_empty() {
            builder = builder.header("Content-Type", req.content_type);
        }
        if let Some(inm) = req.if_none_match {
            builder = builder.header("If-None-Match", inm);
        }
        if req.method == Method::PUT || !req.body.is_empty() {
            builder = builder
                .header("Content-Length", req.body.len().to_string())
                .body(req.body);
        }

        let target = req.blob.unwrap_or(&self.container);
        builder.send().await.map_err(|e| {
            tracing::warn!(op, target, error = %e, "blob request failed");
            BlobError::BackendUnavailable(format!("{} {}: {}", op, target, e.without_url()))
        })
    }
}

#[async_trait]
impl BlobStore for AzureBlobStore {
    async fn list(&self, prefix: &str) -> Result<Vec<BlobObject>, BlobError> {
        let mut objects = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let mut req = BlobRequest::new(Method::GET, None);
            req.query.push(("restype", "container".to_string()));
            req.query.push(("comp", "list".to_string()));
            req.query.push(("include", "metadata".to_string()));
            req.query.push(("maxresults", "1000".to_string()));
            if !prefix.is_empty() {
                req.query.push(("prefix", prefix.to_string()));
            }
            if let Some(ref m) = marker {
                req.query.push(("marker", m.clone()));
            }

            let resp = self.send(req, "list").await?;
            if resp.status() != StatusCode::OK {
                return Err(unavailable("list", prefix, resp.status(), &resp));
            }
            let xml = resp
                .text()
                .await
                .map_err(|e| BlobError::BackendUnavailable(format!("list {}: {}", prefix, e)))?;

            let (batch, next) = parse_list_blobs_response(&xml);
            objects.extend(batch);

            match next {
                Some(token) if !token.is_empty() => marker = Some(token),
                _ => break,
            }
        }

        Ok(objects)
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>, BlobError> {
        let resp = self.send(BlobRequest::new(Method::GET, Some(path)), "read").await?;
        match resp.status() {
            StatusCode::OK => {
                let bytes = resp
                    .bytes()
                    .await
                    .map_err(|e| BlobError::BackendUnavailable(format!("read {}: {}", path, e)))?;
                Ok(bytes.to_vec())
            }
            StatusCode::NOT_FOUND => Err(BlobError::NotFound(path.to_string())),
            status => Err(unavailable("read", path, status, &resp)),
        }
    }

    async fn write(&self, path: &str, content: &[u8], overwrite: bool) -> Result<String, BlobError> {
        let mut req = BlobRequest::new(Method::PUT, Some(path));
        req.body = content.to_vec();
        req.content_type = path
            .rsplit('/')
            .next()
            .and_then(ArtifactFormat::split_filename)
            .map(|(_, f)| f.content_type())
            .unwrap_or("text/plain");
        if !overwrite {
            req.if_none_match = Some("*");
        }
        req.ms_headers
            .push(("x-ms-blob-type".to_string(), "BlockBlob".to_string()));
        req.ms_headers
            .push(("x-ms-meta-sha256".to_string(), content_sha256(content)));

        let resp = self.send(req, "write").await?;
        match resp.status() {
            StatusCode::CREATED => {
                let headers = resp.headers();
                let version = headers
                    .get("x-ms-version-id")
                    .or_else(|| headers.get("etag"))
                    .and_then(|v| v.to_str().ok())
                    .map(|v| v.trim_matches('"').to_string())
                    .unwrap_or_default();
                Ok(version)
            }
            StatusCode::CONFLICT | StatusCode::PRECONDITION_FAILED if !overwrite => {
                Err(BlobError::AlreadyExists(path.to_string()))
            }
            status => Err(unavailable("write", path, status, &resp)),
        }
    }

    async fn delete(&self, path: &str) -> Result<bool, BlobError> {
        let resp = self
            .send(BlobRequest::new(Method::DELETE, Some(path)), "delete")
            .await?;
        match resp.status() {
            StatusCode::ACCEPTED | StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(unavailable("delete", path, status, &resp)),
        }
    }
}

/// Build a `BackendUnavailable` error from an unexpected response status.
fn unavailable(op: &str, target: &str, status: StatusCode, resp: &reqwest::Response) -> BlobError {
    let code = resp
        .headers()
        .get("x-ms-error-code")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");
    tracing::warn!(op, target, %status, code, "unexpected blob service response");
    BlobError::BackendUnavailable(format!(
        "{} {} failed (HTTP {}, {})",
        op, target, status, code
    ))
}

// ============ Shared Key helpers ============

/// Build the Shared Key string-to-sign for the Blob service.
///
/// ```text
/// VERB \n Content-Encoding \n Content-Language \n Content-Length \n
/// Content-MD5 \n Content-Type \n Date \n If-Modified-Since \n If-Match \n
/// If-None-Match \n If-Unmodified-Since \n Range \n
/// CanonicalizedHeaders CanonicalizedResource
/// ```
#[allow(clippy::too_many_arguments)]
fn string_to_sign(
    verb: &str,
    content_length: usize,
    content_type: &str,
    if_none_match: &str,
    ms_headers: &[(String, String)],
    account: &str,
    resource_path: &str,
    query: &[(&'static str, String)],
) -> String {
    // Content-Length is empty rather than "0" for empty bodies.
    let length = if content_length == 0 {
        String::new()
    } else {
        content_length.to_string()
    };

    let canonical_headers: String = ms_headers
        .iter()
        .map(|(k, v)| format!("{}:{}\n", k.to_lowercase(), v.trim()))
        .collect();

    let mut canonical_resource = format!("/{}{}", account, resource_path);
    for (k, v) in query {
        canonical_resource.push_str(&format!("\n{}:{}", k.to_lowercase(), v));
    }

    format!(
        "{}\n\n\n{}\n\n{}\n\n\n\n{}\n\n\n{}{}",
        verb, length, content_type, if_none_match, canonical_headers, canonical_resource
    )
}

/// Path component of the blob endpoint (non-empty only for path-style
/// endpoints such as Azurite's `http://127.0.0.1:10000/devstoreaccount1`).
fn endpoint_path(endpoint: &str) -> &str {
    let after_scheme = endpoint
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(endpoint);
    match after_scheme.find('/') {
        Some(idx) => after_scheme[idx..].trim_end_matches('/'),
        None => "",
    }
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// URI-encode a string per RFC 3986, leaving only unreserved characters.
fn uri_encode(s: &str) -> String {
    let mut result = String::new();
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                result.push(byte as char);
            }
            _ => {
                result.push_str(&format!("%{:02X}", byte));
            }
        }
    }
    result
}

/// Container names: 3-63 chars of lowercase letters, digits, and single hyphens.
fn validate_container_name(name: &str) -> Result<()> {
    let ok = (3..=63).contains(&name.len())
        && name
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
        && !name.starts_with('-')
        && !name.ends_with('-')
        && !name.contains("--");
    if !ok {
        bail!("invalid container name '{}'", name);
    }
    Ok(())
}

// ============ XML parsing (minimal) ============

/// Parse a `List Blobs` response into objects plus the next marker.
fn parse_list_blobs_response(xml: &str) -> (Vec<BlobObject>, Option<String>) {
    let mut objects = Vec::new();
    let next_marker = extract_xml_value(xml, "NextMarker");

    let mut remaining = xml;
    while let Some(start) = remaining.find("<Blob>") {
        let block_start = start + "<Blob>".len();
        let Some(end) = remaining[block_start..].find("</Blob>") else {
            break;
        };
        let block = &remaining[block_start..block_start + end];
        remaining = &remaining[block_start + end + "</Blob>".len()..];

        let path = extract_xml_value(block, "Name")
            .map(|n| xml_unescape(&n))
            .unwrap_or_default();
        if path.is_empty() || path.ends_with('/') {
            continue;
        }

        let size = extract_xml_value(block, "Content-Length")
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(0);
        let last_modified = extract_xml_value(block, "Last-Modified")
            .and_then(|s| chrono::DateTime::parse_from_rfc2822(&s).ok())
            .map(|dt| dt.with_timezone(&Utc));
        let version = extract_xml_value(block, "VersionId")
            .or_else(|| extract_xml_value(block, "Etag"))
            .map(|v| v.trim_matches('"').to_string());
        let sha256 = extract_xml_value(block, "sha256");

        objects.push(BlobObject {
            path,
            size,
            version,
            last_modified,
            sha256,
        });
    }

    (objects, next_marker)
}

/// Extract the text content of an XML tag (simple, non-nested).
fn extract_xml_value(xml: &str, tag: &str) -> Option<String> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);
    let start = xml.find(&open)? + open.len();
    let end = xml[start..].find(&close)?;
    Some(xml[start..start + end].to_string())
}

fn xml_unescape(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
