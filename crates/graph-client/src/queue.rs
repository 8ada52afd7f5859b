//! Azure Storage Queue sink.
//!
//! Messages are posted with the `Put Message` operation and authorised with
//! a SharedKey signature. Message text is the base64 encoding of the record,
//! which is what the downstream queue-triggered consumers decode.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::Url;
use sha2::Sha256;
use tracing::debug;

use sensitivity_core::clients::QueueSink;
use sensitivity_core::types::Channel;
use sensitivity_core::ClientResult;

use crate::error::{check, GraphClientError, Result};

const STORAGE_API_VERSION: &str = "2021-08-06";
const XML: &str = "application/xml";

// ---------------------------------------------------------------------------
// StorageAccount
// ---------------------------------------------------------------------------

/// Account details parsed from a storage connection string.
#[derive(Clone)]
pub struct StorageAccount {
    pub account_name: String,
    account_key: Vec<u8>,
    pub queue_endpoint: String,
}

impl std::fmt::Debug for StorageAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageAccount")
            .field("account_name", &self.account_name)
            .field("queue_endpoint", &self.queue_endpoint)
            .finish_non_exhaustive()
    }
}

impl StorageAccount {
    /// Accepts the usual `Key=Value;...` form. `QueueEndpoint` wins over
    /// the endpoint derived from `DefaultEndpointsProtocol`,
    /// `AccountName` and `EndpointSuffix`.
    pub fn from_connection_string(conn: &str) -> Result<Self> {
        let mut protocol = "https";
        let mut suffix = "core.windows.net";
        let mut name = None;
        let mut key = None;
        let mut endpoint = None;

        for part in conn.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let Some((k, v)) = part.split_once('=') else {
                return Err(GraphClientError::InvalidConnectionString(format!(
                    "segment without '=': {part}"
                )));
            };
            match k {
                "DefaultEndpointsProtocol" => protocol = v,
                "EndpointSuffix" => suffix = v,
                "AccountName" => name = Some(v),
                "AccountKey" => key = Some(v),
                "QueueEndpoint" => endpoint = Some(v),
                _ => {}
            }
        }

        let account_name = name
            .ok_or_else(|| GraphClientError::InvalidConnectionString("missing AccountName".into()))?
            .to_string();
        let account_key = key
            .ok_or_else(|| GraphClientError::InvalidConnectionString("missing AccountKey".into()))
            .and_then(|k| {
                STANDARD.decode(k).map_err(|e| {
                    GraphClientError::InvalidConnectionString(format!("AccountKey is not base64: {e}"))
                })
            })?;
        let queue_endpoint = match endpoint {
            Some(e) => e.trim_end_matches('/').to_string(),
            None => format!("{protocol}://{account_name}.queue.{suffix}"),
        };

        Ok(Self {
            account_name,
            account_key,
            queue_endpoint,
        })
    }

    /// `Authorization` header value for a request with the given parts.
    fn authorization(&self, string_to_sign: &str) -> Result<String> {
        let mut mac = Hmac::<Sha256>::new_from_slice(&self.account_key).map_err(|e| {
            GraphClientError::InvalidConnectionString(format!("unusable AccountKey: {e}"))
        })?;
        mac.update(string_to_sign.as_bytes());
        let signature = STANDARD.encode(mac.finalize().into_bytes());
        Ok(format!("SharedKey {}:{signature}", self.account_name))
    }
}

/// SharedKey string-to-sign for a request that sets only `Content-Length`,
/// `Content-Type` and `x-ms-*` headers.
fn string_to_sign(
    verb: &str,
    content_length: usize,
    content_type: &str,
    ms_headers: &[(&str, &str)],
    canonical_resource: &str,
) -> String {
    let length = if content_length == 0 {
        String::new()
    } else {
        content_length.to_string()
    };

    let mut headers: Vec<(String, &str)> = ms_headers
        .iter()
        .map(|(k, v)| (k.to_ascii_lowercase(), v.trim()))
        .collect();
    headers.sort();
    let canonical_headers: String = headers
        .iter()
        .map(|(k, v)| format!("{k}:{v}\n"))
        .collect();

    // VERB, Content-Encoding, Content-Language, Content-Length, Content-MD5,
    // Content-Type, Date, If-Modified-Since, If-Match, If-None-Match,
    // If-Unmodified-Since, Range
    format!(
        "{verb}\n\n\n{length}\n\n{content_type}\n\n\n\n\n\n\n{canonical_headers}{canonical_resource}"
    )
}

// ---------------------------------------------------------------------------
// StorageQueueSink
// ---------------------------------------------------------------------------

pub struct StorageQueueSink {
    http: reqwest::Client,
    account: StorageAccount,
}

impl StorageQueueSink {
    pub fn new(http: reqwest::Client, account: StorageAccount) -> Self {
        Self { http, account }
    }

    pub async fn put_message(&self, queue_name: &str, text: &str) -> Result<()> {
        let raw = format!("{}/{queue_name}/messages", self.account.queue_endpoint);
        let url = Url::parse(&raw).map_err(|e| {
            GraphClientError::InvalidConnectionString(format!("bad queue url '{raw}': {e}"))
        })?;

        let body = format!(
            "<QueueMessage><MessageText>{}</MessageText></QueueMessage>",
            STANDARD.encode(text)
        );
        let date = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        let canonical_resource = format!("/{}{}", self.account.account_name, url.path());
        let to_sign = string_to_sign(
            "POST",
            body.len(),
            XML,
            &[("x-ms-date", date.as_str()), ("x-ms-version", STORAGE_API_VERSION)],
            &canonical_resource,
        );
        let authorization = self.account.authorization(&to_sign)?;

        debug!(queue = queue_name, bytes = body.len(), "put queue message");
        let resp = self
            .http
            .post(url)
            .header("x-ms-date", date)
            .header("x-ms-version", STORAGE_API_VERSION)
            .header(reqwest::header::CONTENT_TYPE, XML)
            .header(reqwest::header::AUTHORIZATION, authorization)
            .body(body)
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }
}

#[async_trait]
impl QueueSink for StorageQueueSink {
    async fn send(&self, queue_name: &str, channel: Channel, body: String) -> ClientResult<()> {
        debug!(%channel, queue = queue_name, "sending record");
        Ok(self.put_message(queue_name, &body).await?)
    }
}
