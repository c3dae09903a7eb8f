//! Client-credentials token exchange.

use chrono::{DateTime, Utc};
use cloudmux_protocol::constants::REQUEST_TIMEOUT;
use cloudmux_upload::{RemoteFuture, Token, TokenSource, UploadError};
use serde::{Deserialize, Serialize};

use crate::client::{HttpRemoteError, decode_envelope};

const ACCESS_TOKEN_PATH: &str = "/api/v1/access_token";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TokenRequest<'a> {
    #[serde(rename = "clientID")]
    client_id: &'a str,
    client_secret: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenData {
    access_token: String,
    expired_at: String,
}

/// Parses the enveloped token response.
///
/// `expiredAt` is an RFC 3339 timestamp.
pub fn parse_token_response(body: &[u8]) -> Result<Token, UploadError> {
    let data: TokenData = decode_envelope(body)?;
    if data.access_token.is_empty() {
        return Err(UploadError::Auth("empty access token".into()));
    }
    let expires_at = DateTime::parse_from_rfc3339(&data.expired_at)
        .map_err(|e| UploadError::Malformed(format!("expiredAt {:?}: {e}", data.expired_at)))?
        .with_timezone(&Utc);
    Ok(Token {
        access_token: data.access_token,
        expires_at,
    })
}

/// Exchanges a client id and secret for an access token.
///
/// Wrap it in a [`cloudmux_upload::TokenManager`] to cache the token and
/// refresh it before it expires.
pub struct ClientCredentialsSource {
    http: reqwest::Client,
    base_url: String,
    client_id: String,
    client_secret: String,
}

impl ClientCredentialsSource {
    pub fn new(base_url: &str, client_id: &str, client_secret: &str) -> Result<Self, HttpRemoteError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(HttpRemoteError::InvalidUrl(base_url));
        }
        Ok(Self {
            http: reqwest::Client::builder().build()?,
            base_url,
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
        })
    }
}

impl TokenSource for ClientCredentialsSource {
    fn fetch(&self) -> RemoteFuture<'_, Token> {
        Box::pin(async move {
            let url = format!("{}{}", self.base_url, ACCESS_TOKEN_PATH);
            let resp = self
                .http
                .post(&url)
                .timeout(REQUEST_TIMEOUT)
                .json(&TokenRequest {
                    client_id: &self.client_id,
                    client_secret: &self.client_secret,
                })
                .send()
                .await
                .map_err(HttpRemoteError::from)?;

            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                // The token endpoint rejecting us is always a credentials problem.
                return Err(if status.is_client_error() {
                    UploadError::Auth(format!("HTTP {}: {body}", status.as_u16()))
                } else {
                    HttpRemoteError::Api {
                        status: status.as_u16(),
                        body,
                    }
                    .into()
                });
            }
            let body = resp.bytes().await.map_err(HttpRemoteError::from)?;
            parse_token_response(&body)
        })
    }
}
