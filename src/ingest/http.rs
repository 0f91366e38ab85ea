// src/ingest/http.rs
use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use crate::ingest::error::SourceError;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Client shared by one adapter. Every request carries `timeout`.
pub fn build_client(timeout: Duration) -> Result<Client, SourceError> {
    Client::builder()
        .user_agent(concat!("crypto-news-ingest/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()
        .map_err(SourceError::Transport)
}

async fn send_checked(req: RequestBuilder) -> Result<Response, SourceError> {
    let resp = req.send().await?;
    let status = resp.status();
    if !status.is_success() {
        // query strings carry credentials; keep them out of errors/logs
        let mut url = resp.url().clone();
        url.set_query(None);
        return Err(SourceError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }
    Ok(resp)
}

/// GET + 2xx check + JSON decode.
pub async fn get_json<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, SourceError> {
    let body = send_checked(req).await?.text().await?;
    Ok(serde_json::from_str(&body)?)
}

/// GET + 2xx check, raw body.
pub async fn get_text(req: RequestBuilder) -> Result<String, SourceError> {
    Ok(send_checked(req).await?.text().await?)
}
