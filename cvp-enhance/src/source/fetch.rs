//! URL sources

use super::SourceError;
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = concat!("cvp-enhance/", env!("CARGO_PKG_VERSION"));

/// HTTP client used for URL sources
pub fn build_client(timeout: Duration) -> Result<reqwest::Client, SourceError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(|e| SourceError::Download(e.to_string()))
}

/// Download `url` (http/https only), refusing bodies over `max_bytes`
pub async fn download(
    client: &reqwest::Client,
    url: &str,
    max_bytes: u64,
) -> Result<Vec<u8>, SourceError> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|e| SourceError::InvalidUrl(format!("{}: {}", url, e)))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(SourceError::InvalidUrl(format!(
            "{}: unsupported scheme '{}'",
            url,
            parsed.scheme()
        )));
    }

    debug!(url = %parsed, "Downloading input audio");

    let mut response = client
        .get(parsed)
        .send()
        .await
        .map_err(|e| SourceError::Download(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(SourceError::HttpStatus {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    if let Some(length) = response.content_length() {
        if length > max_bytes {
            return Err(SourceError::TooLarge { limit: max_bytes });
        }
    }

    let mut body = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| SourceError::Download(e.to_string()))?
    {
        if (body.len() + chunk.len()) as u64 > max_bytes {
            return Err(SourceError::TooLarge { limit: max_bytes });
        }
        body.extend_from_slice(&chunk);
    }

    if body.is_empty() {
        return Err(SourceError::Empty("input_url"));
    }

    debug!(bytes = body.len(), "Download complete");
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rejects_non_http_scheme() {
        let client = build_client(Duration::from_secs(1)).unwrap();
        let err = download(&client, "file:///etc/passwd", 1024).await.unwrap_err();
        assert!(matches!(err, SourceError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn test_rejects_malformed_url() {
        let client = build_client(Duration::from_secs(1)).unwrap();
        let err = download(&client, "not a url", 1024).await.unwrap_err();
        assert!(matches!(err, SourceError::InvalidUrl(_)));
    }
}
