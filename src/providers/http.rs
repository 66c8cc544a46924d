use std::io::Read;
use std::time::Duration;

use bytes::Bytes;

use crate::orchestrator::ProviderError;

const ERROR_BODY_LIMIT: usize = 512;

pub(crate) fn agent(timeout: Duration) -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout(timeout)
        .user_agent(concat!("mockchat-core/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// 4xx is the caller's fault and is not retried; 5xx and transport failures mean "try again".
pub(crate) fn map_error(provider: &str, error: ureq::Error) -> ProviderError {
    match error {
        ureq::Error::Status(status, response) => {
            let body = response.into_string().unwrap_or_default();
            let detail = truncate(&body);
            if status >= 500 {
                ProviderError::unavailable(provider, format!("status {status}: {detail}"))
            } else {
                ProviderError::rejected(provider, status, detail)
            }
        }
        ureq::Error::Transport(transport) => ProviderError::unavailable(provider, transport.to_string()),
    }
}

pub(crate) fn read_bytes(provider: &str, response: ureq::Response) -> Result<Bytes, ProviderError> {
    let mut buffer = Vec::new();
    response
        .into_reader()
        .read_to_end(&mut buffer)
        .map_err(|err| ProviderError::unavailable(provider, format!("failed to read body: {err}")))?;
    Ok(Bytes::from(buffer))
}

/// Runs a blocking HTTP exchange off the async runtime.
pub(crate) async fn blocking<T, F>(provider: &str, task: F) -> Result<T, ProviderError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ProviderError> + Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|err| ProviderError::unavailable(provider, format!("worker failed: {err}")))?
}

pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

fn truncate(body: &str) -> String {
    let body = body.trim();
    match body.char_indices().nth(ERROR_BODY_LIMIT) {
        Some((index, _)) => format!("{}…", &body[..index]),
        None => body.to_string(),
    }
}

/// Status handling for reqwest exchanges, matching [`map_error`].
pub(crate) async fn check_status(
    provider: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let detail = truncate(&body);
    if status.is_server_error() {
        Err(ProviderError::unavailable(
            provider,
            format!("status {}: {detail}", status.as_u16()),
        ))
    } else {
        Err(ProviderError::rejected(provider, status.as_u16(), detail))
    }
}

pub(crate) fn transport_error(provider: &str, error: reqwest::Error) -> ProviderError {
    ProviderError::unavailable(provider, error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_join_with_single_slash() {
        assert_eq!(
            join_url("https://api.openai.com/v1/", "/models"),
            "https://api.openai.com/v1/models"
        );
        assert_eq!(join_url("http://host", "a/b"), "http://host/a/b");
    }
}
