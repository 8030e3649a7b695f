use crate::error::{RelayError, RelayResult};
use std::future::Future;
use std::time::Duration;

/// Run `fut` with an optional upper bound; expiry becomes `RelayError::Timeout`.
pub async fn bounded<T, F>(operation: &str, limit: Option<Duration>, fut: F) -> RelayResult<T>
where
    F: Future<Output = RelayResult<T>>,
{
    match limit {
        Some(limit) => match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => Err(RelayError::Timeout {
                operation: operation.to_string(),
                elapsed: limit,
            }),
        },
        None => fut.await,
    }
}

/// Shorten long text for log lines, on a char boundary
pub fn truncate_for_log(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let head: String = text.chars().take(max_chars).collect();
    format!("{}...", head)
}
