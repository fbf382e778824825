use alloy::providers::{ProviderBuilder, RootProvider};
use alloy::transports::http::Http;
use reqwest::Client;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};

pub(crate) const RPC_CALL_TIMEOUT_MS: u64 = 20_000;
const RPC_ERR_MAX_LEN: usize = 260;

pub type HttpProvider = RootProvider<Http<Client>>;

pub fn rpc_call_timeout_ms() -> u64 {
    std::env::var("RPC_CALL_TIMEOUT_MS")
        .ok()
        .and_then(|raw| raw.trim().parse::<u64>().ok())
        .filter(|v| (250..=600_000).contains(v))
        .unwrap_or(RPC_CALL_TIMEOUT_MS)
}

fn retry_backoff_ms(attempt: usize) -> u64 {
    bounded_exponential_backoff_ms(100, attempt as u32, 1_800)
}

pub fn is_retryable_rpc_error(message: &str) -> bool {
    let msg = message.to_ascii_lowercase();
    let non_retryable = [
        "method not found",
        "-32601",
        "invalid params",
        "-32602",
        "execution reverted",
        "revert",
        "unknown account",
        "sender account not recognized",
        "unknown variant",
        "did not match any variant",
        "parse error",
        "-32700",
    ];
    !non_retryable.iter().any(|needle| msg.contains(needle))
}

pub fn bounded_exponential_backoff_ms(base_ms: u64, streak: u32, cap_ms: u64) -> u64 {
    if base_ms == 0 {
        return 0;
    }
    let clamped = streak.min(8);
    base_ms
        .saturating_mul(1u64 << clamped)
        .min(cap_ms.max(base_ms))
}

pub fn compact_rpc_error_message(message: &str) -> String {
    crate::utils::error::compact_error_message(message, RPC_ERR_MAX_LEN)
}

pub fn build_http_provider(rpc_url: &str) -> anyhow::Result<Arc<HttpProvider>> {
    let url = rpc_url.trim();
    if url.is_empty() {
        anyhow::bail!("empty RPC url");
    }
    let parsed = url
        .parse::<reqwest::Url>()
        .map_err(|err| anyhow::anyhow!("invalid RPC url `{}`: {}", url, err))?;
    Ok(Arc::new(ProviderBuilder::new().on_http(parsed)))
}

/// Run `op` against `provider` with a per-attempt timeout, retrying transient
/// transport failures. Deterministic failures (reverts, unknown methods, bad
/// params) return on the first attempt.
pub async fn run_with_retry<T, Op, Fut>(
    provider: &Arc<HttpProvider>,
    retries: usize,
    context: &str,
    mut op: Op,
) -> anyhow::Result<T>
where
    Op: FnMut(Arc<HttpProvider>) -> Fut,
    Fut: std::future::Future<Output = anyhow::Result<T>>,
{
    let attempts = retries.max(1);
    let timeout_ms = rpc_call_timeout_ms();
    let mut last_message = String::new();

    for attempt in 1..=attempts {
        let started = Instant::now();
        match timeout(Duration::from_millis(timeout_ms), op(provider.clone())).await {
            Ok(Ok(value)) => {
                tracing::trace!(
                    "[RPC] {} ok in {}ms (attempt {}/{})",
                    context,
                    started.elapsed().as_millis(),
                    attempt,
                    attempts
                );
                return Ok(value);
            }
            Ok(Err(err)) => {
                let message = compact_rpc_error_message(&err.to_string());
                if !is_retryable_rpc_error(&message) || attempt == attempts {
                    return Err(anyhow::anyhow!(
                        "{} failed on attempt {}/{}: {}",
                        context,
                        attempt,
                        attempts,
                        message
                    ));
                }
                last_message = message;
            }
            Err(_) => {
                last_message = format!("timed out after {}ms", timeout_ms);
                if attempt == attempts {
                    break;
                }
            }
        }
        tracing::debug!(
            "[RPC] {} attempt {}/{} failed: {}",
            context,
            attempt,
            attempts,
            last_message
        );
        sleep(Duration::from_millis(retry_backoff_ms(attempt))).await;
    }

    Err(anyhow::anyhow!(
        "{} failed after {} attempts: {}",
        context,
        attempts,
        last_message
    ))
}
