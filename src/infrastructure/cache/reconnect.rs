//! Reconnect policy and the retry loop that applies it

use std::future::Future;
use std::time::Duration;

/// Connection lifecycle notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    Connect,
    Ready,
    Error(String),
    Reconnecting { attempt: u32, delay: Duration },
    End,
}

/// Linear backoff with a ceiling and a retry cap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub step: Duration,
    pub max_delay: Duration,
    pub max_retries: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            step: Duration::from_millis(100),
            max_delay: Duration::from_millis(3000),
            max_retries: 10,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before retry number `retry` (1-based), or `None` once the cap is hit
    pub fn delay_for(&self, retry: u32) -> Option<Duration> {
        if retry == 0 || retry > self.max_retries {
            return None;
        }

        Some(self.step.saturating_mul(retry).min(self.max_delay))
    }
}

/// Run `connect` until it succeeds or `policy` gives up.
///
/// With no `dropped` cause this is a first connect and the initial attempt
/// is immediate. After a drop, every attempt waits out its policy delay.
/// On exhaustion the last failure is returned.
pub async fn connect_with_policy<T, F, Fut>(
    policy: &ReconnectPolicy,
    emit: impl Fn(CacheEvent),
    dropped: Option<String>,
    mut connect: F,
) -> Result<T, String>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, String>>,
{
    let mut retry = 0;
    let mut last_failure = String::new();

    if let Some(cause) = dropped {
        emit(CacheEvent::Error(cause.clone()));
        last_failure = cause;
        retry = 1;
    }

    loop {
        if retry > 0 {
            let Some(delay) = policy.delay_for(retry) else {
                return Err(last_failure);
            };
            emit(CacheEvent::Reconnecting {
                attempt: retry,
                delay,
            });
            tokio::time::sleep(delay).await;
        }

        emit(CacheEvent::Connect);
        match connect().await {
            Ok(connection) => {
                emit(CacheEvent::Ready);
                return Ok(connection);
            }
            Err(failure) => {
                emit(CacheEvent::Error(failure.clone()));
                last_failure = failure;
            }
        }

        retry += 1;
    }
}
