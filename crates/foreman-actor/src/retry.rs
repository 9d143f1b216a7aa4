use std::future::Future;
use std::time::Duration;

use log::warn;

#[derive(Debug, Clone)]
pub enum RetryStrategy {
    Fixed {
        max_count: usize,
        delay: Duration,
    },
    ExponentialBackoff {
        max_count: usize,
        initial_delay: Duration,
        max_delay: Duration,
        factor: u32,
    },
}

struct ExponentialBackoffDelay {
    delay: Duration,
    max_delay: Duration,
    factor: u32,
}

impl Iterator for ExponentialBackoffDelay {
    type Item = Duration;

    fn next(&mut self) -> Option<Self::Item> {
        let delay = self.delay;
        self.delay = std::cmp::min(delay * self.factor, self.max_delay);
        Some(delay)
    }
}

impl RetryStrategy {
    pub async fn run<F, Fut, T, E>(&self, mut f: F) -> Result<T, E>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
        T: Send + 'static,
        E: std::fmt::Display + Send + 'static,
    {
        let mut delay = self.delay();
        loop {
            match f().await {
                x @ Ok(_) => return x,
                Err(e) => {
                    warn!("retryable operation failed: {e}");
                    if let Some(delay) = delay.next() {
                        tokio::time::sleep(delay).await;
                    } else {
                        return Err(e);
                    }
                }
            }
        }
    }

    fn delay(&self) -> Box<dyn Iterator<Item = Duration> + Send> {
        match self {
            Self::ExponentialBackoff {
                max_count,
                initial_delay,
                max_delay,
                factor,
            } => Box::new(
                ExponentialBackoffDelay {
                    delay: *initial_delay,
                    max_delay: *max_delay,
                    factor: *factor,
                }
                .take(*max_count),
            ),
            Self::Fixed { max_count, delay } => Box::new(std::iter::repeat_n(*delay, *max_count)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_fixed_retry_gives_up_after_max_count() {
        let strategy = RetryStrategy::Fixed {
            max_count: 3,
            delay: Duration::from_secs(3),
        };
        let attempts = AtomicUsize::new(0);
        let out: Result<(), String> = strategy
            .run(|| async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err("unreachable".to_string())
            })
            .await;
        assert!(out.is_err());
        // One initial attempt plus three retries.
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fixed_retry_stops_on_success() {
        let strategy = RetryStrategy::Fixed {
            max_count: 3,
            delay: Duration::from_secs(3),
        };
        let attempts = AtomicUsize::new(0);
        let out: Result<usize, String> = strategy
            .run(|| async {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err("unreachable".to_string())
                } else {
                    Ok(n)
                }
            })
            .await;
        assert_eq!(out, Ok(2));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_exponential_backoff_delays() {
        let strategy = RetryStrategy::ExponentialBackoff {
            max_count: 4,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            factor: 2,
        };
        let delays: Vec<_> = strategy.delay().collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(5),
            ]
        );
    }
}
