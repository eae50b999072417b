use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::seq::SliceRandom;
use rand::Rng;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use url::Url;

use darkgather_core::config::{CrawlConfig, TorConfig};
use darkgather_core::{CircuitControl, FetchError, Transport, TransportError};

/// Rotated per attempt so consecutive requests don't share a browser fingerprint.
pub const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; rv:128.0) Gecko/20100101 Firefox/128.0",
    "Mozilla/5.0 (Windows NT 10.0; rv:115.0) Gecko/20100101 Firefox/115.0",
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0",
    "Mozilla/5.0 (X11; Linux x86_64; rv:115.0) Gecko/20100101 Firefox/115.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:128.0) Gecko/20100101 Firefox/128.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36",
];

pub fn random_user_agent() -> &'static str {
    USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(USER_AGENTS[0])
}

/// Uniform random delay in `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Jitter {
    min_ms: u64,
    max_ms: u64,
}

impl Jitter {
    pub fn from_millis(min_ms: u64, max_ms: u64) -> Self {
        Self {
            min_ms: min_ms.min(max_ms),
            max_ms: min_ms.max(max_ms),
        }
    }

    pub fn none() -> Self {
        Self::from_millis(0, 0)
    }

    pub fn sample(&self) -> Duration {
        if self.min_ms == self.max_ms {
            return Duration::from_millis(self.min_ms);
        }
        Duration::from_millis(rand::thread_rng().gen_range(self.min_ms..=self.max_ms))
    }

    pub async fn sleep(&self) {
        let d = self.sample();
        if !d.is_zero() {
            tokio::time::sleep(d).await;
        }
    }
}

/// Global request spacing. One pacer is shared by every worker because the
/// circuit is a shared resource: a jittered gap separates any two request starts.
pub struct Pacer {
    jitter: Jitter,
    last: Mutex<Option<Instant>>,
}

impl Pacer {
    pub fn new(jitter: Jitter) -> Self {
        Self {
            jitter,
            last: Mutex::new(None),
        }
    }

    pub async fn wait(&self) {
        let mut last = self.last.lock().await;
        let gap = self.jitter.sample();
        let ready = match *last {
            Some(prev) => prev + gap,
            None => Instant::now() + gap,
        };
        if ready > Instant::now() {
            tokio::time::sleep_until(ready.into()).await;
        }
        *last = Some(Instant::now());
    }
}

#[derive(Debug, Clone)]
pub struct FetchPolicy {
    pub attempts: u32,
    pub attempt_timeout: Duration,
    pub retry_pause: Duration,
    pub jitter: Jitter,
}

impl FetchPolicy {
    pub fn from_config(crawl: &CrawlConfig, tor: &TorConfig) -> Self {
        Self {
            attempts: crawl.max_retries.max(1),
            attempt_timeout: Duration::from_secs(tor.request_timeout_seconds),
            retry_pause: Duration::from_secs(crawl.retry_pause_seconds),
            jitter: Jitter::from_millis(crawl.min_delay_ms, crawl.max_delay_ms),
        }
    }
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self::from_config(&CrawlConfig::default(), &TorConfig::default())
    }
}

pub struct Fetcher {
    transport: Arc<dyn Transport>,
    circuit: Arc<dyn CircuitControl>,
    pacer: Pacer,
    policy: FetchPolicy,
}

impl Fetcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        circuit: Arc<dyn CircuitControl>,
        policy: FetchPolicy,
    ) -> Self {
        Self {
            transport,
            circuit,
            pacer: Pacer::new(policy.jitter),
            policy,
        }
    }

    pub fn policy(&self) -> &FetchPolicy {
        &self.policy
    }

    /// GET with the configured attempt budget.
    pub async fn fetch_default(&self, url: &Url) -> Result<String, FetchError> {
        self.fetch(url, self.policy.attempts).await
    }

    /// 200 returns the body, 403/404 fail at once, anything else is retried on
    /// a fresh circuit until `attempt_budget` is spent. Rotation happens only
    /// between attempts, never after the last one.
    pub async fn fetch(&self, url: &Url, attempt_budget: u32) -> Result<String, FetchError> {
        let budget = attempt_budget.max(1);
        let timeout = self.policy.attempt_timeout;
        let mut last = TransportError::Network("no attempt made".into());

        for attempt in 1..=budget {
            let user_agent = random_user_agent();
            self.pacer.wait().await;
            debug!(url = %url, attempt, budget, "fetching via tor");

            let outcome = match tokio::time::timeout(
                timeout,
                self.transport.get(url, user_agent, timeout),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(TransportError::Timeout(timeout.as_secs())),
            };

            match outcome {
                Ok(resp) if resp.status == 200 => return Ok(resp.body),
                Ok(resp) if resp.status == 403 || resp.status == 404 => {
                    debug!(url = %url, status = resp.status, "not available, not retrying");
                    return Err(FetchError::NotAvailable {
                        url: url.to_string(),
                        status: resp.status,
                    });
                }
                Ok(resp) => {
                    warn!(url = %url, attempt, status = resp.status, "unexpected status");
                    last = TransportError::Status(resp.status);
                }
                Err(e) => {
                    warn!(url = %url, attempt, error = %e, "attempt failed");
                    last = e;
                }
            }

            if attempt < budget {
                if !self.policy.retry_pause.is_zero() {
                    tokio::time::sleep(self.policy.retry_pause).await;
                }
                if let Err(e) = self.circuit.rotate_identity().await {
                    warn!(error = %e, "identity rotation failed, keeping current circuit");
                }
            }
        }

        Err(FetchError::Exhausted {
            url: url.to_string(),
            attempts: budget,
            last,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use darkgather_core::{GatewayError, RawResponse};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Plays back a fixed script of outcomes, then repeats the last one.
    struct ScriptedTransport {
        script: std::sync::Mutex<VecDeque<Result<RawResponse, TransportError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedTransport {
        fn new(script: Vec<Result<RawResponse, TransportError>>) -> Arc<Self> {
            Arc::new(Self {
                script: std::sync::Mutex::new(script.into()),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn get(
            &self,
            _url: &Url,
            user_agent: &str,
            _timeout: Duration,
        ) -> Result<RawResponse, TransportError> {
            assert!(USER_AGENTS.iter().any(|ua| *ua == user_agent));
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock().unwrap();
            if script.len() > 1 {
                script.pop_front().unwrap()
            } else {
                script.front().cloned().unwrap()
            }
        }
    }

    struct SlowTransport;

    #[async_trait]
    impl Transport for SlowTransport {
        async fn get(&self, _: &Url, _: &str, _: Duration) -> Result<RawResponse, TransportError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(RawResponse::new(200, "late"))
        }
    }

    #[derive(Default)]
    struct CountingCircuit {
        rotations: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl CircuitControl for CountingCircuit {
        async fn rotate_identity(&self) -> Result<(), GatewayError> {
            self.rotations.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(GatewayError::Unavailable("no control port".into()))
            } else {
                Ok(())
            }
        }
    }

    fn quick_policy() -> FetchPolicy {
        FetchPolicy {
            attempts: 3,
            attempt_timeout: Duration::from_secs(2),
            retry_pause: Duration::ZERO,
            jitter: Jitter::none(),
        }
    }

    fn url() -> Url {
        Url::parse("http://abcdefghijklmnop.onion/").unwrap()
    }

    #[tokio::test]
    async fn test_two_failures_then_success_rotates_twice() {
        let transport = ScriptedTransport::new(vec![
            Err(TransportError::Network("connection reset".into())),
            Ok(RawResponse::new(503, "")),
            Ok(RawResponse::new(200, "<html>ok</html>")),
        ]);
        let circuit = Arc::new(CountingCircuit::default());
        let fetcher = Fetcher::new(transport.clone(), circuit.clone(), quick_policy());

        let body = fetcher.fetch(&url(), 3).await.unwrap();

        assert_eq!(body, "<html>ok</html>");
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
        assert_eq!(circuit.rotations.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_404_fails_immediately_without_rotation() {
        let transport = ScriptedTransport::new(vec![Ok(RawResponse::new(404, "gone"))]);
        let circuit = Arc::new(CountingCircuit::default());
        let fetcher = Fetcher::new(transport.clone(), circuit.clone(), quick_policy());

        let err = fetcher.fetch(&url(), 3).await.unwrap_err();

        assert!(matches!(err, FetchError::NotAvailable { status: 404, .. }));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
        assert_eq!(circuit.rotations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_403_is_not_available() {
        let transport = ScriptedTransport::new(vec![Ok(RawResponse::new(403, ""))]);
        let circuit = Arc::new(CountingCircuit::default());
        let fetcher = Fetcher::new(transport, circuit.clone(), quick_policy());

        let err = fetcher.fetch(&url(), 3).await.unwrap_err();

        assert!(matches!(err, FetchError::NotAvailable { status: 403, .. }));
        assert_eq!(circuit.rotations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_exhausted_carries_last_cause() {
        let transport = ScriptedTransport::new(vec![
            Err(TransportError::Network("refused".into())),
            Ok(RawResponse::new(502, "")),
        ]);
        let circuit = Arc::new(CountingCircuit::default());
        let fetcher = Fetcher::new(transport.clone(), circuit.clone(), quick_policy());

        let err = fetcher.fetch(&url(), 3).await.unwrap_err();

        assert_eq!(
            err,
            FetchError::Exhausted {
                url: url().to_string(),
                attempts: 3,
                last: TransportError::Status(502),
            }
        );
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
        // No rotation after the final attempt.
        assert_eq!(circuit.rotations.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_rotation_does_not_abort_fetch() {
        let transport = ScriptedTransport::new(vec![
            Ok(RawResponse::new(500, "")),
            Ok(RawResponse::new(200, "fine")),
        ]);
        let circuit = Arc::new(CountingCircuit {
            fail: true,
            ..Default::default()
        });
        let fetcher = Fetcher::new(transport, circuit.clone(), quick_policy());

        assert_eq!(fetcher.fetch(&url(), 3).await.unwrap(), "fine");
        assert_eq!(circuit.rotations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_attempt_timeout() {
        let circuit = Arc::new(CountingCircuit::default());
        let policy = FetchPolicy {
            attempts: 1,
            attempt_timeout: Duration::from_millis(50),
            ..quick_policy()
        };
        let fetcher = Fetcher::new(Arc::new(SlowTransport), circuit.clone(), policy);

        let err = fetcher.fetch(&url(), 1).await.unwrap_err();

        assert!(matches!(
            err,
            FetchError::Exhausted {
                last: TransportError::Timeout(_),
                attempts: 1,
                ..
            }
        ));
        assert_eq!(circuit.rotations.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let jitter = Jitter::from_millis(30, 10);
        for _ in 0..100 {
            let d = jitter.sample();
            assert!(d >= Duration::from_millis(10) && d <= Duration::from_millis(30));
        }
        assert_eq!(Jitter::none().sample(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_pacer_spaces_requests() {
        let pacer = Pacer::new(Jitter::from_millis(40, 40));
        pacer.wait().await;
        let start = Instant::now();
        pacer.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(30));
    }
}
