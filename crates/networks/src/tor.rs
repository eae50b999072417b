use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE, USER_AGENT};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use darkgather_core::config::TorConfig;
use darkgather_core::{
    CircuitControl, CrawlError, GatewayError, RawResponse, Transport, TransportError,
};

use crate::control::ControlClient;

/// Outbound path through the Tor SOCKS port plus circuit rotation via the control port.
pub struct TorGateway {
    client: reqwest::Client,
    socks_addr: String,
    control: ControlClient,
    rotation_timeout: Duration,
    settle: Duration,
    min_rotation_interval: Duration,
    health_timeout: Duration,
    max_body_size: usize,
    // Held for the whole rotation so concurrent workers never stack NEWNYMs.
    last_rotation: Mutex<Option<Instant>>,
}

impl TorGateway {
    pub fn new(config: &TorConfig) -> Result<Self, CrawlError> {
        let proxy = reqwest::Proxy::all(format!("socks5h://{}", config.socks_proxy))
            .map_err(|e| CrawlError::Config(format!("tor socks proxy {}: {}", config.socks_proxy, e)))?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));

        let client = reqwest::Client::builder()
            .proxy(proxy)
            .redirect(reqwest::redirect::Policy::none())
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| CrawlError::Config(format!("tor client: {}", e)))?;

        Ok(Self {
            client,
            socks_addr: config.socks_proxy.clone(),
            control: ControlClient::new(&config.control_addr, &config.control_password),
            rotation_timeout: Duration::from_secs(config.rotation_timeout_seconds),
            settle: Duration::from_secs(config.rotation_settle_seconds),
            min_rotation_interval: Duration::from_secs(config.rotation_min_interval_seconds),
            health_timeout: Duration::from_secs(config.health_timeout_seconds),
            max_body_size: config.max_body_size_mb * 1024 * 1024,
            last_rotation: Mutex::new(None),
        })
    }

    /// The SOCKS-bound HTTP client. Cheap to clone.
    pub fn connect(&self) -> reqwest::Client {
        self.client.clone()
    }

    pub fn socks_addr(&self) -> &str {
        &self.socks_addr
    }

    /// TCP probe of the SOCKS endpoint. Never errors, a dead proxy is just `false`.
    pub async fn health_check(&self) -> bool {
        match tokio::time::timeout(self.health_timeout, TcpStream::connect(&self.socks_addr)).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                warn!(addr = %self.socks_addr, error = %e, "tor socks endpoint unreachable");
                false
            }
            Err(_) => {
                warn!(addr = %self.socks_addr, "tor socks endpoint probe timed out");
                false
            }
        }
    }
}

#[async_trait]
impl Transport for TorGateway {
    async fn get(
        &self,
        url: &Url,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<RawResponse, TransportError> {
        let start = Instant::now();
        let map_err = |e: reqwest::Error| {
            if e.is_timeout() {
                TransportError::Timeout(timeout.as_secs())
            } else {
                TransportError::Network(e.to_string())
            }
        };

        let resp = self
            .client
            .get(url.as_str())
            .header(USER_AGENT, user_agent)
            .timeout(timeout)
            .send()
            .await
            .map_err(map_err)?;

        let status = resp.status().as_u16();
        if let Some(len) = resp.content_length() {
            if len as usize > self.max_body_size {
                return Err(TransportError::BodyTooLarge {
                    size: len as usize,
                    max: self.max_body_size,
                });
            }
        }

        let body = resp.bytes().await.map_err(map_err)?;
        if body.len() > self.max_body_size {
            return Err(TransportError::BodyTooLarge {
                size: body.len(),
                max: self.max_body_size,
            });
        }

        debug!(url = %url, status, ms = start.elapsed().as_millis() as u64, "tor response");
        Ok(RawResponse {
            status,
            body: String::from_utf8_lossy(&body).into_owned(),
        })
    }
}

#[async_trait]
impl CircuitControl for TorGateway {
    async fn rotate_identity(&self) -> Result<(), GatewayError> {
        let mut last = self.last_rotation.lock().await;
        if let Some(at) = *last {
            if at.elapsed() < self.min_rotation_interval {
                debug!(
                    since_ms = at.elapsed().as_millis() as u64,
                    "circuit renewed recently, keeping it"
                );
                return Ok(());
            }
        }

        match tokio::time::timeout(self.rotation_timeout, self.control.new_identity()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                return Err(GatewayError::Unavailable(format!(
                    "{} did not answer within {}s",
                    self.control.addr(),
                    self.rotation_timeout.as_secs()
                )))
            }
        }

        *last = Some(Instant::now());
        info!("tor identity renewed");
        tokio::time::sleep(self.settle).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::tests::spawn_control_port;

    fn config(control_addr: &str, password: &str, min_interval: u64) -> TorConfig {
        TorConfig {
            control_addr: control_addr.to_string(),
            control_password: password.to_string(),
            rotation_settle_seconds: 0,
            rotation_min_interval_seconds: min_interval,
            rotation_timeout_seconds: 5,
            health_timeout_seconds: 1,
            ..TorConfig::default()
        }
    }

    fn newnym_count(seen: &std::sync::Mutex<Vec<String>>) -> usize {
        seen.lock().unwrap().iter().filter(|l| *l == "SIGNAL NEWNYM").count()
    }

    #[tokio::test]
    async fn test_rotation_is_throttled() {
        let (addr, seen) = spawn_control_port("secret").await;
        let gateway = TorGateway::new(&config(&addr, "secret", 60)).unwrap();

        gateway.rotate_identity().await.unwrap();
        gateway.rotate_identity().await.unwrap();

        assert_eq!(newnym_count(&seen), 1);
    }

    #[tokio::test]
    async fn test_rotation_without_throttle() {
        let (addr, seen) = spawn_control_port("secret").await;
        let gateway = TorGateway::new(&config(&addr, "secret", 0)).unwrap();

        gateway.rotate_identity().await.unwrap();
        gateway.rotate_identity().await.unwrap();

        assert_eq!(newnym_count(&seen), 2);
    }

    #[tokio::test]
    async fn test_rotation_auth_failure_surfaces() {
        let (addr, _seen) = spawn_control_port("secret").await;
        let gateway = TorGateway::new(&config(&addr, "nope", 0)).unwrap();

        let err = gateway.rotate_identity().await.unwrap_err();
        assert!(matches!(err, GatewayError::AuthFailed(_)));
    }

    #[tokio::test]
    async fn test_health_check_false_when_nothing_listens() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let gateway = TorGateway::new(&TorConfig {
            socks_proxy: addr,
            health_timeout_seconds: 1,
            ..TorConfig::default()
        })
        .unwrap();

        assert!(!gateway.health_check().await);
    }

    #[tokio::test]
    async fn test_health_check_true_when_listening() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let gateway = TorGateway::new(&TorConfig {
            socks_proxy: addr,
            health_timeout_seconds: 1,
            ..TorConfig::default()
        })
        .unwrap();

        assert!(gateway.health_check().await);
    }
}
