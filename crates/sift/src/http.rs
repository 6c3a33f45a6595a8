//! Shared HTTP client service.
//!
//! One logical client per upstream-service name, each wrapping a reqwest
//! transport with bounded sockets, keep-alive, and periodic recycling. The
//! recycle-on-age swap is the defense against socket leaks under timeout
//! storms: the transport is replaced under lock and the old one finishes its
//! in-flight requests out-of-band before its pool is dropped.

use crate::config::HttpSettings;
use crate::error::EngineError;
use parking_lot::Mutex;
use reqwest::{Client, Proxy};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Proxy configuration for one route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    /// Proxy server URL (e.g. `http://proxy.example.com:8080` or
    /// `socks5://host:1080`).
    pub url: String,
    /// Optional basic credentials.
    pub auth: Option<(String, String)>,
}

impl ProxyConfig {
    fn build(&self) -> Result<Proxy, EngineError> {
        let mut proxy = Proxy::all(&self.url)
            .map_err(|e| EngineError::internal(format!("invalid proxy URL: {e}")))?;
        if let Some((user, pass)) = &self.auth {
            proxy = proxy.basic_auth(user, pass);
        }
        Ok(proxy)
    }
}

/// How one upstream exchange ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Timeout,
    ConnectionError,
    Status(u16),
}

impl Outcome {
    pub fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Classify a finished reqwest exchange.
pub fn classify(result: &Result<reqwest::Response, reqwest::Error>) -> Outcome {
    match result {
        Ok(response) if response.status().is_success() => Outcome::Success,
        Ok(response) => Outcome::Status(response.status().as_u16()),
        Err(err) if err.is_timeout() => Outcome::Timeout,
        Err(_) => Outcome::ConnectionError,
    }
}

struct ClientSlot {
    client: Client,
    created: Instant,
    via_proxy: bool,
    /// Bounds concurrent sockets per upstream host.
    permits: Arc<Semaphore>,
}

/// Process-wide pool of per-upstream clients.
pub struct SharedHttp {
    settings: HttpSettings,
    /// Explicit per-upstream proxy routes.
    routes: HashMap<String, ProxyConfig>,
    /// Proxy adopted for an upstream once its error streak crosses the
    /// threshold; `None` disables adaptation.
    fallback_proxy: Option<ProxyConfig>,
    slots: Mutex<HashMap<String, Arc<ClientSlot>>>,
    streaks: Mutex<HashMap<String, u32>>,
}

impl SharedHttp {
    pub fn new(settings: HttpSettings) -> Self {
        Self {
            settings,
            routes: HashMap::new(),
            fallback_proxy: None,
            slots: Mutex::new(HashMap::new()),
            streaks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_route(mut self, upstream: impl Into<String>, proxy: ProxyConfig) -> Self {
        self.routes.insert(upstream.into(), proxy);
        self
    }

    pub fn with_fallback_proxy(mut self, proxy: ProxyConfig) -> Self {
        self.fallback_proxy = Some(proxy);
        self
    }

    fn build_client(&self, proxy: Option<&ProxyConfig>) -> Result<Client, EngineError> {
        let mut builder = Client::builder()
            .pool_max_idle_per_host(self.settings.max_idle_per_host)
            .pool_idle_timeout(self.settings.idle_timeout)
            .timeout(self.settings.request_timeout)
            .tcp_keepalive(self.settings.idle_timeout);
        if let Some(proxy) = proxy {
            builder = builder.proxy(proxy.build()?);
        }
        builder
            .build()
            .map_err(|e| EngineError::internal(format!("failed to build HTTP client: {e}")))
    }

    fn make_slot(&self, upstream: &str, via_proxy: bool) -> Result<Arc<ClientSlot>, EngineError> {
        let proxy = if via_proxy {
            self.routes.get(upstream).or(self.fallback_proxy.as_ref())
        } else {
            self.routes.get(upstream)
        };
        let client = self.build_client(proxy)?;
        Ok(Arc::new(ClientSlot {
            client,
            created: Instant::now(),
            via_proxy: proxy.is_some(),
            permits: Arc::new(Semaphore::new(self.settings.max_sockets_per_host)),
        }))
    }

    fn slot_for(&self, upstream: &str) -> Result<Arc<ClientSlot>, EngineError> {
        let mut slots = self.slots.lock();
        if let Some(slot) = slots.get(upstream)
            && slot.created.elapsed() < self.settings.transport_max_age
        {
            return Ok(slot.clone());
        }

        // Expired or absent: swap in a fresh transport. The old Arc keeps the
        // previous transport alive for whatever requests still hold it.
        let keep_proxy = slots.get(upstream).map(|s| s.via_proxy).unwrap_or(false);
        let slot = self.make_slot(upstream, keep_proxy)?;
        if slots.insert(upstream.to_string(), slot.clone()).is_some() {
            debug!(upstream, "recycled HTTP transport past max age");
        }
        Ok(slot)
    }

    /// The reusable client for an upstream. Recycles the transport once it
    /// exceeds its max age.
    pub fn client_for(&self, upstream: &str) -> Result<Client, EngineError> {
        Ok(self.slot_for(upstream)?.client.clone())
    }

    /// Run one request against an upstream under the socket bound, classify
    /// the outcome and feed the error-streak accounting.
    pub async fn execute(
        &self,
        upstream: &str,
        build: impl FnOnce(&Client) -> reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, EngineError> {
        let slot = self.slot_for(upstream)?;
        let _permit = slot
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| EngineError::internal("socket semaphore closed"))?;

        let result = build(&slot.client).send().await;
        let outcome = classify(&result);
        self.record_outcome(upstream, outcome);

        match result {
            Ok(response) => Ok(response),
            Err(err) => Err(EngineError::upstream(upstream, err.to_string())),
        }
    }

    /// Record a classified outcome. Streaks of non-success outcomes flip the
    /// upstream onto the fallback proxy route.
    pub fn record_outcome(&self, upstream: &str, outcome: Outcome) {
        let mut streaks = self.streaks.lock();
        let streak = streaks.entry(upstream.to_string()).or_insert(0);
        if outcome.is_success() {
            *streak = 0;
            return;
        }
        *streak += 1;
        debug!(upstream, streak = *streak, ?outcome, "upstream error streak");

        if *streak < self.settings.streak_threshold {
            return;
        }
        *streak = 0;
        drop(streaks);

        if self.fallback_proxy.is_none() && !self.routes.contains_key(upstream) {
            return;
        }
        let mut slots = self.slots.lock();
        let already_proxied = slots.get(upstream).map(|s| s.via_proxy).unwrap_or(false);
        if already_proxied {
            return;
        }
        match self.make_slot(upstream, true) {
            Ok(slot) => {
                info!(upstream, "error streak threshold reached, routing through proxy");
                slots.insert(upstream.to_string(), slot);
            }
            Err(err) => warn!(upstream, error = %err, "failed to adapt proxy routing"),
        }
    }

    /// Whether the upstream is currently routed through a proxy.
    pub fn is_proxied(&self, upstream: &str) -> bool {
        self.slots
            .lock()
            .get(upstream)
            .map(|s| s.via_proxy)
            .unwrap_or(false)
    }

    /// Drop every transport. In-flight requests holding a clone finish on the
    /// old pool before it closes.
    pub fn shutdown(&self) {
        self.slots.lock().clear();
        self.streaks.lock().clear();
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn settings() -> HttpSettings {
        HttpSettings::default()
    }

    fn install_crypto_provider() {
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
    }

    #[test]
    fn classify_maps_status_families() {
        // Errors are hard to fabricate without a socket; status mapping is
        // exercised through the Outcome constructors used by the engine.
        assert!(Outcome::Success.is_success());
        assert!(!Outcome::Status(502).is_success());
        assert!(!Outcome::Timeout.is_success());
        assert!(!Outcome::ConnectionError.is_success());
    }

    #[test]
    fn clients_are_reused_until_max_age() {
        install_crypto_provider();
        let http = SharedHttp::new(settings());
        let _ = http.client_for("indexer").unwrap();
        let created_before = http.slots.lock().get("indexer").unwrap().created;

        // Within max age the slot stays put.
        let _ = http.client_for("indexer").unwrap();
        assert_eq!(
            http.slots.lock().get("indexer").unwrap().created,
            created_before
        );
    }

    #[test]
    fn expired_transport_is_recycled() {
        install_crypto_provider();
        let http = SharedHttp::new(HttpSettings {
            transport_max_age: Duration::ZERO,
            ..HttpSettings::default()
        });
        let _ = http.client_for("indexer").unwrap();
        let created_before = http.slots.lock().get("indexer").unwrap().created;
        std::thread::sleep(Duration::from_millis(5));
        let _ = http.client_for("indexer").unwrap();
        let created_after = http.slots.lock().get("indexer").unwrap().created;
        assert!(created_after > created_before);
    }

    #[test]
    fn streaks_flip_upstream_onto_fallback_proxy() {
        install_crypto_provider();
        let http = SharedHttp::new(settings()).with_fallback_proxy(ProxyConfig {
            url: "http://127.0.0.1:18080".to_string(),
            auth: None,
        });
        let _ = http.client_for("flaky").unwrap();
        assert!(!http.is_proxied("flaky"));

        for _ in 0..settings().streak_threshold {
            http.record_outcome("flaky", Outcome::Timeout);
        }
        assert!(http.is_proxied("flaky"));
    }

    #[test]
    fn success_resets_the_streak() {
        install_crypto_provider();
        let http = SharedHttp::new(settings()).with_fallback_proxy(ProxyConfig {
            url: "http://127.0.0.1:18080".to_string(),
            auth: None,
        });
        let _ = http.client_for("mostly-fine").unwrap();

        for _ in 0..settings().streak_threshold - 1 {
            http.record_outcome("mostly-fine", Outcome::Status(503));
        }
        http.record_outcome("mostly-fine", Outcome::Success);
        http.record_outcome("mostly-fine", Outcome::Status(503));
        assert!(!http.is_proxied("mostly-fine"));
    }

    #[test]
    fn shutdown_drops_transports() {
        install_crypto_provider();
        let http = SharedHttp::new(settings());
        let _ = http.client_for("a").unwrap();
        let _ = http.client_for("b").unwrap();
        http.shutdown();
        assert!(http.slots.lock().is_empty());
    }
}
