//! Geolocation resolution with per-IP caching.

use async_trait::async_trait;
use ipnetwork::IpNetwork;
use lru::LruCache;
use parking_lot::Mutex;
use std::net::IpAddr;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::TelemetryResult;
use warden_core::GeoLocation;

/// Default per-IP cache capacity.
const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// Networks that are never sent to the geolocation collaborator.
const PRIVATE_RANGES: &[&str] = &[
    "10.0.0.0/8",
    "172.16.0.0/12",
    "192.168.0.0/16",
    "127.0.0.0/8",
    "169.254.0.0/16",
    "::1/128",
    "fc00::/7",
    "fe80::/10",
];

/// Checks whether an IP belongs to a private or loopback range.
///
/// Unparseable addresses are reported as private so they are never
/// shipped to the external collaborator.
#[must_use]
pub fn is_private_ip(ip: &str) -> bool {
    match ip.parse::<IpAddr>() {
        Ok(addr) => PRIVATE_RANGES
            .iter()
            .filter_map(|range| range.parse::<IpNetwork>().ok())
            .any(|net| net.contains(addr)),
        Err(_) => true,
    }
}

/// External geolocation collaborator.
#[async_trait]
pub trait GeoProvider: Send + Sync {
    /// Resolves an IP to a location. `None` when the provider has no
    /// data for the address.
    async fn lookup(&self, ip: &str) -> TelemetryResult<Option<GeoLocation>>;
}

/// Provider stub that resolves nothing.
pub struct NullGeoProvider;

#[async_trait]
impl GeoProvider for NullGeoProvider {
    async fn lookup(&self, _ip: &str) -> TelemetryResult<Option<GeoLocation>> {
        Ok(None)
    }
}

/// Caching wrapper around a [`GeoProvider`].
///
/// Successful lookups are cached per IP so repeated events from the
/// same address avoid redundant external calls. Private and loopback
/// addresses short-circuit to `None`; provider failures are logged and
/// yield `None` rather than propagating.
pub struct GeoResolver {
    provider: Arc<dyn GeoProvider>,
    cache: Mutex<LruCache<String, GeoLocation>>,
}

impl GeoResolver {
    /// Creates a resolver with the default cache capacity.
    pub fn new(provider: Arc<dyn GeoProvider>) -> Self {
        Self::with_capacity(provider, DEFAULT_CACHE_CAPACITY)
    }

    /// Creates a resolver with a custom cache capacity.
    pub fn with_capacity(provider: Arc<dyn GeoProvider>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            provider,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Resolves an IP address to a location, if possible.
    pub async fn resolve(&self, ip: &str) -> Option<GeoLocation> {
        if is_private_ip(ip) {
            debug!(ip, "skipping geolocation for private address");
            return None;
        }

        if let Some(geo) = self.cache.lock().get(ip).cloned() {
            return Some(geo);
        }

        match self.provider.lookup(ip).await {
            Ok(Some(geo)) => {
                self.cache.lock().put(ip.to_string(), geo.clone());
                Some(geo)
            }
            Ok(None) => None,
            Err(err) => {
                warn!(ip, error = %err, "geolocation lookup failed");
                None
            }
        }
    }
}
