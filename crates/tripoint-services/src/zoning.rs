//! Zone classification service
//!
//! Routes the customer location from each configured base, takes the closest
//! base by drive time (definition order breaks ties), and assigns a zone
//! letter. Route lookups are external calls, so results are cached briefly.

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use tripoint_cache::keys;
use tripoint_core::config::BaseConfig;
use tripoint_core::models::{BaseRoute, Zone, ZoneResult};
use tripoint_core::traits::{CacheService, RoutingGateway};
use tripoint_core::{AppError, AppResult};

/// Round to two decimal places for presentation
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Zone classifier with cached route lookups
pub struct ZoneClassifier<R: RoutingGateway, C: CacheService> {
    routing: Arc<R>,
    cache: Arc<C>,
    bases: Vec<BaseConfig>,
    cache_ttl_secs: u64,
}

impl<R: RoutingGateway, C: CacheService> ZoneClassifier<R, C> {
    /// Create a new zone classifier
    pub fn new(
        routing: Arc<R>,
        cache: Arc<C>,
        bases: Vec<BaseConfig>,
        cache_ttl_secs: u64,
    ) -> Self {
        Self {
            routing,
            cache,
            bases,
            cache_ttl_secs,
        }
    }

    /// Try to get a cached classification; cache failures degrade to a miss
    async fn get_cached(&self, postcode: &str) -> Option<ZoneResult> {
        let key = keys::zone_key(postcode);
        match self.cache.get::<ZoneResult>(&key).await {
            Ok(result) => {
                if result.is_some() {
                    debug!("Zone cache HIT for {}", postcode);
                }
                result
            }
            Err(e) => {
                warn!("Zone cache error for {}: {}", postcode, e);
                None
            }
        }
    }

    /// Store a classification; cache failures are non-fatal
    async fn store_cached(&self, postcode: &str, result: &ZoneResult) {
        let key = keys::zone_key(postcode);
        if let Err(e) = self.cache.set(&key, result, self.cache_ttl_secs).await {
            warn!("Failed to cache zone result for {}: {}", postcode, e);
        }
    }

    /// Classify a location into a service zone
    ///
    /// Calls the routing collaborator once per base; individual failures are
    /// tolerated. Fails with `RouteUnavailable` only when no base returns a
    /// usable route.
    #[instrument(skip(self))]
    pub async fn classify(&self, postcode: &str) -> AppResult<ZoneResult> {
        if let Some(cached) = self.get_cached(postcode).await {
            return Ok(cached);
        }

        let mut details: BTreeMap<String, BaseRoute> = BTreeMap::new();
        let mut best: Option<(&BaseConfig, f64, f64)> = None;

        for base in &self.bases {
            match self.routing.route(&base.address, postcode).await {
                Ok(estimate) => {
                    details.insert(
                        base.name.clone(),
                        BaseRoute {
                            address: base.address.clone(),
                            time_minutes: Some(estimate.minutes),
                            distance_km: Some(estimate.distance_km),
                        },
                    );
                    // Strict comparison keeps the first base on ties
                    let better = match best {
                        Some((_, best_minutes, _)) => estimate.minutes < best_minutes,
                        None => true,
                    };
                    if better {
                        best = Some((base, estimate.minutes, estimate.distance_km));
                    }
                }
                Err(e) => {
                    warn!("Route {} -> {} failed: {}", base.address, postcode, e);
                    details.insert(
                        base.name.clone(),
                        BaseRoute {
                            address: base.address.clone(),
                            time_minutes: None,
                            distance_km: None,
                        },
                    );
                }
            }
        }

        let (base, minutes, distance_km) = best.ok_or(AppError::RouteUnavailable)?;
        let zone = Zone::from_drive_time(minutes);

        debug!(
            "Classified {} as zone {} via {} ({:.1} mins)",
            postcode, zone, base.name, minutes
        );

        let result = ZoneResult {
            postcode: postcode.to_string(),
            best_base_name: base.name.clone(),
            best_base_address: base.address.clone(),
            time_minutes: round2(minutes),
            distance_km: round2(distance_km),
            zone,
            details,
        };

        self.store_cached(postcode, &result).await;

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde::{de::DeserializeOwned, Serialize};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tripoint_core::traits::RouteEstimate;

    struct MockRouting {
        /// Routes keyed by base address; None simulates a failed lookup
        routes: HashMap<String, Option<RouteEstimate>>,
    }

    #[async_trait]
    impl RoutingGateway for MockRouting {
        async fn route(&self, origin: &str, _destination: &str) -> AppResult<RouteEstimate> {
            match self.routes.get(origin) {
                Some(Some(estimate)) => Ok(*estimate),
                _ => Err(AppError::Upstream("no route".to_string())),
            }
        }
    }

    #[derive(Default)]
    struct MemoryCache {
        entries: Mutex<HashMap<String, String>>,
    }

    #[async_trait]
    impl CacheService for MemoryCache {
        async fn get<T: DeserializeOwned>(&self, key: &str) -> AppResult<Option<T>> {
            let entries = self.entries.lock().unwrap();
            Ok(entries
                .get(key)
                .and_then(|json| serde_json::from_str(json).ok()))
        }

        async fn set<T: Serialize + Send + Sync>(
            &self,
            key: &str,
            value: &T,
            _ttl_secs: u64,
        ) -> AppResult<()> {
            let mut entries = self.entries.lock().unwrap();
            entries.insert(key.to_string(), serde_json::to_string(value)?);
            Ok(())
        }

        async fn delete(&self, key: &str) -> AppResult<bool> {
            Ok(self.entries.lock().unwrap().remove(key).is_some())
        }

        async fn exists(&self, key: &str) -> AppResult<bool> {
            Ok(self.entries.lock().unwrap().contains_key(key))
        }
    }

    fn bases() -> Vec<BaseConfig> {
        vec![
            BaseConfig {
                name: "Tonbridge".to_string(),
                address: "TN9 1PP".to_string(),
            },
            BaseConfig {
                name: "Eltham".to_string(),
                address: "SE9 4HA".to_string(),
            },
        ]
    }

    fn classifier(
        routes: HashMap<String, Option<RouteEstimate>>,
    ) -> ZoneClassifier<MockRouting, MemoryCache> {
        ZoneClassifier::new(
            Arc::new(MockRouting { routes }),
            Arc::new(MemoryCache::default()),
            bases(),
            600,
        )
    }

    fn estimate(minutes: f64, km: f64) -> Option<RouteEstimate> {
        Some(RouteEstimate {
            minutes,
            distance_km: km,
        })
    }

    #[tokio::test]
    async fn test_closest_base_wins() {
        let routes = HashMap::from([
            ("TN9 1PP".to_string(), estimate(42.0, 30.0)),
            ("SE9 4HA".to_string(), estimate(18.5, 12.0)),
        ]);
        let result = classifier(routes).classify("BR1 1AA").await.unwrap();

        assert_eq!(result.best_base_name, "Eltham");
        assert_eq!(result.zone, Zone::A);
        assert_eq!(result.time_minutes, 18.5);
        assert_eq!(result.details.len(), 2);
    }

    #[tokio::test]
    async fn test_tie_prefers_first_base() {
        let routes = HashMap::from([
            ("TN9 1PP".to_string(), estimate(30.0, 20.0)),
            ("SE9 4HA".to_string(), estimate(30.0, 25.0)),
        ]);
        let result = classifier(routes).classify("ME1 1AA").await.unwrap();
        assert_eq!(result.best_base_name, "Tonbridge");
    }

    #[tokio::test]
    async fn test_single_base_failure_tolerated() {
        let routes = HashMap::from([
            ("TN9 1PP".to_string(), None),
            ("SE9 4HA".to_string(), estimate(50.0, 40.0)),
        ]);
        let result = classifier(routes).classify("CT1 1AA").await.unwrap();

        assert_eq!(result.best_base_name, "Eltham");
        assert_eq!(result.zone, Zone::C);
        // Failed base still appears in the details with empty measurements
        assert!(result.details["Tonbridge"].time_minutes.is_none());
    }

    #[tokio::test]
    async fn test_all_bases_failing_is_route_unavailable() {
        let routes = HashMap::from([
            ("TN9 1PP".to_string(), None),
            ("SE9 4HA".to_string(), None),
        ]);
        let err = classifier(routes).classify("ZZ1 1ZZ").await.unwrap_err();
        assert!(matches!(err, AppError::RouteUnavailable));
    }

    #[tokio::test]
    async fn test_out_of_area_classification() {
        let routes = HashMap::from([
            ("TN9 1PP".to_string(), estimate(75.0, 90.0)),
            ("SE9 4HA".to_string(), estimate(80.0, 95.0)),
        ]);
        let result = classifier(routes).classify("EX1 1AA").await.unwrap();
        assert_eq!(result.zone, Zone::OutOfArea);
    }

    #[tokio::test]
    async fn test_second_lookup_served_from_cache() {
        let routes = HashMap::from([
            ("TN9 1PP".to_string(), estimate(20.0, 15.0)),
            ("SE9 4HA".to_string(), estimate(40.0, 30.0)),
        ]);
        let classifier = classifier(routes);

        let first = classifier.classify("TN1 1AA").await.unwrap();
        let second = classifier.classify("TN1 1AA").await.unwrap();
        assert_eq!(first.best_base_name, second.best_base_name);
        assert_eq!(first.time_minutes, second.time_minutes);
    }

    #[tokio::test]
    async fn test_rounding() {
        let routes = HashMap::from([
            ("TN9 1PP".to_string(), estimate(20.12345, 15.6789)),
            ("SE9 4HA".to_string(), None),
        ]);
        let result = classifier(routes).classify("TN2 2BB").await.unwrap();
        assert_eq!(result.time_minutes, 20.12);
        assert_eq!(result.distance_km, 15.68);
    }
}
