// ============================================================================
// MarketDataCache : cache TTL + rate limiting devant l'API de prix
// ============================================================================
// L'API gratuite de CoinGecko limite fortement le nombre de requêtes. Ce cache
// garantit :
// 1. Une réponse de moins de `ttl` (30 s) est resservie sans appel réseau
// 2. Deux requêtes sortantes sont espacées d'au moins `min_interval` (2 s),
//    toutes URL confondues ; une requête trop tôt est retardée, jamais abandonnée
// 3. Les échecs (statut non 2xx, JSON invalide) ne sont jamais mis en cache
//
// CONCEPTS RUST :
// 1. std::sync::Mutex pour la map : sections critiques courtes, jamais de .await
// 2. tokio::sync::Mutex pour le rate limiter : tenu pendant le sleep et la
//    requête, ce qui sérialise les appelants concurrents
// 3. Arc<Value> : un hit de cache retourne le même objet, sans copie
// 4. tokio::time::Instant : l'horloge peut être mise en pause dans les tests
// ============================================================================

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use crate::api::{HttpTransport, MarketDataError};

/// Entrée du cache : valeur JSON parsée + instant de capture
#[derive(Debug, Clone)]
struct CacheEntry {
    value: Arc<Value>,
    fetched_at: Instant,
}

pub struct MarketDataCache {
    transport: Arc<dyn HttpTransport>,
    ttl: Duration,
    min_interval: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,

    /// Début de la dernière requête réseau, partagé par toutes les clés
    last_request: tokio::sync::Mutex<Option<Instant>>,
}

impl MarketDataCache {
    pub fn new(transport: Arc<dyn HttpTransport>, ttl: Duration, min_interval: Duration) -> Self {
        Self {
            transport,
            ttl,
            min_interval,
            entries: Mutex::new(HashMap::new()),
            last_request: tokio::sync::Mutex::new(None),
        }
    }

    /// Retourne la réponse JSON pour `url`, depuis le cache si elle est fraîche
    ///
    /// Le verrou du rate limiter reste pris jusqu'à ce que la réponse soit
    /// stockée : un appelant en attente pour la même URL trouve alors l'entrée
    /// fraîche et ne refait pas la requête.
    #[instrument(skip(self))]
    pub async fn fetch(&self, url: &str) -> Result<Arc<Value>, MarketDataError> {
        if let Some(value) = self.fresh(url) {
            debug!("Cache hit");
            return Ok(value);
        }

        let mut last_request = self.last_request.lock().await;

        if let Some(value) = self.fresh(url) {
            debug!("Cache filled while waiting for the rate limiter");
            return Ok(value);
        }

        if let Some(last) = *last_request {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                let wait = self.min_interval - elapsed;
                debug!(wait_ms = wait.as_millis() as u64, "Rate limit: delaying request");
                tokio::time::sleep(wait).await;
            }
        }
        *last_request = Some(Instant::now());

        let response = self.transport.get(url).await?;
        if !response.is_success() {
            warn!(status = response.status, "Market API returned error status");
            return Err(MarketDataError::Status {
                status: response.status,
            });
        }

        let value: Value = serde_json::from_str(&response.body).map_err(MarketDataError::Parse)?;
        let value = Arc::new(value);

        self.entries().insert(
            url.to_string(),
            CacheEntry {
                value: Arc::clone(&value),
                fetched_at: Instant::now(),
            },
        );
        debug!("Cached fresh response");

        Ok(value)
    }

    /// Nombre d'URL en cache (fraîches ou non)
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn fresh(&self, url: &str) -> Option<Arc<Value>> {
        let entries = self.entries();
        let entry = entries.get(url)?;
        if entry.fetched_at.elapsed() < self.ttl {
            Some(Arc::clone(&entry.value))
        } else {
            None
        }
    }

    /// Un panic pendant une insertion ne laisse pas la map incohérente :
    /// on récupère le verrou empoisonné plutôt que de propager le panic
    fn entries(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ============================================================================
// Tests unitaires
// ============================================================================
// CONCEPT : #[tokio::test(start_paused = true)]
// - L'horloge tokio est gelée, sleep() avance le temps instantanément
// - Les tests de TTL / rate limit ne prennent donc pas 30 secondes
// ============================================================================
