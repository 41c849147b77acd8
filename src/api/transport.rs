// ============================================================================
// HttpTransport : couche réseau derrière le cache
// ============================================================================
// Le cache ne parle jamais directement à reqwest : il passe par ce trait, ce
// qui permet de le tester avec un transport scripté (compteur d'appels,
// horodatage de chaque requête) sans réseau.
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::api::MarketDataError;

/// Réponse HTTP brute : statut + corps texte
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    /// Statut dans la plage 200-299
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// CONCEPT RUST : async_trait
/// - Les méthodes async dans un trait utilisé en `dyn` nécessitent la macro
/// - Send + Sync : le transport est partagé entre tâches tokio via Arc
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, url: &str) -> Result<HttpResponse, MarketDataError>;
}

/// Transport de production basé sur reqwest
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Construit le client une seule fois (pool de connexions réutilisé)
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, MarketDataError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str) -> Result<HttpResponse, MarketDataError> {
        debug!(url = %url, "Sending HTTP request");
        let response = self
            .client
            .get(url)
            .header("accept", "application/json")
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        debug!(status, bytes = body.len(), "Received HTTP response");

        Ok(HttpResponse { status, body })
    }
}

// ============================================================================
// Transport scripté pour les tests
// ============================================================================
