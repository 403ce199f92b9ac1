//! UF exchange rate lookup with a TTL cache.
//!
//! The UF (Unidad de Fomento) is Chile's inflation-indexed accounting unit;
//! listings are priced in UF while payments happen in CLP. The daily value
//! comes from mindicador.cl and changes once a day, so a short TTL cache is
//! enough. `UF_FIXED_VALUE` pins the value for local development and tests.

use chrono::{DateTime, Utc};
use propia_core::Config;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RateSource {
    /// Pinned via configuration
    Fixed,
    /// Fetched from the live indicator API
    Live,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct UfRate {
    /// CLP per 1 UF
    pub value: f64,
    pub fetched_at: DateTime<Utc>,
    pub source: RateSource,
}

#[derive(Debug, Deserialize)]
struct IndicatorResponse {
    serie: Vec<IndicatorPoint>,
}

#[derive(Debug, Deserialize)]
struct IndicatorPoint {
    valor: f64,
}

/// A hung indicator API must not pin rate requests indefinitely.
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

pub struct RateCache {
    client: reqwest::Client,
    source_url: String,
    ttl: Duration,
    fixed: Option<f64>,
    cached: RwLock<Option<UfRate>>,
}

impl RateCache {
    pub fn from_config(config: &Config) -> Result<Self, anyhow::Error> {
        let fixed = match &config.uf_fixed_value {
            Some(raw) => Some(parse_chilean_number(raw).ok_or_else(|| {
                anyhow::anyhow!("UF_FIXED_VALUE is not a valid number: {raw:?}")
            })?),
            None => None,
        };

        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build HTTP client: {e}"))?;

        Ok(Self {
            client,
            source_url: config.uf_source_url.clone(),
            ttl: Duration::from_secs(config.uf_cache_minutes * 60),
            fixed,
            cached: RwLock::new(None),
        })
    }

    /// Current UF value, served from cache while fresh.
    ///
    /// When the live fetch fails and a stale cached value exists, the stale
    /// value is returned rather than failing the request.
    pub async fn current(&self) -> Result<UfRate, RateError> {
        if let Some(value) = self.fixed {
            return Ok(UfRate {
                value,
                fetched_at: Utc::now(),
                source: RateSource::Fixed,
            });
        }

        {
            let cached = self.cached.read().await;
            if let Some(rate) = *cached {
                if self.is_fresh(&rate) {
                    return Ok(rate);
                }
            }
        }

        match self.fetch().await {
            Ok(value) => {
                let rate = UfRate {
                    value,
                    fetched_at: Utc::now(),
                    source: RateSource::Live,
                };
                *self.cached.write().await = Some(rate);
                Ok(rate)
            }
            Err(e) => {
                let cached = self.cached.read().await;
                if let Some(stale) = *cached {
                    tracing::warn!(error = %e, "UF fetch failed, serving stale value");
                    return Ok(stale);
                }
                Err(e)
            }
        }
    }

    /// Force a live fetch, ignoring cache freshness and the fixed override.
    pub async fn refresh(&self) -> Result<UfRate, RateError> {
        let value = self.fetch().await?;
        let rate = UfRate {
            value,
            fetched_at: Utc::now(),
            source: RateSource::Live,
        };
        *self.cached.write().await = Some(rate);
        Ok(rate)
    }

    fn is_fresh(&self, rate: &UfRate) -> bool {
        let age = Utc::now().signed_duration_since(rate.fetched_at);
        age.to_std().map(|age| age < self.ttl).unwrap_or(false)
    }

    async fn fetch(&self) -> Result<f64, RateError> {
        let response = self
            .client
            .get(&self.source_url)
            .send()
            .await
            .map_err(|e| RateError::Fetch(e.to_string()))?
            .error_for_status()
            .map_err(|e| RateError::Fetch(e.to_string()))?;

        let body: IndicatorResponse = response
            .json()
            .await
            .map_err(|e| RateError::Fetch(format!("invalid indicator payload: {}", e)))?;

        let value = body
            .serie
            .first()
            .map(|point| point.valor)
            .ok_or_else(|| RateError::Fetch("indicator payload has no data points".to_string()))?;

        tracing::debug!(value = value, "Fetched UF value");
        Ok(value)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RateError {
    #[error("UF rate fetch failed: {0}")]
    Fetch(String),
}

/// CLP amount for a UF-denominated price.
pub fn uf_to_clp(amount_uf: f64, rate: f64) -> f64 {
    amount_uf * rate
}

/// UF amount for a CLP-denominated price.
pub fn clp_to_uf(amount_clp: f64, rate: f64) -> f64 {
    amount_clp / rate
}

/// Parse a number in Chilean locale ("36.123,45") or plain form ("36123.45").
pub fn parse_chilean_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let normalized = if trimmed.contains(',') {
        // Dots are thousands separators, comma is the decimal mark
        trimmed.replace('.', "").replace(',', ".")
    } else {
        trimmed.to_string()
    };

    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chilean_number() {
        assert_eq!(parse_chilean_number("36.123,45"), Some(36123.45));
        assert_eq!(parse_chilean_number("36123.45"), Some(36123.45));
        assert_eq!(parse_chilean_number("39207"), Some(39207.0));
        assert_eq!(parse_chilean_number("1.234.567,89"), Some(1234567.89));
        assert_eq!(parse_chilean_number("  38.500,5 "), Some(38500.5));
        assert_eq!(parse_chilean_number(""), None);
        assert_eq!(parse_chilean_number("abc"), None);
    }

    #[test]
    fn test_conversions() {
        let rate = 38000.0;
        assert_eq!(uf_to_clp(2.0, rate), 76000.0);
        assert_eq!(clp_to_uf(76000.0, rate), 2.0);
    }

    #[tokio::test]
    async fn test_fixed_value_bypasses_fetch() {
        let mut config = Config::default();
        config.uf_fixed_value = Some("36.123,45".to_string());
        // Unroutable source proves no network call happens
        config.uf_source_url = "http://127.0.0.1:1/api/uf".to_string();

        let cache = RateCache::from_config(&config).unwrap();
        let rate = cache.current().await.unwrap();

        assert_eq!(rate.value, 36123.45);
        assert_eq!(rate.source, RateSource::Fixed);
    }

    #[tokio::test]
    async fn test_fetch_gives_up_on_silent_server() {
        // Accepts the connection and then says nothing; without the client
        // timeout this would hang forever
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(60)).await;
        });

        let mut config = Config::default();
        config.uf_source_url = format!("http://{}/api/uf", addr);
        let cache = RateCache::from_config(&config).unwrap();

        let result = tokio::time::timeout(FETCH_TIMEOUT + Duration::from_secs(5), cache.refresh())
            .await
            .expect("fetch must fail within its timeout");
        assert!(matches!(result, Err(RateError::Fetch(_))));
    }

    #[test]
    fn test_invalid_fixed_value_rejected() {
        let mut config = Config::default();
        config.uf_fixed_value = Some("not-a-number".to_string());
        assert!(RateCache::from_config(&config).is_err());
    }
}
