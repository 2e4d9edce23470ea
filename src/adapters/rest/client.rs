use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};
use url::Url;

use crate::adapters::cache::fetch_cache::FetchCache;
use crate::config::types::ApiConfig;
use crate::domain::country::Country;
use crate::error::{CountryError, Result};
use crate::ports::country_client::CountryClient;

/// Cache key for the unparameterized "fetch everything" request.
pub const ALL_COUNTRIES_KEY: &str = "all-countries";

// Parameterized lookups get disjoint prefixed namespaces so a region and a
// code that share the same literal text ("USA") can never collide.
fn name_key(name: &str) -> String {
    format!("name:{name}")
}

fn region_key(region: &str) -> String {
    format!("region:{region}")
}

fn code_key(code: &str) -> String {
    format!("code:{code}")
}

/// REST Countries v3.1 adapter. Every read goes through the shared
/// [`FetchCache`], so repeated lookups within the TTL cost no network call.
pub struct RestCountriesClient {
    http: Client,
    cache: Arc<FetchCache>,
    config: ApiConfig,
}

impl RestCountriesClient {
    pub fn new(
        config: ApiConfig,
        cache: Arc<FetchCache>,
    ) -> std::result::Result<Self, reqwest::Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            cache,
            config,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<String> {
        let mut url = Url::parse(&self.config.base_url)?;
        url.path_segments_mut()
            .map_err(|()| {
                CountryError::Config(format!(
                    "base URL cannot take path segments: {}",
                    self.config.base_url
                ))
            })?
            .extend(segments);
        Ok(url.to_string())
    }

    async fn fetch_countries(&self, url: &str, query: &str) -> Result<Vec<Country>> {
        debug!(url, "Fetching countries");

        let mut last_error = None;
        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(u64::from(attempt) * 2);
                debug!(attempt, delay_secs = delay.as_secs(), "Retrying request");
                tokio::time::sleep(delay).await;
            }

            match self.http.get(url).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let body = response.text().await.map_err(CountryError::Http)?;
                        return serde_json::from_str(&body).map_err(|e| CountryError::Decode {
                            reason: format!("invalid country payload: {e}"),
                        });
                    }
                    if status.as_u16() == 429 {
                        warn!("Rate limited by REST Countries (429)");
                        last_error = Some(CountryError::RateLimited);
                        continue;
                    }
                    if status.as_u16() == 404 {
                        return Err(CountryError::CountryNotFound {
                            query: query.to_string(),
                        });
                    }
                    last_error = Some(CountryError::Decode {
                        reason: format!("HTTP {status} for {url}"),
                    });
                }
                Err(e) => {
                    warn!(error = %e, attempt, "HTTP request failed");
                    last_error = Some(CountryError::Http(e));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| CountryError::Decode {
            reason: "all retries exhausted".into(),
        }))
    }
}

fn validate_query<'a>(value: &'a str, what: &str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CountryError::InvalidQuery {
            reason: format!("{what} must not be blank"),
        });
    }
    Ok(trimmed)
}

#[async_trait]
impl CountryClient for RestCountriesClient {
    async fn fetch_all(&self) -> Result<Vec<Country>> {
        let url = self.endpoint(&["all"])?;
        self.cache
            .get_or_fetch(ALL_COUNTRIES_KEY, || {
                self.fetch_countries(&url, "all countries")
            })
            .await
    }

    async fn get_by_name(&self, name: &str) -> Result<Vec<Country>> {
        let name = validate_query(name, "country name")?;
        let url = self.endpoint(&["name", name])?;
        self.cache
            .get_or_fetch(&name_key(name), || self.fetch_countries(&url, name))
            .await
    }

    async fn get_by_region(&self, region: &str) -> Result<Vec<Country>> {
        let region = validate_query(region, "region")?;
        let url = self.endpoint(&["region", region])?;
        self.cache
            .get_or_fetch(&region_key(region), || self.fetch_countries(&url, region))
            .await
    }

    async fn get_by_code(&self, code: &str) -> Result<Country> {
        let code = validate_query(code, "country code")?;
        let url = self.endpoint(&["alpha", code])?;
        self.cache
            .get_or_fetch(&code_key(code), || async {
                // The alpha endpoint answers with a one-element list.
                let mut countries = self.fetch_countries(&url, code).await?;
                if countries.is_empty() {
                    return Err(CountryError::CountryNotFound {
                        query: code.to_string(),
                    });
                }
                Ok(countries.remove(0))
            })
            .await
    }
}
