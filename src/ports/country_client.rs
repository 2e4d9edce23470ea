use async_trait::async_trait;

use crate::domain::country::Country;
use crate::error::Result;

/// Country codes warmed into the cache at startup, the ones users ask for
/// most often.
pub const POPULAR_CODES: [&str; 8] = ["USA", "GBR", "CAN", "DEU", "JPN", "AUS", "FRA", "IND"];

#[async_trait]
pub trait CountryClient: Send + Sync {
    async fn fetch_all(&self) -> Result<Vec<Country>>;
    async fn get_by_name(&self, name: &str) -> Result<Vec<Country>>;
    async fn get_by_region(&self, region: &str) -> Result<Vec<Country>>;
    async fn get_by_code(&self, code: &str) -> Result<Country>;

    /// Warm the cache for [`POPULAR_CODES`]. Returns the fetched countries.
    async fn prefetch_popular(&self) -> Result<Vec<Country>> {
        let mut countries = Vec::with_capacity(POPULAR_CODES.len());
        for code in POPULAR_CODES {
            countries.push(self.get_by_code(code).await?);
        }
        Ok(countries)
    }
}
