use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::country::{Country, CountryName, Currency, Flags};
use crate::error::Result;
use crate::ports::country_client::CountryClient;

type AllFn = Box<dyn Fn() -> Result<Vec<Country>> + Send + Sync>;
type NameFn = Box<dyn Fn(&str) -> Result<Vec<Country>> + Send + Sync>;
type RegionFn = Box<dyn Fn(&str) -> Result<Vec<Country>> + Send + Sync>;
type CodeFn = Box<dyn Fn(&str) -> Result<Country> + Send + Sync>;

#[allow(clippy::struct_field_names)]
pub struct MockCountryClient {
    all_fn: Mutex<AllFn>,
    name_fn: Mutex<NameFn>,
    region_fn: Mutex<RegionFn>,
    code_fn: Mutex<CodeFn>,
}

impl Default for MockCountryClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCountryClient {
    pub fn new() -> Self {
        Self {
            all_fn: Mutex::new(Box::new(|| Ok(Vec::new()))),
            name_fn: Mutex::new(Box::new(|name| {
                Ok(vec![make_country(name, "TST", "Europe", 1_000_000, 1_000.0)])
            })),
            region_fn: Mutex::new(Box::new(|region| {
                Ok(vec![make_country(
                    "Testland", "TST", region, 1_000_000, 1_000.0,
                )])
            })),
            code_fn: Mutex::new(Box::new(|code| {
                Ok(make_country("Testland", code, "Europe", 1_000_000, 1_000.0))
            })),
        }
    }

    #[must_use]
    pub fn with_all(self, f: impl Fn() -> Result<Vec<Country>> + Send + Sync + 'static) -> Self {
        *self.all_fn.lock().unwrap() = Box::new(f);
        self
    }

    #[must_use]
    pub fn with_name(
        self,
        f: impl Fn(&str) -> Result<Vec<Country>> + Send + Sync + 'static,
    ) -> Self {
        *self.name_fn.lock().unwrap() = Box::new(f);
        self
    }

    #[must_use]
    pub fn with_region(
        self,
        f: impl Fn(&str) -> Result<Vec<Country>> + Send + Sync + 'static,
    ) -> Self {
        *self.region_fn.lock().unwrap() = Box::new(f);
        self
    }

    #[must_use]
    pub fn with_code(self, f: impl Fn(&str) -> Result<Country> + Send + Sync + 'static) -> Self {
        *self.code_fn.lock().unwrap() = Box::new(f);
        self
    }
}

#[async_trait]
impl CountryClient for MockCountryClient {
    async fn fetch_all(&self) -> Result<Vec<Country>> {
        let f = self.all_fn.lock().unwrap();
        f()
    }

    async fn get_by_name(&self, name: &str) -> Result<Vec<Country>> {
        let f = self.name_fn.lock().unwrap();
        f(name)
    }

    async fn get_by_region(&self, region: &str) -> Result<Vec<Country>> {
        let f = self.region_fn.lock().unwrap();
        f(region)
    }

    async fn get_by_code(&self, code: &str) -> Result<Country> {
        let f = self.code_fn.lock().unwrap();
        f(code)
    }
}

// --- Factory functions ---

pub fn make_country(name: &str, code: &str, region: &str, population: u64, area: f64) -> Country {
    Country {
        name: CountryName {
            common: name.to_string(),
            official: format!("Republic of {name}"),
        },
        cca2: code.chars().take(2).collect(),
        cca3: code.to_string(),
        capital: vec![format!("{name} City")],
        region: region.to_string(),
        subregion: None,
        population,
        area,
        latlng: vec![10.0, 20.0],
        borders: Vec::new(),
        timezones: vec!["UTC".to_string()],
        currencies: HashMap::from([(
            "TCU".to_string(),
            Currency {
                name: "Test Currency Unit".to_string(),
                symbol: Some("¤".to_string()),
            },
        )]),
        languages: HashMap::from([("tst".to_string(), "Testish".to_string())]),
        flags: Flags::default(),
    }
}
