use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountryName {
    pub common: String,
    #[serde(default)]
    pub official: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Flags {
    #[serde(default)]
    pub png: String,
    #[serde(default)]
    pub svg: String,
    #[serde(default)]
    pub alt: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Currency {
    pub name: String,
    #[serde(default)]
    pub symbol: Option<String>,
}

/// Subset of the REST Countries v3.1 payload. Unknown provider fields are
/// ignored; fields the provider omits for some countries are defaulted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Country {
    pub name: CountryName,
    #[serde(default)]
    pub cca2: String,
    #[serde(default)]
    pub cca3: String,
    #[serde(default)]
    pub capital: Vec<String>,
    pub region: String,
    #[serde(default)]
    pub subregion: Option<String>,
    pub population: u64,
    #[serde(default)]
    pub area: f64,
    #[serde(default)]
    pub latlng: Vec<f64>,
    #[serde(default)]
    pub borders: Vec<String>,
    #[serde(default)]
    pub timezones: Vec<String>,
    #[serde(default)]
    pub currencies: HashMap<String, Currency>,
    #[serde(default)]
    pub languages: HashMap<String, String>,
    #[serde(default)]
    pub flags: Flags,
}

impl Country {
    /// Population per km², `None` when the provider reports no land area.
    #[allow(clippy::cast_precision_loss)]
    pub fn density(&self) -> Option<f64> {
        if self.area > 0.0 {
            Some(self.population as f64 / self.area)
        } else {
            None
        }
    }
}

pub fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

impl std::fmt::Display for Country {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "# {}", self.name.common)?;
        if !self.name.official.is_empty() && self.name.official != self.name.common {
            writeln!(f, "Official name: {}", self.name.official)?;
        }
        if !self.cca2.is_empty() || !self.cca3.is_empty() {
            writeln!(f, "Codes: {} / {}", self.cca2, self.cca3)?;
        }
        if !self.capital.is_empty() {
            writeln!(f, "Capital: {}", self.capital.join(", "))?;
        }
        write!(f, "Region: {}", self.region)?;
        if let Some(ref sub) = self.subregion {
            write!(f, " ({sub})")?;
        }
        writeln!(f)?;
        writeln!(f, "Population: {}", group_thousands(self.population))?;
        if self.area > 0.0 {
            writeln!(f, "Area: {:.0} km²", self.area)?;
        }
        if let Some(density) = self.density() {
            writeln!(f, "Density: {density:.1} people/km²")?;
        }
        if self.latlng.len() == 2 {
            writeln!(f, "Coordinates: {:.1}, {:.1}", self.latlng[0], self.latlng[1])?;
        }
        if !self.languages.is_empty() {
            let mut languages: Vec<&str> = self.languages.values().map(String::as_str).collect();
            languages.sort_unstable();
            writeln!(f, "Languages: {}", languages.join(", "))?;
        }
        if !self.currencies.is_empty() {
            let mut currencies: Vec<String> = self
                .currencies
                .values()
                .map(|c| match c.symbol {
                    Some(ref symbol) => format!("{} ({symbol})", c.name),
                    None => c.name.clone(),
                })
                .collect();
            currencies.sort_unstable();
            writeln!(f, "Currencies: {}", currencies.join(", "))?;
        }
        if !self.borders.is_empty() {
            writeln!(f, "Borders: {}", self.borders.join(", "))?;
        }
        if !self.timezones.is_empty() {
            writeln!(f, "Timezones: {}", self.timezones.join(", "))?;
        }
        if !self.flags.svg.is_empty() {
            writeln!(f, "Flag: {}", self.flags.svg)?;
        }
        Ok(())
    }
}
