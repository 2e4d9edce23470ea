#![allow(clippy::cast_precision_loss)] // Counts are small enough for f64
#![allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::country::{Country, group_thousands};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionCount {
    pub region: String,
    pub count: u32,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedCountry {
    pub name: String,
    pub code: String,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountryStatistics {
    pub region_filter: Option<String>,
    pub total_countries: u32,
    pub total_population: u64,
    pub average_population: Option<f64>,
    pub total_area: f64,
    pub regions: Vec<RegionCount>,
    pub top_by_population: Vec<RankedCountry>,
    pub top_by_area: Vec<RankedCountry>,
    pub top_by_density: Vec<RankedCountry>,
}

// ---------------------------------------------------------------------------
// Computation
// ---------------------------------------------------------------------------

/// Aggregate statistics over a country set, optionally restricted to one
/// region. Rankings are sorted descending and capped at `top_n`; the density
/// ranking skips countries with no reported land area.
pub fn compute_statistics(
    region_filter: Option<&str>,
    countries: &[Country],
    top_n: usize,
) -> CountryStatistics {
    let filtered: Vec<&Country> = match region_filter {
        Some(region) => countries
            .iter()
            .filter(|c| c.region.eq_ignore_ascii_case(region))
            .collect(),
        None => countries.iter().collect(),
    };

    let total_countries = filtered.len() as u32;
    let total_population: u64 = filtered.iter().map(|c| c.population).sum();
    let average_population = if filtered.is_empty() {
        None
    } else {
        Some(total_population as f64 / filtered.len() as f64)
    };
    let total_area: f64 = filtered.iter().map(|c| c.area).sum();

    let mut region_counts: HashMap<&str, u32> = HashMap::new();
    for country in &filtered {
        if !country.region.is_empty() {
            *region_counts.entry(country.region.as_str()).or_default() += 1;
        }
    }
    let mut regions: Vec<RegionCount> = region_counts
        .into_iter()
        .map(|(region, count)| RegionCount {
            region: region.to_string(),
            count,
            percentage: if total_countries == 0 {
                0.0
            } else {
                f64::from(count) / f64::from(total_countries) * 100.0
            },
        })
        .collect();
    regions.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.region.cmp(&b.region)));

    let top_by_population = rank(&filtered, top_n, |c| Some(c.population as f64));
    let top_by_area = rank(&filtered, top_n, |c| (c.area > 0.0).then_some(c.area));
    let top_by_density = rank(&filtered, top_n, Country::density);

    CountryStatistics {
        region_filter: region_filter.map(str::to_string),
        total_countries,
        total_population,
        average_population,
        total_area,
        regions,
        top_by_population,
        top_by_area,
        top_by_density,
    }
}

fn rank(
    countries: &[&Country],
    top_n: usize,
    metric: impl Fn(&Country) -> Option<f64>,
) -> Vec<RankedCountry> {
    let mut ranked: Vec<RankedCountry> = countries
        .iter()
        .filter_map(|c| {
            metric(c).map(|value| RankedCountry {
                name: c.name.common.clone(),
                code: c.cca3.clone(),
                value,
            })
        })
        .collect();
    ranked.sort_by(|a, b| b.value.total_cmp(&a.value));
    ranked.truncate(top_n);
    ranked
}

// ---------------------------------------------------------------------------
// Display impls
// ---------------------------------------------------------------------------

impl std::fmt::Display for CountryStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.region_filter {
            Some(ref region) => writeln!(f, "# Statistics: {region}")?,
            None => writeln!(f, "# World Statistics")?,
        }
        writeln!(f, "Countries: {}", self.total_countries)?;
        writeln!(
            f,
            "Total population: {}",
            group_thousands(self.total_population)
        )?;
        if let Some(avg) = self.average_population {
            writeln!(f, "Average population: {}", group_thousands(avg as u64))?;
        }
        if self.total_area > 0.0 {
            writeln!(f, "Total area: {:.0} km²", self.total_area)?;
        }
        if !self.regions.is_empty() {
            writeln!(f, "\nRegions:")?;
            for rc in &self.regions {
                writeln!(
                    f,
                    "  {} — {} ({:.1}%)",
                    rc.region, rc.count, rc.percentage
                )?;
            }
        }
        write_ranking(f, "Top by population", &self.top_by_population, |v| {
            group_thousands(v as u64)
        })?;
        write_ranking(f, "Top by area", &self.top_by_area, |v| {
            format!("{v:.0} km²")
        })?;
        write_ranking(f, "Top by density", &self.top_by_density, |v| {
            format!("{v:.1} people/km²")
        })?;
        Ok(())
    }
}

fn write_ranking(
    f: &mut std::fmt::Formatter<'_>,
    title: &str,
    ranked: &[RankedCountry],
    fmt_value: impl Fn(f64) -> String,
) -> std::fmt::Result {
    if ranked.is_empty() {
        return Ok(());
    }
    writeln!(f, "\n{title}:")?;
    for (i, entry) in ranked.iter().enumerate() {
        writeln!(
            f,
            "  {}. {} ({}) — {}",
            i + 1,
            entry.name,
            entry.code,
            fmt_value(entry.value)
        )?;
    }
    Ok(())
}
