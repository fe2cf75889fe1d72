//! Country/State Directory
//!
//! Lookup tables for the address selections. No business logic.

use serde::Deserialize;

use crate::address::Region;
use crate::error::Result;

const EMBEDDED_DIRECTORY: &str = include_str!("../data/directory.json");

/// Directory lookup trait
pub trait Directory: Send + Sync {
    /// All countries, sorted by name
    fn countries(&self) -> Vec<Region>;

    /// Subdivisions of a country; empty for unknown codes
    fn states(&self, country_code: &str) -> Vec<Region>;
}

#[derive(Debug, Deserialize)]
struct CountryEntry {
    code: String,
    name: String,
    #[serde(default)]
    states: Vec<Region>,
}

/// Directory backed by a JSON table
#[derive(Debug)]
pub struct StaticDirectory {
    countries: Vec<CountryEntry>,
}

impl StaticDirectory {
    /// Parse a JSON table of `{code, name, states: [{code, name}]}` entries
    pub fn from_json(json: &str) -> Result<Self> {
        let mut countries: Vec<CountryEntry> = serde_json::from_str(json)?;
        countries.sort_by(|a, b| a.name.cmp(&b.name));
        for country in &mut countries {
            country.states.sort_by(|a, b| a.name.cmp(&b.name));
        }
        Ok(Self { countries })
    }

    /// The table shipped with the crate
    pub fn embedded() -> Result<Self> {
        Self::from_json(EMBEDDED_DIRECTORY)
    }
}

impl Directory for StaticDirectory {
    fn countries(&self) -> Vec<Region> {
        self.countries
            .iter()
            .map(|c| Region::new(&c.code, &c.name))
            .collect()
    }

    fn states(&self, country_code: &str) -> Vec<Region> {
        self.countries
            .iter()
            .find(|c| c.code.eq_ignore_ascii_case(country_code.trim()))
            .map(|c| c.states.clone())
            .unwrap_or_default()
    }
}
