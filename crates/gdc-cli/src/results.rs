use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use gdc_analysis::{
    ClassifiedBeacon, ClassifiedCookie, PartyHosts, PracticalResults, WebsiteClassification,
};

pub const COOKIE_RESULTS: &str = "cookie-results.json";
pub const COOKIE_DOMAIN_RESULTS: &str = "domain-cookie-results.json";
pub const BEACON_RESULTS: &str = "beacons-results.json";
pub const BEACON_DOMAIN_RESULTS: &str = "domain-beacons-results.json";
pub const SUMMARY: &str = "summary.json";
pub const COMPLIANCE: &str = "compliance.json";

/// Per-website result files, keyed by website id.
#[derive(Debug, Clone, Default)]
pub struct ResultFiles {
    pub cookies: BTreeMap<String, Vec<ClassifiedCookie>>,
    pub cookie_domains: BTreeMap<String, PartyHosts>,
    pub beacons: BTreeMap<String, Vec<ClassifiedBeacon>>,
    pub beacon_domains: BTreeMap<String, PartyHosts>,
}

impl ResultFiles {
    pub fn from_classifications(classifications: &[WebsiteClassification]) -> Self {
        let mut files = Self::default();
        for c in classifications {
            files.cookies.insert(c.website.clone(), c.cookies.clone());
            files.cookie_domains.insert(c.website.clone(), c.cookie_hosts.clone());
            files.beacons.insert(c.website.clone(), c.beacons.clone());
            files.beacon_domains.insert(c.website.clone(), c.beacon_hosts.clone());
        }
        files
    }

    pub fn write(&self, dir: &Path) -> Result<(), String> {
        write_json(&dir.join(COOKIE_RESULTS), &self.cookies)?;
        write_json(&dir.join(COOKIE_DOMAIN_RESULTS), &self.cookie_domains)?;
        write_json(&dir.join(BEACON_RESULTS), &self.beacons)?;
        write_json(&dir.join(BEACON_DOMAIN_RESULTS), &self.beacon_domains)?;
        Ok(())
    }

    pub fn into_practical(self) -> PracticalResults {
        PracticalResults {
            cookies: self.cookies,
            beacons: self.beacons,
        }
    }
}

/// Cookie and beacon results previously written to `dir`.
pub fn read_practical(dir: &Path) -> Result<PracticalResults, String> {
    Ok(PracticalResults {
        cookies: read_json(&dir.join(COOKIE_RESULTS))?,
        beacons: read_json(&dir.join(BEACON_RESULTS))?,
    })
}

pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create '{}': {}", parent.display(), e))?;
    }
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| format!("Failed to serialize '{}': {}", path.display(), e))?;
    fs::write(path, json).map_err(|e| format!("Failed to write '{}': {}", path.display(), e))
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read '{}': {}", path.display(), e))?;
    serde_json::from_str(&content).map_err(|e| format!("Invalid JSON in '{}': {}", path.display(), e))
}
