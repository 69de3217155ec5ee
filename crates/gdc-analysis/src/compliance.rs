//! Compliance Set Engine
//!
//! Combines the theoretical (legal) analysis of each website with what was
//! measured in practice. Websites whose consent mechanism puts them at risk
//! form the sets A and B; those where no tracking was observed form Ao and Bo.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::classifier::{ClassifiedBeacon, ClassifiedCookie, WebsiteClassification};
use crate::error::{AnalysisError, Diagnostic};

// =============================================================================
// Theoretical analysis
// =============================================================================

/// Consent mechanism found on a website.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ConsentType {
    /// No consent mechanism at all
    None,
    NoOption,
    Confirm,
    Other(String),
}

impl From<String> for ConsentType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "none" => ConsentType::None,
            "no_option" => ConsentType::NoOption,
            "confirm" => ConsentType::Confirm,
            _ => ConsentType::Other(s),
        }
    }
}

impl From<&str> for ConsentType {
    fn from(s: &str) -> Self {
        ConsentType::from(s.to_string())
    }
}

impl From<ConsentType> for String {
    fn from(c: ConsentType) -> Self {
        match c {
            ConsentType::None => "none".to_string(),
            ConsentType::NoOption => "no_option".to_string(),
            ConsentType::Confirm => "confirm".to_string(),
            ConsentType::Other(s) => s,
        }
    }
}

impl fmt::Display for ConsentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsentType::None => f.write_str("none"),
            ConsentType::NoOption => f.write_str("no_option"),
            ConsentType::Confirm => f.write_str("confirm"),
            ConsentType::Other(s) => f.write_str(s),
        }
    }
}

/// Legal analysis of one website. Every field is required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TheoreticalRecord {
    pub consent_type: ConsentType,
    pub has_cookies_wall: bool,
    pub default_active: bool,
}

/// Mutually exclusive legal classification of a website.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LegalClass {
    /// No consent mechanism
    A,
    /// A consent mechanism that does not force acceptance
    B,
    Neither,
}

impl TheoreticalRecord {
    pub fn legal_class(&self) -> LegalClass {
        match self.consent_type {
            ConsentType::None => LegalClass::A,
            ConsentType::NoOption | ConsentType::Confirm => LegalClass::Neither,
            ConsentType::Other(_) if !self.has_cookies_wall && !self.default_active => LegalClass::B,
            ConsentType::Other(_) => LegalClass::Neither,
        }
    }
}

pub type TheoreticalAnalysis = BTreeMap<String, TheoreticalRecord>;

pub fn parse_theoretical(json: &str) -> Result<TheoreticalAnalysis, serde_json::Error> {
    serde_json::from_str(json)
}

pub fn load_theoretical(path: &Path) -> Result<TheoreticalAnalysis, AnalysisError> {
    let content = fs::read_to_string(path).map_err(|source| AnalysisError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_theoretical(&content).map_err(|source| AnalysisError::Json {
        path: path.to_path_buf(),
        source,
    })
}

// =============================================================================
// Practical results
// =============================================================================

/// What was measured on one website.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Measurement {
    pub has_tracking: bool,
    pub beacon_count: usize,
}

impl Measurement {
    /// The theoretical risk did not manifest.
    pub fn is_clean(&self) -> bool {
        !self.has_tracking && self.beacon_count == 0
    }
}

/// Classified cookies and beacons keyed by website.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PracticalResults {
    pub cookies: BTreeMap<String, Vec<ClassifiedCookie>>,
    pub beacons: BTreeMap<String, Vec<ClassifiedBeacon>>,
}

impl PracticalResults {
    pub fn from_classifications(classifications: &[WebsiteClassification]) -> Self {
        let mut results = Self::default();
        for c in classifications {
            results.cookies.insert(c.website.clone(), c.cookies.clone());
            results.beacons.insert(c.website.clone(), c.beacons.clone());
        }
        results
    }

    /// Both cookie and beacon results are present for the website.
    pub fn is_available(&self, website: &str) -> bool {
        self.cookies.contains_key(website) && self.beacons.contains_key(website)
    }

    pub fn measurement(&self, website: &str) -> Result<Measurement, AnalysisError> {
        let cookies = self
            .cookies
            .get(website)
            .ok_or_else(|| AnalysisError::missing(website, "cookie classification"))?;
        let beacons = self
            .beacons
            .get(website)
            .ok_or_else(|| AnalysisError::missing(website, "beacon classification"))?;

        Ok(Measurement {
            has_tracking: cookies.iter().any(|c| c.tracking) || beacons.iter().any(|b| b.tracking),
            beacon_count: beacons.len(),
        })
    }
}

// =============================================================================
// Compliance sets
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceSets {
    pub a: BTreeSet<String>,
    pub b: BTreeSet<String>,
    pub ao: BTreeSet<String>,
    pub bo: BTreeSet<String>,
}

impl ComplianceSets {
    /// `|Ao ∪ Bo| / |A ∪ B|`.
    pub fn gdc(&self) -> Result<f64, AnalysisError> {
        let denominator = self.a.union(&self.b).count();
        if denominator == 0 {
            return Err(AnalysisError::degenerate("A and B are both empty"));
        }
        let numerator = self.ao.union(&self.bo).count();
        Ok(numerator as f64 / denominator as f64)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComplianceOutcome {
    pub sets: ComplianceSets,
    /// Websites excluded for lack of practical evidence
    pub diagnostics: Vec<Diagnostic>,
}

/// Build A, B, Ao and Bo.
///
/// Websites without both cookie and beacon results are excluded before
/// classification and reported as diagnostics.
pub fn compute_sets(theoretical: &TheoreticalAnalysis, practical: &PracticalResults) -> ComplianceOutcome {
    let mut outcome = ComplianceOutcome::default();

    for (website, record) in theoretical {
        let measurement = match practical.measurement(website) {
            Ok(m) => m,
            Err(err) => {
                log::warn!("{}", err);
                outcome.diagnostics.push(Diagnostic::from_error(website, &err));
                continue;
            }
        };

        let (set, clean_set) = match record.legal_class() {
            LegalClass::A => (&mut outcome.sets.a, &mut outcome.sets.ao),
            LegalClass::B => (&mut outcome.sets.b, &mut outcome.sets.bo),
            LegalClass::Neither => continue,
        };
        set.insert(website.clone());
        if measurement.is_clean() {
            clean_set.insert(website.clone());
        }
    }

    let sets = &outcome.sets;
    log::info!(
        "|A| = {}, |B| = {}, |Ao| = {}, |Bo| = {} ({} excluded)",
        sets.a.len(),
        sets.b.len(),
        sets.ao.len(),
        sets.bo.len(),
        outcome.diagnostics.len()
    );
    outcome
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetSizes {
    pub a: usize,
    pub b: usize,
    pub ao: usize,
    pub bo: usize,
}

/// Serialisable result of a GdC computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceReport {
    #[serde(flatten)]
    pub sets: ComplianceSets,
    pub sizes: SetSizes,
    pub gdc: f64,
    #[serde(default)]
    pub diagnostics: Vec<Diagnostic>,
}

impl ComplianceReport {
    pub fn from_outcome(outcome: ComplianceOutcome) -> Result<Self, AnalysisError> {
        let gdc = outcome.sets.gdc()?;
        let sizes = SetSizes {
            a: outcome.sets.a.len(),
            b: outcome.sets.b.len(),
            ao: outcome.sets.ao.len(),
            bo: outcome.sets.bo.len(),
        };
        Ok(Self {
            sets: outcome.sets,
            sizes,
            gdc,
            diagnostics: outcome.diagnostics,
        })
    }
}

/// Theoretical analysis plus practical results to a report.
pub fn compute_gdc(
    theoretical: &TheoreticalAnalysis,
    practical: &PracticalResults,
) -> Result<ComplianceReport, AnalysisError> {
    ComplianceReport::from_outcome(compute_sets(theoretical, practical))
}
