//! GdC Analysis
//!
//! Classifies the cookies and web beacons collected per website against the
//! compiled block-lists, aggregates corpus statistics, and computes the
//! compliance sets and the GdC score.
//!
//! # Modules
//!
//! - `evidence`: inspection records and evidence directory loading
//! - `classifier`: tracking verdicts over the rule catalogue
//! - `stats`: mean, standard deviation and rankings
//! - `aggregate`: per-website counts and corpus summary
//! - `compliance`: A, B, Ao, Bo and GdC
//! - `error`: error and diagnostic types

pub mod aggregate;
pub mod classifier;
pub mod compliance;
pub mod error;
pub mod evidence;
pub mod stats;

pub use aggregate::{summarize, CorpusSummary, CountSummary, UsageBreakdown, WebsiteCounts};
pub use classifier::{
    ClassifiedBeacon, ClassifiedCookie, Classifier, ClassifierOptions, ContextMode,
    ExceptionScope, ListPaths, Resource, RuleCatalogue, Verdict, WebsiteClassification,
};
pub use compliance::{
    compute_gdc, compute_sets, load_theoretical, parse_theoretical, ComplianceOutcome,
    ComplianceReport, ComplianceSets, ConsentType, LegalClass, Measurement, PracticalResults,
    TheoreticalAnalysis, TheoreticalRecord,
};
pub use error::{AnalysisError, Diagnostic};
pub use evidence::{load_evidence_dir, Beacon, Cookie, EvidenceCorpus, PartyHosts, WebsiteEvidence};
pub use stats::{RankedEntry, TOP_N};
