//! Descriptive statistics and rankings over per-website counts.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

/// Number of entries kept by rankings.
pub const TOP_N: usize = 10;

pub fn mean(values: &[f64]) -> Result<f64, AnalysisError> {
    if values.is_empty() {
        return Err(AnalysisError::degenerate("mean of an empty sample"));
    }
    Ok(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (n - 1 denominator).
pub fn sample_std_dev(values: &[f64]) -> Result<f64, AnalysisError> {
    if values.len() < 2 {
        return Err(AnalysisError::degenerate(format!(
            "standard deviation needs at least 2 values, got {}",
            values.len()
        )));
    }
    let m = mean(values)?;
    let sum_sq: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    Ok((sum_sq / (values.len() - 1) as f64).sqrt())
}

/// A labelled count in a ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub label: String,
    pub count: usize,
}

impl RankedEntry {
    pub fn new(label: impl Into<String>, count: usize) -> Self {
        Self {
            label: label.into(),
            count,
        }
    }
}

/// The `n` largest counts, descending. Ties keep input order.
pub fn top_n(entries: &[RankedEntry], n: usize) -> Vec<RankedEntry> {
    let mut ranked = entries.to_vec();
    // stable sort
    ranked.sort_by(|a, b| b.count.cmp(&a.count));
    ranked.truncate(n);
    ranked
}

/// Occurrence count per distinct label, in first-seen order.
pub fn count_occurrences<I, S>(labels: I) -> Vec<RankedEntry>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut counts: Vec<RankedEntry> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for label in labels {
        let label = label.as_ref();
        match index.get(label) {
            Some(&i) => counts[i].count += 1,
            None => {
                index.insert(label.to_string(), counts.len());
                counts.push(RankedEntry::new(label, 1));
            }
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_and_std_dev() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((mean(&values).unwrap() - 5.0).abs() < 1e-12);
        // sample variance = 32 / 7
        let expected = (32.0f64 / 7.0).sqrt();
        assert!((sample_std_dev(&values).unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn degenerate_samples() {
        assert!(matches!(mean(&[]), Err(AnalysisError::DegenerateInput(_))));
        assert!(matches!(
            sample_std_dev(&[3.0]),
            Err(AnalysisError::DegenerateInput(_))
        ));
        assert_eq!(sample_std_dev(&[3.0, 3.0]).unwrap(), 0.0);
    }

    #[test]
    fn top_n_is_stable() {
        let entries = vec![
            RankedEntry::new("a", 1),
            RankedEntry::new("b", 3),
            RankedEntry::new("c", 3),
            RankedEntry::new("d", 2),
        ];
        let top = top_n(&entries, 3);
        let labels: Vec<&str> = top.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["b", "c", "d"]);

        assert_eq!(top_n(&entries, 10).len(), 4);
    }

    #[test]
    fn occurrences_in_first_seen_order() {
        let counts = count_occurrences(["x.com", "y.com", "x.com", "z.com", "x.com"]);
        assert_eq!(
            counts,
            vec![
                RankedEntry::new("x.com", 3),
                RankedEntry::new("y.com", 1),
                RankedEntry::new("z.com", 1),
            ]
        );
    }
}
