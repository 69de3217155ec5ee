use std::collections::BTreeMap;
use std::sync::Arc;

use gdc_analysis::{Classifier, ClassifierOptions, RuleCatalogue, WebsiteClassification, WebsiteEvidence};

/// Classify every website on the blocking pool and re-join by website id.
///
/// The catalogue is shared read-only; each task owns its website. Results come
/// back ordered by website id regardless of completion order.
pub fn classify_parallel(
    catalogue: Arc<RuleCatalogue>,
    options: ClassifierOptions,
    websites: Vec<WebsiteEvidence>,
    workers: usize,
) -> Result<Vec<WebsiteClassification>, String> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .max_blocking_threads(workers.max(1))
        .build()
        .map_err(|e| format!("Failed to start tokio runtime: {}", e))?;

    runtime.block_on(async move {
        let mut handles = Vec::with_capacity(websites.len());
        for website in websites {
            let catalogue = Arc::clone(&catalogue);
            handles.push(tokio::task::spawn_blocking(move || {
                Classifier::new(&catalogue, options).classify_website(&website)
            }));
        }

        let mut results = BTreeMap::new();
        for handle in handles {
            let classification = handle
                .await
                .map_err(|e| format!("Classification task failed: {}", e))?;
            results.insert(classification.website.clone(), classification);
        }
        Ok::<_, String>(results.into_values().collect())
    })
}
