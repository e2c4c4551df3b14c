use tracing::{debug, error, info};

use crate::features::Feature;
use crate::gateway::BrowserDriver;
use crate::harness::feature::{ensure_dependency, run_with_new_session};
use crate::harness::types::RunOptions;
use crate::runner::BatchResult;

/// Whether a batch run includes `feature`
pub fn should_run(feature: &Feature, options: &RunOptions) -> bool {
    feature.accepted || options.test_all
}

/// Run the included features one after another, in input order.
///
/// The dependency is checked once up front; if it is missing nothing runs
/// and every feature counts as failed. Runs never overlap: each feature's
/// session is closed before the next one opens.
pub async fn run_all(
    driver: &dyn BrowserDriver,
    features: &[Feature],
    options: &RunOptions,
) -> BatchResult {
    let mut batch = BatchResult::new(features.len());

    if let Err(err) = ensure_dependency(driver).await {
        error!(error = %err, "cannot run batch");
        batch.failed = features.len();
        batch.error = Some(err.to_string());
        return batch;
    }

    for feature in features {
        if !should_run(feature, options) {
            debug!(feature = %feature.id, "skipping feature that is not accepted yet");
            batch.skipped += 1;
            continue;
        }
        let result = run_with_new_session(driver, feature, options).await;
        batch.record(result);
    }

    info!(
        total = batch.total,
        passed = batch.passed,
        failed = batch.failed,
        skipped = batch.skipped,
        "batch finished"
    );
    batch
}
