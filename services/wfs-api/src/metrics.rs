//! Prometheus counters for the WFS service.

use metrics::counter;

use wfs_protocol::ActionKind;

/// Count a dispatched request.
pub fn record_request(operation: &'static str) {
    counter!("wfs_requests_total", "operation" => operation).increment(1);
}

/// Count an exception report sent to a client.
pub fn record_exception(code: &'static str) {
    counter!("wfs_exceptions_total", "code" => code).increment(1);
}

/// Count the outcome of a GetFeature.
pub fn record_features(returned: usize, skipped: usize) {
    counter!("wfs_features_returned_total").increment(returned as u64);
    if skipped > 0 {
        counter!("wfs_features_skipped_total").increment(skipped as u64);
    }
}

/// Count one executed transaction sub-operation.
pub fn record_transaction_operation(kind: ActionKind, success: bool) {
    let outcome = if success { "success" } else { "failure" };
    counter!(
        "wfs_transaction_operations_total",
        "kind" => kind.as_str(),
        "outcome" => outcome
    )
    .increment(1);
}
