//! Report ordering by best primary-contestant metric.

use crate::models::Report;

/// Sort reports by their best attempt's primary metric, highest first.
///
/// The sort is stable: reports with equal scores keep their input order.
/// Reports without attempts or contestants score 0.
pub fn sort_reports(reports: &mut [Report]) {
    reports.sort_by(|a, b| b.best_metric().total_cmp(&a.best_metric()));
}

/// Keep at most `limit` reports. `None` keeps everything.
pub fn apply_limit(reports: &mut Vec<Report>, limit: Option<usize>) {
    if let Some(limit) = limit {
        reports.truncate(limit);
    }
}
