use std::time::Duration;

use pretty_assertions::assert_eq;

use super::helpers::DataTree;
use crate::{
  cache::{DirectoryCheck, DirectoryState, diagnostics::recommendations, run_diagnostics},
  model::CacheDomain,
  scan::ConcurrencyLimiter,
};

#[tokio::test]
async fn test_diagnostics_time_each_domain_in_order() {
  let tree = DataTree::populated();
  tree.write_settings("Broken", "<ScriptureText>");

  let report = run_diagnostics(&tree.scanners(), &ConcurrencyLimiter::new(2)).await;

  let order: Vec<_> = report.timings.iter().map(|t| t.domain).collect();
  assert_eq!(
    order,
    vec![CacheDomain::Project, CacheDomain::Translation, CacheDomain::Scripture]
  );

  let project = &report.timings[0];
  assert_eq!(project.item_count, 2);
  assert_eq!(project.failure_count, 1);
  assert!(project.root_error.is_none());

  let shares: f64 = report.timings.iter().map(|t| t.share).sum();
  assert!(shares <= 1.0 + f64::EPSILON);
  assert!(report.directories.iter().all(DirectoryCheck::is_usable));
  assert!(report.recommendations.is_empty());
}

#[tokio::test]
async fn test_diagnostics_report_missing_roots() {
  let tree = DataTree::populated();
  std::fs::remove_dir_all(tree.domain_root(CacheDomain::Project)).unwrap();

  let report = run_diagnostics(&tree.scanners(), &ConcurrencyLimiter::new(2)).await;

  assert_eq!(report.directories[0].domain, CacheDomain::Project);
  assert_eq!(report.directories[0].state, DirectoryState::Missing);
  assert!(report.timings[0].root_error.is_some());
  assert_eq!(report.timings[0].item_count, 0);
  assert_eq!(report.timings[2].item_count, 2);
}

#[test]
fn test_directory_check_counts_files_recursively() {
  let tree = DataTree::populated();
  let check = DirectoryCheck::inspect(CacheDomain::Translation, &tree.domain_root(CacheDomain::Translation));
  // config.yml plus two drafts
  assert_eq!(check.state, DirectoryState::Ok { file_count: 3 });

  let file = tree.add_scripture("x", "a\nb\nc\n");
  let check = DirectoryCheck::inspect(CacheDomain::Scripture, &file);
  assert_eq!(check.state, DirectoryState::NotADirectory);
}

#[test]
fn test_recommendations_follow_thresholds() {
  let fast = [
    (CacheDomain::Scripture, Duration::from_secs(10)),
    (CacheDomain::Translation, Duration::from_secs(5)),
  ];
  assert!(recommendations(&fast, Duration::from_secs(30)).is_empty());

  let slow = [
    (CacheDomain::Scripture, Duration::from_secs(11)),
    (CacheDomain::Translation, Duration::from_secs(6)),
  ];
  let subjects: Vec<_> = recommendations(&slow, Duration::from_secs(31))
    .into_iter()
    .map(|r| r.subject)
    .collect();
  assert_eq!(
    subjects,
    vec![
      "Scripture scanning is slow".to_string(),
      "Translation scanning is slow".to_string(),
      "Overall startup is very slow".to_string(),
    ]
  );
}
