//! End-to-end hydration runs against a mock lookup and a temp directory.

use std::collections::HashSet;
use std::fs;
use std::time::Duration;

use hydrator::testing::MockLookup;
use hydrator::{
    read_result_store, HaltReason, HydrateConfig, HydrateError, HydrationOrchestrator,
    IdentifierSource, PersistMode, TweetId,
};
use tempfile::TempDir;

const COOLDOWN: Duration = Duration::from_secs(900);

/// Helper to set up a run directory with the given input ids.
fn setup(ids: &[&str], batch_size: usize) -> (TempDir, HydrateConfig) {
    let dir = TempDir::new().unwrap();
    let config = HydrateConfig::default()
        .rooted_at(dir.path())
        .with_batch_size(batch_size)
        .with_batch_delay(Duration::from_secs(1))
        .with_rate_limit_cooldown(COOLDOWN);

    let mut input = String::from("tweet_id\ttoken\tlabel\n");
    for id in ids {
        input.push_str(&format!("{}\tword\tO\n", id));
    }
    fs::write(&config.input_path, input).unwrap();

    (dir, config)
}

fn lines(path: &std::path::Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

fn result_ids(config: &HydrateConfig) -> Vec<String> {
    read_result_store(&config.output_path)
        .unwrap()
        .into_iter()
        .map(|r| r.tweet_id.to_string())
        .collect()
}

fn ids(values: &[&str]) -> Vec<TweetId> {
    values.iter().map(|v| v.parse().unwrap()).collect()
}

#[tokio::test(start_paused = true)]
async fn test_five_ids_one_missing() {
    let (_dir, config) = setup(&["1", "2", "3", "4", "5"], 2);
    let mock = MockLookup::new().with_tweets(["1", "2", "4", "5"]);

    let summary = HydrationOrchestrator::new(config.clone(), mock.clone())
        .run()
        .await
        .unwrap();

    assert_eq!(result_ids(&config), vec!["1", "2", "4", "5"]);
    assert_eq!(lines(&config.missing_path), vec!["3"]);
    assert_eq!(lines(&config.progress_path), vec!["1", "2", "3", "4", "5"]);

    assert_eq!(summary.batches, 3);
    assert_eq!(summary.hydrated, 4);
    assert_eq!(summary.missing, 1);
    assert_eq!(summary.pending, 0);
    assert!(summary.halted.is_none());

    // Batches cover the remaining ids exactly, in order.
    assert_eq!(
        mock.calls(),
        vec![ids(&["1", "2"]), ids(&["3", "4"]), ids(&["5"])]
    );

    let header = fs::read_to_string(&config.output_path).unwrap();
    assert!(header.starts_with("tweet_id,text,created_at,author_id\n"));
}

#[tokio::test(start_paused = true)]
async fn test_second_run_adds_no_duplicates() {
    let (_dir, config) = setup(&["1", "2", "3", "4", "5"], 2);
    let mock = MockLookup::new().with_tweets(["1", "2", "4", "5"]);

    HydrationOrchestrator::new(config.clone(), mock.clone())
        .run()
        .await
        .unwrap();
    let first_calls = mock.call_count();

    let summary = HydrationOrchestrator::new(config.clone(), mock.clone())
        .run()
        .await
        .unwrap();

    // Only the previously missing id is retried.
    assert_eq!(mock.calls()[first_calls..].to_vec(), vec![ids(&["3"])]);
    assert_eq!(summary.already_hydrated, 4);
    assert_eq!(summary.hydrated, 0);
    let rows = result_ids(&config);
    let unique: HashSet<_> = rows.iter().collect();
    assert_eq!(rows.len(), unique.len());
    assert_eq!(rows.len(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_every_id_lands_in_results_or_missing() {
    let input: Vec<String> = (1..=23).map(|i| i.to_string()).collect();
    let input_refs: Vec<&str> = input.iter().map(String::as_str).collect();
    let (_dir, config) = setup(&input_refs, 5);
    let resolvable: Vec<&str> = input_refs
        .iter()
        .copied()
        .filter(|id| id.len() == 1)
        .collect();
    let mock = MockLookup::new()
        .with_tweets(resolvable)
        .fail_batches_containing("17");

    let summary = HydrationOrchestrator::new(config.clone(), mock)
        .run()
        .await
        .unwrap();

    let hydrated: HashSet<String> = result_ids(&config).into_iter().collect();
    let missing: HashSet<String> = lines(&config.missing_path).into_iter().collect();
    assert!(hydrated.is_disjoint(&missing));
    let all: HashSet<String> = hydrated.union(&missing).cloned().collect();
    assert_eq!(all, input.iter().cloned().collect::<HashSet<_>>());

    // Batch 16..=20 failed as a whole.
    assert_eq!(summary.failed_batches, 1);
    for id in ["16", "17", "18", "19", "20"] {
        assert!(missing.contains(id));
    }
    assert_eq!(lines(&config.progress_path).len(), 23);
}

#[tokio::test(start_paused = true)]
async fn test_restart_resumes_after_persisted_batches() {
    let (_dir, config) = setup(&["1", "2", "3", "4", "5", "6"], 2);
    let mock = MockLookup::new()
        .with_tweets(["1", "2", "3", "4", "5", "6"])
        .rate_limit_batches_containing("3");

    // First run: batch one persists, batch two stays rate limited.
    let limited = config.clone().with_max_rate_limit_retries(1);
    let summary = HydrationOrchestrator::new(limited, mock.clone())
        .run()
        .await
        .unwrap();

    assert_eq!(
        summary.halted,
        Some(HaltReason::RateLimited {
            batch: 1,
            attempts: 2
        })
    );
    assert_eq!(summary.hydrated, 2);
    assert_eq!(summary.pending, 4);
    assert_eq!(result_ids(&config), vec!["1", "2"]);
    // The halted batch is neither progress nor missing.
    assert_eq!(lines(&config.progress_path), vec!["1", "2"]);
    assert!(!config.missing_path.exists());

    // Restart: remaining excludes everything already persisted.
    let workload = IdentifierSource::from_config(&config).load().unwrap();
    assert_eq!(workload.remaining, ids(&["3", "4", "5", "6"]));

    mock.clear_rate_limit();
    let calls_before = mock.call_count();
    let summary = HydrationOrchestrator::new(config.clone(), mock.clone())
        .run()
        .await
        .unwrap();

    assert!(summary.halted.is_none());
    assert_eq!(
        mock.calls()[calls_before..].to_vec(),
        vec![ids(&["3", "4"]), ids(&["5", "6"])]
    );
    assert_eq!(result_ids(&config), vec!["1", "2", "3", "4", "5", "6"]);
    assert_eq!(lines(&config.progress_path), vec!["1", "2", "3", "4", "5", "6"]);
}

#[tokio::test(start_paused = true)]
async fn test_single_rate_limit_costs_one_cooldown() {
    let (_dir, config) = setup(&["1", "2", "3"], 100);
    let mock = MockLookup::new().with_tweets(["1", "3"]).rate_limit_next(1);

    let start = tokio::time::Instant::now();
    let summary = HydrationOrchestrator::new(config.clone(), mock.clone())
        .run()
        .await
        .unwrap();

    assert_eq!(summary.rate_limit_waits, 1);
    assert_eq!(start.elapsed(), COOLDOWN);
    assert_eq!(mock.calls(), vec![ids(&["1", "2", "3"]), ids(&["1", "2", "3"])]);
    assert_eq!(result_ids(&config), vec!["1", "3"]);
    assert_eq!(lines(&config.missing_path), vec!["2"]);
    // Progress is written once, after the retried attempt concludes.
    assert_eq!(lines(&config.progress_path), vec!["1", "2", "3"]);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_exhaustion_halts_without_misclassifying() {
    let (_dir, config) = setup(&["1", "2", "3"], 2);
    let config = config.with_max_rate_limit_retries(2);
    let mock = MockLookup::new().with_tweets(["1", "2", "3"]).always_rate_limited();

    let start = tokio::time::Instant::now();
    let summary = HydrationOrchestrator::new(config.clone(), mock.clone())
        .run()
        .await
        .unwrap();

    assert_eq!(
        summary.halted,
        Some(HaltReason::RateLimited {
            batch: 0,
            attempts: 3
        })
    );
    assert_eq!(start.elapsed(), COOLDOWN * 2);
    assert_eq!(mock.call_count(), 3);
    assert_eq!(summary.pending, 3);
    assert!(!config.output_path.exists());
    assert!(!config.progress_path.exists());
    assert!(!config.missing_path.exists());

    // Once the limit lifts, a rerun finishes the job.
    mock.clear_rate_limit();
    let summary = HydrationOrchestrator::new(config.clone(), mock)
        .run()
        .await
        .unwrap();
    assert!(summary.halted.is_none());
    assert_eq!(result_ids(&config), vec!["1", "2", "3"]);
}

#[tokio::test(start_paused = true)]
async fn test_missing_file_holds_only_this_runs_ids() {
    let (_dir, config) = setup(&["1", "2", "3"], 10);
    fs::write(&config.missing_path, "999\n888\n").unwrap();
    let mock = MockLookup::new().with_tweets(["1", "3"]);

    HydrationOrchestrator::new(config.clone(), mock)
        .run()
        .await
        .unwrap();

    assert_eq!(lines(&config.missing_path), vec!["2"]);
}

#[tokio::test(start_paused = true)]
async fn test_fully_resolved_rerun_keeps_previous_missing_list() {
    let (_dir, config) = setup(&["1", "2", "3"], 10);
    let first = MockLookup::new().with_tweets(["1", "3"]);
    HydrationOrchestrator::new(config.clone(), first)
        .run()
        .await
        .unwrap();
    assert_eq!(lines(&config.missing_path), vec!["2"]);

    // Tweet 2 becomes resolvable; nothing is missing this time.
    let second = MockLookup::new().with_tweets(["2"]);
    let summary = HydrationOrchestrator::new(config.clone(), second.clone())
        .run()
        .await
        .unwrap();

    assert_eq!(second.calls(), vec![ids(&["2"])]);
    assert_eq!(summary.missing, 0);
    assert_eq!(result_ids(&config), vec!["1", "3", "2"]);
    assert_eq!(lines(&config.missing_path), vec!["2"]);

    // Nothing left to do: the list is still untouched.
    HydrationOrchestrator::new(config.clone(), MockLookup::new())
        .run()
        .await
        .unwrap();
    assert_eq!(lines(&config.missing_path), vec!["2"]);
}

#[tokio::test(start_paused = true)]
async fn test_append_mode_produces_same_results() {
    let (_dir_a, rewrite) = setup(&["1", "2", "3", "4", "5"], 2);
    let (_dir_b, append) = setup(&["1", "2", "3", "4", "5"], 2);
    let append = append.with_persist_mode(PersistMode::Append);
    let mock = MockLookup::new().with_tweets(["1", "2", "4", "5"]);

    HydrationOrchestrator::new(rewrite.clone(), mock.clone())
        .run()
        .await
        .unwrap();
    HydrationOrchestrator::new(append.clone(), mock.clone())
        .run()
        .await
        .unwrap();

    assert_eq!(
        fs::read_to_string(&rewrite.output_path).unwrap(),
        fs::read_to_string(&append.output_path).unwrap()
    );
}

#[tokio::test]
async fn test_malformed_input_fails_before_any_call() {
    let (_dir, config) = setup(&["1", "x2"], 2);
    let mock = MockLookup::new().with_tweets(["1"]);

    let err = HydrationOrchestrator::new(config.clone(), mock.clone())
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, HydrateError::MalformedInput { line: 3, .. }));
    assert_eq!(mock.call_count(), 0);
    assert!(!config.progress_path.exists());
}

#[tokio::test]
async fn test_malformed_result_store_fails_before_any_call() {
    let (_dir, config) = setup(&["1"], 2);
    fs::write(&config.output_path, "garbage\n\"unterminated\n").unwrap();
    let mock = MockLookup::new().with_tweets(["1"]);

    let err = HydrationOrchestrator::new(config.clone(), mock.clone())
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, HydrateError::ResultStore { .. }));
    assert_eq!(mock.call_count(), 0);
    // Prior work is left untouched.
    assert_eq!(
        fs::read_to_string(&config.output_path).unwrap(),
        "garbage\n\"unterminated\n"
    );
}
