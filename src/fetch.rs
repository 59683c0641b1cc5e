//! Metadata Fetcher
//!
//! Retrieves table metadata for a list of names with bounded concurrency.
//! Every retrieval runs as its own task and hands its result back to a
//! single aggregating loop; no map is shared between tasks.

use crate::accessor::Accessor;
use crate::config::FetchConfig;
use crate::error::{AccessError, Side, SyncError, SyncResult};
use crate::schema::{NamedObjects, ObjectKind, Table};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Tuning for one fetch phase
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Maximum concurrent retrievals
    pub workers: usize,
    /// Attempts per object when the accessor reports a transient error
    pub max_attempts: u32,
    /// Base delay between attempts, multiplied by the attempt number
    pub retry_backoff: Duration,
    /// Stop scheduling and abort in-flight retrievals on the first failure
    pub fail_fast: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self::from(&FetchConfig::default())
    }
}

impl From<&FetchConfig> for FetchOptions {
    fn from(config: &FetchConfig) -> Self {
        Self {
            workers: config.workers.max(1),
            max_attempts: config.max_attempts.max(1),
            retry_backoff: Duration::from_millis(200),
            fail_fast: true,
        }
    }
}

/// A retrieval that did not produce a table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    pub name: String,
    pub error: AccessError,
    pub attempts: u32,
}

impl FetchFailure {
    /// True when the last error was transient and attempts simply ran out
    pub fn is_retryable(&self) -> bool {
        self.error.is_retryable()
    }
}

/// Aggregated result of one fetch phase
#[derive(Debug)]
pub struct FetchOutcome {
    /// Retrieved tables, in listing order
    pub tables: NamedObjects<Table>,
    pub failures: Vec<FetchFailure>,
}

impl FetchOutcome {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Strict policy: a partial snapshot is an error
    pub fn into_complete(self, side: Side) -> SyncResult<NamedObjects<Table>> {
        match self.failures.into_iter().next() {
            None => Ok(self.tables),
            Some(failure) => Err(SyncError::Fetch {
                kind: ObjectKind::Table,
                side,
                name: failure.name,
                source: failure.error,
            }),
        }
    }
}

pub struct MetadataFetcher {
    options: FetchOptions,
}

impl MetadataFetcher {
    pub fn new(options: FetchOptions) -> Self {
        Self { options }
    }

    /// Fetch every named table. Returns only once no retrieval is in flight.
    pub async fn fetch_tables(
        &self,
        accessor: Arc<dyn Accessor>,
        names: &[String],
    ) -> SyncResult<FetchOutcome> {
        let mut seen = HashSet::with_capacity(names.len());
        for name in names {
            if !seen.insert(name.as_str()) {
                return Err(SyncError::DuplicateName {
                    kind: ObjectKind::Table,
                    name: name.clone(),
                });
            }
        }

        let semaphore = Arc::new(Semaphore::new(self.options.workers.max(1)));
        let mut tasks = JoinSet::new();
        let mut slots: Vec<Option<Table>> = vec![None; names.len()];
        let mut failures = Vec::new();

        for (index, name) in names.iter().enumerate() {
            // Drain finished tasks while waiting so a failure is seen early
            let permit = loop {
                if self.options.fail_fast && !failures.is_empty() {
                    break None;
                }
                tokio::select! {
                    permit = semaphore.clone().acquire_owned() => {
                        break Some(permit.map_err(|e| SyncError::Internal(e.to_string()))?);
                    }
                    Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                        Self::collect(joined, &mut slots, &mut failures)?;
                    }
                }
            };
            let Some(permit) = permit else { break };

            let accessor = accessor.clone();
            let name = name.clone();
            let max_attempts = self.options.max_attempts.max(1);
            let backoff = self.options.retry_backoff;

            tasks.spawn(async move {
                let _permit = permit;
                let result = Self::fetch_one(accessor.as_ref(), &name, max_attempts, backoff).await;
                (index, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            Self::collect(joined, &mut slots, &mut failures)?;
            if self.options.fail_fast && !failures.is_empty() {
                tasks.shutdown().await;
                break;
            }
        }

        // Names were checked distinct and each slot holds the table it asked for
        let mut tables = NamedObjects::with_capacity(names.len());
        for table in slots.into_iter().flatten() {
            let _ = tables.insert(table.name.clone(), table);
        }

        debug!(
            "Fetched {} of {} tables ({} failures)",
            tables.len(),
            names.len(),
            failures.len()
        );

        Ok(FetchOutcome { tables, failures })
    }

    fn collect(
        joined: Result<(usize, Result<Table, FetchFailure>), tokio::task::JoinError>,
        slots: &mut [Option<Table>],
        failures: &mut Vec<FetchFailure>,
    ) -> SyncResult<()> {
        let (index, result) =
            joined.map_err(|e| SyncError::Internal(format!("fetch task failed: {}", e)))?;
        match result {
            Ok(table) => {
                if let Some(slot) = slots.get_mut(index) {
                    *slot = Some(table);
                }
            }
            Err(failure) => failures.push(failure),
        }
        Ok(())
    }

    async fn fetch_one(
        accessor: &dyn Accessor,
        name: &str,
        max_attempts: u32,
        backoff: Duration,
    ) -> Result<Table, FetchFailure> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            debug!("get table info: {} (attempt {})", name, attempt);

            let error = match accessor.get_table_detail(name).await {
                Ok(table) if table.name == name => return Ok(table),
                Ok(table) => AccessError::Fatal(format!(
                    "requested table {} but received {}",
                    name, table.name
                )),
                Err(e) => e,
            };

            if error.is_retryable() && attempt < max_attempts {
                warn!(
                    "Retrying table {} after transient error (attempt {}/{}): {}",
                    name, attempt, max_attempts, error
                );
                tokio::time::sleep(backoff * attempt).await;
                continue;
            }

            return Err(FetchFailure {
                name: name.to_string(),
                error,
                attempts: attempt,
            });
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::accessor::NameFilter;
    use crate::schema::fixtures::users_table;
    use crate::schema::Script;
    use async_trait::async_trait;
    use rand::Rng;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory accessor with random latency and scripted failures
    #[derive(Default)]
    pub(crate) struct TestAccessor {
        tables: HashMap<String, Table>,
        transient_failures: Mutex<HashMap<String, u32>>,
        fatal: HashSet<String>,
        in_flight: AtomicUsize,
        pub max_in_flight: AtomicUsize,
        pub calls: AtomicUsize,
        max_delay_ms: u64,
    }

    impl TestAccessor {
        pub fn with_tables(names: &[String], max_delay_ms: u64) -> Self {
            let tables = names
                .iter()
                .map(|n| {
                    let mut t = users_table();
                    t.name = n.clone();
                    (n.clone(), t)
                })
                .collect();
            Self {
                tables,
                max_delay_ms,
                ..Self::default()
            }
        }

        pub fn fail_transiently(self, name: &str, times: u32) -> Self {
            self.transient_failures
                .lock()
                .unwrap()
                .insert(name.to_string(), times);
            self
        }

        pub fn fail_fatally(mut self, name: &str) -> Self {
            self.fatal.insert(name.to_string());
            self
        }
    }

    #[async_trait]
    impl Accessor for TestAccessor {
        async fn list_objects(
            &self,
            _kind: ObjectKind,
            filter: &NameFilter,
        ) -> Result<Vec<String>, AccessError> {
            let mut names: Vec<_> = self.tables.keys().filter(|n| filter.matches(n)).cloned().collect();
            names.sort();
            Ok(names)
        }

        async fn get_table_detail(&self, name: &str) -> Result<Table, AccessError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            let delay = if self.max_delay_ms == 0 {
                0
            } else {
                rand::thread_rng().gen_range(0..=self.max_delay_ms)
            };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.fatal.contains(name) {
                return Err(AccessError::Fatal(format!("access denied for {}", name)));
            }
            {
                let mut pending = self.transient_failures.lock().unwrap();
                if let Some(left) = pending.get_mut(name) {
                    if *left > 0 {
                        *left -= 1;
                        return Err(AccessError::Transient("lock wait timeout".to_string()));
                    }
                }
            }
            self.tables
                .get(name)
                .cloned()
                .ok_or_else(|| AccessError::NotFound(name.to_string()))
        }

        async fn list_scripts(
            &self,
            _kind: ObjectKind,
            _filter: &NameFilter,
        ) -> Result<Vec<Script>, AccessError> {
            Ok(vec![])
        }
    }

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("t_{:03}", i)).collect()
    }

    fn fetcher(workers: usize) -> MetadataFetcher {
        MetadataFetcher::new(FetchOptions {
            workers,
            max_attempts: 3,
            retry_backoff: Duration::from_millis(1),
            fail_fast: true,
        })
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_fetch_is_complete_under_random_scheduling() {
        for _ in 0..5 {
            let list = names(60);
            let accessor = Arc::new(TestAccessor::with_tables(&list, 5));
            let outcome = fetcher(10).fetch_tables(accessor.clone(), &list).await.unwrap();

            assert!(outcome.is_complete());
            assert_eq!(outcome.tables.len(), list.len());
            let fetched: Vec<_> = outcome.tables.names().map(str::to_string).collect();
            assert_eq!(fetched, list, "listing order is preserved");
            assert_eq!(accessor.calls.load(Ordering::SeqCst), list.len());
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrency_is_bounded() {
        let list = names(40);
        let accessor = Arc::new(TestAccessor::with_tables(&list, 3));
        fetcher(4).fetch_tables(accessor.clone(), &list).await.unwrap();

        let peak = accessor.max_in_flight.load(Ordering::SeqCst);
        assert!(peak >= 1 && peak <= 4, "peak concurrency was {}", peak);
    }

    #[tokio::test]
    async fn test_empty_name_list() {
        let accessor = Arc::new(TestAccessor::default());
        let outcome = fetcher(10).fetch_tables(accessor, &[]).await.unwrap();
        assert!(outcome.is_complete());
        assert!(outcome.tables.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_names_rejected() {
        let list = vec!["a".to_string(), "b".to_string(), "a".to_string()];
        let accessor = Arc::new(TestAccessor::with_tables(&list, 0));
        let err = fetcher(2).fetch_tables(accessor.clone(), &list).await.unwrap_err();

        assert!(matches!(err, SyncError::DuplicateName { ref name, .. } if name == "a"));
        assert_eq!(accessor.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let list = names(3);
        let accessor = Arc::new(TestAccessor::with_tables(&list, 0).fail_transiently("t_001", 2));
        let outcome = fetcher(2).fetch_tables(accessor.clone(), &list).await.unwrap();

        assert!(outcome.is_complete());
        assert_eq!(accessor.calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_retries_run_out() {
        let list = names(1);
        let accessor = Arc::new(TestAccessor::with_tables(&list, 0).fail_transiently("t_000", 10));
        let outcome = fetcher(1).fetch_tables(accessor, &list).await.unwrap();

        assert_eq!(outcome.failures.len(), 1);
        let failure = &outcome.failures[0];
        assert!(failure.is_retryable());
        assert_eq!(failure.attempts, 3);
    }

    #[tokio::test]
    async fn test_not_found_is_fatal_for_the_phase() {
        let mut list = names(5);
        list.push("ghost".to_string());
        let accessor = Arc::new(TestAccessor::with_tables(&names(5), 0));
        let outcome = fetcher(3).fetch_tables(accessor, &list).await.unwrap();

        assert!(!outcome.is_complete());
        let err = outcome.into_complete(Side::Destination).unwrap_err();
        match err {
            SyncError::Fetch { name, side, source, .. } => {
                assert_eq!(name, "ghost");
                assert_eq!(side, Side::Destination);
                assert!(matches!(source, AccessError::NotFound(_)));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_mismatched_table_name_is_fatal() {
        let list = names(2);
        let mut accessor = TestAccessor::with_tables(&list, 0);
        if let Some(table) = accessor.tables.get_mut("t_001") {
            table.name = "t_000".to_string();
        }
        let fetcher = MetadataFetcher::new(FetchOptions {
            workers: 2,
            max_attempts: 3,
            retry_backoff: Duration::from_millis(1),
            fail_fast: false,
        });
        let outcome = fetcher.fetch_tables(Arc::new(accessor), &list).await.unwrap();

        let fetched: Vec<_> = outcome.tables.names().collect();
        assert_eq!(fetched, vec!["t_000"]);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].name, "t_001");
        assert_eq!(outcome.failures[0].attempts, 1);
        assert!(matches!(outcome.failures[0].error, AccessError::Fatal(_)));
    }

    #[tokio::test]
    async fn test_collect_mode_reports_every_failure() {
        let list = names(6);
        let accessor = Arc::new(
            TestAccessor::with_tables(&list, 0)
                .fail_fatally("t_001")
                .fail_fatally("t_004"),
        );
        let fetcher = MetadataFetcher::new(FetchOptions {
            workers: 2,
            max_attempts: 1,
            retry_backoff: Duration::from_millis(1),
            fail_fast: false,
        });
        let outcome = fetcher.fetch_tables(accessor, &list).await.unwrap();

        let mut failed: Vec<_> = outcome.failures.iter().map(|f| f.name.as_str()).collect();
        failed.sort();
        assert_eq!(failed, vec!["t_001", "t_004"]);
        assert_eq!(outcome.tables.len(), 4);
    }
}
