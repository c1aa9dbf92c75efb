//! ScanCoordinator: orchestrates discovery, per-entity work and the rollup.
//!
//! Per entity: list files → fingerprint → Hit | Fresh, or a recorded failure.
//! Entities share no state while they run: each worker gets its own clone of
//! the cached entry, and only the coordinator writes to the `CacheStore`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::stream::{self, StreamExt};
use tokio::sync::Semaphore;
use uuid::Uuid;

use super::discovery::{pick_review_file, reviewer_entities};
use super::error::{ScanError, ScanFailure};
use super::traits::RemoteStore;
use super::types::*;
use crate::config::ScanConfig;
use crate::models::{EntityState, RemoteFingerprint, ReviewRow};
use crate::pipeline::cache::{CacheEntry, CacheStore};
use crate::pipeline::classify::OutcomeCounts;
use crate::pipeline::extraction::RowExtractor;
use crate::pipeline::report::{aggregate, ManualOverrides};

/// Runs scans against one remote store.
pub struct ScanCoordinator {
    remote: Arc<dyn RemoteStore>,
    extractor: RowExtractor,
    config: ScanConfig,
    entity_timeout: Duration,
    /// One permit per worker, held until the blocking call returns, so work
    /// abandoned on timeout still counts against `max_workers`.
    slots: Arc<Semaphore>,
}

impl ScanCoordinator {
    pub fn new(remote: Arc<dyn RemoteStore>, config: ScanConfig) -> Self {
        let extractor = RowExtractor::new(config.sheet_marker.clone());
        let entity_timeout = config.entity_timeout();
        let slots = Arc::new(Semaphore::new(config.workers().min(Semaphore::MAX_PERMITS)));
        Self {
            remote,
            extractor,
            config,
            entity_timeout,
            slots,
        }
    }

    /// Override the per-entity time bound (finer than the config's seconds).
    pub fn with_entity_timeout(mut self, timeout: Duration) -> Self {
        self.entity_timeout = timeout;
        self
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// List reviewer folders under every target. Applications that cannot be
    /// listed are reported and skipped.
    pub async fn discover(&self, targets: &[ScanTarget]) -> (Vec<EntityTarget>, Vec<ScanError>) {
        let mut entities = Vec::new();
        let mut errors = Vec::new();

        for target in targets {
            let remote = Arc::clone(&self.remote);
            let path = target.path.clone();
            let listing = self
                .bounded(move || {
                    remote
                        .list_reviewer_folders(&path)
                        .map_err(ScanFailure::Discovery)
                })
                .await;

            match listing {
                Ok(folders) => {
                    let found = reviewer_entities(target, folders, &self.config);
                    tracing::info!(
                        category = %target.category,
                        application = %target.application,
                        reviewers = found.len(),
                        "Application discovered"
                    );
                    entities.extend(found);
                }
                Err(failure) => {
                    tracing::error!(
                        category = %target.category,
                        application = %target.application,
                        error = %failure,
                        "Application listing failed"
                    );
                    errors.push(ScanError::for_application(target, &failure));
                }
            }
        }

        (entities, errors)
    }

    /// Full run: discover reviewers under `targets`, then scan them.
    pub async fn run_scan(
        &self,
        targets: &[ScanTarget],
        cache: &mut CacheStore,
        overrides: &ManualOverrides,
        progress: Option<ProgressFn<'_>>,
    ) -> ScanReport {
        if targets.is_empty() {
            tracing::warn!("No scan targets given");
            return ScanReport::empty(new_run_id());
        }

        let (entities, discovery_errors) = self.discover(targets).await;
        let mut report = self.scan_entities(entities, cache, overrides, progress).await;

        report.errors.extend(discovery_errors);
        sort_errors(&mut report.errors);
        report
    }

    /// Scan an explicit entity list.
    pub async fn scan_entities(
        &self,
        entities: Vec<EntityTarget>,
        cache: &mut CacheStore,
        overrides: &ManualOverrides,
        progress: Option<ProgressFn<'_>>,
    ) -> ScanReport {
        let start = Instant::now();
        let mut report = ScanReport::empty(new_run_id());

        if entities.is_empty() {
            tracing::warn!(run_id = %report.run_id, "Nothing to scan");
            return report;
        }
        report.status = ScanStatus::Completed;

        let total = entities.len() as u32;
        tracing::info!(
            run_id = %report.run_id,
            entities = total,
            workers = self.config.workers(),
            use_cache = self.config.use_cache,
            "Scan started"
        );
        if let Some(progress) = progress {
            progress(ScanEvent::Started { entity_count: total });
        }

        // Each worker receives its own copy of the cached entry up front.
        let jobs: Vec<(EntityTarget, Option<CacheEntry>)> = entities
            .into_iter()
            .map(|target| {
                let cached = if self.config.use_cache {
                    cache.get(&target.key).cloned()
                } else {
                    None
                };
                (target, cached)
            })
            .collect();

        let mut pending = stream::iter(
            jobs.into_iter()
                .map(|(target, cached)| self.run_entity(target, cached)),
        )
        .buffer_unordered(self.config.workers());

        let mut completed = 0u32;
        while let Some((target, outcome)) = pending.next().await {
            completed += 1;
            if let Some(progress) = progress {
                progress(ScanEvent::Progress {
                    completed,
                    total,
                    current: target.key.to_string(),
                });
            }

            match outcome {
                Ok(result) => self.record_result(result, cache, &mut report),
                Err(failure) => {
                    tracing::error!(
                        category = %target.key.category,
                        application = %target.key.application,
                        reviewer = %target.key.reviewer,
                        error = %failure,
                        "Entity failed"
                    );
                    report.errors.push(ScanError::for_entity(&target, &failure));
                }
            }
        }
        drop(pending);

        match cache.persist() {
            Ok(written) => report.cache_persisted = written,
            Err(e) => {
                tracing::error!(error = %e, "Cache persist failed");
                report.cache_error = Some(e.to_string());
            }
        }

        report.results.sort_by(|a, b| a.key.cmp(&b.key));
        sort_errors(&mut report.errors);
        report.aggregate = aggregate(&report.results, overrides);
        report.duration_ms = start.elapsed().as_millis() as u64;

        tracing::info!(
            run_id = %report.run_id,
            hits = report.hits,
            fresh = report.fresh,
            skipped = report.skipped,
            failed = report.errors.len(),
            duration_ms = report.duration_ms,
            "Scan finished"
        );
        if let Some(progress) = progress {
            progress(ScanEvent::Completed {
                hits: report.hits,
                fresh: report.fresh,
                failed: report.errors.len() as u32,
                duration_ms: report.duration_ms,
            });
        }

        report
    }

    fn record_result(&self, result: EntityResult, cache: &mut CacheStore, report: &mut ScanReport) {
        let counts = result.counts;
        match result.state {
            EntityState::Hit => report.hits += 1,
            EntityState::Fresh => report.fresh += 1,
            EntityState::Skipped => {
                report.skipped += 1;
                tracing::debug!(reviewer = %result.key.reviewer, "No spreadsheet in reviewer folder");
                report.results.push(result);
                return;
            }
        }

        tracing::info!(
            category = %result.key.category,
            application = %result.key.application,
            reviewer = %result.key.reviewer,
            source = result.state.as_str(),
            rows = result.rows.len(),
            missing = counts.missing,
            approved = counts.approved,
            denied = counts.denied,
            changed = counts.changed,
            "Reviewer read"
        );

        if result.state == EntityState::Fresh {
            match (&result.fingerprint, result.has_rows()) {
                (Some(fingerprint), true) => cache.put(CacheEntry::new(
                    result.key.clone(),
                    fingerprint.clone(),
                    result.rows.clone(),
                    result.audit.clone(),
                )),
                _ => tracing::warn!(
                    reviewer = %result.key.reviewer,
                    "Fresh read produced no rows; not cached"
                ),
            }
        }

        report.results.push(result);
    }

    async fn run_entity(
        &self,
        target: EntityTarget,
        cached: Option<CacheEntry>,
    ) -> (EntityTarget, Result<EntityResult, ScanFailure>) {
        let remote = Arc::clone(&self.remote);
        let extractor = self.extractor.clone();
        let use_cache = self.config.use_cache;
        let job = target.clone();

        let outcome = self
            .bounded(move || process_entity(remote.as_ref(), &extractor, &job, cached, use_cache))
            .await;
        (target, outcome)
    }

    /// Run blocking remote work on the worker pool under the entity timeout.
    /// On expiry the work is abandoned; whatever it returns later is dropped.
    /// The clock starts once a worker slot is free.
    async fn bounded<T, F>(&self, work: F) -> Result<T, ScanFailure>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, ScanFailure> + Send + 'static,
    {
        let permit = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|e| ScanFailure::Worker(e.to_string()))?;
        let task = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            work()
        });

        let timeout = self.entity_timeout;
        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(ScanFailure::Worker(join_error.to_string())),
            Err(_) => Err(ScanFailure::Timeout(timeout)),
        }
    }
}

/// One-shot scan with a coordinator built from `config`.
pub async fn run_scan(
    remote: Arc<dyn RemoteStore>,
    targets: &[ScanTarget],
    cache: &mut CacheStore,
    overrides: &ManualOverrides,
    config: ScanConfig,
    progress: Option<ProgressFn<'_>>,
) -> ScanReport {
    ScanCoordinator::new(remote, config)
        .run_scan(targets, cache, overrides, progress)
        .await
}

/// Resolve one entity. Pure with respect to shared state: reads only its
/// arguments and the remote store.
pub fn process_entity(
    remote: &dyn RemoteStore,
    extractor: &RowExtractor,
    target: &EntityTarget,
    cached: Option<CacheEntry>,
    use_cache: bool,
) -> Result<EntityResult, ScanFailure> {
    let files = remote
        .list_spreadsheet_files(&target.folder_path)
        .map_err(ScanFailure::Discovery)?;

    let Some(file) = pick_review_file(&files, &target.key.reviewer) else {
        return Ok(EntityResult::skipped(target));
    };

    let live = RemoteFingerprint::current(&file.last_modified);

    if let Some(entry) = cached.filter(|e| use_cache && CacheStore::is_fresh(e, &live)) {
        let rows: Vec<ReviewRow> = entry.rows.into_iter().map(ReviewRow::normalized).collect();
        return Ok(EntityResult {
            key: target.key.clone(),
            state: EntityState::Hit,
            folder_url: target.folder_url.clone(),
            file_name: Some(file.name.clone()),
            fingerprint: Some(live),
            counts: OutcomeCounts::from_rows(&rows),
            rows,
            audit: entry.audit,
        });
    }

    let bytes = remote
        .download_file(&format!("{}/{}", target.folder_path, file.name))
        .map_err(ScanFailure::Download)?;

    let mut audit = remote.audit_snapshot(&file.id).map_err(ScanFailure::Audit)?;
    if audit.created_ts.is_none() {
        audit.created_ts = file.created.clone();
    }

    let rows = extractor.extract(&bytes, &target.key.reviewer, &file.name, &target.folder_url)?;

    Ok(EntityResult {
        key: target.key.clone(),
        state: EntityState::Fresh,
        folder_url: target.folder_url.clone(),
        file_name: Some(file.name.clone()),
        fingerprint: Some(live),
        counts: OutcomeCounts::from_rows(&rows),
        rows,
        audit,
    })
}

fn new_run_id() -> String {
    Uuid::new_v4().to_string()
}

fn sort_errors(errors: &mut [ScanError]) {
    errors.sort_by(|a, b| {
        (&a.category, &a.application, &a.reviewer).cmp(&(&b.category, &b.application, &b.reviewer))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use rust_xlsxwriter::Workbook;

    use crate::models::{AuditSnapshot, EntityKey, ScanErrorKind};
    use crate::pipeline::scan::error::RemoteError;

    /// In-memory remote store. Folders map to reviewer folders, files to
    /// spreadsheets; `fail_download` lists file paths whose download errors.
    #[derive(Default)]
    struct FakeRemote {
        folders: HashMap<String, Vec<RemoteFolder>>,
        files: Mutex<HashMap<String, Vec<RemoteFile>>>,
        blobs: Mutex<HashMap<String, Vec<u8>>>,
        fail_download: Vec<String>,
        slow_download: Option<Duration>,
        downloads: Mutex<Vec<String>>,
        in_flight: AtomicUsize,
        peak_in_flight: AtomicUsize,
    }

    impl FakeRemote {
        fn add_reviewer(&mut self, app_path: &str, reviewer: &str, modified: &str, bytes: Vec<u8>) {
            self.folders
                .entry(app_path.to_string())
                .or_default()
                .push(RemoteFolder {
                    name: reviewer.into(),
                    web_url: format!("https://x/{reviewer}"),
                });
            let folder = format!("{app_path}/{reviewer}");
            let name = format!("{reviewer}.xlsx");
            self.files.lock().unwrap().insert(
                folder.clone(),
                vec![RemoteFile {
                    id: format!("id-{reviewer}"),
                    name: name.clone(),
                    last_modified: modified.into(),
                    created: Some("2026-01-01T00:00:00Z".into()),
                    web_url: String::new(),
                }],
            );
            self.blobs.lock().unwrap().insert(format!("{folder}/{name}"), bytes);
        }

        fn touch(&self, folder: &str, modified: &str, bytes: Vec<u8>) {
            let mut files = self.files.lock().unwrap();
            let file = &mut files.get_mut(folder).unwrap()[0];
            file.last_modified = modified.into();
            self.blobs
                .lock()
                .unwrap()
                .insert(format!("{folder}/{}", file.name), bytes);
        }

        fn download_count(&self) -> usize {
            self.downloads.lock().unwrap().len()
        }
    }

    impl RemoteStore for FakeRemote {
        fn list_reviewer_folders(&self, path: &str) -> Result<Vec<RemoteFolder>, RemoteError> {
            self.folders
                .get(path)
                .cloned()
                .ok_or_else(|| RemoteError::NotFound(path.to_string()))
        }

        fn list_spreadsheet_files(&self, path: &str) -> Result<Vec<RemoteFile>, RemoteError> {
            Ok(self.files.lock().unwrap().get(path).cloned().unwrap_or_default())
        }

        fn download_file(&self, path: &str) -> Result<Vec<u8>, RemoteError> {
            if let Some(delay) = self.slow_download {
                let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(delay);
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
            }
            self.downloads.lock().unwrap().push(path.to_string());
            if self.fail_download.iter().any(|p| p == path) {
                return Err(RemoteError::Request(format!("503 for {path}")));
            }
            self.blobs
                .lock()
                .unwrap()
                .get(path)
                .cloned()
                .ok_or_else(|| RemoteError::NotFound(path.to_string()))
        }

        fn audit_snapshot(&self, file_id: &str) -> Result<AuditSnapshot, RemoteError> {
            Ok(AuditSnapshot {
                created_ts: None,
                creator: "Owner".into(),
                modifier: "Editor".into(),
                log: format!("v1.0 {file_id}"),
            })
        }
    }

    fn sheet(reviewer: &str, responses: &[&str]) -> Vec<u8> {
        let mut wb = Workbook::new();
        let ws = wb.add_worksheet();
        ws.set_name("User Listing").unwrap();
        for (c, h) in ["User Name", "User Email", "Reviewer", "Response"].iter().enumerate() {
            ws.write_string(0, c as u16, *h).unwrap();
        }
        for (i, response) in responses.iter().enumerate() {
            let r = i as u32 + 1;
            ws.write_string(r, 0, format!("User {r}")).unwrap();
            ws.write_string(r, 1, format!("user{r}@example.com")).unwrap();
            ws.write_string(r, 2, reviewer).unwrap();
            if !response.is_empty() {
                ws.write_string(r, 3, *response).unwrap();
            }
        }
        wb.save_to_buffer().unwrap()
    }

    const APP: &str = "Reviews/cat1/app1";

    fn targets() -> Vec<ScanTarget> {
        vec![ScanTarget::new("cat1", "app1", APP)]
    }

    fn two_reviewer_remote() -> FakeRemote {
        let mut remote = FakeRemote::default();
        remote.add_reviewer(APP, "alice", "F1", sheet("alice", &["Approved"]));
        remote.add_reviewer(APP, "bob", "F2", sheet("bob", &[""]));
        remote
    }

    fn coordinator(remote: Arc<FakeRemote>) -> ScanCoordinator {
        ScanCoordinator::new(remote, ScanConfig::default())
    }

    #[tokio::test]
    async fn first_run_fresh_second_run_hits_with_identical_rollup() {
        let remote = Arc::new(two_reviewer_remote());
        let scan = coordinator(remote.clone());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let overrides = ManualOverrides::default();

        let mut cache = CacheStore::load(&path);
        let first = scan.run_scan(&targets(), &mut cache, &overrides, None).await;
        assert_eq!(first.status, ScanStatus::Completed);
        assert_eq!(first.fresh, 2);
        assert_eq!(first.hits, 0);
        assert!(first.errors.is_empty());
        assert!(first.cache_persisted);

        let node = &first.aggregate["cat1 > app1"];
        assert_eq!(node.total_users, 2);
        assert_eq!(node.completed_users, 1);
        assert!(node.reviewers["alice"].status.is_completed());
        assert!(!node.reviewers["bob"].status.is_completed());

        // Fresh process: reload the cache from disk.
        let mut cache = CacheStore::load(&path);
        let second = scan.run_scan(&targets(), &mut cache, &overrides, None).await;
        assert_eq!(second.hits, 2);
        assert_eq!(second.fresh, 0);
        assert!(!second.cache_persisted);
        assert_eq!(remote.download_count(), 2);

        assert_eq!(
            serde_json::to_string(&first.aggregate).unwrap(),
            serde_json::to_string(&second.aggregate).unwrap()
        );
    }

    #[tokio::test]
    async fn changed_fingerprint_forces_fresh() {
        let remote = Arc::new(two_reviewer_remote());
        let scan = coordinator(remote.clone());
        let mut cache = CacheStore::in_memory();
        let overrides = ManualOverrides::default();

        scan.run_scan(&targets(), &mut cache, &overrides, None).await;
        remote.touch(&format!("{APP}/alice"), "F1b", sheet("alice", &["Denied"]));

        let second = scan.run_scan(&targets(), &mut cache, &overrides, None).await;
        let alice = second.result(&EntityKey::new("cat1", "app1", "alice")).unwrap();
        assert_eq!(alice.state, EntityState::Fresh);
        assert_eq!(alice.counts.denied, 1);
        let bob = second.result(&EntityKey::new("cat1", "app1", "bob")).unwrap();
        assert_eq!(bob.state, EntityState::Hit);

        let cached = cache.get(&EntityKey::new("cat1", "app1", "alice")).unwrap();
        assert_eq!(cached.fingerprint, RemoteFingerprint::current("F1b"));
    }

    #[tokio::test]
    async fn empty_cached_entry_is_re_extracted() {
        let remote = Arc::new(two_reviewer_remote());
        let scan = coordinator(remote.clone());
        let mut cache = CacheStore::in_memory();
        cache.put(CacheEntry::new(
            EntityKey::new("cat1", "app1", "alice"),
            RemoteFingerprint::current("F1"),
            vec![],
            AuditSnapshot::default(),
        ));

        let report = scan
            .run_scan(&targets(), &mut cache, &ManualOverrides::default(), None)
            .await;
        let alice = report.result(&EntityKey::new("cat1", "app1", "alice")).unwrap();
        assert_eq!(alice.state, EntityState::Fresh);
        assert_eq!(alice.rows.len(), 1);
    }

    #[tokio::test]
    async fn download_failure_is_isolated() {
        let mut remote = two_reviewer_remote();
        remote.fail_download = vec![format!("{APP}/bob/bob.xlsx")];
        let scan = coordinator(Arc::new(remote));
        let mut cache = CacheStore::in_memory();

        let report = scan
            .run_scan(&targets(), &mut cache, &ManualOverrides::default(), None)
            .await;

        assert_eq!(report.errors.len(), 1);
        assert_eq!(
            report.errors[0].entity_key(),
            Some(EntityKey::new("cat1", "app1", "bob"))
        );
        assert_eq!(report.errors[0].kind, ScanErrorKind::Download);
        assert_eq!(report.fresh, 1);
        assert!(cache.get(&EntityKey::new("cat1", "app1", "bob")).is_none());
        assert_eq!(report.aggregate["cat1 > app1"].total_users, 1);
    }

    #[tokio::test]
    async fn unparseable_file_becomes_parse_error() {
        let mut remote = FakeRemote::default();
        remote.add_reviewer(APP, "carol", "F3", b"garbage".to_vec());
        let scan = coordinator(Arc::new(remote));
        let report = scan
            .run_scan(&targets(), &mut CacheStore::in_memory(), &ManualOverrides::default(), None)
            .await;
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].kind, ScanErrorKind::Parse);
        assert!(report.aggregate.is_empty());
    }

    #[tokio::test]
    async fn slow_entity_times_out_without_caching() {
        let mut remote = two_reviewer_remote();
        remote.slow_download = Some(Duration::from_millis(300));
        let scan = coordinator(Arc::new(remote)).with_entity_timeout(Duration::from_millis(50));
        let mut cache = CacheStore::in_memory();

        let report = scan
            .run_scan(&targets(), &mut cache, &ManualOverrides::default(), None)
            .await;
        assert_eq!(report.errors.len(), 2);
        assert!(report.errors.iter().all(|e| e.kind == ScanErrorKind::Timeout));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn timed_out_work_still_holds_its_worker_slot() {
        let mut remote = two_reviewer_remote();
        remote.add_reviewer(APP, "carol", "F3", sheet("carol", &["ok"]));
        remote.slow_download = Some(Duration::from_millis(150));
        let remote = Arc::new(remote);
        let config = ScanConfig {
            max_workers: 1,
            ..ScanConfig::default()
        };
        let scan = ScanCoordinator::new(remote.clone(), config)
            .with_entity_timeout(Duration::from_millis(20));

        let report = scan
            .run_scan(&targets(), &mut CacheStore::in_memory(), &ManualOverrides::default(), None)
            .await;
        assert_eq!(report.errors.len(), 3);
        assert!(report.errors.iter().all(|e| e.kind == ScanErrorKind::Timeout));
        assert_eq!(remote.peak_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unlisted_application_reported_and_others_continue() {
        let remote = Arc::new(two_reviewer_remote());
        let scan = coordinator(remote);
        let mut targets = targets();
        targets.push(ScanTarget::new("cat1", "ghost", "Reviews/cat1/ghost"));

        let report = scan
            .run_scan(&targets, &mut CacheStore::in_memory(), &ManualOverrides::default(), None)
            .await;
        assert_eq!(report.fresh, 2);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].application, "ghost");
        assert_eq!(report.errors[0].reviewer, None);
        assert_eq!(report.errors[0].kind, ScanErrorKind::Discovery);
    }

    #[tokio::test]
    async fn reviewer_without_file_is_skipped() {
        let mut remote = two_reviewer_remote();
        remote.folders.get_mut(APP).unwrap().push(RemoteFolder {
            name: "dave".into(),
            web_url: "#".into(),
        });
        let scan = coordinator(Arc::new(remote));
        let report = scan
            .run_scan(&targets(), &mut CacheStore::in_memory(), &ManualOverrides::default(), None)
            .await;
        assert_eq!(report.skipped, 1);
        assert!(report.errors.is_empty());
        assert_eq!(report.aggregate["cat1 > app1"].total_users, 2);
    }

    #[tokio::test]
    async fn cache_disabled_always_reads_fresh() {
        let remote = Arc::new(two_reviewer_remote());
        let config = ScanConfig {
            use_cache: false,
            ..ScanConfig::default()
        };
        let scan = ScanCoordinator::new(remote.clone(), config);
        let mut cache = CacheStore::in_memory();
        let overrides = ManualOverrides::default();

        scan.run_scan(&targets(), &mut cache, &overrides, None).await;
        let second = scan.run_scan(&targets(), &mut cache, &overrides, None).await;
        assert_eq!(second.fresh, 2);
        assert_eq!(second.hits, 0);
        assert_eq!(remote.download_count(), 4);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn sequential_and_parallel_runs_agree() {
        let overrides = ManualOverrides::default();
        let serial = ScanCoordinator::new(
            Arc::new(two_reviewer_remote()),
            ScanConfig {
                max_workers: 1,
                ..ScanConfig::default()
            },
        )
        .run_scan(&targets(), &mut CacheStore::in_memory(), &overrides, None)
        .await;
        let parallel = ScanCoordinator::new(
            Arc::new(two_reviewer_remote()),
            ScanConfig {
                max_workers: 8,
                ..ScanConfig::default()
            },
        )
        .run_scan(&targets(), &mut CacheStore::in_memory(), &overrides, None)
        .await;
        assert_eq!(serial.aggregate, parallel.aggregate);
        assert_eq!(serial.results, parallel.results);
    }

    #[tokio::test]
    async fn no_targets_is_explicit() {
        let scan = coordinator(Arc::new(FakeRemote::default()));
        let report = scan
            .run_scan(&[], &mut CacheStore::in_memory(), &ManualOverrides::default(), None)
            .await;
        assert_eq!(report.status, ScanStatus::NoTargets);
        assert!(report.results.is_empty());
        assert!(report.errors.is_empty());
    }

    #[tokio::test]
    async fn progress_events_bracket_the_run() {
        let scan = coordinator(Arc::new(two_reviewer_remote()));
        let events = Mutex::new(Vec::new());
        let record = |e: ScanEvent| events.lock().unwrap().push(e);

        scan.run_scan(
            &targets(),
            &mut CacheStore::in_memory(),
            &ManualOverrides::default(),
            Some(&record),
        )
        .await;

        let events = events.into_inner().unwrap();
        assert_eq!(events.len(), 4);
        assert_eq!(events[0], ScanEvent::Started { entity_count: 2 });
        assert!(matches!(events[3], ScanEvent::Completed { fresh: 2, failed: 0, .. }));
    }

    #[test]
    fn hit_recomputes_missing_and_counts_from_rows() {
        let remote = two_reviewer_remote();
        let target = EntityTarget {
            key: EntityKey::new("cat1", "app1", "alice"),
            folder_path: format!("{APP}/alice"),
            folder_url: "https://x/alice".into(),
        };
        let mut entry = CacheEntry::new(
            target.key.clone(),
            RemoteFingerprint::current("F1"),
            vec![ReviewRow {
                reviewer: "alice".into(),
                user_name: "U".into(),
                user_email: "u@example.com".into(),
                response: "Remove".into(),
                details: String::new(),
                is_missing: true,
                row_number: 2,
                file_name: "alice.xlsx".into(),
                folder_url: "https://x/alice".into(),
            }],
            AuditSnapshot::default(),
        );
        // Stale display stats must not leak into the result.
        entry.stats.approved = 99;

        let result =
            process_entity(&remote, &RowExtractor::default(), &target, Some(entry), true).unwrap();
        assert_eq!(result.state, EntityState::Hit);
        assert!(!result.rows[0].is_missing);
        assert_eq!(result.counts.approved, 0);
        assert_eq!(result.counts.denied, 1);
        assert_eq!(remote.download_count(), 0);
    }

    #[test]
    fn fresh_read_fills_created_from_file_listing() {
        let remote = two_reviewer_remote();
        let target = EntityTarget {
            key: EntityKey::new("cat1", "app1", "alice"),
            folder_path: format!("{APP}/alice"),
            folder_url: "https://x/alice".into(),
        };
        let result = process_entity(&remote, &RowExtractor::default(), &target, None, true).unwrap();
        assert_eq!(result.state, EntityState::Fresh);
        assert_eq!(result.audit.created_ts.as_deref(), Some("2026-01-01T00:00:00Z"));
        assert_eq!(result.audit.log, "v1.0 id-alice");
        assert_eq!(result.file_name.as_deref(), Some("alice.xlsx"));
    }
}
