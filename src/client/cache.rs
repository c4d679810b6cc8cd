use crate::client::api::{ClientError, ExpenseApi};
use crate::domain::expense::{ExpenseFields, ExpenseRecord};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Whether a mirrored record matches the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncState {
    Synced,
    PendingCreate,
    PendingUpdate,
    PendingDelete,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub record: ExpenseRecord,
    pub state: SyncState,
}

/// How a single operation resolved: confirmed by the server, or applied only
/// to the local mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Synced,
    Offline,
}

/// Result of a `sync_now` outbox replay. `rejected` counts entries the
/// server answered with a refusal for; they are dropped from the mirror
/// since replaying them unchanged can never succeed.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub flushed: usize,
    pub remaining: usize,
    pub rejected: usize,
}

/// Optimistic local mirror of one user's expenses.
///
/// Every mutation is applied locally first, then pushed to the remote API;
/// a failed push leaves the entry flagged pending instead of erroring. The
/// mirror is persisted to a per-user JSON file after each change, so unsynced
/// work survives reloads. Pending entries are replayed only by [`sync_now`],
/// never by an automatic retry loop.
///
/// [`sync_now`]: SyncCache::sync_now
pub struct SyncCache<A: ExpenseApi> {
    api: A,
    entries: Vec<CacheEntry>,
    mirror_path: PathBuf,
}

impl<A: ExpenseApi> SyncCache<A> {
    /// Opens the mirror for one user, restoring whatever a previous session
    /// left behind. The file name is scoped by user id so mirrors on a shared
    /// device stay separate.
    pub fn new(api: A, mirror_dir: &Path, user_id: &str) -> Self {
        let mirror_path = mirror_dir.join(format!("expenses-{}.json", user_id));
        let entries = load_mirror(&mirror_path);
        Self {
            api,
            entries,
            mirror_path,
        }
    }

    /// Records as the UI should show them: everything except entries awaiting
    /// a remote delete.
    pub fn records(&self) -> Vec<ExpenseRecord> {
        self.entries
            .iter()
            .filter(|e| e.state != SyncState::PendingDelete)
            .map(|e| e.record.clone())
            .collect()
    }

    pub fn entries(&self) -> &[CacheEntry] {
        &self.entries
    }

    pub fn has_pending(&self) -> bool {
        self.entries.iter().any(|e| e.state != SyncState::Synced)
    }

    /// Read path. On a successful remote list, server records replace the
    /// synced part of the mirror; pending entries are kept layered on top
    /// (a pending update or delete shadows the server copy, a pending create
    /// stays appended), so unsynced work is never discarded by a read. On
    /// failure, the existing mirror stands and the caller is told it is
    /// operating offline.
    pub async fn refresh(&mut self) -> SyncOutcome {
        let remote = match self.api.list().await {
            Ok(remote) => remote,
            Err(e) => {
                warn!(error = %e, "Refresh failed, keeping local mirror");
                return SyncOutcome::Offline;
            }
        };

        let pending: Vec<CacheEntry> = self
            .entries
            .drain(..)
            .filter(|e| e.state != SyncState::Synced)
            .collect();

        let mut merged: Vec<CacheEntry> = Vec::new();
        for record in remote {
            match pending.iter().find(|p| p.record.id == record.id) {
                Some(shadowing) => merged.push(shadowing.clone()),
                None => merged.push(CacheEntry {
                    record,
                    state: SyncState::Synced,
                }),
            }
        }
        for entry in pending {
            if !merged.iter().any(|e| e.record.id == entry.record.id) {
                merged.push(entry);
            }
        }

        self.entries = merged;
        self.persist();
        debug!(count = self.entries.len(), "Mirror refreshed from server");
        SyncOutcome::Synced
    }

    /// Optimistically adds the record under a locally assigned id, then
    /// attempts the remote create. On success the server's canonical form
    /// (including its id) replaces the optimistic entry.
    pub async fn create(&mut self, fields: ExpenseFields) -> (ExpenseRecord, SyncOutcome) {
        let local = ExpenseRecord {
            id: Uuid::new_v4().to_string(),
            fields: fields.clone(),
        };
        self.entries.push(CacheEntry {
            record: local.clone(),
            state: SyncState::PendingCreate,
        });
        self.persist();

        match self.api.create(&fields).await {
            Ok(canonical) => {
                self.resolve(&local.id, canonical.clone());
                (canonical, SyncOutcome::Synced)
            }
            Err(e) => {
                warn!(error = %e, "Create not confirmed by server, record kept unsynced");
                (local, SyncOutcome::Offline)
            }
        }
    }

    /// Replaces the fields of a mirrored record, then attempts the remote
    /// update. Returns `None` if the mirror holds no such record. An entry
    /// still awaiting its create keeps that state; the new fields ride along
    /// when the create is eventually replayed.
    pub async fn update(
        &mut self,
        id: &str,
        fields: ExpenseFields,
    ) -> Option<(ExpenseRecord, SyncOutcome)> {
        let index = self
            .entries
            .iter()
            .position(|e| e.record.id == id && e.state != SyncState::PendingDelete)?;

        let awaiting_create = self.entries[index].state == SyncState::PendingCreate;
        self.entries[index].record.fields = fields.clone();
        if !awaiting_create {
            self.entries[index].state = SyncState::PendingUpdate;
        }
        self.persist();

        if awaiting_create {
            return Some((self.entries[index].record.clone(), SyncOutcome::Offline));
        }

        match self.api.update(id, &fields).await {
            Ok(canonical) => {
                self.resolve(id, canonical.clone());
                Some((canonical, SyncOutcome::Synced))
            }
            Err(e) => {
                warn!(error = %e, "Update not confirmed by server, record kept unsynced");
                Some((self.entries[index].record.clone(), SyncOutcome::Offline))
            }
        }
    }

    /// Hides the record immediately, then attempts the remote delete. A
    /// record the server never saw is simply dropped from the mirror.
    pub async fn delete(&mut self, id: &str) -> Option<SyncOutcome> {
        let index = self
            .entries
            .iter()
            .position(|e| e.record.id == id && e.state != SyncState::PendingDelete)?;

        if self.entries[index].state == SyncState::PendingCreate {
            self.entries.remove(index);
            self.persist();
            return Some(SyncOutcome::Synced);
        }

        self.entries[index].state = SyncState::PendingDelete;
        self.persist();

        match self.remote_delete(id).await {
            Ok(()) => {
                self.entries.retain(|e| e.record.id != id);
                self.persist();
                Some(SyncOutcome::Synced)
            }
            Err(e) => {
                warn!(error = %e, "Delete not confirmed by server, kept pending");
                Some(SyncOutcome::Offline)
            }
        }
    }

    /// Manual outbox replay: pushes pending entries to the server in mirror
    /// order. A network failure stops the replay, since nothing behind it
    /// can get through either. An API rejection is a definitive answer (a
    /// 404 on update means another client removed the record), so the entry
    /// is dropped and the replay moves on rather than wedging the queue.
    pub async fn sync_now(&mut self) -> SyncReport {
        let mut flushed = 0;
        let mut rejected = 0;
        let mut index = 0;

        while index < self.entries.len() {
            let state = self.entries[index].state;
            if state == SyncState::Synced {
                index += 1;
                continue;
            }

            let id = self.entries[index].record.id.clone();
            let fields = self.entries[index].record.fields.clone();

            let outcome = match state {
                SyncState::PendingCreate => match self.api.create(&fields).await {
                    Ok(canonical) => {
                        self.entries[index].record = canonical;
                        self.entries[index].state = SyncState::Synced;
                        Ok(false)
                    }
                    Err(e) => Err(e),
                },
                SyncState::PendingUpdate => match self.api.update(&id, &fields).await {
                    Ok(canonical) => {
                        self.entries[index].record = canonical;
                        self.entries[index].state = SyncState::Synced;
                        Ok(false)
                    }
                    Err(e) => Err(e),
                },
                SyncState::PendingDelete => match self.remote_delete(&id).await {
                    Ok(()) => Ok(true),
                    Err(e) => Err(e),
                },
                SyncState::Synced => unreachable!(),
            };

            match outcome {
                Ok(remove) => {
                    flushed += 1;
                    if remove {
                        self.entries.remove(index);
                    } else {
                        index += 1;
                    }
                }
                Err(ClientError::Network(e)) => {
                    warn!(error = %e, "Sync stopped, server unreachable");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "Server rejected pending change, dropping it");
                    rejected += 1;
                    self.entries.remove(index);
                }
            }
        }

        self.persist();
        let remaining = self
            .entries
            .iter()
            .filter(|e| e.state != SyncState::Synced)
            .count();
        if flushed > 0 || rejected > 0 {
            info!(flushed, rejected, remaining, "Pending mutations replayed");
        }
        SyncReport {
            flushed,
            remaining,
            rejected,
        }
    }

    /// A 404 on delete means the record is already gone; that counts as done.
    async fn remote_delete(&self, id: &str) -> Result<(), ClientError> {
        match self.api.delete(id).await {
            Ok(()) => Ok(()),
            Err(ClientError::Api { status: 404, .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn resolve(&mut self, local_id: &str, canonical: ExpenseRecord) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.record.id == local_id) {
            entry.record = canonical;
            entry.state = SyncState::Synced;
        }
        self.persist();
    }

    // Mirror writes are best-effort; a failed write must never take the UI
    // down with it.
    fn persist(&self) {
        match serde_json::to_string_pretty(&self.entries) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&self.mirror_path, json) {
                    warn!(path = %self.mirror_path.display(), error = %e, "Failed to persist mirror");
                }
            }
            Err(e) => warn!(error = %e, "Failed to serialize mirror"),
        }
    }
}

fn load_mirror(path: &Path) -> Vec<CacheEntry> {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|json| serde_json::from_str(&json).ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::expense::{Amount, Category};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::Arc;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    fn sample_fields(amount: f64) -> ExpenseFields {
        ExpenseFields {
            description: "Groceries".to_string(),
            amount: Amount::new(amount),
            category: Category::Food,
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            note: String::new(),
        }
    }

    /// Fake server: switchable network failure, real record storage.
    #[derive(Clone, Default)]
    struct FakeApi {
        inner: Arc<FakeApiInner>,
    }

    #[derive(Default)]
    struct FakeApiInner {
        offline: AtomicBool,
        next_id: AtomicUsize,
        store: Mutex<Vec<ExpenseRecord>>,
    }

    impl FakeApi {
        fn set_offline(&self, offline: bool) {
            self.inner.offline.store(offline, Ordering::SeqCst);
        }

        fn server_records(&self) -> Vec<ExpenseRecord> {
            self.inner.store.lock().unwrap().clone()
        }

        fn check_online(&self) -> Result<(), ClientError> {
            if self.inner.offline.load(Ordering::SeqCst) {
                Err(ClientError::Network("connection refused".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl ExpenseApi for FakeApi {
        async fn list(&self) -> Result<Vec<ExpenseRecord>, ClientError> {
            self.check_online()?;
            Ok(self.server_records())
        }

        async fn create(&self, fields: &ExpenseFields) -> Result<ExpenseRecord, ClientError> {
            self.check_online()?;
            let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
            let record = ExpenseRecord {
                id: format!("srv-{}", id),
                fields: fields.clone(),
            };
            self.inner.store.lock().unwrap().push(record.clone());
            Ok(record)
        }

        async fn update(
            &self,
            id: &str,
            fields: &ExpenseFields,
        ) -> Result<ExpenseRecord, ClientError> {
            self.check_online()?;
            let mut store = self.inner.store.lock().unwrap();
            let record = store
                .iter_mut()
                .find(|r| r.id == id)
                .ok_or(ClientError::Api {
                    status: 404,
                    message: "Expense not found".to_string(),
                })?;
            record.fields = fields.clone();
            Ok(record.clone())
        }

        async fn delete(&self, id: &str) -> Result<(), ClientError> {
            self.check_online()?;
            let mut store = self.inner.store.lock().unwrap();
            let before = store.len();
            store.retain(|r| r.id != id);
            if store.len() == before {
                return Err(ClientError::Api {
                    status: 404,
                    message: "Expense not found".to_string(),
                });
            }
            Ok(())
        }
    }

    fn new_cache(api: &FakeApi, dir: &Path) -> SyncCache<FakeApi> {
        SyncCache::new(api.clone(), dir, "user-1")
    }

    #[tokio::test]
    async fn test_create_online_adopts_server_id() {
        let dir = tempfile::tempdir().unwrap();
        let api = FakeApi::default();
        let mut cache = new_cache(&api, dir.path());

        let (record, outcome) = cache.create(sample_fields(50.0)).await;

        assert_eq!(outcome, SyncOutcome::Synced);
        assert_eq!(record.id, "srv-0");
        assert_eq!(cache.entries()[0].state, SyncState::Synced);
        assert!(!cache.has_pending());
    }

    #[tokio::test]
    async fn test_create_offline_keeps_unsynced_record() {
        let dir = tempfile::tempdir().unwrap();
        let api = FakeApi::default();
        api.set_offline(true);
        let mut cache = new_cache(&api, dir.path());

        let (record, outcome) = cache.create(sample_fields(50.0)).await;

        assert_eq!(outcome, SyncOutcome::Offline);
        assert_eq!(cache.records(), vec![record]);
        assert_eq!(cache.entries()[0].state, SyncState::PendingCreate);
        assert!(api.server_records().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_offline_keeps_existing_mirror() {
        let dir = tempfile::tempdir().unwrap();
        let api = FakeApi::default();
        let mut cache = new_cache(&api, dir.path());
        cache.create(sample_fields(50.0)).await;

        api.set_offline(true);
        let outcome = cache.refresh().await;

        assert_eq!(outcome, SyncOutcome::Offline);
        assert_eq!(cache.records().len(), 1);
    }

    #[tokio::test]
    async fn test_refresh_keeps_pending_create_missing_from_server() {
        let dir = tempfile::tempdir().unwrap();
        let api = FakeApi::default();
        let mut cache = new_cache(&api, dir.path());

        // This create never reaches the server
        api.set_offline(true);
        let (local, _) = cache.create(sample_fields(50.0)).await;

        // The next list succeeds and does not contain the record; the
        // unsynced entry must survive it
        api.set_offline(false);
        let outcome = cache.refresh().await;

        assert_eq!(outcome, SyncOutcome::Synced);
        assert_eq!(cache.records(), vec![local]);
        assert_eq!(cache.entries()[0].state, SyncState::PendingCreate);
    }

    #[tokio::test]
    async fn test_refresh_pending_update_shadows_server_copy() {
        let dir = tempfile::tempdir().unwrap();
        let api = FakeApi::default();
        let mut cache = new_cache(&api, dir.path());
        let (record, _) = cache.create(sample_fields(50.0)).await;

        api.set_offline(true);
        cache.update(&record.id, sample_fields(75.0)).await.unwrap();

        api.set_offline(false);
        cache.refresh().await;

        let records = cache.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].fields.amount.inner(), 75.0);
        assert_eq!(cache.entries()[0].state, SyncState::PendingUpdate);
        // Server still has the stale amount until sync_now
        assert_eq!(api.server_records()[0].fields.amount.inner(), 50.0);
    }

    #[tokio::test]
    async fn test_update_unknown_id_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let api = FakeApi::default();
        let mut cache = new_cache(&api, dir.path());

        assert!(cache.update("no-such-id", sample_fields(10.0)).await.is_none());
    }

    #[tokio::test]
    async fn test_delete_offline_hides_record_until_flushed() {
        let dir = tempfile::tempdir().unwrap();
        let api = FakeApi::default();
        let mut cache = new_cache(&api, dir.path());
        let (record, _) = cache.create(sample_fields(50.0)).await;

        api.set_offline(true);
        let outcome = cache.delete(&record.id).await.unwrap();

        assert_eq!(outcome, SyncOutcome::Offline);
        assert!(cache.records().is_empty());
        assert_eq!(cache.entries()[0].state, SyncState::PendingDelete);
        // Still on the server until the delete is replayed
        assert_eq!(api.server_records().len(), 1);

        api.set_offline(false);
        let report = cache.sync_now().await;
        assert_eq!(report, SyncReport { flushed: 1, remaining: 0, rejected: 0 });
        assert!(api.server_records().is_empty());
        assert!(cache.entries().is_empty());
    }

    #[tokio::test]
    async fn test_delete_of_pending_create_drops_locally() {
        let dir = tempfile::tempdir().unwrap();
        let api = FakeApi::default();
        api.set_offline(true);
        let mut cache = new_cache(&api, dir.path());
        let (record, _) = cache.create(sample_fields(50.0)).await;

        let outcome = cache.delete(&record.id).await.unwrap();

        // Nothing to undo remotely, the record never left this device
        assert_eq!(outcome, SyncOutcome::Synced);
        assert!(cache.entries().is_empty());
    }

    #[tokio::test]
    async fn test_remote_delete_tolerates_already_gone() {
        let dir = tempfile::tempdir().unwrap();
        let api = FakeApi::default();
        let mut cache = new_cache(&api, dir.path());
        let (record, _) = cache.create(sample_fields(50.0)).await;

        // Another client already removed it server-side
        api.delete(&record.id).await.unwrap();

        let outcome = cache.delete(&record.id).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Synced);
        assert!(cache.entries().is_empty());
    }

    #[tokio::test]
    async fn test_sync_now_replays_pending_create_and_update() {
        let dir = tempfile::tempdir().unwrap();
        let api = FakeApi::default();
        let mut cache = new_cache(&api, dir.path());
        let (record, _) = cache.create(sample_fields(50.0)).await;

        api.set_offline(true);
        cache.create(sample_fields(20.0)).await;
        cache.update(&record.id, sample_fields(75.0)).await.unwrap();

        api.set_offline(false);
        let report = cache.sync_now().await;

        assert_eq!(report, SyncReport { flushed: 2, remaining: 0, rejected: 0 });
        assert!(!cache.has_pending());
        let server = api.server_records();
        assert_eq!(server.len(), 2);
        assert_eq!(server[0].fields.amount.inner(), 75.0);
        assert_eq!(server[1].fields.amount.inner(), 20.0);
        // The flushed create now carries its server id
        assert!(cache.records().iter().all(|r| r.id.starts_with("srv-")));
    }

    #[tokio::test]
    async fn test_sync_now_stops_at_first_failure() {
        let dir = tempfile::tempdir().unwrap();
        let api = FakeApi::default();
        api.set_offline(true);
        let mut cache = new_cache(&api, dir.path());
        cache.create(sample_fields(10.0)).await;
        cache.create(sample_fields(20.0)).await;

        let report = cache.sync_now().await;

        assert_eq!(report, SyncReport { flushed: 0, remaining: 2, rejected: 0 });
        assert!(cache.has_pending());
    }

    #[tokio::test]
    async fn test_sync_now_drops_rejected_update_and_keeps_flushing() {
        let dir = tempfile::tempdir().unwrap();
        let api = FakeApi::default();
        let mut cache = new_cache(&api, dir.path());
        let (record, _) = cache.create(sample_fields(50.0)).await;

        // Another client removes the record server-side, then this one
        // queues an update to it and a fresh create while offline
        api.delete(&record.id).await.unwrap();
        api.set_offline(true);
        cache.update(&record.id, sample_fields(75.0)).await.unwrap();
        cache.create(sample_fields(20.0)).await;

        // Server reachable again: the update gets a definitive 404 and is
        // dropped; the create behind it must still go through
        api.set_offline(false);
        let report = cache.sync_now().await;

        assert_eq!(report, SyncReport { flushed: 1, remaining: 0, rejected: 1 });
        assert!(!cache.has_pending());
        let server = api.server_records();
        assert_eq!(server.len(), 1);
        assert_eq!(server[0].fields.amount.inner(), 20.0);

        // Nothing left to replay
        let report = cache.sync_now().await;
        assert_eq!(report, SyncReport::default());
    }

    #[tokio::test]
    async fn test_mirror_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let api = FakeApi::default();
        api.set_offline(true);

        let (record, _) = {
            let mut cache = new_cache(&api, dir.path());
            cache.create(sample_fields(50.0)).await
        };

        // Next session, same user and directory
        let cache = new_cache(&api, dir.path());
        assert_eq!(cache.records(), vec![record]);
        assert_eq!(cache.entries()[0].state, SyncState::PendingCreate);

        // Different user sees nothing
        let other = SyncCache::new(api.clone(), dir.path(), "user-2");
        assert!(other.records().is_empty());
    }

    #[tokio::test]
    async fn test_update_on_pending_create_rides_along() {
        let dir = tempfile::tempdir().unwrap();
        let api = FakeApi::default();
        api.set_offline(true);
        let mut cache = new_cache(&api, dir.path());
        let (record, _) = cache.create(sample_fields(50.0)).await;

        let (updated, outcome) = cache.update(&record.id, sample_fields(75.0)).await.unwrap();

        assert_eq!(outcome, SyncOutcome::Offline);
        assert_eq!(updated.fields.amount.inner(), 75.0);
        // Still a create from the server's point of view
        assert_eq!(cache.entries()[0].state, SyncState::PendingCreate);

        api.set_offline(false);
        let report = cache.sync_now().await;
        assert_eq!(report.flushed, 1);
        assert_eq!(api.server_records()[0].fields.amount.inner(), 75.0);
    }
}
