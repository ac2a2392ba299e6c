//! In-memory `Store` with optional JSON snapshot persistence.
//!
//! Accounts and courses live in `BTreeMap`s keyed by id, so iteration order is
//! id order. When opened on a directory the store reads `accounts.json` and
//! `courses.json` on startup and rewrites the affected file after each mutation.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{Course, CourseFields, CourseUpdate, NewPrincipal, Store, StoreError, StoreResult};
use crate::identity::Principal;

const ACCOUNTS_FILE: &str = "accounts.json";
const COURSES_FILE: &str = "courses.json";

#[derive(Default)]
struct Tables {
    principals: BTreeMap<i64, Principal>,
    courses: BTreeMap<i64, Course>,
    next_principal_id: i64,
    next_course_id: i64,
    /// Bumped on every mutation; orders snapshots taken under the lock.
    generation: u64,
}

impl Tables {
    fn reindex(&mut self) {
        self.next_principal_id = self.principals.keys().next_back().copied().unwrap_or(0) + 1;
        self.next_course_id = self.courses.keys().next_back().copied().unwrap_or(0) + 1;
    }
}

/// Serialized table contents, taken under the write lock and written after it is released.
struct Snapshot {
    path: PathBuf,
    generation: u64,
    bytes: Vec<u8>,
}

pub struct MemoryStore {
    tables: RwLock<Tables>,
    dir: Option<PathBuf>,
    // Generation last written to each file. Held across the write so files are
    // replaced in generation order.
    accounts_written: Mutex<u64>,
    courses_written: Mutex<u64>,
}

impl Default for MemoryStore {
    fn default() -> Self { Self::new() }
}

impl MemoryStore {
    pub fn new() -> Self {
        let mut tables = Tables::default();
        tables.reindex();
        Self::with_tables(tables, None)
    }

    /// Open a store persisted under `dir`, creating the directory if needed.
    pub fn open<P: AsRef<Path>>(dir: P) -> StoreResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        let principals: Vec<Principal> = read_snapshot(&dir.join(ACCOUNTS_FILE))?;
        let courses: Vec<Course> = read_snapshot(&dir.join(COURSES_FILE))?;
        let mut tables = Tables {
            principals: principals.into_iter().map(|p| (p.id, p)).collect(),
            courses: courses.into_iter().map(|c| (c.id, c)).collect(),
            ..Default::default()
        };
        tables.reindex();
        debug!(target: "coursegate::storage", "opened store dir='{}' accounts={} courses={}", dir.display(), tables.principals.len(), tables.courses.len());
        Ok(Self::with_tables(tables, Some(dir)))
    }

    fn with_tables(tables: Tables, dir: Option<PathBuf>) -> Self {
        Self { tables: RwLock::new(tables), dir, accounts_written: Mutex::new(0), courses_written: Mutex::new(0) }
    }

    fn snapshot_principals(&self, tables: &mut Tables) -> StoreResult<Option<Snapshot>> {
        let Some(dir) = &self.dir else { return Ok(None); };
        tables.generation += 1;
        let rows: Vec<&Principal> = tables.principals.values().collect();
        Ok(Some(Snapshot { path: dir.join(ACCOUNTS_FILE), generation: tables.generation, bytes: serde_json::to_vec_pretty(&rows)? }))
    }

    fn snapshot_courses(&self, tables: &mut Tables) -> StoreResult<Option<Snapshot>> {
        let Some(dir) = &self.dir else { return Ok(None); };
        tables.generation += 1;
        let rows: Vec<&Course> = tables.courses.values().collect();
        Ok(Some(Snapshot { path: dir.join(COURSES_FILE), generation: tables.generation, bytes: serde_json::to_vec_pretty(&rows)? }))
    }

    /// Write `snapshot` off the async workers. A snapshot older than the one already
    /// on disk is skipped: every snapshot holds the whole table, so the newer one
    /// already contains its rows.
    async fn flush(&self, written: &Mutex<u64>, snapshot: Option<Snapshot>) -> StoreResult<()> {
        let Some(Snapshot { path, generation, bytes }) = snapshot else { return Ok(()); };
        let mut last = written.lock().await;
        if generation <= *last { return Ok(()); }
        tokio::task::spawn_blocking(move || write_snapshot(&path, &bytes))
            .await
            .map_err(|e| StoreError::Unavailable(format!("snapshot writer failed: {e}")))??;
        *last = generation;
        Ok(())
    }
}

fn read_snapshot<T: DeserializeOwned>(path: &Path) -> StoreResult<Vec<T>> {
    if !path.exists() { return Ok(Vec::new()); }
    let bytes = fs::read(path)?;
    if bytes.is_empty() { return Ok(Vec::new()); }
    Ok(serde_json::from_slice(&bytes)?)
}

fn write_snapshot(path: &Path, bytes: &[u8]) -> StoreResult<()> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_principal_by_login(&self, login: &str) -> StoreResult<Option<Principal>> {
        let t = self.tables.read();
        Ok(t.principals.values().find(|p| p.email_address == login).cloned())
    }

    async fn find_principal_by_id(&self, id: i64) -> StoreResult<Option<Principal>> {
        Ok(self.tables.read().principals.get(&id).cloned())
    }

    async fn create_principal(&self, new: NewPrincipal) -> StoreResult<Principal> {
        let (principal, snapshot) = {
            let mut t = self.tables.write();
            if t.principals.values().any(|p| p.email_address == new.email_address) {
                return Err(StoreError::DuplicateLogin(new.email_address));
            }
            let now = Utc::now();
            let principal = Principal {
                id: t.next_principal_id,
                first_name: new.first_name,
                last_name: new.last_name,
                email_address: new.email_address,
                password_hash: new.password_hash,
                created_at: now,
                updated_at: now,
            };
            t.next_principal_id += 1;
            t.principals.insert(principal.id, principal.clone());
            match self.snapshot_principals(&mut t) {
                Ok(snapshot) => (principal, snapshot),
                Err(e) => {
                    t.principals.remove(&principal.id);
                    return Err(e);
                }
            }
        };
        if let Err(e) = self.flush(&self.accounts_written, snapshot).await {
            warn!(target: "coursegate::storage", id = principal.id, "create_principal not persisted: {}", e);
            self.tables.write().principals.remove(&principal.id);
            return Err(e);
        }
        debug!(target: "coursegate::storage", id = principal.id, "create_principal");
        Ok(principal)
    }

    async fn count_principals(&self) -> StoreResult<usize> {
        Ok(self.tables.read().principals.len())
    }

    async fn list_courses(&self) -> StoreResult<Vec<Course>> {
        Ok(self.tables.read().courses.values().cloned().collect())
    }

    async fn find_course_by_id(&self, id: i64) -> StoreResult<Option<Course>> {
        Ok(self.tables.read().courses.get(&id).cloned())
    }

    async fn create_course(&self, fields: CourseFields, owner_id: i64) -> StoreResult<Course> {
        let (course, snapshot) = {
            let mut t = self.tables.write();
            if !t.principals.contains_key(&owner_id) {
                return Err(StoreError::UnknownOwner(owner_id));
            }
            let now = Utc::now();
            let course = Course {
                id: t.next_course_id,
                title: fields.title,
                description: fields.description,
                estimated_time: fields.estimated_time,
                materials_needed: fields.materials_needed,
                user_id: owner_id,
                created_at: now,
                updated_at: now,
            };
            t.next_course_id += 1;
            t.courses.insert(course.id, course.clone());
            match self.snapshot_courses(&mut t) {
                Ok(snapshot) => (course, snapshot),
                Err(e) => {
                    t.courses.remove(&course.id);
                    return Err(e);
                }
            }
        };
        if let Err(e) = self.flush(&self.courses_written, snapshot).await {
            warn!(target: "coursegate::storage", id = course.id, "create_course not persisted: {}", e);
            self.tables.write().courses.remove(&course.id);
            return Err(e);
        }
        debug!(target: "coursegate::storage", id = course.id, owner_id, "create_course");
        Ok(course)
    }

    async fn update_course(&self, id: i64, update: CourseUpdate) -> StoreResult<()> {
        let (previous, applied, snapshot) = {
            let mut t = self.tables.write();
            let Some(course) = t.courses.get_mut(&id) else { return Err(StoreError::MissingCourse(id)); };
            let previous = course.clone();
            update.apply(course);
            course.updated_at = Utc::now();
            let applied = course.clone();
            match self.snapshot_courses(&mut t) {
                Ok(snapshot) => (previous, applied, snapshot),
                Err(e) => {
                    t.courses.insert(id, previous);
                    return Err(e);
                }
            }
        };
        if let Err(e) = self.flush(&self.courses_written, snapshot).await {
            warn!(target: "coursegate::storage", id, "update_course not persisted: {}", e);
            let mut t = self.tables.write();
            // only undo if nobody changed the row since
            if t.courses.get(&id) == Some(&applied) {
                t.courses.insert(id, previous);
            }
            return Err(e);
        }
        debug!(target: "coursegate::storage", id, "update_course");
        Ok(())
    }

    async fn delete_course(&self, id: i64) -> StoreResult<()> {
        let (previous, snapshot) = {
            let mut t = self.tables.write();
            let Some(previous) = t.courses.remove(&id) else { return Err(StoreError::MissingCourse(id)); };
            match self.snapshot_courses(&mut t) {
                Ok(snapshot) => (previous, snapshot),
                Err(e) => {
                    t.courses.insert(id, previous);
                    return Err(e);
                }
            }
        };
        if let Err(e) = self.flush(&self.courses_written, snapshot).await {
            warn!(target: "coursegate::storage", id, "delete_course not persisted: {}", e);
            self.tables.write().courses.entry(id).or_insert(previous);
            return Err(e);
        }
        debug!(target: "coursegate::storage", id, "delete_course");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn joe() -> NewPrincipal {
        NewPrincipal {
            first_name: "Joe".into(),
            last_name: "Smith".into(),
            email_address: "joe@smith.com".into(),
            password_hash: "$argon2id$v=19$placeholder".into(),
        }
    }

    fn fields(title: &str) -> CourseFields {
        CourseFields { title: title.into(), description: "desc".into(), ..Default::default() }
    }

    #[tokio::test]
    async fn principals_are_unique_by_login() {
        let store = MemoryStore::new();
        let p = store.create_principal(joe()).await.unwrap();
        assert_eq!(p.id, 1);
        let err = store.create_principal(joe()).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateLogin(ref l) if l == "joe@smith.com"));
        assert_eq!(store.count_principals().await.unwrap(), 1);
        assert_eq!(store.find_principal_by_login("joe@smith.com").await.unwrap().map(|p| p.id), Some(1));
        assert!(store.find_principal_by_login("JOE@smith.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn course_owner_must_exist() {
        let store = MemoryStore::new();
        let err = store.create_course(fields("Orphan"), 42).await.unwrap_err();
        assert!(matches!(err, StoreError::UnknownOwner(42)));
        assert!(store.list_courses().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_keeps_owner_and_missing_rows_are_reported() {
        let store = MemoryStore::new();
        let owner = store.create_principal(joe()).await.unwrap();
        let c = store.create_course(fields("Build a Basic Bookcase"), owner.id).await.unwrap();

        let changed = CourseUpdate {
            title: Some("Build a Better Bookcase".into()),
            materials_needed: Some(Some("* 1/2 x 3/4 inch parting strip".into())),
            ..Default::default()
        };
        store.update_course(c.id, changed.clone()).await.unwrap();
        let reloaded = store.find_course_by_id(c.id).await.unwrap().unwrap();
        assert_eq!(reloaded.title, "Build a Better Bookcase");
        assert_eq!(reloaded.user_id, owner.id);

        assert!(matches!(store.update_course(99, changed).await, Err(StoreError::MissingCourse(99))));
        store.delete_course(c.id).await.unwrap();
        assert!(matches!(store.delete_course(c.id).await, Err(StoreError::MissingCourse(_))));
    }

    #[tokio::test]
    async fn update_only_touches_supplied_keys() {
        let store = MemoryStore::new();
        let owner = store.create_principal(joe()).await.unwrap();
        let mut bookcase = fields("Bookcase");
        bookcase.estimated_time = Some("12 hours".into());
        bookcase.materials_needed = Some("wood".into());
        let c = store.create_course(bookcase, owner.id).await.unwrap();

        let retitle = CourseUpdate { title: Some("Bigger Bookcase".into()), ..Default::default() };
        store.update_course(c.id, retitle).await.unwrap();
        let after = store.find_course_by_id(c.id).await.unwrap().unwrap();
        assert_eq!(after.title, "Bigger Bookcase");
        assert_eq!(after.description, "desc");
        assert_eq!(after.estimated_time.as_deref(), Some("12 hours"));
        assert_eq!(after.materials_needed.as_deref(), Some("wood"));

        // an explicit null clears
        let clear = CourseUpdate { estimated_time: Some(None), ..Default::default() };
        store.update_course(c.id, clear).await.unwrap();
        let after = store.find_course_by_id(c.id).await.unwrap().unwrap();
        assert_eq!(after.estimated_time, None);
        assert_eq!(after.materials_needed.as_deref(), Some("wood"));
    }

    #[tokio::test]
    async fn list_is_ordered_by_id() {
        let store = MemoryStore::new();
        let owner = store.create_principal(joe()).await.unwrap();
        for t in ["a", "b", "c"] { store.create_course(fields(t), owner.id).await.unwrap(); }
        store.delete_course(2).await.unwrap();
        let ids: Vec<i64> = store.list_courses().await.unwrap().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[tokio::test]
    async fn snapshot_survives_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        {
            let store = MemoryStore::open(tmp.path()).unwrap();
            let owner = store.create_principal(joe()).await.unwrap();
            store.create_course(fields("Learn How to Program"), owner.id).await.unwrap();
        }
        let store = MemoryStore::open(tmp.path()).unwrap();
        assert_eq!(store.count_principals().await.unwrap(), 1);
        let courses = store.list_courses().await.unwrap();
        assert_eq!(courses.len(), 1);
        assert_eq!(courses[0].title, "Learn How to Program");
        // ids keep increasing after reload
        let next = store.create_course(fields("Next"), 1).await.unwrap();
        assert_eq!(next.id, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writes_leave_the_latest_snapshot() {
        let tmp = tempfile::tempdir().unwrap();
        let store = std::sync::Arc::new(MemoryStore::open(tmp.path()).unwrap());
        let owner_id = store.create_principal(joe()).await.unwrap().id;
        let mut tasks = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move { store.create_course(fields(&format!("c{i}")), owner_id).await }));
        }
        for t in tasks { t.await.unwrap().unwrap(); }
        drop(store);

        let reopened = MemoryStore::open(tmp.path()).unwrap();
        assert_eq!(reopened.list_courses().await.unwrap().len(), 16);
        assert!(!tmp.path().join("courses.json.tmp").exists());
    }

    #[tokio::test]
    async fn corrupt_snapshot_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(ACCOUNTS_FILE), b"{not json").unwrap();
        assert!(matches!(MemoryStore::open(tmp.path()), Err(StoreError::Serde(_))));
    }
}
