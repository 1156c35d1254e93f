use anyhow::Context;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::datastore::KeyValueStore;
use crate::task::{Task, TaskDraft, next_task_id};

type Listener = Box<dyn FnMut(&[Task])>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

/// Owns the task list and writes it through to storage after every
/// mutation. Newest tasks come first.
pub struct TaskStore<S> {
    storage: S,
    key: String,
    tasks: Vec<Task>,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: u64,
}

impl<S: KeyValueStore> TaskStore<S> {
    /// Reads the snapshot under `key`. An absent or malformed snapshot
    /// yields an empty list; only storage I/O failures are errors.
    #[tracing::instrument(skip(storage, key), fields(storage_key = %key.as_ref()))]
    pub fn load(storage: S, key: impl AsRef<str>) -> anyhow::Result<Self> {
        let key = key.as_ref().to_string();
        let raw = storage
            .get_item(&key)
            .with_context(|| format!("failed to read stored tasks under {key}"))?;

        let tasks = match raw {
            None => {
                debug!("no stored tasks, starting empty");
                vec![]
            }
            Some(raw) => match decode_snapshot(&raw) {
                Ok(tasks) => tasks,
                Err(err) => {
                    warn!(error = %err, "stored tasks are malformed; starting empty");
                    vec![]
                }
            },
        };

        info!(count = tasks.len(), "loaded tasks");

        Ok(Self {
            storage,
            key,
            tasks,
            listeners: vec![],
            next_subscription: 0,
        })
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn storage_key(&self) -> &str {
        &self.key
    }

    pub fn add(&mut self, draft: &mut TaskDraft) -> anyhow::Result<Option<String>> {
        self.add_at(draft, Utc::now())
    }

    /// Creates a task from `draft` and resets the draft. A blank description
    /// leaves both the list and the draft untouched.
    #[tracing::instrument(skip(self, draft, now))]
    pub fn add_at(
        &mut self,
        draft: &mut TaskDraft,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Option<String>> {
        if draft.is_blank() {
            debug!("ignoring add with blank description");
            return Ok(None);
        }

        let id = next_task_id(now, &self.tasks);
        let mut next = Vec::with_capacity(self.tasks.len() + 1);
        next.push(Task::from_draft(id.clone(), draft));
        next.extend(self.tasks.iter().cloned());
        self.commit(next)?;
        draft.reset();

        info!(id = %id, count = self.tasks.len(), "task added");
        Ok(Some(id))
    }

    /// Flips every task carrying `id`; hand-edited snapshots may repeat ids.
    #[tracing::instrument(skip(self))]
    pub fn toggle_status(&mut self, id: &str) -> anyhow::Result<bool> {
        let mut next = self.tasks.clone();
        let mut flipped = 0_usize;
        for task in next.iter_mut().filter(|t| t.id == id) {
            task.status = task.status.toggled();
            flipped += 1;
        }

        if flipped == 0 {
            debug!("toggle on unknown id is a no-op");
            return Ok(false);
        }

        self.commit(next)?;
        info!(flipped, "task status toggled");
        Ok(true)
    }

    #[tracing::instrument(skip(self))]
    pub fn delete(&mut self, id: &str) -> anyhow::Result<bool> {
        let next: Vec<Task> = self.tasks.iter().filter(|t| t.id != id).cloned().collect();
        if next.len() == self.tasks.len() {
            debug!("delete on unknown id is a no-op");
            return Ok(false);
        }

        self.commit(next)?;
        info!(count = self.tasks.len(), "task deleted");
        Ok(true)
    }

    /// Writes the whole list under the store's key.
    #[tracing::instrument(skip(self), fields(key = %self.key, count = self.tasks.len()))]
    pub fn persist(&self) -> anyhow::Result<()> {
        self.write_snapshot(&self.tasks)
    }

    /// Registers a listener called with the fresh list after each mutation.
    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&[Task]) + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sub, _)| *sub != id);
        self.listeners.len() != before
    }

    /// Writes `next` and only then replaces the in-memory list, so a failed
    /// write leaves the store as it was.
    fn commit(&mut self, next: Vec<Task>) -> anyhow::Result<()> {
        self.write_snapshot(&next)?;
        self.tasks = next;
        for (_, listener) in &mut self.listeners {
            listener(&self.tasks);
        }
        Ok(())
    }

    fn write_snapshot(&self, tasks: &[Task]) -> anyhow::Result<()> {
        let json = encode_snapshot(tasks)?;
        self.storage
            .set_item(&self.key, &json)
            .with_context(|| format!("failed to persist tasks under {}", self.key))
    }
}

pub fn decode_snapshot(raw: &str) -> anyhow::Result<Vec<Task>> {
    serde_json::from_str(raw).context("failed parsing stored task list")
}

pub fn encode_snapshot(tasks: &[Task]) -> anyhow::Result<String> {
    serde_json::to_string(tasks).context("failed serializing task list")
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use anyhow::anyhow;
    use chrono::{TimeZone, Utc};

    use super::TaskStore;
    use crate::datastore::{KeyValueStore, MemoryStorage};
    use crate::task::{Priority, Status, TaskDraft};

    /// Memory storage whose writes can be switched off.
    #[derive(Default)]
    struct FlakyStorage {
        inner: MemoryStorage,
        failing: Cell<bool>,
    }

    impl KeyValueStore for FlakyStorage {
        fn get_item(&self, key: &str) -> anyhow::Result<Option<String>> {
            self.inner.get_item(key)
        }

        fn set_item(&self, key: &str, value: &str) -> anyhow::Result<()> {
            if self.failing.get() {
                return Err(anyhow!("disk full"));
            }
            self.inner.set_item(key, value)
        }
    }

    fn at(millis: i64) -> chrono::DateTime<Utc> {
        Utc.timestamp_millis_opt(millis).single().expect("valid time")
    }

    #[test]
    fn add_prepends_and_resets_draft() {
        let storage = MemoryStorage::new();
        let mut store = TaskStore::load(&storage, "tasks").expect("load");

        let mut first = TaskDraft::new("first");
        store.add_at(&mut first, at(1)).expect("add first");

        let mut second = TaskDraft {
            description: "second".to_string(),
            status: Status::Completed,
            priority: Priority::High,
            due_date: "2024-05-01".to_string(),
            location: "1,2".to_string(),
        };
        let id = store
            .add_at(&mut second, at(2))
            .expect("add second")
            .expect("created");

        assert_eq!(store.tasks().len(), 2);
        assert_eq!(store.tasks()[0].id, id);
        assert_eq!(store.tasks()[0].description, "second");
        assert_eq!(store.tasks()[0].priority, Priority::High);
        assert_eq!(second, TaskDraft::default());
    }

    #[test]
    fn blank_add_is_ignored_and_keeps_draft() {
        let storage = MemoryStorage::new();
        let mut store = TaskStore::load(&storage, "tasks").expect("load");

        let mut draft = TaskDraft {
            description: "   ".to_string(),
            priority: Priority::Medium,
            ..TaskDraft::default()
        };
        let created = store.add_at(&mut draft, at(1)).expect("add");

        assert_eq!(created, None);
        assert!(store.tasks().is_empty());
        assert_eq!(draft.priority, Priority::Medium);
        assert_eq!(storage.get_item("tasks").expect("get"), None);
    }

    #[test]
    fn toggle_and_delete_unknown_ids_are_noops() {
        let storage = MemoryStorage::new();
        let mut store = TaskStore::load(&storage, "tasks").expect("load");
        store
            .add_at(&mut TaskDraft::new("keep"), at(5))
            .expect("add");

        assert!(!store.toggle_status("missing").expect("toggle"));
        assert!(!store.delete("missing").expect("delete"));
        assert_eq!(store.tasks().len(), 1);
        assert_eq!(store.tasks()[0].status, Status::Pending);
    }

    #[test]
    fn every_mutation_is_written_through() {
        let storage = MemoryStorage::new();
        let mut store = TaskStore::load(&storage, "tasks").expect("load");
        let id = store
            .add_at(&mut TaskDraft::new("persist me"), at(7))
            .expect("add")
            .expect("created");

        store.toggle_status(&id).expect("toggle");
        let raw = storage.get_item("tasks").expect("get").expect("stored");
        assert!(raw.contains("\"completed\""));

        store.delete(&id).expect("delete");
        assert_eq!(storage.get_item("tasks").expect("get").as_deref(), Some("[]"));
    }

    #[test]
    fn malformed_snapshot_loads_empty() {
        let storage = MemoryStorage::new();
        storage.set_item("tasks", "{not json").expect("seed");
        let store = TaskStore::load(&storage, "tasks").expect("load");
        assert!(store.tasks().is_empty());

        storage
            .set_item("tasks", r#"[{"id":"1","description":"x","status":"archived","priority":"low"}]"#)
            .expect("seed");
        let store = TaskStore::load(&storage, "tasks").expect("load");
        assert!(store.tasks().is_empty());
    }

    #[test]
    fn listeners_see_mutations_until_unsubscribed() {
        let storage = MemoryStorage::new();
        let mut store = TaskStore::load(&storage, "tasks").expect("load");
        let seen = Rc::new(RefCell::new(Vec::new()));

        let sink = Rc::clone(&seen);
        let sub = store.subscribe(move |tasks| sink.borrow_mut().push(tasks.len()));

        let id = store
            .add_at(&mut TaskDraft::new("a"), at(1))
            .expect("add")
            .expect("created");
        store.toggle_status("missing").expect("noop toggle");
        store.toggle_status(&id).expect("toggle");
        assert!(store.unsubscribe(sub));
        store.delete(&id).expect("delete");

        assert_eq!(*seen.borrow(), vec![1, 1]);
        assert!(!store.unsubscribe(sub));
    }

    #[test]
    fn failed_add_leaves_list_and_draft_alone() {
        let storage = FlakyStorage::default();
        let mut store = TaskStore::load(&storage, "tasks").expect("load");
        storage.failing.set(true);

        let mut draft = TaskDraft::new("pay rent");
        assert!(store.add_at(&mut draft, at(1)).is_err());
        assert!(store.tasks().is_empty());
        assert_eq!(draft.description, "pay rent");

        storage.failing.set(false);
        store.add_at(&mut draft, at(2)).expect("retry add");
        assert_eq!(store.tasks().len(), 1);
        assert_eq!(draft, TaskDraft::default());
    }

    #[test]
    fn failed_toggle_keeps_status() {
        let storage = FlakyStorage::default();
        let mut store = TaskStore::load(&storage, "tasks").expect("load");
        let id = store
            .add_at(&mut TaskDraft::new("water plants"), at(1))
            .expect("add")
            .expect("created");

        storage.failing.set(true);
        assert!(store.toggle_status(&id).is_err());
        assert_eq!(store.tasks()[0].status, Status::Pending);
    }

    #[test]
    fn failed_delete_keeps_task() {
        let storage = FlakyStorage::default();
        let mut store = TaskStore::load(&storage, "tasks").expect("load");
        let id = store
            .add_at(&mut TaskDraft::new("call mum"), at(1))
            .expect("add")
            .expect("created");

        storage.failing.set(true);
        assert!(store.delete(&id).is_err());
        assert_eq!(store.tasks().len(), 1);
        assert!(store.get(&id).is_some());
    }

    #[test]
    fn failed_write_does_not_notify() {
        let storage = FlakyStorage::default();
        let mut store = TaskStore::load(&storage, "tasks").expect("load");
        let calls = Rc::new(Cell::new(0));
        let sink = Rc::clone(&calls);
        store.subscribe(move |_| sink.set(sink.get() + 1));

        storage.failing.set(true);
        assert!(store.add_at(&mut TaskDraft::new("x"), at(1)).is_err());
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn toggle_flips_every_task_sharing_an_id() {
        let storage = MemoryStorage::new();
        storage
            .set_item(
                "tasks",
                r#"[{"id":"7","description":"a","status":"pending","priority":"low"},
                    {"id":"7","description":"b","status":"completed","priority":"low"}]"#,
            )
            .expect("seed");
        let mut store = TaskStore::load(&storage, "tasks").expect("load");

        assert!(store.toggle_status("7").expect("toggle"));
        assert_eq!(store.tasks()[0].status, Status::Completed);
        assert_eq!(store.tasks()[1].status, Status::Pending);
    }
}
