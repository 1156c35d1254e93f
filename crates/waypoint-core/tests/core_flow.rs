use chrono::NaiveDate;
use proptest::prelude::*;
use tempfile::tempdir;
use waypoint_core::calendar::calendar_events;
use waypoint_core::datastore::{FileStorage, KeyValueStore, MemoryStorage};
use waypoint_core::filter::{Filter, filtered_list};
use waypoint_core::map::{Coordinate, map_markers};
use waypoint_core::store::TaskStore;
use waypoint_core::task::{Priority, Status, TaskDraft};

#[test]
fn buy_milk_shows_up_in_every_view() {
    let temp = tempdir().expect("tempdir");
    let storage = FileStorage::open(temp.path()).expect("open storage");
    let mut store = TaskStore::load(storage, "tasks").expect("load store");

    let mut draft = TaskDraft {
        description: "Buy milk".to_string(),
        due_date: "2024-05-01".to_string(),
        location: "37.77,-122.41".to_string(),
        ..TaskDraft::default()
    };
    store.add(&mut draft).expect("add task");

    assert_eq!(store.tasks().len(), 1);

    let events = calendar_events(store.tasks());
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].title, "Buy milk");
    assert_eq!(
        events[0].start,
        Some(NaiveDate::from_ymd_opt(2024, 5, 1).expect("valid date"))
    );

    let markers = map_markers(store.tasks());
    assert_eq!(markers.len(), 1);
    assert_eq!(
        markers[0].position,
        Coordinate {
            lat: 37.77,
            lng: -122.41
        }
    );
}

#[test]
fn bad_location_stays_in_list_and_calendar() {
    let storage = MemoryStorage::new();
    let mut store = TaskStore::load(&storage, "tasks").expect("load store");

    let mut draft = TaskDraft {
        description: "Somewhere odd".to_string(),
        due_date: "2024-06-01".to_string(),
        location: "not,valid".to_string(),
        ..TaskDraft::default()
    };
    store.add(&mut draft).expect("add task");

    assert_eq!(filtered_list(store.tasks(), Filter::All).len(), 1);
    assert_eq!(calendar_events(store.tasks()).len(), 1);
    assert!(map_markers(store.tasks()).is_empty());
}

#[test]
fn persisted_list_reloads_identically() {
    let temp = tempdir().expect("tempdir");
    let original = {
        let storage = FileStorage::open(temp.path()).expect("open storage");
        let mut store = TaskStore::load(storage, "tasks").expect("load store");
        for (description, priority) in [
            ("first", Priority::Low),
            ("second", Priority::Medium),
            ("third", Priority::High),
        ] {
            let mut draft = TaskDraft {
                description: description.to_string(),
                priority,
                ..TaskDraft::default()
            };
            store.add(&mut draft).expect("add task");
        }
        let middle = store.tasks()[1].id.clone();
        store.toggle_status(&middle).expect("toggle");
        store.tasks().to_vec()
    };

    let storage = FileStorage::open(temp.path()).expect("reopen storage");
    let reloaded = TaskStore::load(storage, "tasks").expect("reload store");

    assert_eq!(reloaded.tasks(), original.as_slice());
    assert_eq!(reloaded.tasks()[0].description, "third");
    assert_eq!(reloaded.tasks()[1].status, Status::Completed);
}

#[test]
fn corrupt_file_falls_back_to_empty() {
    let temp = tempdir().expect("tempdir");
    let storage = FileStorage::open(temp.path()).expect("open storage");
    storage.set_item("tasks", "[{\"id\":").expect("seed corrupt data");

    let store = TaskStore::load(storage, "tasks").expect("load store");
    assert!(store.tasks().is_empty());
}

#[test]
fn non_utf8_file_falls_back_to_empty() {
    let temp = tempdir().expect("tempdir");
    std::fs::write(temp.path().join("tasks.json"), [0xff, 0xfe, b'[', b']'])
        .expect("seed invalid bytes");

    let storage = FileStorage::open(temp.path()).expect("open storage");
    let mut store = TaskStore::load(storage, "tasks").expect("load store");
    assert!(store.tasks().is_empty());

    store
        .add(&mut TaskDraft::new("fresh start"))
        .expect("add after recovery");
    assert_eq!(store.tasks().len(), 1);
}

#[test]
fn second_delete_is_a_noop() {
    let storage = MemoryStorage::new();
    let mut store = TaskStore::load(&storage, "tasks").expect("load store");
    let id = store
        .add(&mut TaskDraft::new("short lived"))
        .expect("add task")
        .expect("created");

    assert!(store.delete(&id).expect("first delete"));
    assert!(!store.delete(&id).expect("second delete"));
    assert!(store.tasks().is_empty());
}

#[test]
fn rapid_adds_get_distinct_ids() {
    let storage = MemoryStorage::new();
    let mut store = TaskStore::load(&storage, "tasks").expect("load store");
    for n in 0..50 {
        store
            .add(&mut TaskDraft::new(format!("task {n}")))
            .expect("add task");
    }

    let mut ids: Vec<&str> = store.tasks().iter().map(|t| t.id.as_str()).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 50);
}

proptest! {
    #[test]
    fn toggling_twice_restores_status(
        completed in prop::collection::vec(any::<bool>(), 1..20),
        pick in any::<prop::sample::Index>(),
    ) {
        let storage = MemoryStorage::new();
        let mut store = TaskStore::load(&storage, "tasks").expect("load store");
        for (n, done) in completed.iter().enumerate() {
            let mut draft = TaskDraft::new(format!("task {n}"));
            if *done {
                draft.status = Status::Completed;
            }
            store.add(&mut draft).expect("add task");
        }

        let target = store.tasks()[pick.index(store.tasks().len())].clone();
        store.toggle_status(&target.id).expect("first toggle");
        prop_assert_ne!(store.get(&target.id).map(|t| t.status), Some(target.status));
        store.toggle_status(&target.id).expect("second toggle");
        prop_assert_eq!(store.get(&target.id), Some(&target));
    }

    #[test]
    fn blank_descriptions_never_add(description in "[ \t\n]{0,8}") {
        let storage = MemoryStorage::new();
        let mut store = TaskStore::load(&storage, "tasks").expect("load store");
        let created = store.add(&mut TaskDraft::new(description)).expect("add");
        prop_assert_eq!(created, None);
        prop_assert!(store.tasks().is_empty());
    }
}
