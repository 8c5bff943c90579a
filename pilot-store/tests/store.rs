use chrono::{DateTime, Duration, TimeZone, Utc};
use pilot_core::task::{ContextTag, NewTask, TaskSource, TaskStatus, MAX_TITLE_CHARS};
use pilot_store::{Backups, SqliteStore, TaskStore};
use tempfile::TempDir;

const CHAT: i64 = 42;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap()
}

fn store() -> (TempDir, SqliteStore) {
    let dir = TempDir::new().unwrap();
    let store = SqliteStore::open(dir.path().join("pilot.db")).unwrap();
    (dir, store)
}

fn draft(title: &str, priority: f64, due: Option<DateTime<Utc>>) -> NewTask {
    let mut t = NewTask::new(CHAT, title, priority, 30);
    t.due_at = due;
    t.added_at = now();
    t
}

#[test]
fn insert_and_read_back() {
    let (_dir, store) = store();
    let mut t = draft(&"x".repeat(250), 120.0, Some(now() + Duration::hours(3)));
    t.context = ContextTag::Custom("Horien".into());
    t.source = TaskSource::Voice;

    let id = store.insert_task(&t).unwrap();
    let got = store.get_task(CHAT, id).unwrap().unwrap();

    assert_eq!(got.title.chars().count(), MAX_TITLE_CHARS);
    assert_eq!(got.priority, 100.0);
    assert_eq!(got.due_at, Some(now() + Duration::hours(3)));
    assert_eq!(got.added_at, now());
    assert_eq!(got.context, ContextTag::Custom("Horien".into()));
    assert_eq!(got.source, TaskSource::Voice);
    assert_eq!(got.status, TaskStatus::Open);

    assert!(store.get_task(CHAT + 1, id).unwrap().is_none());
}

#[test]
fn ids_are_never_reused() {
    let (_dir, store) = store();
    let a = store.insert_task(&draft("a", 10.0, None)).unwrap();
    store.mark_dropped(CHAT, a).unwrap();
    let b = store.insert_task(&draft("b", 10.0, None)).unwrap();
    assert!(b > a);
}

#[test]
fn open_tasks_sorted_by_priority_then_newest() {
    let (_dir, store) = store();
    let low = store.insert_task(&draft("low", 10.0, None)).unwrap();
    let hi1 = store.insert_task(&draft("hi one", 80.0, None)).unwrap();
    let hi2 = store.insert_task(&draft("hi two", 80.0, None)).unwrap();

    let ids: Vec<_> = store
        .list_open_tasks(CHAT)
        .unwrap()
        .iter()
        .map(|t| t.id)
        .collect();
    assert_eq!(ids, vec![hi2, hi1, low]);
}

#[test]
fn status_transitions_only_from_open() {
    let (_dir, store) = store();
    let id = store.insert_task(&draft("pay", 50.0, None)).unwrap();

    assert!(store.mark_done(CHAT, id).unwrap());
    assert!(!store.mark_done(CHAT, id).unwrap());
    assert!(!store.mark_dropped(CHAT, id).unwrap());
    assert!(!store.update_due_at(CHAT, id, now(), None).unwrap());
    assert!(!store.mark_done(CHAT + 1, 9999).unwrap());

    assert!(store.list_open_tasks(CHAT).unwrap().is_empty());
    assert_eq!(store.get_task(CHAT, id).unwrap().unwrap().status, TaskStatus::Done);
}

#[test]
fn snooze_moves_due_and_rescores() {
    let (_dir, store) = store();
    let id = store
        .insert_task(&draft("report", 70.0, Some(now() - Duration::hours(1))))
        .unwrap();
    let later = now() + Duration::days(2);

    assert!(store.update_due_at(CHAT, id, later, Some(25.0)).unwrap());
    let t = store.get_task(CHAT, id).unwrap().unwrap();
    assert_eq!(t.due_at, Some(later));
    assert_eq!(t.priority, 25.0);
    assert!(store.list_overdue(now()).unwrap().is_empty());
}

#[test]
fn overdue_is_complete_and_oldest_first() {
    let (_dir, store) = store();
    for h in [1, 5, 3, 2] {
        store
            .insert_task(&draft(&format!("late {h}"), 50.0, Some(now() - Duration::hours(h))))
            .unwrap();
    }
    store
        .insert_task(&draft("future", 50.0, Some(now() + Duration::hours(1))))
        .unwrap();

    let rows = store.list_overdue(now()).unwrap();
    let titles: Vec<_> = rows.iter().map(|t| t.title.as_str()).collect();
    assert_eq!(titles, vec!["late 5", "late 3", "late 2", "late 1"]);
}

#[test]
fn overdue_skips_unreadable_deadlines() {
    let (dir, store) = store();
    let id = store
        .insert_task(&draft("real", 50.0, Some(now() - Duration::minutes(1))))
        .unwrap();
    let conn = rusqlite::Connection::open(dir.path().join("pilot.db")).unwrap();
    conn.execute(
        "INSERT INTO tasks (chat_id, title, due_at, added_at, status, priority, source)
         VALUES (?1, 'legacy', '0000-garbage', '2026-03-01T00:00:00Z', 'open', 10, 'text')",
        rusqlite::params![CHAT],
    )
    .unwrap();

    let rows = store.list_overdue(now()).unwrap();
    assert_eq!(rows.iter().map(|t| t.id).collect::<Vec<_>>(), vec![id]);
}

#[test]
fn today_window_and_inbox() {
    let (_dir, store) = store();
    let start = now() - Duration::hours(9);
    let end = start + Duration::days(1);

    let overdue = store
        .insert_task(&draft("yesterday", 40.0, Some(start - Duration::hours(3))))
        .unwrap();
    let today = store
        .insert_task(&draft("tonight", 60.0, Some(now() + Duration::hours(8))))
        .unwrap();
    store
        .insert_task(&draft("next week", 90.0, Some(now() + Duration::days(7))))
        .unwrap();
    let inbox = store.insert_task(&draft("someday", 20.0, None)).unwrap();

    let ids: Vec<_> = store
        .list_today(CHAT, now(), start, end)
        .unwrap()
        .iter()
        .map(|t| t.id)
        .collect();
    assert_eq!(ids, vec![today, overdue]);

    let inbox_ids: Vec<_> = store.list_inbox(CHAT).unwrap().iter().map(|t| t.id).collect();
    assert_eq!(inbox_ids, vec![inbox]);

    let week = store
        .list_tasks_due_in_window(CHAT, now(), now() + Duration::days(8))
        .unwrap();
    assert_eq!(week.len(), 2);
    assert!(week[0].due_at < week[1].due_at);
}

#[test]
fn kv_round_trip_and_overwrite() {
    let (_dir, store) = store();
    assert!(store.kv_get("weekly_review_manual").unwrap().is_none());
    store.kv_set("weekly_review_manual", "2026-03-08").unwrap();
    store.kv_set("weekly_review_manual", "2026-03-15").unwrap();
    assert_eq!(
        store.kv_get("weekly_review_manual").unwrap().as_deref(),
        Some("2026-03-15")
    );
}

#[test]
fn stats_counts_week_and_contexts() {
    let (_dir, store) = store();
    let mut old = draft("old", 10.0, None);
    old.added_at = now() - Duration::days(30);
    store.insert_task(&old).unwrap();

    let mut work = draft("deploy", 50.0, Some(now()));
    work.context = ContextTag::Work;
    let done_id = store.insert_task(&work).unwrap();
    store.insert_task(&work).unwrap();
    let mut voice = draft("call mom", 30.0, None);
    voice.source = TaskSource::Voice;
    voice.context = ContextTag::Family;
    store.insert_task(&voice).unwrap();
    store.mark_done(CHAT, done_id).unwrap();

    let s = store.stats(CHAT, now() - Duration::days(7)).unwrap();
    assert_eq!(s.total, 4);
    assert_eq!(s.done, 1);
    assert_eq!(s.open, 3);
    assert_eq!(s.with_deadline, 1);
    assert_eq!(s.voice, 1);
    assert_eq!(s.added_week, 3);
    assert_eq!(s.done_week, 1);
    assert_eq!(s.productivity_pct, 33.3);
    assert_eq!(s.top_contexts[0].1, 1);
    assert_eq!(s.top_contexts.len(), 3);
    assert!(s.db_size_bytes > 0);
}

#[test]
fn backups_are_created_listed_and_rotated() {
    let (dir, store) = store();
    store.insert_task(&draft("keep me", 10.0, None)).unwrap();
    let backups = Backups::new(store.path(), dir.path().join("backups"), 7);

    let old = backups.create_backup(now() - Duration::days(10)).unwrap().unwrap();
    assert!(old.exists());
    let fresh = backups.create_backup(now()).unwrap().unwrap();

    assert!(fresh.exists());
    assert!(!old.exists(), "backup past retention should be removed");
    assert!(fresh
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with("daily_pilot_backup_20260310_090000"));

    let listed = backups.list_backups(10).unwrap();
    assert_eq!(listed.len(), 1);
    assert!(listed[0].size > 0);

    let copy = SqliteStore::open(&fresh).unwrap();
    assert_eq!(copy.list_open_tasks(CHAT).unwrap().len(), 1);
}

#[test]
fn backup_without_database_is_none() {
    let dir = TempDir::new().unwrap();
    let backups = Backups::new(dir.path().join("missing.db"), dir.path().join("b"), 7);
    assert!(backups.create_backup(now()).unwrap().is_none());
    assert!(backups.list_backups(5).unwrap().is_empty());
}
