use chrono::{DateTime, TimeZone, Utc};
use pv_core::{Role, Turn};
use pv_session::{Identity, Transcript};
use pv_storage::{Database, Period, SqliteTranscript, StorageError, Trend};
use tempfile::TempDir;

fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
}

async fn db_with_user(id: i64) -> Database {
    let db = Database::open_in_memory().unwrap();
    db.users().get_or_create(id, Some("alice"), "Alice").await.unwrap();
    db
}

// ============================================================
// Database
// ============================================================

#[tokio::test]
async fn test_open_creates_parent_dir() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("bot.db");
    let db = Database::open(&path).unwrap();
    db.users().get_or_create(1, None, "Bob").await.unwrap();
    assert!(path.exists());
}

#[tokio::test]
async fn test_reopen_keeps_rows() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bot.db");
    {
        let db = Database::open(&path).unwrap();
        db.users().get_or_create(1, None, "Bob").await.unwrap();
        db.messages().create(1, Role::User, "persisted").await.unwrap();
    }
    let db = Database::open(&path).unwrap();
    let recent = db.messages().get_recent(1, 10).await.unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].content, "persisted");
}

// ============================================================
// Users
// ============================================================

#[tokio::test]
async fn test_user_get_or_create_touches() {
    let db = Database::open_in_memory().unwrap();
    let users = db.users();
    let first = users.get_or_create_at(7, Some("h"), "Ann", at(2026, 1, 1, 0, 0)).await.unwrap();
    let second = users.get_or_create_at(7, Some("h"), "Ann", at(2026, 1, 2, 0, 0)).await.unwrap();

    assert_eq!(first.created_at, second.created_at);
    assert_eq!(second.last_accessed, at(2026, 1, 2, 0, 0));
    assert_eq!(second.handle.as_deref(), Some("h"));
    assert_eq!(second.display_name, "Ann");
}

#[tokio::test]
async fn test_soft_deleted_user_not_returned() {
    let db = db_with_user(3).await;
    assert!(db.users().soft_delete(3).await.unwrap());
    assert!(db.users().get_by_id(3).await.unwrap().is_none());

    let err = db.users().get_or_create(3, None, "Alice").await.unwrap_err();
    assert!(matches!(err, StorageError::Invariant(_)));
}

#[tokio::test]
async fn test_soft_delete_unknown_user() {
    let db = Database::open_in_memory().unwrap();
    assert!(!db.users().soft_delete(404).await.unwrap());
}

// ============================================================
// Messages
// ============================================================

#[tokio::test]
async fn test_message_requires_user() {
    let db = Database::open_in_memory().unwrap();
    let err = db.messages().create(99, Role::User, "orphan").await.unwrap_err();
    assert!(matches!(err, StorageError::Sqlite(_)));
}

#[tokio::test]
async fn test_get_recent_order_and_limit() {
    let db = db_with_user(1).await;
    let messages = db.messages();
    for (i, text) in ["one", "two", "three"].iter().enumerate() {
        messages.create_at(1, Role::User, text, at(2026, 2, 1, 10, i as u32)).await.unwrap();
    }

    let recent = messages.get_recent(1, 2).await.unwrap();
    let texts: Vec<_> = recent.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(texts, vec!["three", "two"]);
    assert_eq!(recent[0].role, Role::User);
    assert_eq!(recent[0].length, 5);
}

#[tokio::test]
async fn test_length_counts_chars() {
    let db = db_with_user(1).await;
    db.messages().create(1, Role::Assistant, "héllo").await.unwrap();
    let recent = db.messages().get_recent(1, 1).await.unwrap();
    assert_eq!(recent[0].length, 5);
}

#[tokio::test]
async fn test_soft_delete_hides_message() {
    let db = db_with_user(1).await;
    let messages = db.messages();
    let id = messages.create(1, Role::User, "secret").await.unwrap();
    messages.create(1, Role::User, "public").await.unwrap();

    assert!(messages.soft_delete(id).await.unwrap());
    assert!(!messages.soft_delete(id).await.unwrap());
    let recent = messages.get_recent(1, 10).await.unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].content, "public");
}

#[tokio::test]
async fn test_soft_delete_all_for_user() {
    let db = db_with_user(1).await;
    db.users().get_or_create(2, None, "Other").await.unwrap();
    let messages = db.messages();
    messages.create(1, Role::User, "a").await.unwrap();
    messages.create(1, Role::Assistant, "b").await.unwrap();
    messages.create(2, Role::User, "c").await.unwrap();

    assert_eq!(messages.soft_delete_all_for_user(1).await.unwrap(), 2);
    assert_eq!(messages.soft_delete_all_for_user(1).await.unwrap(), 0);
    assert!(messages.get_recent(1, 10).await.unwrap().is_empty());
    assert_eq!(messages.get_recent(2, 10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_search_fts() {
    let db = db_with_user(1).await;
    let messages = db.messages();
    messages.create(1, Role::User, "the quick brown fox").await.unwrap();
    let hidden = messages.create(1, Role::User, "a quick detour").await.unwrap();
    messages.create(1, Role::Assistant, "nothing to see").await.unwrap();
    messages.soft_delete(hidden).await.unwrap();

    let hits = messages.search("quick", 10).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].content, "the quick brown fox");

    assert_eq!(messages.search("quick fox", 10).await.unwrap().len(), 1);
    assert!(messages.search("quick cat", 10).await.unwrap().is_empty());
    // Operator characters are searched literally instead of failing.
    assert!(messages.search("\"unbalanced AND (", 10).await.unwrap().is_empty());
    assert!(messages.search("   ", 10).await.unwrap().is_empty());
}

// ============================================================
// Stats
// ============================================================

async fn seeded_stats_db() -> Database {
    let db = Database::open_in_memory().unwrap();
    let users = db.users();
    users.get_or_create_at(1, None, "Old", at(2026, 2, 28, 9, 0)).await.unwrap();
    users.get_or_create_at(2, None, "New", at(2026, 3, 9, 8, 0)).await.unwrap();
    users.get_or_create_at(3, None, "Newer", at(2026, 3, 9, 8, 30)).await.unwrap();

    let messages = db.messages();
    messages.create_at(1, Role::User, "abcd", at(2026, 2, 28, 10, 0)).await.unwrap();
    messages.create_at(2, Role::User, "hello", at(2026, 3, 9, 9, 0)).await.unwrap();
    messages.create_at(2, Role::User, "hi there!", at(2026, 3, 10, 8, 0)).await.unwrap();
    db
}

#[tokio::test]
async fn test_stats_week() {
    let db = seeded_stats_db().await;
    let stats = db.stats().collect_at(Period::Week, at(2026, 3, 10, 12, 30)).await.unwrap();

    assert_eq!(stats.period, Period::Week);
    let labels: Vec<_> = stats.kpi_metrics.iter().map(|k| k.label.as_str()).collect();
    assert_eq!(
        labels,
        vec!["Total Users", "Total Messages", "Deleted Messages", "Avg Message Length"]
    );

    let users = &stats.kpi_metrics[0];
    assert_eq!(users.value, "3");
    assert_eq!(users.change, 100.0);
    assert_eq!(users.trend, Trend::Up);

    let messages = &stats.kpi_metrics[1];
    assert_eq!(messages.value, "3");
    assert_eq!(messages.change, 100.0);

    let deleted = &stats.kpi_metrics[2];
    assert_eq!(deleted.value, "0");
    assert_eq!(deleted.change, 0.0);
    assert_eq!(deleted.trend, Trend::Stable);

    let avg = &stats.kpi_metrics[3];
    assert_eq!(avg.value, "7 chars");
    assert_eq!(avg.change, 75.0);

    assert_eq!(stats.timeline.len(), 7);
    assert_eq!(stats.timeline[0].date, "2026-03-04");
    assert_eq!(stats.timeline[6].date, "2026-03-10");
    assert_eq!(stats.timeline[5].value, 1);
    assert_eq!(stats.timeline[6].value, 1);
    assert_eq!(stats.timeline.iter().map(|p| p.value).sum::<i64>(), 2);
}

#[tokio::test]
async fn test_stats_day_is_hourly() {
    let db = seeded_stats_db().await;
    let stats = db.stats().collect_at(Period::Day, at(2026, 3, 10, 12, 30)).await.unwrap();

    assert_eq!(stats.timeline.len(), 24);
    assert_eq!(stats.timeline[0].date, "2026-03-09T13:00:00");
    assert_eq!(stats.timeline[23].date, "2026-03-10T12:00:00");
    let hit: Vec<_> = stats.timeline.iter().filter(|p| p.value > 0).collect();
    assert_eq!(hit.len(), 1);
    assert_eq!(hit[0].date, "2026-03-10T08:00:00");
}

#[tokio::test]
async fn test_stats_month_and_empty_db() {
    let db = Database::open_in_memory().unwrap();
    let stats = db.stats().collect(Period::Month).await.unwrap();
    assert_eq!(stats.timeline.len(), 30);
    assert!(stats.timeline.iter().all(|p| p.value == 0));
    assert_eq!(stats.kpi_metrics[3].value, "0 chars");
    assert!(stats.kpi_metrics.iter().all(|k| k.trend == Trend::Stable));
}

#[tokio::test]
async fn test_stats_counts_deletions() {
    let db = db_with_user(1).await;
    let id = db.messages().create(1, Role::User, "oops").await.unwrap();
    db.messages().soft_delete(id).await.unwrap();

    let stats = db.stats().collect_at(Period::Week, Utc::now() + chrono::Duration::minutes(1)).await.unwrap();
    assert_eq!(stats.kpi_metrics[1].value, "0");
    assert_eq!(stats.kpi_metrics[2].value, "1");
    assert_eq!(stats.kpi_metrics[2].trend, Trend::Up);
}

// ============================================================
// Transcript
// ============================================================

#[tokio::test]
async fn test_transcript_records_exchange() {
    let db = Database::open_in_memory().unwrap();
    let transcript = SqliteTranscript::new(db.clone());
    let identity = Identity::new(5, Some("ann".into()), "Ann", "You are helpful.", Utc::now());

    transcript
        .record(&identity, &[Turn::user("question"), Turn::assistant("answer")])
        .await
        .unwrap();

    let user = db.users().get_by_id(5).await.unwrap().unwrap();
    assert_eq!(user.display_name, "Ann");
    let recent = db.messages().get_recent(5, 10).await.unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].role, Role::Assistant);
    assert_eq!(recent[0].content, "answer");
    assert_eq!(recent[1].content, "question");
}
