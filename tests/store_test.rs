//! Store integration tests against the SQLite client.
//!
//! Tests:
//! - Mutations are visible in every live store once awaited
//! - Rows survive reopening the database
//! - Single-row stores initialize once and persist field writes
//! - Optimistic writes settle or roll back

mod common;

use common::{wait_for, TestFixture};
use dealflow::store::{
    user_settings_store, ActivityStore, RowDefaults, SingleRowStore, TableStore, UserSettings,
};
use dealflow::sync::{MemoryClient, Query, Row, SyncClient};
use dealflow::ErrorKind;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_table_store_mutations_visible_after_await() {
    let fixture = TestFixture::new();
    let client = fixture.client();
    let leads = TableStore::new(Arc::clone(&client), "leads");
    let won = TableStore::with_query(
        Arc::clone(&client),
        Query::table("leads").where_eq("status", "won"),
    );
    assert_ok!(leads.ready().await);
    assert_ok!(won.ready().await);

    let id = assert_ok!(
        leads
            .add(Row::new().with("company", "Acme").with("status", "new"))
            .await
    );
    assert_eq!(leads.count(), 1);
    assert_eq!(won.count(), 0);

    assert_ok!(leads.update(&id, Row::new().with("status", "won")).await);
    assert_eq!(won.count(), 1);
    assert_eq!(
        leads.find_by_id(&id).unwrap().get("company"),
        Some(&json!("Acme"))
    );

    assert_ok!(leads.remove(&id).await);
    assert_eq!(leads.count(), 0);
    assert_eq!(won.count(), 0);

    let err = assert_err!(leads.remove(&id).await);
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_rows_survive_reopen() {
    let fixture = TestFixture::new();
    let ids = {
        let deals = TableStore::new(fixture.client(), "deals");
        deals
            .add_many((0..5).map(|i| Row::new().with("amount", i * 1000)))
            .await
            .into_result()
            .unwrap()
    };

    let deals = TableStore::new(fixture.client(), "deals");
    assert_ok!(deals.ready().await);
    assert_eq!(deals.count(), 5);
    for id in &ids {
        assert!(deals.exists(id), "missing {id} after reopen");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_activity_filters_on_booleans() {
    let fixture = TestFixture::new();
    let client = fixture.client();
    let activities = ActivityStore::new(Arc::clone(&client));
    let done = TableStore::with_query(
        Arc::clone(&client),
        Query::table("activities").where_eq("completed", true),
    );

    let call = assert_ok!(
        activities
            .add(Row::new().with("kind", "call").with("completed", false))
            .await
    );
    assert_ok!(activities.add(Row::new().with("kind", "demo")).await);
    assert_ok!(activities.complete(&call).await);

    assert_eq!(done.count(), 1);
    assert_eq!(activities.completed().len(), 1);
    assert_eq!(activities.pending().len(), 1);

    assert!(activities.clear_completed().await.is_complete());
    assert_eq!(done.count(), 0);
    assert_eq!(activities.count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_settings_initialize_once_and_persist() {
    let fixture = TestFixture::new();
    let client = fixture.client();
    let settings = user_settings_store(Arc::clone(&client), "ann");

    let (a, b) = tokio::join!(settings.initialize(), settings.initialize());
    assert_ok!(a);
    assert_ok!(b);

    let all = TableStore::new(Arc::clone(&client), UserSettings::TABLE);
    assert_ok!(all.ready().await);
    assert_eq!(all.count(), 1);

    assert_ok!(settings.set("theme", json!("dark")).wait().await);
    assert_eq!(settings.get("theme"), Some(json!("dark")));

    let reopened = user_settings_store(fixture.client(), "ann");
    assert_ok!(reopened.ready().await);
    let stored: UserSettings = reopened.typed().unwrap().unwrap();
    assert_eq!(stored.theme, "dark");
    assert_eq!(stored.language, "en");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unawaited_set_settles() {
    let fixture = TestFixture::new();
    let settings = user_settings_store(fixture.client(), "ann");
    assert_ok!(settings.initialize().await);

    drop(settings.set("language", json!("de")));
    assert_eq!(settings.get("language"), Some(json!("de")));

    let settled = wait_for(Duration::from_secs(5), || settings.pending_writes() == 0).await;
    assert!(settled, "background write never settled");
    assert_eq!(
        settings.confirmed_row().unwrap().get("language"),
        Some(&json!("de"))
    );
}

#[tokio::test]
async fn test_offline_set_rolls_back() {
    let client = Arc::new(MemoryClient::new());
    let profile = SingleRowStore::builder("user_profile", "ann")
        .defaults(|| Row::new().with("displayName", ""))
        .build(Arc::clone(&client));
    assert_ok!(profile.initialize().await);
    let mut failures = profile.write_failures();

    client.set_online(false);
    let err = assert_err!(profile.set("displayName", json!("Ann")).wait().await);
    assert_eq!(err.kind(), ErrorKind::Network);
    assert_eq!(profile.get("displayName"), Some(json!("")));

    let failure = assert_ok!(failures.recv().await);
    assert_eq!(failure.field, "displayName");

    client.set_online(true);
    assert_ok!(profile.set_field("displayName", json!("Ann")).await);
    assert_eq!(profile.get("displayName"), Some(json!("Ann")));
}

#[tokio::test]
async fn test_stores_share_one_client() {
    let client = Arc::new(MemoryClient::new());
    let writer = TableStore::new(Arc::clone(&client), "contacts");
    let mut reader = TableStore::new(Arc::clone(&client), "contacts");

    let id = assert_ok!(client.insert("contacts", Row::new().with("name", "Bo")).await);
    assert!(reader.changed().await);
    assert!(reader.exists(&id));
    assert!(writer.exists(&id));
}
