use bson::{Bson, doc};
use docdriver::{memory::in_memory_drivers, prelude::*};
use futures::StreamExt;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct City {
    name: String,
    population: i64,
    #[serde(default)]
    tags: Vec<String>,
}

fn porto() -> City {
    City { name: "Porto".into(), population: 231_800, tags: vec![] }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Flag {
    test: bool,
}

#[tokio::test]
async fn direct_create_get_and_delete() {
    let drivers = in_memory_drivers("direct");
    let reference = drivers.database().doc("cities/porto").unwrap();
    let accessor = drivers.accessor_driver.direct::<City>().accessor_for(&reference);

    assert_eq!(accessor.context_type(), ExecutionContext::None);
    assert!(!accessor.exists().await.unwrap());

    let result = accessor.create(&porto()).await.unwrap();
    assert!(!result.is_staged());

    assert_eq!(accessor.get_with_converter().await.unwrap(), Some(porto()));

    accessor.delete(None).await.unwrap();
    assert!(!accessor.exists().await.unwrap());
    assert_eq!(accessor.get_with_converter().await.unwrap(), None);
}

#[tokio::test]
async fn direct_create_rejects_existing_document() {
    let drivers = in_memory_drivers("direct");
    let reference = drivers.database().doc("cities/porto").unwrap();
    let accessor = drivers.accessor_driver.direct::<City>().accessor_for(&reference);

    accessor.create(&porto()).await.unwrap();
    let err = accessor.create(&porto()).await.unwrap_err();

    assert_eq!(err, DocumentStoreError::DocumentAlreadyExists("porto".into(), "cities".into()));
}

#[tokio::test]
async fn direct_update_of_missing_document_fails() {
    let drivers = in_memory_drivers("direct");
    let reference = drivers.database().doc("cities/nowhere").unwrap();
    let accessor = drivers.accessor_driver.direct::<City>().accessor_for(&reference);

    let err = accessor
        .update(UpdateData::from(doc! { "population": 1 }), None)
        .await
        .unwrap_err();

    assert!(matches!(err, DocumentStoreError::DocumentNotFound(..)));
}

#[tokio::test]
async fn direct_update_honours_update_time_precondition() {
    let drivers = in_memory_drivers("direct");
    let reference = drivers.database().doc("cities/porto").unwrap();
    let accessor = drivers.accessor_driver.direct::<City>().accessor_for(&reference);

    accessor.create(&porto()).await.unwrap();
    let seen = accessor.get().await.unwrap().update_time().unwrap();

    accessor
        .update(
            UpdateData::new().set("population", FieldValue::value(1_i64)),
            Some(WriteParams::last_update_time(seen)),
        )
        .await
        .unwrap();

    let err = accessor
        .update(
            UpdateData::new().set("population", FieldValue::value(2_i64)),
            Some(WriteParams::last_update_time(seen)),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, DocumentStoreError::FailedPrecondition(_)));
}

#[tokio::test]
async fn direct_delete_honours_preconditions() {
    let drivers = in_memory_drivers("direct");
    let reference = drivers.database().doc("cities/porto").unwrap();
    let accessor = drivers.accessor_driver.direct::<City>().accessor_for(&reference);

    accessor.create(&porto()).await.unwrap();
    let stale = accessor.get().await.unwrap().update_time().unwrap();
    accessor
        .update(UpdateData::from(doc! { "population": 1 }), None)
        .await
        .unwrap();

    let err = accessor
        .delete(Some(WriteParams::last_update_time(stale)))
        .await
        .unwrap_err();
    assert!(matches!(err, DocumentStoreError::FailedPrecondition(_)));
    assert!(accessor.exists().await.unwrap());

    accessor.delete(Some(WriteParams::exists(true))).await.unwrap();
    assert!(!accessor.exists().await.unwrap());

    let err = accessor.delete(Some(WriteParams::exists(true))).await.unwrap_err();
    assert!(matches!(err, DocumentStoreError::DocumentNotFound(..)));
}

#[tokio::test]
async fn set_with_merge_keeps_other_fields() {
    let drivers = in_memory_drivers("direct");
    let reference = drivers.database().doc("places/porto").unwrap();
    let accessor = drivers.accessor_driver.direct::<bson::Document>().accessor_for(&reference);

    accessor.set(&doc! { "name": "Porto", "river": "Douro" }, None).await.unwrap();
    accessor
        .set(&doc! { "name": "Oporto" }, Some(SetOptions::merge()))
        .await
        .unwrap();

    let snapshot = accessor.get().await.unwrap();
    assert_eq!(snapshot.get("name"), Some(&Bson::String("Oporto".into())));
    assert_eq!(snapshot.get("river"), Some(&Bson::String("Douro".into())));
}

#[tokio::test]
async fn increment_and_array_updates() {
    let drivers = in_memory_drivers("direct");
    let reference = drivers.database().doc("cities/porto").unwrap();
    let accessor = drivers.accessor_driver.direct::<City>().accessor_for(&reference);

    accessor.create(&porto()).await.unwrap();

    accessor
        .increment(
            IncrementUpdate::new()
                .field("population", 200)
                .field_without_delta("visits"),
            None,
        )
        .await
        .unwrap();
    accessor
        .array_update(
            ArrayUpdate::new().field("tags", ArrayOps::union(["coast", "wine"])),
            None,
        )
        .await
        .unwrap();
    accessor
        .apply(
            vec![
                ArrayUpdate::new().field("tags", ArrayOps::remove(["coast"])).into(),
                IncrementUpdate::new().field("population", -100).into(),
            ],
            None,
        )
        .await
        .unwrap();

    let snapshot = accessor.get().await.unwrap();
    let city: City = snapshot.decode().unwrap().unwrap();

    assert_eq!(city.population, 231_900);
    assert_eq!(city.tags, vec!["wine".to_string()]);
    assert_eq!(snapshot.get("visits"), Some(&Bson::Int64(0)));
}

#[tokio::test]
async fn batch_writes_are_invisible_until_commit() {
    let drivers = in_memory_drivers("batch");
    let reference = drivers.database().doc("flags/one").unwrap();
    let batch = drivers.accessor_driver.batch();
    let context = drivers.accessor_driver.in_batch::<Flag>(batch.clone());
    let accessor = context.accessor_for(&reference);

    assert_eq!(context.context_type, ExecutionContext::WriteBatch);

    let staged = accessor.set(&Flag { test: true }, None).await.unwrap();
    assert!(staged.is_staged());
    assert!(!accessor.exists().await.unwrap());

    batch.commit().await.unwrap();

    let direct = drivers.accessor_driver.direct::<Flag>().accessor_for(&reference);
    assert!(direct.exists().await.unwrap());
    assert_eq!(direct.get().await.unwrap().get("test"), Some(&Bson::Boolean(true)));
}

#[tokio::test]
async fn batched_writes_ignore_preconditions() {
    let drivers = in_memory_drivers("batch");
    let reference = drivers.database().doc("cities/porto").unwrap();
    let direct = drivers.accessor_driver.direct::<City>().accessor_for(&reference);
    direct.create(&porto()).await.unwrap();

    let batch = drivers.accessor_driver.batch();
    let accessor = drivers
        .accessor_driver
        .in_batch::<City>(batch.clone())
        .accessor_for(&reference);

    accessor
        .increment(
            IncrementUpdate::new().field("population", 1),
            Some(WriteParams::exists(false)),
        )
        .await
        .unwrap();
    batch.commit().await.unwrap();

    assert_eq!(direct.get_with_converter().await.unwrap().map(|city| city.population), Some(231_801));

    let batch = drivers.accessor_driver.batch();
    drivers
        .accessor_driver
        .in_batch::<City>(batch.clone())
        .accessor_for(&reference)
        .delete(Some(WriteParams::exists(false)))
        .await
        .unwrap();
    batch.commit().await.unwrap();

    assert!(!direct.exists().await.unwrap());
}

#[tokio::test]
async fn batch_commit_is_all_or_nothing() {
    let drivers = in_memory_drivers("batch");
    let database = drivers.database();
    let batch = drivers.accessor_driver.batch();
    let context = drivers.accessor_driver.in_batch::<City>(batch.clone());

    context
        .accessor_for(&database.doc("cities/porto").unwrap())
        .create(&porto())
        .await
        .unwrap();
    context
        .accessor_for(&database.doc("cities/missing").unwrap())
        .update(UpdateData::from(doc! { "population": 1 }), None)
        .await
        .unwrap();

    assert!(batch.commit().await.is_err());

    let direct = drivers
        .accessor_driver
        .direct::<City>()
        .accessor_for(&database.doc("cities/porto").unwrap());
    assert!(!direct.exists().await.unwrap());
}

#[tokio::test]
async fn batch_commits_only_once() {
    let drivers = in_memory_drivers("batch");
    let batch = drivers.accessor_driver.batch();
    let accessor = drivers
        .accessor_driver
        .in_batch::<Flag>(batch.clone())
        .accessor_for(&drivers.database().doc("flags/one").unwrap());

    accessor.set(&Flag { test: false }, None).await.unwrap();
    batch.commit().await.unwrap();

    assert!(matches!(
        batch.commit().await,
        Err(DocumentStoreError::FailedPrecondition(_))
    ));
    assert!(matches!(
        accessor.set(&Flag { test: true }, None).await,
        Err(DocumentStoreError::FailedPrecondition(_))
    ));
}

#[tokio::test]
async fn batch_rejects_writes_past_the_limit() {
    let settings = DatabaseSettings::builder().max_batch_writes(2).build().unwrap();
    let drivers = docdriver::memory::in_memory_drivers_with_settings("batch", settings);
    let batch = drivers.accessor_driver.batch();
    let context = drivers.accessor_driver.in_batch::<Flag>(batch.clone());
    let flags = drivers.database().collection("flags").unwrap();

    for _ in 0..2 {
        context
            .accessor_for(&flags.new_doc())
            .set(&Flag { test: true }, None)
            .await
            .unwrap();
    }

    let err = context
        .accessor_for(&flags.new_doc())
        .set(&Flag { test: true }, None)
        .await
        .unwrap_err();

    assert!(matches!(err, DocumentStoreError::ResourceExhausted(_)));
    assert_eq!(batch.len().await, 2);
}

#[tokio::test]
async fn direct_stream_follows_changes() {
    let drivers = in_memory_drivers("stream");
    let reference = drivers.database().doc("flags/live").unwrap();
    let accessor = drivers.accessor_driver.direct::<Flag>().accessor_for(&reference);

    let mut snapshots = accessor.stream().await.unwrap();
    accessor.set(&Flag { test: true }, None).await.unwrap();

    assert!(!snapshots.next().await.unwrap().unwrap().exists());
    let updated = snapshots.next().await.unwrap().unwrap();
    assert_eq!(updated.get("test"), Some(&Bson::Boolean(true)));
}

#[tokio::test]
async fn batched_stream_is_a_single_snapshot() {
    let drivers = in_memory_drivers("stream");
    let reference = drivers.database().doc("flags/live").unwrap();
    let batch = drivers.accessor_driver.batch();
    let accessor = drivers
        .accessor_driver
        .in_batch::<Flag>(batch)
        .accessor_for(&reference);

    let snapshots = accessor.stream().await.unwrap().collect::<Vec<_>>().await;

    assert_eq!(snapshots.len(), 1);
    assert!(!snapshots[0].as_ref().unwrap().exists());
}

#[tokio::test]
async fn handles_reject_references_from_other_databases() {
    let first = in_memory_drivers("first");
    let second = in_memory_drivers("second");
    let batch = first.accessor_driver.batch();
    let foreign = second.database().doc("flags/one").unwrap();

    let err = first
        .accessor_driver
        .in_batch::<Flag>(batch)
        .accessor_for(&foreign)
        .set(&Flag { test: true }, None)
        .await
        .unwrap_err();

    assert!(matches!(err, DocumentStoreError::InvalidArgument(_)));
}
