use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use bson::doc;
use docdriver::{
    memory::{in_memory_drivers, in_memory_drivers_with_settings},
    prelude::*,
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Counter {
    value: i64,
}

#[tokio::test]
async fn create_succeeds_once_then_reports_existing_document() {
    let drivers = in_memory_drivers("tx");
    let accessors = &drivers.accessor_driver;
    let reference = drivers.database().doc("counters/visits").unwrap();

    accessors
        .run_transaction(|tx| {
            let context = accessors.in_transaction::<Counter>(tx);
            let reference = reference.clone();
            async move {
                let counter = context.accessor_for(&reference);
                assert_eq!(counter.context_type(), ExecutionContext::Transaction);
                assert!(!counter.exists().await?);

                let staged = counter.create(&Counter { value: 1 }).await?;
                assert!(staged.is_staged());
                Ok(())
            }
        })
        .await
        .unwrap();

    let err = accessors
        .run_transaction(|tx| {
            let context = accessors.in_transaction::<Counter>(tx);
            let reference = reference.clone();
            async move {
                context
                    .accessor_for(&reference)
                    .create(&Counter { value: 2 })
                    .await?;
                Ok(())
            }
        })
        .await
        .unwrap_err();

    assert_eq!(
        err,
        DocumentStoreError::DocumentAlreadyExists("visits".into(), "counters".into())
    );

    let stored = accessors
        .direct::<Counter>()
        .accessor_for(&reference)
        .get_with_converter()
        .await
        .unwrap();
    assert_eq!(stored, Some(Counter { value: 1 }));
}

#[tokio::test]
async fn staged_writes_apply_only_on_success() {
    let drivers = in_memory_drivers("tx");
    let accessors = &drivers.accessor_driver;
    let reference = drivers.database().doc("counters/visits").unwrap();

    let err = accessors
        .run_transaction(|tx| {
            let context = accessors.in_transaction::<Counter>(tx.clone());
            let reference = reference.clone();
            async move {
                context
                    .accessor_for(&reference)
                    .set(&Counter { value: 10 }, None)
                    .await?;
                assert_eq!(tx.pending_writes().await, 1);
                Err::<(), _>(DocumentStoreError::InvalidArgument("rejected by caller".into()))
            }
        })
        .await
        .unwrap_err();

    assert!(matches!(err, DocumentStoreError::InvalidArgument(_)));
    assert!(
        !accessors
            .direct::<Counter>()
            .accessor_for(&reference)
            .exists()
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn contention_reruns_the_transaction_body() {
    let drivers = in_memory_drivers("tx");
    let accessors = &drivers.accessor_driver;
    let reference = drivers.database().doc("counters/visits").unwrap();
    let direct = accessors.direct::<Counter>().accessor_for(&reference);
    direct.create(&Counter { value: 0 }).await.unwrap();

    let attempts = Arc::new(AtomicUsize::new(0));

    let value = accessors
        .run_transaction(|tx| {
            let context = accessors.in_transaction::<Counter>(tx);
            let reference = reference.clone();
            let attempts = attempts.clone();
            let direct = accessors.direct::<Counter>().accessor_for(&reference);
            async move {
                let counter = context.accessor_for(&reference);
                let current = counter.get_with_converter().await?.unwrap_or(Counter { value: 0 });

                if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                    direct
                        .increment(IncrementUpdate::new().field("value", 100), None)
                        .await?;
                }

                counter
                    .set(&Counter { value: current.value + 1 }, None)
                    .await?;
                Ok(current.value + 1)
            }
        })
        .await
        .unwrap();

    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    assert_eq!(value, 101);
    assert_eq!(
        direct.get_with_converter().await.unwrap(),
        Some(Counter { value: 101 })
    );
}

#[tokio::test]
async fn persistent_contention_gives_up_after_max_attempts() {
    let settings = DatabaseSettings::builder()
        .max_transaction_attempts(3)
        .build()
        .unwrap();
    let drivers = in_memory_drivers_with_settings("tx", settings);
    let accessors = &drivers.accessor_driver;
    let reference = drivers.database().doc("counters/visits").unwrap();
    accessors
        .direct::<Counter>()
        .accessor_for(&reference)
        .create(&Counter { value: 0 })
        .await
        .unwrap();

    let attempts = Arc::new(AtomicUsize::new(0));

    let err = accessors
        .run_transaction(|tx| {
            let context = accessors.in_transaction::<Counter>(tx);
            let reference = reference.clone();
            let attempts = attempts.clone();
            let direct = accessors.direct::<Counter>().accessor_for(&reference);
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                let counter = context.accessor_for(&reference);
                counter.get().await?;

                direct
                    .increment(IncrementUpdate::new().field("value", 1), None)
                    .await?;
                counter
                    .update(UpdateData::from(doc! { "value": -1 }), None)
                    .await?;
                Ok(())
            }
        })
        .await
        .unwrap_err();

    assert!(err.is_retryable());
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn transactional_preconditions_are_ignored() {
    let drivers = in_memory_drivers("tx");
    let accessors = &drivers.accessor_driver;
    let reference = drivers.database().doc("counters/visits").unwrap();
    let direct = accessors.direct::<Counter>().accessor_for(&reference);
    direct.create(&Counter { value: 1 }).await.unwrap();

    accessors
        .run_transaction(|tx| {
            let context = accessors.in_transaction::<Counter>(tx);
            let reference = reference.clone();
            async move {
                context
                    .accessor_for(&reference)
                    .increment(
                        IncrementUpdate::new().field("value", 1),
                        Some(WriteParams::exists(false)),
                    )
                    .await?;
                Ok(())
            }
        })
        .await
        .unwrap();

    assert_eq!(
        direct.get_with_converter().await.unwrap(),
        Some(Counter { value: 2 })
    );
}

#[tokio::test]
async fn transactional_stream_is_a_single_snapshot() {
    let drivers = in_memory_drivers("tx");
    let accessors = &drivers.accessor_driver;
    let reference = drivers.database().doc("counters/visits").unwrap();

    let count = accessors
        .run_transaction(|tx| {
            let context = accessors.in_transaction::<Counter>(tx);
            let reference = reference.clone();
            async move {
                let snapshots = context
                    .accessor_for(&reference)
                    .stream()
                    .await?
                    .collect::<Vec<_>>()
                    .await;
                Ok(snapshots.len())
            }
        })
        .await
        .unwrap();

    assert_eq!(count, 1);
}

#[tokio::test]
async fn transaction_handle_requires_reads_before_writes() {
    let drivers = in_memory_drivers("tx");
    let database = drivers.database();
    let reference = database.doc("counters/visits").unwrap();

    let err = database
        .run_transaction(|tx| {
            let reference = reference.clone();
            async move {
                tx.set(&reference, doc! { "value": 1 }, None).await?;
                tx.get(&reference).await?;
                Ok(())
            }
        })
        .await
        .unwrap_err();

    assert!(matches!(err, DocumentStoreError::FailedPrecondition(_)));
}
