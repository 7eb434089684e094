use docdriver::{memory::in_memory_drivers, prelude::*};

#[test]
fn even_segment_lists_descend_one_level_per_pair() {
    let drivers = in_memory_drivers("paths");
    let users = drivers.database().collection("users").unwrap();

    let segment_lists: [&[&str]; 4] = [
        &[],
        &["posts", "first"],
        &["posts", "", "comments", "c1"],
        &["posts", "p", "comments", "", "likes", ""],
    ];

    for segments in segment_lists {
        let reference = doc_ref_for_path(&users, Some("alice"), segments).unwrap();

        assert_eq!(reference.depth(), 1 + segments.len() / 2);
        assert!(reference.path().is_document());
    }
}

#[test]
fn odd_segment_lists_are_rejected() {
    let drivers = in_memory_drivers("paths");
    let database = drivers.database();

    let err = doc_ref_for_path(database, Some("users/alice"), &["posts"]).unwrap_err();
    assert_eq!(err, DocumentStoreError::InvalidPathSegments("users/alice".into()));

    let err = collection_ref_for_path(database, "users", &["alice", "posts", "p1"]).unwrap_err();
    assert_eq!(err, DocumentStoreError::InvalidPathSegments("users".into()));
}

#[test]
fn empty_ids_are_generated() {
    let drivers = in_memory_drivers("paths");
    let accessors = &drivers.accessor_driver;

    let first = accessors.doc_ref_for_path("users/alice", &["posts", ""]).unwrap();
    let second = accessors.doc_ref_for_path("users/alice", &["posts", ""]).unwrap();

    assert_eq!(first.parent().path().to_string(), "users/alice/posts");
    assert!(!first.id().is_empty());
    assert_ne!(first, second);
}

#[test]
fn explicit_ids_are_kept() {
    let drivers = in_memory_drivers("paths");

    let reference = drivers
        .accessor_driver
        .doc_ref_for_path("users/alice", &["posts", "hello"])
        .unwrap();

    assert_eq!(reference.path().to_string(), "users/alice/posts/hello");
    assert_eq!(reference, drivers.database().doc("users/alice/posts/hello").unwrap());
}

#[test]
fn collection_paths_continue_with_document_collection_pairs() {
    let drivers = in_memory_drivers("paths");

    let comments = drivers
        .accessor_driver
        .collection_ref_for_path("users", &["alice", "comments"])
        .unwrap();

    assert_eq!(comments.path().to_string(), "users/alice/comments");
    assert_eq!(comments.id(), "comments");
    assert_eq!(comments.parent().unwrap().id(), "alice");
}

#[test]
fn references_resolve_relative_to_their_root() {
    let drivers = in_memory_drivers("paths");
    let alice = drivers.database().doc("users/alice").unwrap();

    let same = doc_ref_for_path(&alice, None, NO_SEGMENTS).unwrap();
    assert_eq!(same, alice);

    let posts = collection_ref_for_path(&alice, "posts", NO_SEGMENTS).unwrap();
    assert_eq!(posts.path().to_string(), "users/alice/posts");

    let generated = doc_ref_for_path(&posts, None, NO_SEGMENTS).unwrap();
    assert_eq!(generated.parent(), posts);
}

#[test]
fn wrong_kinds_are_invalid_paths() {
    let drivers = in_memory_drivers("paths");
    let database = drivers.database();

    assert!(matches!(
        doc_ref_for_path(database, Some("users"), NO_SEGMENTS),
        Err(DocumentStoreError::InvalidPath(_))
    ));
    assert!(matches!(
        collection_ref_for_path(database, "users/alice", NO_SEGMENTS),
        Err(DocumentStoreError::InvalidPath(_))
    ));
    assert!(matches!(
        doc_ref_for_path(database, None, NO_SEGMENTS),
        Err(DocumentStoreError::InvalidPath(_))
    ));
    assert!(matches!(
        database.doc("users//alice"),
        Err(DocumentStoreError::InvalidPath(_))
    ));
}
