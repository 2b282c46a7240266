use super::*;
use crate::ErrorCode;
use crate::model::{ActionItem, ActionStatus, Platform, PostStatus, SocialPost, StaffMember};
use crate::state::test_helpers;
use crate::storage::OriginStore;

fn staff(id: &str, name: &str) -> StaffMember {
    StaffMember { id: id.into(), name: name.into(), role: "Host".into(), email: None, phone: None }
}

// =============================================================================
// create
// =============================================================================

#[test]
fn create_writes_storage_patches_model_and_syncs() {
    let state = test_helpers::test_app_state();

    let created = create(&state, "bo", staff("", "Ann")).unwrap();
    assert!(!created.id.is_empty(), "blank id should be assigned");

    let stored = state.storage.get("staff").unwrap().expect("staff stored");
    assert!(stored.contains("Ann"));
    assert_eq!(state.model().staff, vec![created]);
    assert!(!state.monitor.check_for_updates(), "write must be followed by a sync");
    assert!(state.monitor.stored_snapshot().is_some());
}

#[test]
fn create_rejects_duplicates_and_invalid_records() {
    let state = test_helpers::test_app_state();
    create(&state, "bo", staff("1", "Ann")).unwrap();

    let dup = create(&state, "bo", staff("1", "Bo")).unwrap_err();
    assert!(matches!(dup, CollectionError::Duplicate { collection: NamedCollection::Staff, .. }));
    assert_eq!(dup.error_code(), "E_DUPLICATE");

    let invalid = create(&state, "bo", staff("2", " ")).unwrap_err();
    assert!(matches!(invalid, CollectionError::Invalid { source: RecordError::Blank { field: "name" }, .. }));
}

#[test]
fn create_requires_editor() {
    let state = test_helpers::test_app_state();

    let err = create(&state, "cy", staff("1", "Ann")).unwrap_err();
    assert!(matches!(err, CollectionError::Forbidden(AccessError::Insufficient { .. })));
    assert_eq!(err.error_code(), "E_FORBIDDEN");

    let err = create(&state, "nobody", staff("1", "Ann")).unwrap_err();
    assert!(matches!(err, CollectionError::Forbidden(AccessError::UnknownUser(_))));
    assert!(state.storage.get("staff").unwrap().is_none());
}

#[test]
fn create_preserves_records_it_cannot_decode() {
    let state = test_helpers::test_app_state();
    state.storage.set("staff", r#"[{"legacy":true}]"#).unwrap();

    create(&state, "bo", staff("1", "Ann")).unwrap();
    let raw = state.storage.get("staff").unwrap().unwrap();
    let values: Vec<Value> = serde_json::from_str(&raw).unwrap();
    assert_eq!(values.len(), 2);
    assert_eq!(values[0], serde_json::json!({"legacy": true}));
}

#[test]
fn failed_save_leaves_model_and_snapshot_alone() {
    let origin = OriginStore::in_memory(64 * 1024);
    let state = test_helpers::test_app_state_on(&origin);
    state.monitor.sync_data();
    let before = state.monitor.stored_snapshot();

    origin.set_disabled(true);
    let err = create(&state, "bo", staff("1", "Ann")).unwrap_err();
    assert!(matches!(err, CollectionError::Storage { source: StorageError::Disabled, .. }));
    assert_eq!(err.error_code(), "E_SAVE_FAILED");
    assert!(!err.retryable(), "disabled storage will not recover on retry");
    assert!(state.model().staff.is_empty());

    origin.set_disabled(false);
    assert_eq!(state.monitor.stored_snapshot(), before);
}

// =============================================================================
// update / delete
// =============================================================================

#[test]
fn update_replaces_record_by_id() {
    let state = test_helpers::test_app_state();
    let item = create(
        &state,
        "bo",
        ActionItem {
            id: String::new(),
            description: "Confirm caterer".into(),
            owner: "Ann".into(),
            due_date: Some("2026-06-01".into()),
            status: ActionStatus::Open,
            meeting: Some("Weekly marketing sync".into()),
        },
    )
    .unwrap();

    let mut done = item.clone();
    done.status = ActionStatus::Done;
    update(&state, "bo", done.clone()).unwrap();

    assert_eq!(state.model().action_items, vec![done.clone()]);
    assert_eq!(get::<ActionItem>(&state, "cy", &item.id).unwrap(), done);
    assert!(!state.monitor.check_for_updates());
}

#[test]
fn update_unknown_id_is_not_found() {
    let state = test_helpers::test_app_state();
    let err = update(&state, "bo", staff("missing", "Ann")).unwrap_err();
    assert!(matches!(err, CollectionError::NotFound { .. }));
}

#[test]
fn update_adds_record_created_by_another_context_to_model() {
    let origin = OriginStore::in_memory(64 * 1024);
    let mine = test_helpers::test_app_state_on(&origin);
    let theirs = test_helpers::test_app_state_on(&origin);

    create(&theirs, "bo", staff("7", "Cy")).unwrap();
    assert!(mine.model().staff.is_empty(), "other context's write is not pushed into views");

    update(&mine, "bo", staff("7", "Cyrus")).unwrap();
    assert_eq!(mine.model().staff, vec![staff("7", "Cyrus")]);
}

#[test]
fn delete_requires_admin_and_removes_record() {
    let state = test_helpers::test_app_state();
    create(&state, "bo", staff("1", "Ann")).unwrap();
    create(&state, "bo", staff("2", "Bo")).unwrap();

    let err = delete::<StaffMember>(&state, "bo", "1").unwrap_err();
    assert!(matches!(err, CollectionError::Forbidden(_)));

    delete::<StaffMember>(&state, "ann", "1").unwrap();
    assert_eq!(state.model().staff, vec![staff("2", "Bo")]);
    assert!(!state.monitor.check_for_updates());

    let err = delete::<StaffMember>(&state, "ann", "1").unwrap_err();
    assert!(matches!(err, CollectionError::NotFound { .. }));
}

// =============================================================================
// read
// =============================================================================

#[test]
fn list_requires_known_user_and_reads_model() {
    let state = test_helpers::test_app_state();
    create(
        &state,
        "bo",
        SocialPost {
            id: "p-1".into(),
            platform: Platform::Instagram,
            caption: "Spring retreat early-bird".into(),
            scheduled_for: "2026-03-15".into(),
            status: PostStatus::Scheduled,
        },
    )
    .unwrap();

    let posts = list::<SocialPost>(&state, "cy").unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].id, "p-1");
    assert!(matches!(list::<SocialPost>(&state, "zed"), Err(CollectionError::Forbidden(_))));
}

#[test]
fn get_unknown_id_is_not_found() {
    let state = test_helpers::test_app_state();
    let err = get::<StaffMember>(&state, "cy", "nope").unwrap_err();
    assert!(matches!(err, CollectionError::NotFound { collection: NamedCollection::Staff, .. }));
}
