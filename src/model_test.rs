use super::*;
use crate::storage::OriginStore;
use serde_json::json;

fn staff(name: &str) -> StaffMember {
    StaffMember { id: "s-1".into(), name: name.into(), role: "Yoga lead".into(), email: None, phone: None }
}

// =============================================================================
// validation
// =============================================================================

#[test]
fn staff_requires_name_and_plausible_email() {
    assert!(staff("Ann").validate().is_ok());
    assert_eq!(staff("  ").validate(), Err(RecordError::Blank { field: "name" }));

    let mut bad_email = staff("Ann");
    bad_email.email = Some("ann.example.com".into());
    assert_eq!(bad_email.validate(), Err(RecordError::InvalidEmail("ann.example.com".into())));
}

#[test]
fn action_item_due_date_must_be_iso_date() {
    let mut item = ActionItem {
        id: String::new(),
        description: "Book photographer".into(),
        owner: "Bo".into(),
        due_date: Some("2026-04-31".into()),
        status: ActionStatus::Open,
        meeting: None,
    };
    assert!(matches!(item.validate(), Err(RecordError::InvalidDate { field: "dueDate", .. })));

    item.due_date = Some("2026-04-30".into());
    assert!(item.validate().is_ok());
}

#[test]
fn social_post_requires_caption_and_schedule() {
    let post = SocialPost {
        id: String::new(),
        platform: Platform::Instagram,
        caption: String::new(),
        scheduled_for: "2026-05-01".into(),
        status: PostStatus::Draft,
    };
    assert_eq!(post.validate(), Err(RecordError::Blank { field: "caption" }));
}

// =============================================================================
// serde shape
// =============================================================================

#[test]
fn records_use_camel_case_fields() {
    let post = SocialPost {
        id: "p-1".into(),
        platform: Platform::Tiktok,
        caption: "Sunrise flow".into(),
        scheduled_for: "2026-05-01".into(),
        status: PostStatus::Scheduled,
    };
    let value = serde_json::to_value(&post).unwrap();
    assert_eq!(value["scheduledFor"], json!("2026-05-01"));
    assert_eq!(value["platform"], json!("tiktok"));
    assert_eq!(value["status"], json!("scheduled"));
}

#[test]
fn action_item_defaults_status_and_optional_fields() {
    let item: ActionItem = serde_json::from_value(json!({"description": "Order mats", "owner": "Ann"})).unwrap();
    assert_eq!(item.status, ActionStatus::Open);
    assert_eq!(item.due_date, None);
    assert!(item.id.is_empty());
}

// =============================================================================
// loading
// =============================================================================

#[test]
fn decode_records_skips_records_of_wrong_shape() {
    let records: Vec<StaffMember> = decode_records(vec![json!({"id": "1", "name": "Ann"}), json!(42), json!({"id": "2"})]);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].name, "Ann");
}

#[test]
fn load_reads_each_collection_and_degrades_bad_ones() {
    let ctx = OriginStore::in_memory(4096).context();
    ctx.set("staff", r#"[{"id":"1","name":"Ann"}]"#).unwrap();
    ctx.set("socialPosts", "not json").unwrap();

    let model = DashboardModel::load(&ctx);
    assert_eq!(model.records::<StaffMember>().len(), 1);
    assert!(model.records::<SocialPost>().is_empty());
    assert!(model.records::<ActionItem>().is_empty());
}
