use serde_json::{json, Value};

use revscrape_core::UNKNOWN_DATE;

use super::*;

/// A record in the current layout with every field populated.
fn full_record() -> Value {
    let mut meta = vec![Value::Null; 7];
    meta[2] = json!(1_705_320_000_000_000_i64);
    meta[4] = json!([
        null,
        null,
        null,
        null,
        null,
        ["Ada Lovelace", "https://img/ada.png", ["https://maps/contrib/ada"], null, null, 42]
    ]);
    meta[6] = json!("9 months ago");

    let mut content = vec![Value::Null; 23];
    content[0] = json!([4]);
    content[14] = json!(["en"]);
    content[15] = json!([["Great coffee, slow service."]]);
    content[21] = json!([[], [], [], [], [], [], [null, null, null, null, null, null, null, null, [2024, 1, 15, 9]]]);
    content[22] = json!([["photo-a"], ["photo-b"], ["photo-c"]]);

    let mut owner = vec![Value::Null; 15];
    owner[14] = json!([["Thanks for visiting!"]]);

    json!([["ChZDSUhNMG9nS0VJQ0FnSUQ", meta, content, owner, [null, 7]]])
}

#[test]
fn decodes_every_field_of_a_full_record() {
    let review = decode(&full_record(), 3).unwrap();
    assert_eq!(review.id, "ChZDSUhNMG9nS0VJQ0FnSUQ");
    assert_eq!(review.author_name, "Ada Lovelace");
    assert_eq!(review.author_profile_url, "https://maps/contrib/ada");
    assert_eq!(review.author_review_count, 42);
    assert_eq!(review.rating, 4);
    assert_eq!(review.text, "Great coffee, slow service.");
    assert_eq!(review.language, "en");
    assert_eq!(review.date_formatted, "15/01/2024");
    assert_eq!(review.date_relative, "9 months ago");
    assert_eq!(review.like_count, 7);
    assert_eq!(review.photo_count, 3);
    assert_eq!(review.owner_response_text, "Thanks for visiting!");
    assert_eq!(review.page_number, 3);
}

#[test]
fn id_only_record_gets_defaults() {
    let review = decode(&json!([["only-an-id"]]), 1).unwrap();
    assert_eq!(review.id, "only-an-id");
    assert_eq!(review.author_name, "");
    assert_eq!(review.rating, 0);
    assert_eq!(review.like_count, 0);
    assert_eq!(review.photo_count, 0);
    assert_eq!(review.date_formatted, UNKNOWN_DATE);
    assert_eq!(review.date_relative, UNKNOWN_DATE);
}

#[test]
fn flat_legacy_record_uses_fallback_id_path() {
    let review = decode(&json!(["legacy-id", null, [3]]), 2).unwrap();
    assert_eq!(review.id, "legacy-id");
}

#[test]
fn legacy_author_and_rating_paths_are_used() {
    let mut author = vec![Value::Null; 16];
    author[0] = json!([null, null, null, null, "Grace Hopper"]);
    author[2] = json!(["https://maps/contrib/grace"]);
    author[15] = json!([null, "1,204"]);
    let raw = json!([["id-9", [null, null, null, null, author], [5, ["Fine."]]]]);

    let review = decode(&raw, 1).unwrap();
    assert_eq!(review.author_name, "Grace Hopper");
    assert_eq!(review.author_profile_url, "https://maps/contrib/grace");
    assert_eq!(review.author_review_count, 1204);
    assert_eq!(review.rating, 5);
    assert_eq!(review.text, "Fine.");
}

#[test]
fn out_of_range_rating_becomes_zero() {
    let raw = json!([["id-1", null, [[9]]]]);
    assert_eq!(decode(&raw, 1).unwrap().rating, 0);
    let raw = json!([["id-2", null, [[0]]]]);
    assert_eq!(decode(&raw, 1).unwrap().rating, 0);
}

#[test]
fn missing_id_is_rejected() {
    assert_eq!(
        decode(&json!([[null, ["meta"]]]), 4),
        Err(DecodeFailure::MissingId { page: 4 })
    );
    assert_eq!(
        decode(&json!([["   "]]), 4),
        Err(DecodeFailure::MissingId { page: 4 })
    );
    assert_eq!(decode(&json!([]), 4), Err(DecodeFailure::MissingId { page: 4 }));
}

#[test]
fn non_array_record_is_rejected() {
    assert_eq!(
        decode(&json!({"id": "x"}), 2),
        Err(DecodeFailure::NotAnArray { page: 2 })
    );
}

#[test]
fn decoded_ids_are_never_empty() {
    let records = vec![
        full_record(),
        json!([[""]]),
        json!("string"),
        json!([["  padded-id  "]]),
        json!(null),
        json!([[17]]),
    ];
    let page = decode_page(&records, 1);
    assert_eq!(page.reviews.len(), 2);
    assert_eq!(page.dropped.len(), 4);
    assert!(page.reviews.iter().all(|r| !r.id.is_empty()));
    assert_eq!(page.reviews[1].id, "padded-id");
}

#[test]
fn a_bad_record_does_not_stop_the_page() {
    let records = vec![json!(42), full_record()];
    let page = decode_page(&records, 7);
    assert_eq!(page.reviews.len(), 1);
    assert_eq!(page.dropped, vec![DecodeFailure::NotAnArray { page: 7 }]);
}
