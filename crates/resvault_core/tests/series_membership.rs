use resvault_core::model::meta::meta_from_value;
use resvault_core::{ErrorKind, MetaDocument, RepoError, SeriesPatch, UploadRequest, Vault};
use serde_json::json;
use uuid::Uuid;

fn meta(value: serde_json::Value) -> MetaDocument {
    meta_from_value(value).unwrap()
}

fn create_in_series(vault: &Vault, slug: &str, doc: serde_json::Value) -> Uuid {
    let request = UploadRequest::new("page.png", "image/png", Uuid::new_v4().as_bytes().to_vec())
        .with_meta(meta(doc))
        .in_series(slug);
    vault
        .resources()
        .unwrap()
        .create_resource(&request)
        .unwrap()
        .resource
        .id
}

fn create_plain(vault: &Vault, doc: serde_json::Value) -> Uuid {
    let request = UploadRequest::new("loose.png", "image/png", Uuid::new_v4().as_bytes().to_vec())
        .with_meta(meta(doc));
    vault
        .resources()
        .unwrap()
        .create_resource(&request)
        .unwrap()
        .resource
        .id
}

#[test]
fn join_and_leave_follow_the_shared_document_protocol() {
    let vault = Vault::in_memory().unwrap();
    let resources = vault.resources().unwrap();
    let series = vault.series().unwrap();

    let a = create_in_series(&vault, "s", json!({"artist": "alice", "page": 1}));
    let s = series.get_series_by_slug("s").unwrap().unwrap();
    assert_eq!(s.meta, meta(json!({"artist": "alice", "page": 1})));
    assert!(resources.get_resource(a).unwrap().own_meta.is_empty());

    let b = create_in_series(&vault, "s", json!({"artist": "alice", "page": 2}));
    let b_row = resources.get_resource(b).unwrap();
    assert_eq!(b_row.own_meta, meta(json!({"page": 2})));
    assert_eq!(b_row.series_id, Some(s.id));
    assert_eq!(
        resources.effective_meta(b).unwrap(),
        meta(json!({"artist": "alice", "page": 2}))
    );

    let left = series.remove_resource_from_series(b).unwrap();
    assert!(!left.series_deleted);
    let b_row = resources.get_resource(b).unwrap();
    assert_eq!(b_row.own_meta, meta(json!({"artist": "alice", "page": 2})));
    assert_eq!(b_row.series_id, None);
    assert!(series.get_series_by_slug("s").unwrap().is_some());

    let left = series.remove_resource_from_series(a).unwrap();
    assert!(left.series_deleted);
    assert!(series.get_series_by_slug("s").unwrap().is_none());
    assert_eq!(
        resources.get_resource(a).unwrap().own_meta,
        meta(json!({"artist": "alice", "page": 1}))
    );
}

#[test]
fn effective_meta_survives_a_join_leave_round_trip() {
    let vault = Vault::in_memory().unwrap();
    let resources = vault.resources().unwrap();
    let series = vault.series().unwrap();
    create_in_series(&vault, "comic", json!({"artist": "bob", "lang": "en"}));

    let loose = create_plain(&vault, json!({"artist": "bob", "lang": "fr", "page": 7}));
    let before = resources.effective_meta(loose).unwrap();

    let joined = series.attach("comic", loose).unwrap();
    assert!(!joined.created);
    assert_eq!(resources.effective_meta(loose).unwrap(), before);
    assert_eq!(
        resources.get_resource(loose).unwrap().own_meta,
        meta(json!({"lang": "fr", "page": 7}))
    );

    series.remove_resource_from_series(loose).unwrap();
    assert_eq!(resources.effective_meta(loose).unwrap(), before);
}

#[test]
fn series_edits_reach_members_without_re_diffing() {
    let vault = Vault::in_memory().unwrap();
    let resources = vault.resources().unwrap();
    let series = vault.series().unwrap();
    let a = create_in_series(&vault, "s", json!({"artist": "alice", "page": 1}));
    let b = create_in_series(&vault, "s", json!({"artist": "alice", "page": 2}));
    let series_id = resources.get_resource(a).unwrap().series_id.unwrap();

    let patch = SeriesPatch {
        name: None,
        meta: Some(meta(json!({"artist": "carol", "page": 2}))),
    };
    series.update_series(series_id, &patch).unwrap();

    assert_eq!(
        resources.effective_meta(a).unwrap(),
        meta(json!({"artist": "carol", "page": 2}))
    );
    // b keeps its override even though it now equals the series value.
    assert_eq!(
        resources.get_resource(b).unwrap().own_meta,
        meta(json!({"page": 2}))
    );
}

#[test]
fn member_overrides_win_over_the_series_document() {
    let vault = Vault::in_memory().unwrap();
    let resources = vault.resources().unwrap();
    let a = create_in_series(&vault, "s", json!({"artist": "alice"}));

    resources
        .set_own_meta(a, &meta(json!({"artist": "dave", "note": "guest"})))
        .unwrap();

    assert_eq!(
        resources.effective_meta(a).unwrap(),
        meta(json!({"artist": "dave", "note": "guest"}))
    );
}

#[test]
fn delete_series_detaches_members_with_their_effective_meta() {
    let vault = Vault::in_memory().unwrap();
    let resources = vault.resources().unwrap();
    let series = vault.series().unwrap();
    let a = create_in_series(&vault, "s", json!({"artist": "alice", "page": 1}));
    let b = create_in_series(&vault, "s", json!({"artist": "alice", "page": 2}));
    let series_id = resources.get_resource(a).unwrap().series_id.unwrap();

    let members = series.delete_series(series_id).unwrap();
    assert_eq!(members.len(), 2);
    assert!(members.contains(&a) && members.contains(&b));

    assert!(matches!(
        series.get_series(series_id).unwrap_err(),
        RepoError::SeriesNotFound(_)
    ));
    for (id, page) in [(a, 1), (b, 2)] {
        let row = resources.get_resource(id).unwrap();
        assert_eq!(row.series_id, None);
        assert_eq!(row.own_meta, meta(json!({"artist": "alice", "page": page})));
    }
}

#[test]
fn deleting_the_last_member_deletes_the_series() {
    let vault = Vault::in_memory().unwrap();
    let resources = vault.resources().unwrap();
    let series = vault.series().unwrap();
    let a = create_in_series(&vault, "solo", json!({"artist": "erin"}));

    let deletion = resources.delete_resource(a).unwrap();
    let left = deletion.left_series.unwrap();
    assert!(left.series_deleted);
    assert!(series.get_series_by_slug("solo").unwrap().is_none());
}

#[test]
fn leaving_without_a_series_is_not_found() {
    let vault = Vault::in_memory().unwrap();
    let loose = create_plain(&vault, json!({}));
    let err = vault
        .series()
        .unwrap()
        .remove_resource_from_series(loose)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn moving_between_series_merges_the_old_document_first() {
    let vault = Vault::in_memory().unwrap();
    let resources = vault.resources().unwrap();
    let series = vault.series().unwrap();
    create_in_series(&vault, "old", json!({"artist": "alice", "year": 2020}));
    let mover = create_in_series(&vault, "old", json!({"artist": "alice", "year": 2020, "page": 3}));

    let joined = series.attach("new", mover).unwrap();
    assert!(joined.created);
    let new_series = series.get_series(joined.series_id).unwrap();
    assert_eq!(
        new_series.meta,
        meta(json!({"artist": "alice", "year": 2020, "page": 3}))
    );
    assert!(resources.get_resource(mover).unwrap().own_meta.is_empty());
    assert_eq!(new_series.name, "new");
}

#[test]
fn update_series_rejects_blank_names_and_unknown_ids() {
    let vault = Vault::in_memory().unwrap();
    let resources = vault.resources().unwrap();
    let series = vault.series().unwrap();
    let a = create_in_series(&vault, "s", json!({}));
    let series_id = resources.get_resource(a).unwrap().series_id.unwrap();

    let blank = SeriesPatch {
        name: Some("   ".to_string()),
        meta: None,
    };
    assert_eq!(
        series.update_series(series_id, &blank).unwrap_err().kind(),
        ErrorKind::Validation
    );

    let rename = SeriesPatch {
        name: Some("Chapter One".to_string()),
        meta: None,
    };
    assert_eq!(
        series.update_series(series_id, &rename).unwrap().name,
        "Chapter One"
    );
    assert_eq!(
        series
            .update_series(Uuid::new_v4(), &rename)
            .unwrap_err()
            .kind(),
        ErrorKind::NotFound
    );
}

#[test]
fn blank_slug_is_a_validation_error() {
    let vault = Vault::in_memory().unwrap();
    let request = UploadRequest::new("x.png", "image/png", b"x".to_vec()).in_series("  ");
    let err = vault
        .resources()
        .unwrap()
        .create_resource(&request)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn explicit_join_then_leave_restores_the_join_document() {
    let vault = Vault::in_memory().unwrap();
    let resources = vault.resources().unwrap();
    let series = vault.series().unwrap();
    let loose = create_plain(&vault, json!({"artist": "frank", "draft": true}));

    let m = meta(json!({"artist": "grace", "page": 4}));
    let joined = series.join_or_create("fresh", loose, &m).unwrap();
    assert!(joined.created);
    assert_eq!(resources.effective_meta(loose).unwrap(), m);

    series.remove_resource_from_series(loose).unwrap();
    assert_eq!(resources.effective_meta(loose).unwrap(), m);
    assert_eq!(resources.get_resource(loose).unwrap().own_meta, m);
}

#[test]
fn explicit_join_of_an_existing_series_round_trips() {
    let vault = Vault::in_memory().unwrap();
    let resources = vault.resources().unwrap();
    let series = vault.series().unwrap();
    create_in_series(&vault, "shared", json!({"artist": "alice", "lang": "en"}));
    let loose = create_plain(&vault, json!({"unrelated": 1}));

    let m = meta(json!({"artist": "alice", "lang": "de", "page": 9}));
    let joined = series.join_or_create("shared", loose, &m).unwrap();
    assert!(!joined.created);
    assert_eq!(
        resources.get_resource(loose).unwrap().own_meta,
        meta(json!({"lang": "de", "page": 9}))
    );

    series.remove_resource_from_series(loose).unwrap();
    assert_eq!(resources.effective_meta(loose).unwrap(), m);
}

#[test]
fn rejoining_the_current_series_keeps_its_identity() {
    let vault = Vault::in_memory().unwrap();
    let resources = vault.resources().unwrap();
    let series = vault.series().unwrap();
    let only = create_in_series(&vault, "s", json!({"artist": "alice", "page": 1}));
    let series_id = resources.get_resource(only).unwrap().series_id.unwrap();
    let rename = SeriesPatch {
        name: Some("My Comic".to_string()),
        meta: None,
    };
    series.update_series(series_id, &rename).unwrap();

    let joined = series.attach(" s ", only).unwrap();
    assert_eq!(joined.series_id, series_id);
    assert!(!joined.created);
    let kept = series.get_series(series_id).unwrap();
    assert_eq!(kept.name, "My Comic");
    assert_eq!(kept.meta, meta(json!({"artist": "alice", "page": 1})));
    assert!(resources.get_resource(only).unwrap().own_meta.is_empty());

    let joined = series
        .join_or_create("s", only, &meta(json!({"artist": "alice", "page": 2})))
        .unwrap();
    assert_eq!(joined.series_id, series_id);
    assert!(!joined.created);
    assert_eq!(series.get_series(series_id).unwrap().name, "My Comic");
    assert_eq!(
        resources.get_resource(only).unwrap().own_meta,
        meta(json!({"page": 2}))
    );
}
