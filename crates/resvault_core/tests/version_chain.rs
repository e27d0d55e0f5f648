use resvault_core::repo::version_repo::{SqliteVersionRepository, VersionRepository};
use resvault_core::{
    ContentHash, ContentStore, ErrorKind, MemoryContentStore, NewVersion, RepoError,
    ResourceVersion, UploadRequest, Vault, VersionUpload,
};
use std::collections::HashSet;
use uuid::Uuid;

fn new_resource(vault: &Vault, bytes: &[u8]) -> (Uuid, ResourceVersion) {
    let created = vault
        .resources()
        .unwrap()
        .create_resource(&UploadRequest::new("cover.png", "image/png", bytes.to_vec()))
        .unwrap();
    (created.resource.id, created.version)
}

fn upload(vault: &Vault, resource_id: Uuid, bytes: &[u8]) -> ResourceVersion {
    vault
        .versions()
        .unwrap()
        .upload_version(resource_id, &VersionUpload::new("image/png", bytes.to_vec()))
        .unwrap()
}

fn assert_chain_invariants(vault: &Vault, resource_id: Uuid) {
    let resource = vault.resources().unwrap().get_resource(resource_id).unwrap();
    let versions = vault.versions().unwrap().list_versions(resource_id).unwrap();

    let current: Vec<_> = versions
        .iter()
        .filter(|v| v.id == resource.current_version_id)
        .collect();
    assert_eq!(current.len(), 1, "exactly one version must be current");
    assert_eq!(resource.hash, current[0].content_hash);
    assert_eq!(resource.file_size, current[0].size);

    let numbers: Vec<u32> = versions.iter().map(|v| v.version_number).collect();
    let unique: HashSet<u32> = numbers.iter().copied().collect();
    assert_eq!(unique.len(), numbers.len(), "version numbers must be unique");
    assert!(numbers.windows(2).all(|pair| pair[0] > pair[1]));
}

#[test]
fn first_upload_creates_version_one_as_current() {
    let vault = Vault::in_memory().unwrap();
    let (resource_id, version) = new_resource(&vault, b"v1");

    assert_eq!(version.version_number, 1);
    let resource = vault.resources().unwrap().get_resource(resource_id).unwrap();
    assert_eq!(resource.current_version_id, version.id);
    assert_eq!(resource.hash, ContentHash::of(b"v1"));
    assert_chain_invariants(&vault, resource_id);
}

#[test]
fn uploads_append_gapless_numbers_and_promote() {
    let vault = Vault::in_memory().unwrap();
    let (resource_id, _) = new_resource(&vault, b"v1");
    let v2 = upload(&vault, resource_id, b"v2");
    let v3 = upload(&vault, resource_id, b"v3");

    assert_eq!(v2.version_number, 2);
    assert_eq!(v3.version_number, 3);
    let resource = vault.resources().unwrap().get_resource(resource_id).unwrap();
    assert_eq!(resource.current_version_id, v3.id);

    let numbers: Vec<u32> = vault
        .versions()
        .unwrap()
        .list_versions(resource_id)
        .unwrap()
        .iter()
        .map(|v| v.version_number)
        .collect();
    assert_eq!(numbers, vec![3, 2, 1]);
    assert_chain_invariants(&vault, resource_id);
}

#[test]
fn deleting_a_middle_version_leaves_a_gap() {
    let vault = Vault::in_memory().unwrap();
    let (resource_id, _) = new_resource(&vault, b"v1");
    let v2 = upload(&vault, resource_id, b"v2");
    upload(&vault, resource_id, b"v3");

    let versions = vault.versions().unwrap();
    let deletion = versions.delete_version(resource_id, v2.id).unwrap();
    assert!(deletion.blob_reclaimed);

    let numbers: Vec<u32> = versions
        .list_versions(resource_id)
        .unwrap()
        .iter()
        .map(|v| v.version_number)
        .collect();
    assert_eq!(numbers, vec![3, 1]);

    let v4 = upload(&vault, resource_id, b"v4");
    assert_eq!(v4.version_number, 4);
    assert_chain_invariants(&vault, resource_id);
}

#[test]
fn deleting_the_current_version_is_a_conflict() {
    let vault = Vault::in_memory().unwrap();
    let (resource_id, _) = new_resource(&vault, b"v1");
    let v2 = upload(&vault, resource_id, b"v2");

    let versions = vault.versions().unwrap();
    let err = versions.delete_version(resource_id, v2.id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert!(matches!(err, RepoError::CurrentVersionDelete { .. }));
    assert_eq!(versions.list_versions(resource_id).unwrap().len(), 2);
}

#[test]
fn restore_moves_forward_with_the_old_content() {
    let vault = Vault::in_memory().unwrap();
    let (resource_id, v1) = new_resource(&vault, b"v1");
    upload(&vault, resource_id, b"v2");
    upload(&vault, resource_id, b"v3");

    let versions = vault.versions().unwrap();
    let v4 = versions.restore_version(resource_id, v1.id).unwrap();
    assert_eq!(v4.version_number, 4);
    assert_eq!(v4.comment, "Restored from version 1");

    let comparison = versions.compare_versions(v1.id, v4.id).unwrap();
    assert!(comparison.same_hash);
    assert_eq!(comparison.size_delta, 0);

    let resource = vault.resources().unwrap().get_resource(resource_id).unwrap();
    assert_eq!(resource.current_version_id, v4.id);
    assert_eq!(
        versions.version_content(resource_id, v4.id).unwrap(),
        b"v1".to_vec()
    );
    assert_chain_invariants(&vault, resource_id);
}

#[test]
fn version_of_another_resource_is_not_found() {
    let vault = Vault::in_memory().unwrap();
    let (first, first_v1) = new_resource(&vault, b"first");
    let (second, _) = new_resource(&vault, b"second");

    let versions = vault.versions().unwrap();
    let restore = versions.restore_version(second, first_v1.id).unwrap_err();
    assert_eq!(restore.kind(), ErrorKind::NotFound);
    let delete = versions.delete_version(second, first_v1.id).unwrap_err();
    assert_eq!(delete.kind(), ErrorKind::NotFound);
    let get = versions.get_version(second, first_v1.id).unwrap_err();
    assert!(matches!(get, RepoError::VersionNotFound { .. }));

    assert_eq!(versions.list_versions(first).unwrap().len(), 1);
    assert_eq!(versions.list_versions(second).unwrap().len(), 1);
}

#[test]
fn restoring_an_unknown_version_never_falls_back() {
    let vault = Vault::in_memory().unwrap();
    let (resource_id, _) = new_resource(&vault, b"v1");
    upload(&vault, resource_id, b"v2");

    let versions = vault.versions().unwrap();
    let err = versions
        .restore_version(resource_id, Uuid::new_v4())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(versions.list_versions(resource_id).unwrap().len(), 2);
}

#[test]
fn identical_bytes_share_one_blob_until_the_last_reference_goes() {
    let vault = Vault::in_memory().unwrap();
    let (resource_id, v1) = new_resource(&vault, b"same bytes");
    let v2 = upload(&vault, resource_id, b"same bytes");
    upload(&vault, resource_id, b"other bytes");

    assert_eq!(v1.content_hash, v2.content_hash);
    assert_ne!(v1.id, v2.id);

    let versions = vault.versions().unwrap();
    let first = versions.delete_version(resource_id, v1.id).unwrap();
    assert!(!first.blob_reclaimed);
    assert!(vault.store().exists(&v1.content_hash).unwrap());

    let second = versions.delete_version(resource_id, v2.id).unwrap();
    assert!(second.blob_reclaimed);
    assert!(!vault.store().exists(&v1.content_hash).unwrap());
}

#[test]
fn blob_shared_across_resources_survives_one_delete() {
    let vault = Vault::in_memory().unwrap();
    let (first, first_v1) = new_resource(&vault, b"shared");
    upload(&vault, first, b"newer");
    new_resource(&vault, b"shared");

    let deletion = vault
        .versions()
        .unwrap()
        .delete_version(first, first_v1.id)
        .unwrap();
    assert!(!deletion.blob_reclaimed);
    assert!(vault.store().exists(&first_v1.content_hash).unwrap());
}

#[test]
fn missing_blob_is_a_consistency_failure_not_empty_content() {
    let vault = Vault::in_memory().unwrap();
    let (resource_id, v1) = new_resource(&vault, b"will vanish");
    assert!(vault.store().remove(&v1.content_hash).unwrap());

    let err = vault
        .versions()
        .unwrap()
        .version_content(resource_id, v1.id)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Consistency);
    assert!(matches!(err, RepoError::MissingContent { .. }));
}

#[test]
fn expected_number_guards_against_stale_writers() {
    let vault = Vault::in_memory().unwrap();
    let (resource_id, _) = new_resource(&vault, b"v1");
    let versions = vault.versions().unwrap();

    let mut stale = VersionUpload::new("image/png", b"v2".to_vec());
    stale.expected_number = Some(3);
    let err = versions.upload_version(resource_id, &stale).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(matches!(
        err,
        RepoError::NonMonotonicVersion {
            expected: 3,
            next: 2,
            ..
        }
    ));

    let mut fresh = VersionUpload::new("image/png", b"v2".to_vec());
    fresh.expected_number = Some(2);
    assert_eq!(
        versions
            .upload_version(resource_id, &fresh)
            .unwrap()
            .version_number,
        2
    );
}

#[test]
fn create_version_requires_stored_content() {
    let vault = Vault::in_memory().unwrap();
    let (resource_id, _) = new_resource(&vault, b"v1");

    let repo = SqliteVersionRepository::try_new(vault.connection(), vault.store()).unwrap();
    let other_store = MemoryContentStore::new();
    let hash = other_store.put(b"only in the other store").unwrap();
    let missing = NewVersion {
        content_hash: hash,
        content_type: "text/plain".to_string(),
        size: 23,
        dimensions: None,
        comment: String::new(),
        expected_number: None,
    };
    let err = repo.create_version(resource_id, &missing).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let hash = vault.store().put(b"pre-stored").unwrap();
    let present = NewVersion {
        content_hash: hash,
        ..missing
    };
    assert_eq!(
        repo.create_version(resource_id, &present)
            .unwrap()
            .version_number,
        2
    );
}

#[test]
fn cleanup_keeps_the_newest_and_the_current() {
    let vault = Vault::in_memory().unwrap();
    let (resource_id, _) = new_resource(&vault, b"v1");
    for body in [b"v2", b"v3", b"v4"] {
        upload(&vault, resource_id, body);
    }

    let versions = vault.versions().unwrap();
    let deleted = versions.cleanup_versions(resource_id, 2).unwrap();
    let mut deleted_numbers: Vec<u32> =
        deleted.iter().map(|d| d.version.version_number).collect();
    deleted_numbers.sort_unstable();
    assert_eq!(deleted_numbers, vec![1, 2]);

    let remaining = versions.cleanup_versions(resource_id, 0).unwrap();
    assert_eq!(remaining.len(), 1);
    let left: Vec<u32> = versions
        .list_versions(resource_id)
        .unwrap()
        .iter()
        .map(|v| v.version_number)
        .collect();
    assert_eq!(left, vec![4]);
}

#[test]
fn compare_reports_size_and_dimension_changes() {
    let vault = Vault::in_memory().unwrap();
    let (resource_id, v1) = new_resource(&vault, b"tiny");
    let mut bigger = VersionUpload::new("image/jpeg", b"much bigger".to_vec());
    bigger.dimensions = Some(resvault_core::Dimensions {
        width: 640,
        height: 480,
    });
    let v2 = vault
        .versions()
        .unwrap()
        .upload_version(resource_id, &bigger)
        .unwrap();

    let comparison = vault
        .versions()
        .unwrap()
        .compare_versions(v1.id, v2.id)
        .unwrap();
    assert!(!comparison.same_hash);
    assert!(!comparison.same_type);
    assert!(!comparison.same_dimensions);
    assert_eq!(comparison.size_delta, 7);
    assert_eq!((comparison.number1, comparison.number2), (1, 2));

    let err = vault
        .versions()
        .unwrap()
        .compare_versions(v1.id, Uuid::new_v4())
        .unwrap_err();
    assert!(matches!(err, RepoError::UnknownVersion(_)));
}

#[test]
fn listing_versions_of_unknown_resource_is_not_found() {
    let vault = Vault::in_memory().unwrap();
    let err = vault
        .versions()
        .unwrap()
        .list_versions(Uuid::new_v4())
        .unwrap_err();
    assert!(matches!(err, RepoError::ResourceNotFound(_)));
}
