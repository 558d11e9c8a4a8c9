//! Integration tests for the Valve vault service.

use std::collections::HashSet;
use std::fs;

use tempfile::TempDir;
use valve::crypto::cipher::{self, NONCE_LEN};
use valve::crypto::KdfParams;
use valve::errors::VaultError;
use valve::vault::format;
use valve::vault::{Fields, VaultService};

/// Helper: create a fresh vault file inside a temp dir.
fn new_vault() -> (TempDir, VaultService) {
    let dir = TempDir::new().expect("create temp dir");
    let path = dir.path().join("vault.steel");
    let service = VaultService::create(&path, KdfParams::minimum()).expect("create vault");
    (dir, service)
}

fn reopen(service: &VaultService) -> VaultService {
    VaultService::open(service.path(), KdfParams::minimum()).expect("open vault")
}

fn fields(pairs: &[(&str, &str)]) -> Fields {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

// ---------------------------------------------------------------------------
// End-to-end scenarios
// ---------------------------------------------------------------------------

#[test]
fn create_persist_reload_and_read() {
    let (_dir, service) = new_vault();

    let handle = service
        .create_section("work", "alice", b"correct-horse")
        .unwrap();
    service
        .add_entry(&handle, "github", &fields(&[("api_key", "ghp_xxx")]))
        .unwrap();
    service.save().unwrap();

    let reloaded = reopen(&service);
    assert!(!reloaded.is_unlocked("work"), "sections start locked");

    let handle = reloaded.authenticate("work", b"correct-horse").unwrap();
    let entry = reloaded.read_entry(&handle, "github").unwrap();
    assert_eq!(entry.get("api_key").map(String::as_str), Some("ghp_xxx"));

    let err = reloaded.authenticate("work", b"wrong-pass").unwrap_err();
    assert!(matches!(err, VaultError::Authentication));
}

#[test]
fn change_secret_key_rotates_everything() {
    let (_dir, service) = new_vault();
    let handle = service.create_section("work", "alice", b"old").unwrap();
    service
        .add_entry(&handle, "github", &fields(&[("api_key", "ghp_xxx"), ("user", "al")]))
        .unwrap();
    service
        .add_entry(&handle, "aws", &fields(&[("secret", "wJalr")]))
        .unwrap();
    let before = service.snapshot().section("work").unwrap().clone();

    service
        .change_secret_key(&handle, b"old", b"new", b"new")
        .unwrap();
    service.save().unwrap();

    let after = service.snapshot().section("work").unwrap().clone();
    assert_ne!(before.salt, after.salt);
    assert_ne!(before.nonce, after.nonce);
    assert_ne!(before.verification_hash, after.verification_hash);
    for (name, entry) in &before.owner.entries {
        for (field, sealed) in &entry.content {
            assert_ne!(&after.owner.entries[name].content[field], sealed);
        }
    }

    let reloaded = reopen(&service);
    assert!(matches!(
        reloaded.authenticate("work", b"old"),
        Err(VaultError::Authentication)
    ));
    let handle = reloaded.authenticate("work", b"new").unwrap();
    let github = reloaded.read_entry(&handle, "github").unwrap();
    assert_eq!(github, fields(&[("api_key", "ghp_xxx"), ("user", "al")]));
    let aws = reloaded.read_entry(&handle, "aws").unwrap();
    assert_eq!(aws, fields(&[("secret", "wJalr")]));
}

#[test]
fn change_secret_key_works_from_a_locked_handle() {
    let (_dir, service) = new_vault();
    let h = service.create_section("work", "alice", b"old").unwrap();
    service
        .add_entry(&h, "github", &fields(&[("api_key", "x")]))
        .unwrap();
    service.save().unwrap();

    let reloaded = reopen(&service);
    let handle = reloaded.section("work").unwrap();
    assert!(!reloaded.is_unlocked("work"));

    reloaded
        .change_secret_key(&handle, b"old", b"new", b"new")
        .unwrap();
    assert!(reloaded.is_unlocked("work"));
    assert_eq!(reloaded.read_entry(&handle, "github").unwrap()["api_key"], "x");
}

#[test]
fn locked_handle_for_unknown_section_is_not_found() {
    let (_dir, service) = new_vault();
    assert!(matches!(
        service.section("nope"),
        Err(VaultError::NotFound { .. })
    ));
}

#[test]
fn change_secret_key_with_wrong_old_password_changes_nothing() {
    let (_dir, service) = new_vault();
    let handle = service.create_section("work", "alice", b"old").unwrap();
    service
        .add_entry(&handle, "github", &fields(&[("api_key", "x")]))
        .unwrap();
    let before = service.snapshot();

    let err = service
        .change_secret_key(&handle, b"not-old", b"new", b"new")
        .unwrap_err();
    assert!(matches!(err, VaultError::Authentication));
    assert_eq!(service.snapshot(), before);
}

#[test]
fn change_secret_key_with_mismatched_confirmation_changes_nothing() {
    let (_dir, service) = new_vault();
    let handle = service.create_section("work", "alice", b"old").unwrap();
    let before = service.snapshot();

    let err = service
        .change_secret_key(&handle, b"old", b"new", b"neww")
        .unwrap_err();
    assert!(matches!(err, VaultError::PasswordMismatch));
    assert_eq!(service.snapshot(), before);
    assert!(service.authenticate("work", b"old").is_ok());
}

// ---------------------------------------------------------------------------
// Lock / unlock
// ---------------------------------------------------------------------------

#[test]
fn authenticate_twice_gives_two_usable_sessions() {
    let (_dir, service) = new_vault();
    let h = service.create_section("work", "alice", b"pw").unwrap();
    service
        .add_entry(&h, "github", &fields(&[("api_key", "x")]))
        .unwrap();
    service.lock(&h);

    let first = service.authenticate("work", b"pw").unwrap();
    let second = service.authenticate("work", b"pw").unwrap();
    assert!(service.read_entry(&first, "github").is_ok());
    assert!(service.read_entry(&second, "github").is_ok());
}

#[test]
fn wrong_password_never_unlocks() {
    let (_dir, service) = new_vault();
    let h = service.create_section("work", "alice", b"pw").unwrap();
    service.lock(&h);

    assert!(service.authenticate("work", b"pw ").is_err());
    assert!(!service.is_unlocked("work"));
    assert!(matches!(
        service.read_entry(&h, "anything"),
        Err(VaultError::NotAuthenticated(_))
    ));
}

#[test]
fn unknown_section_is_not_found() {
    let (_dir, service) = new_vault();
    assert!(matches!(
        service.authenticate("nope", b"pw"),
        Err(VaultError::NotFound { .. })
    ));
}

#[test]
fn sections_are_keyed_independently() {
    let (_dir, service) = new_vault();
    let work = service.create_section("work", "alice", b"alice-pw").unwrap();
    service.create_section("home", "bob", b"bob-pw").unwrap();
    service
        .add_entry(&work, "github", &fields(&[("api_key", "x")]))
        .unwrap();
    service.save().unwrap();

    let reloaded = reopen(&service);
    assert!(matches!(
        reloaded.authenticate("work", b"bob-pw"),
        Err(VaultError::Authentication)
    ));
    let home = reloaded.authenticate("home", b"bob-pw").unwrap();
    assert!(reloaded.is_unlocked("home"));
    assert!(!reloaded.is_unlocked("work"));
    assert!(matches!(
        reloaded.read_entry(&home, "github"),
        Err(VaultError::NotFound { .. })
    ));
}

// ---------------------------------------------------------------------------
// Duplicates and deletion
// ---------------------------------------------------------------------------

#[test]
fn duplicate_section_and_entry_are_rejected() {
    let (_dir, service) = new_vault();
    let h = service.create_section("work", "alice", b"pw").unwrap();
    assert!(matches!(
        service.create_section("work", "mallory", b"other"),
        Err(VaultError::DuplicateName(_))
    ));

    service
        .add_entry(&h, "github", &fields(&[("api_key", "first")]))
        .unwrap();
    let err = service
        .add_entry(&h, "github", &fields(&[("api_key", "second")]))
        .unwrap_err();
    assert!(matches!(err, VaultError::DuplicateEntry { .. }));
    assert_eq!(
        service.read_entry(&h, "github").unwrap()["api_key"],
        "first"
    );
}

#[test]
fn delete_entry_and_section() {
    let (_dir, service) = new_vault();
    let h = service.create_section("work", "alice", b"pw").unwrap();
    service
        .add_entry(&h, "github", &fields(&[("api_key", "x")]))
        .unwrap();

    service.delete_entry(&h, "github").unwrap();
    assert!(matches!(
        service.delete_entry(&h, "github"),
        Err(VaultError::NotFound { .. })
    ));
    assert!(service.list_entries(&h).unwrap().is_empty());

    service.delete_section(&h).unwrap();
    assert_eq!(service.section_count(), 0);
    assert!(!service.is_unlocked("work"));
    assert!(matches!(
        service.delete_section(&h),
        Err(VaultError::NotFound { .. })
    ));

    service.save().unwrap();
    assert_eq!(reopen(&service).section_count(), 0);
}

#[test]
fn list_sections_needs_no_password() {
    let (_dir, service) = new_vault();
    let h = service.create_section("work", "alice", b"pw").unwrap();
    service
        .add_entry(&h, "github", &fields(&[("api_key", "x")]))
        .unwrap();
    service.create_section("home", "bob", b"pw2").unwrap();
    service.save().unwrap();

    let listed = reopen(&service).list_sections();
    let names: Vec<_> = listed.iter().map(|s| (s.name.as_str(), s.owner.as_str())).collect();
    assert_eq!(names, [("home", "bob"), ("work", "alice")]);
    assert_eq!(listed[1].entry_count, 1);
    assert!(listed.iter().all(|s| !s.unlocked));
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

#[test]
fn reload_preserves_every_field() {
    let (_dir, service) = new_vault();
    for (section, owner) in [("a", "ann"), ("b", "ben"), ("c", "cat")] {
        let h = service.create_section(section, owner, b"pw").unwrap();
        for entry in ["one", "two", "three"] {
            service
                .add_entry(&h, entry, &fields(&[("k1", "v1"), ("k2", entry)]))
                .unwrap();
        }
    }
    service.save().unwrap();

    let on_disk = format::read(service.path()).unwrap();
    assert_eq!(on_disk, service.snapshot());
}

#[test]
fn save_is_deterministic() {
    let (_dir, service) = new_vault();
    let h = service.create_section("work", "alice", b"pw").unwrap();
    service
        .add_entry(&h, "github", &fields(&[("api_key", "x")]))
        .unwrap();

    service.save().unwrap();
    let first = fs::read(service.path()).unwrap();
    service.save().unwrap();
    let second = fs::read(service.path()).unwrap();
    assert_eq!(first, second);
}

#[cfg(unix)]
#[test]
fn vault_file_is_owner_only() {
    use std::os::unix::fs::PermissionsExt;

    let (_dir, service) = new_vault();
    service.create_section("work", "alice", b"pw").unwrap();
    service.save().unwrap();

    let mode = fs::metadata(service.path()).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}

#[test]
fn corrupted_file_is_not_loaded() {
    let (_dir, service) = new_vault();
    service.create_section("work", "alice", b"pw").unwrap();
    service.save().unwrap();

    let mut bytes = fs::read(service.path()).unwrap();
    bytes[0] = 0x00;
    fs::write(service.path(), &bytes).unwrap();

    let result = VaultService::open(service.path(), KdfParams::minimum());
    assert!(matches!(result, Err(VaultError::Parse(_))));
}

#[test]
fn missing_file_is_a_persistence_error() {
    let dir = TempDir::new().unwrap();
    let result = VaultService::open(&dir.path().join("absent.steel"), KdfParams::minimum());
    assert!(matches!(result, Err(VaultError::Persistence(_))));
}

#[test]
fn empty_path_is_a_configuration_error() {
    let result = VaultService::open(std::path::Path::new(""), KdfParams::minimum());
    assert!(matches!(result, Err(VaultError::Configuration(_))));
}

// ---------------------------------------------------------------------------
// Nonces and tampering
// ---------------------------------------------------------------------------

#[test]
fn no_two_fields_of_a_section_share_a_nonce() {
    let (_dir, service) = new_vault();
    let h = service.create_section("work", "alice", b"pw").unwrap();
    for i in 0..40 {
        let f = fields(&[("a", "same"), ("b", "same"), ("c", "same")]);
        service.add_entry(&h, &format!("entry-{i}"), &f).unwrap();
    }

    let check = |service: &VaultService| {
        let vault = service.snapshot();
        let section = vault.section("work").unwrap();
        let nonces: HashSet<[u8; NONCE_LEN]> = section
            .used_masks()
            .iter()
            .map(|mask| {
                let mut nonce = [0u8; NONCE_LEN];
                for (out, (b, m)) in nonce.iter_mut().zip(section.nonce.iter().zip(mask)) {
                    *out = b ^ m;
                }
                nonce
            })
            .collect();
        assert_eq!(nonces.len(), 120);
    };

    check(&service);
    service.change_secret_key(&h, b"pw", b"pw2", b"pw2").unwrap();
    check(&service);
}

#[test]
fn tampered_ciphertext_fails_with_authentication_error() {
    let (_dir, service) = new_vault();
    let h = service.create_section("work", "alice", b"pw").unwrap();

    // One entry per bit of a sealed 7-byte value; entry N gets bit N flipped.
    let sealed_len = NONCE_LEN + 7 + cipher::TAG_LEN;
    for bit in 0..sealed_len * 8 {
        service
            .add_entry(&h, &format!("e{bit:03}"), &fields(&[("api_key", "ghp_xxx")]))
            .unwrap();
    }
    service.save().unwrap();

    let mut vault = format::read(service.path()).unwrap();
    let section = vault.section_mut("work").unwrap();
    for bit in 0..sealed_len * 8 {
        let entry = section.owner.entries.get_mut(&format!("e{bit:03}")).unwrap();
        let sealed = entry.content.get_mut("api_key").unwrap();
        assert_eq!(sealed.len(), sealed_len);
        sealed[bit / 8] ^= 1 << (bit % 8);
    }
    format::write(&vault, service.path()).unwrap();

    let reloaded = reopen(&service);
    let h = reloaded.authenticate("work", b"pw").unwrap();
    for bit in 0..sealed_len * 8 {
        let result = reloaded.read_entry(&h, &format!("e{bit:03}"));
        assert!(
            matches!(result, Err(VaultError::Authentication)),
            "bit {bit} flip must fail authentication"
        );
    }
}

#[test]
fn ciphertext_moved_between_entries_is_rejected() {
    let (_dir, service) = new_vault();
    let h = service.create_section("work", "alice", b"pw").unwrap();
    service
        .add_entry(&h, "github", &fields(&[("api_key", "gh")]))
        .unwrap();
    service
        .add_entry(&h, "gitlab", &fields(&[("api_key", "gl")]))
        .unwrap();
    service.save().unwrap();

    let mut vault = format::read(service.path()).unwrap();
    let owner = &mut vault.section_mut("work").unwrap().owner;
    let stolen = owner.entries["github"].content["api_key"].clone();
    owner
        .entries
        .get_mut("gitlab")
        .unwrap()
        .content
        .insert("api_key".into(), stolen);
    format::write(&vault, service.path()).unwrap();

    let reloaded = reopen(&service);
    let h = reloaded.authenticate("work", b"pw").unwrap();
    assert!(matches!(
        reloaded.read_entry(&h, "gitlab"),
        Err(VaultError::Authentication)
    ));
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

#[test]
fn concurrent_writers_are_serialized() {
    let (_dir, service) = new_vault();
    let h = service.create_section("work", "alice", b"pw").unwrap();

    std::thread::scope(|scope| {
        for t in 0..4 {
            let (service, h) = (&service, &h);
            scope.spawn(move || {
                for i in 0..10 {
                    let name = format!("t{t}-e{i}");
                    service
                        .add_entry(h, &name, &fields(&[("v", name.as_str())]))
                        .unwrap();
                    if i % 3 == 0 {
                        service.save().unwrap();
                    }
                }
            });
        }
    });

    assert_eq!(service.list_entries(&h).unwrap().len(), 40);
    assert_eq!(
        service.read_entry(&h, "t2-e7").unwrap()["v"],
        "t2-e7"
    );
    service.save().unwrap();
    assert_eq!(format::read(service.path()).unwrap(), service.snapshot());
}

#[test]
fn racing_key_changes_commit_exactly_once() {
    for _ in 0..4 {
        let (_dir, service) = new_vault();
        let h = service.create_section("work", "alice", b"old").unwrap();
        service
            .add_entry(&h, "github", &fields(&[("k", "v")]))
            .unwrap();

        let (first, second) = std::thread::scope(|scope| {
            let a = scope.spawn(|| service.change_secret_key(&h, b"old", b"new-a", b"new-a"));
            let b = scope.spawn(|| service.change_secret_key(&h, b"old", b"new-b", b"new-b"));
            (a.join().unwrap(), b.join().unwrap())
        });

        let winner: &[u8] = match (&first, &second) {
            (Ok(()), Err(VaultError::Authentication)) => b"new-a",
            (Err(VaultError::Authentication), Ok(())) => b"new-b",
            other => panic!("expected exactly one rotation to commit, got {other:?}"),
        };

        service.lock(&h);
        assert!(matches!(
            service.authenticate("work", b"old"),
            Err(VaultError::Authentication)
        ));
        let h = service.authenticate("work", winner).unwrap();
        assert_eq!(service.read_entry(&h, "github").unwrap()["k"], "v");
    }
}
