use chrono::Utc;
use secure_file_store::storage::{AuditAction, AuditEvent, Database, DatabaseError, FileRecord};

fn test_db() -> (tempfile::TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path().join("data")).unwrap();
    (dir, db)
}

fn sample_file(id: &str, filename: &str, digest: &str) -> FileRecord {
    FileRecord {
        id: id.to_string(),
        owner: "alice".to_string(),
        filename: filename.to_string(),
        digest: digest.to_string(),
        sensitivity: 1,
        encrypted_key: "a2V5".to_string(),
        department: None,
        created_at: Utc::now(),
    }
}

#[test]
fn test_insert_and_get_file() {
    let (_dir, db) = test_db();
    let mut file = sample_file("file-1", "report.pdf", "d1");
    file.department = Some("finance".to_string());
    file.sensitivity = 3;

    db.insert_file(&file).unwrap();

    let retrieved = db.get_file("file-1").unwrap().expect("file should exist");
    assert_eq!(retrieved, file);
    assert!(db.get_file("missing").unwrap().is_none());
}

#[test]
fn test_get_file_by_digest() {
    let (_dir, db) = test_db();
    db.insert_file(&sample_file("file-2", "notes.txt", "abc")).unwrap();

    let retrieved = db.get_file_by_digest("abc").unwrap().expect("file should exist");
    assert_eq!(retrieved.id, "file-2");
    assert!(db.get_file_by_digest("ABC").unwrap().is_none());
}

#[test]
fn test_duplicate_digest_rejected() {
    let (_dir, db) = test_db();
    db.insert_file(&sample_file("first", "a.txt", "same")).unwrap();

    let err = db
        .insert_file(&sample_file("second", "b.txt", "same"))
        .unwrap_err();
    match err {
        DatabaseError::DuplicateDigest {
            digest,
            existing_id,
        } => {
            assert_eq!(digest, "same");
            assert_eq!(existing_id, "first");
        }
        other => panic!("expected DuplicateDigest, got {other:?}"),
    }

    // Nothing from the rejected insert is visible
    assert!(db.get_file("second").unwrap().is_none());
    assert!(db.get_files_by_filename_prefix("b").unwrap().is_empty());
    assert_eq!(db.get_all_files().unwrap().len(), 1);
}

#[test]
fn test_filename_prefix_search() {
    let (_dir, db) = test_db();
    db.insert_file(&sample_file("1", "report-q1.pdf", "d1")).unwrap();
    db.insert_file(&sample_file("2", "report-q2.pdf", "d2")).unwrap();
    db.insert_file(&sample_file("3", "Report.doc", "d3")).unwrap();
    db.insert_file(&sample_file("4", "photo.png", "d4")).unwrap();

    let ids: Vec<String> = db
        .get_files_by_filename_prefix("report")
        .unwrap()
        .into_iter()
        .map(|f| f.id)
        .collect();
    assert_eq!(ids, vec!["1", "2"]);

    let upper = db.get_files_by_filename_prefix("Report").unwrap();
    assert_eq!(upper.len(), 1);
    assert_eq!(upper[0].id, "3");

    assert_eq!(db.get_files_by_filename_prefix("report-q1.pdf").unwrap().len(), 1);
    assert!(db.get_files_by_filename_prefix("video").unwrap().is_empty());
}

#[test]
fn test_shared_filename_returns_all_records() {
    let (_dir, db) = test_db();
    db.insert_file(&sample_file("a", "scan.jpg", "d1")).unwrap();
    db.insert_file(&sample_file("b", "scan.jpg", "d2")).unwrap();

    let mut ids: Vec<String> = db
        .get_files_by_filename_prefix("scan")
        .unwrap()
        .into_iter()
        .map(|f| f.id)
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["a", "b"]);
}

#[test]
fn test_get_all_files() {
    let (_dir, db) = test_db();
    assert!(db.get_all_files().unwrap().is_empty());

    for i in 0..5 {
        db.insert_file(&sample_file(&format!("f{i}"), &format!("file{i}.bin"), &format!("d{i}")))
            .unwrap();
    }
    assert_eq!(db.get_all_files().unwrap().len(), 5);
}

#[test]
fn test_audit_newest_first_with_limit() {
    let (_dir, db) = test_db();
    assert!(db.list_audit(100).unwrap().is_empty());

    for (i, user) in ["alice", "bob", "carol"].iter().enumerate() {
        let seq = db
            .append_audit(&AuditEvent::new(user, "file-1", AuditAction::Download, i != 1))
            .unwrap();
        assert_eq!(seq, i as u64 + 1);
    }

    let events = db.list_audit(100).unwrap();
    let users: Vec<&str> = events.iter().map(|e| e.user.as_str()).collect();
    assert_eq!(users, vec!["carol", "bob", "alice"]);
    assert_eq!(events[0].seq, 3);
    assert!(!events[1].allowed);

    let limited = db.list_audit(2).unwrap();
    assert_eq!(limited.len(), 2);
    assert_eq!(limited[0].user, "carol");
}

#[test]
fn test_records_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let db = Database::open(dir.path().join("data")).unwrap();
        db.insert_file(&sample_file("kept", "kept.txt", "dk")).unwrap();
        db.append_audit(&AuditEvent::new("bob", "kept", AuditAction::Download, true))
            .unwrap();
    }

    let db = Database::open(dir.path().join("data")).unwrap();
    assert!(db.get_file("kept").unwrap().is_some());
    assert_eq!(db.get_file_by_digest("dk").unwrap().unwrap().id, "kept");

    // Sequence numbers continue after reopening
    let seq = db
        .append_audit(&AuditEvent::new("bob", "kept", AuditAction::Download, false))
        .unwrap();
    assert_eq!(seq, 2);
}
