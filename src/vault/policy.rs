//! Access decision for downloads.

use serde::Serialize;

use crate::storage::FileRecord;

/// Who is asking, as resolved by the request gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Requester {
    pub id: String,
    pub department: String,
    pub clearance: u32,
}

impl Requester {
    pub fn new(id: impl Into<String>, department: impl Into<String>, clearance: u32) -> Self {
        Self {
            id: id.into(),
            department: department.into(),
            clearance,
        }
    }
}

/// Same department, or clearance at least the record's sensitivity.
///
/// A record without a department is treated as belonging to the
/// requester's department, so it is always readable.
pub fn is_allowed(requester: &Requester, record: &FileRecord) -> bool {
    let record_department = record
        .department
        .as_deref()
        .unwrap_or(&requester.department);
    requester.department == record_department || requester.clearance >= record.sensitivity
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(department: Option<&str>, sensitivity: u32) -> FileRecord {
        FileRecord {
            id: "f1".to_string(),
            owner: "alice".to_string(),
            filename: "plan.txt".to_string(),
            digest: "d1".to_string(),
            sensitivity,
            encrypted_key: String::new(),
            department: department.map(str::to_string),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn same_department_is_allowed_regardless_of_clearance() {
        let bob = Requester::new("bob", "eng", 0);
        assert!(is_allowed(&bob, &record(Some("eng"), 9)));
    }

    #[test]
    fn clearance_at_or_above_sensitivity_is_allowed() {
        let bob = Requester::new("bob", "eng", 3);
        assert!(is_allowed(&bob, &record(Some("finance"), 3)));
        assert!(is_allowed(&bob, &record(Some("finance"), 1)));
    }

    #[test]
    fn other_department_with_low_clearance_is_denied() {
        let bob = Requester::new("bob", "eng", 2);
        assert!(!is_allowed(&bob, &record(Some("finance"), 3)));
    }

    #[test]
    fn missing_department_defaults_to_requester() {
        let bob = Requester::new("bob", "eng", 0);
        assert!(is_allowed(&bob, &record(None, 5)));
    }
}
