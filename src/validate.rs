//! Validation of a proposed record against a registry state.

use std::collections::{HashMap, HashSet};

use crate::error::RecordValidationError;
use crate::record::{Record, RecordIntent};

/// True if `name` is a syntactically valid DNS hostname: dot-separated
/// labels of letters, digits and hyphens, no label starting or ending
/// with a hyphen, labels 1-63 chars, 253 chars overall.
pub fn is_valid_hostname(name: &str) -> bool {
    if name.is_empty() || name.len() > 253 {
        return false;
    }
    name.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    })
}

/// Validate a proposed record intent against the records that would remain
/// in the registry after the intent's evictions are applied.
///
/// Rules enforced:
/// 1. names (and CNAME targets) must be syntactically valid hostnames;
/// 2. A and CNAME records may not coexist for the same name;
/// 3. no duplicate CNAMEs for one name;
/// 4. no duplicate A (name, value) pairs;
/// 5. CNAMEs may not form resolution cycles through the simulated set.
///
/// Pure and deterministic given the same inputs.
pub fn validate_record(
    new: &RecordIntent,
    existing: &[RecordIntent],
) -> Result<(), RecordValidationError> {
    let new_record = &new.record;
    let name = new_record.name();

    if !is_valid_hostname(name) {
        return Err(RecordValidationError::InvalidHostname(name.to_string()));
    }

    let same_name: Vec<&Record> = existing
        .iter()
        .map(|ri| &ri.record)
        .filter(|r| r.name() == name)
        .collect();
    let has_a = same_name.iter().any(|r| matches!(r, Record::A { .. }));
    let has_cname = same_name.iter().any(|r| matches!(r, Record::Cname { .. }));

    match new_record {
        Record::A { value, .. } => {
            if has_cname {
                return Err(RecordValidationError::CnameExistsForName {
                    name: name.to_string(),
                });
            }
            let duplicate = same_name
                .iter()
                .any(|r| matches!(r, Record::A { value: v, .. } if v == value));
            if duplicate {
                return Err(RecordValidationError::DuplicateAValue {
                    name: name.to_string(),
                    value: value.to_string(),
                });
            }
        }
        Record::Cname { value, .. } => {
            if !is_valid_hostname(value) {
                return Err(RecordValidationError::InvalidHostname(value.clone()));
            }
            if has_a {
                return Err(RecordValidationError::AExistsForName {
                    name: name.to_string(),
                });
            }
            if has_cname {
                return Err(RecordValidationError::DuplicateCname {
                    name: name.to_string(),
                });
            }
            detect_cname_cycle(new_record, existing)?;
        }
    }

    Ok(())
}

/// Walk the CNAME forwarding chain the new record would join and reject it
/// if the chain revisits a name.
fn detect_cname_cycle(
    new_record: &Record,
    existing: &[RecordIntent],
) -> Result<(), RecordValidationError> {
    let mut forward_map: HashMap<&str, &str> = HashMap::new();
    for ri in existing {
        if let Record::Cname { name, value } = &ri.record {
            // First definition wins; duplicates in the remote set are a
            // pre-existing inconsistency, not this record's problem.
            forward_map.entry(name.as_str()).or_insert(value.as_str());
        }
    }
    let (new_name, new_value) = match new_record {
        Record::Cname { name, value } => (name.as_str(), value.as_str()),
        Record::A { .. } => return Ok(()),
    };
    forward_map.insert(new_name, new_value);

    let mut seen: HashSet<&str> = HashSet::new();
    let mut node = new_name;
    while let Some(&next) = forward_map.get(node) {
        if !seen.insert(node) {
            return Err(RecordValidationError::CnameCycle(new_name.to_string()));
        }
        node = next;
    }
    Ok(())
}
