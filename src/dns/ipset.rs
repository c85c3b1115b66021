//! Pure helpers computing the next value list for an existing record.
//!
//! The provider's change API only adds or removes whole record sets, so when
//! a record already exists the new value list has to be computed here and
//! applied with a PATCH.

use std::collections::HashSet;

/// Value list for a create against an existing record.
///
/// Any overlap between `previous` and `incoming` means the record is already
/// consistent and `previous` comes back unchanged; otherwise the result is
/// `previous` followed by `incoming` as-is.
pub fn merge_for_create(previous: &[String], incoming: &[String]) -> Vec<String> {
    if incoming.iter().any(|ip| previous.contains(ip)) {
        return previous.to_vec();
    }
    previous.iter().chain(incoming).cloned().collect()
}

/// Value list for a partial delete: every address in `previous` not named in
/// `to_remove`, keeping the order of `previous`.
pub fn subtract_for_delete(previous: &[String], to_remove: &[String]) -> Vec<String> {
    let remove: HashSet<&str> = to_remove.iter().map(String::as_str).collect();
    previous
        .iter()
        .filter(|ip| !remove.contains(ip.as_str()))
        .cloned()
        .collect()
}

/// Order-insensitive equality, used to decide between deleting a record whole
/// and patching it down.
pub fn sorted_eq(a: &[String], b: &[String]) -> bool {
    let mut a = a.to_vec();
    let mut b = b.to_vec();
    a.sort();
    b.sort();
    a == b
}
