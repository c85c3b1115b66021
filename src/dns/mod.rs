pub mod clouddns;
pub mod ipset;
pub mod ptr;

use serde::{
    Deserialize,
    Serialize,
};
use std::fmt;

/// TTL applied to every record we publish. Record TTL policy beyond this
/// fixed value is out of scope.
pub const RECORD_TTL: i64 = 60;

/// The record types this service manages. Anything else a zone may contain
/// (SOA, NS, ...) shows up in list responses as [`RecordType::Other`] and is
/// left untouched.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordType {
    A,
    #[serde(rename = "PTR")]
    Ptr,
    #[serde(other)]
    Other,
}

impl RecordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Ptr => "PTR",
            RecordType::Other => "OTHER",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A whole record set as the provider stores it: one name/type pair and its
/// value list. Identity within a zone is name + type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordSet {
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: RecordType,
    pub ttl: i64,
    #[serde(default)]
    pub rrdatas: Vec<String>,
}

impl RecordSet {
    /// Forward record: FQDN -> IP addresses.
    pub fn a(fqdn: impl ToString, ips: Vec<String>) -> Self {
        RecordSet {
            name: fqdn.to_string(),
            record_type: RecordType::A,
            ttl: RECORD_TTL,
            rrdatas: ips,
        }
    }

    /// Reverse record: PTR name -> FQDN. Its value must always equal the FQDN
    /// of the forward record it is paired with.
    pub fn ptr(ptr_name: impl ToString, fqdn: impl ToString) -> Self {
        RecordSet {
            name: ptr_name.to_string(),
            record_type: RecordType::Ptr,
            ttl: RECORD_TTL,
            rrdatas: vec![fqdn.to_string()],
        }
    }
}

/// One atomic provider operation: additions and deletions of whole record
/// sets within a zone. The provider cannot patch a value list through this,
/// only add or remove complete sets.
#[derive(Debug, Default, Serialize)]
pub struct Change {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub additions: Vec<RecordSet>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub deletions: Vec<RecordSet>,
}

impl Change {
    pub fn addition(record: RecordSet) -> Self {
        Change {
            additions: vec![record],
            ..Default::default()
        }
    }

    pub fn deletion(record: RecordSet) -> Self {
        Change {
            deletions: vec![record],
            ..Default::default()
        }
    }
}
