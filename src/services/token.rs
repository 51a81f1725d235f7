//! Decoding of scanned token text.
//!
//! Two shapes are accepted: the structured JSON payload issued by
//! [`crate::services::qr_generator`], and the legacy pipe-delimited profile
//! string printed on badges issued before tokens carried only an id.

use serde_json::Value as JsonValue;

use crate::models::{student::normalize_email, StudentId};
use crate::store::StudentLookup;

/// Number of fields in a legacy token: name|email|phone|college|department
pub const LEGACY_FIELD_COUNT: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyToken {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub college: String,
    pub department: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedToken {
    Structured(StudentId),
    Legacy(LegacyToken),
    Unrecognized,
}

impl DecodedToken {
    /// The exact-match lookup that resolves this token, if any
    pub fn lookup(&self) -> Option<StudentLookup> {
        match self {
            DecodedToken::Structured(id) => Some(StudentLookup::Id(id.clone())),
            DecodedToken::Legacy(legacy) => Some(StudentLookup::Email(normalize_email(&legacy.email))),
            DecodedToken::Unrecognized => None,
        }
    }

    pub fn format_name(&self) -> &'static str {
        match self {
            DecodedToken::Structured(_) => "structured",
            DecodedToken::Legacy(_) => "legacy",
            DecodedToken::Unrecognized => "unrecognized",
        }
    }
}

pub fn decode(scanned: &str) -> DecodedToken {
    if let Some(id) = decode_structured(scanned) {
        return DecodedToken::Structured(id);
    }
    if let Some(legacy) = decode_legacy(scanned) {
        return DecodedToken::Legacy(legacy);
    }
    DecodedToken::Unrecognized
}

fn decode_structured(scanned: &str) -> Option<StudentId> {
    let value: JsonValue = serde_json::from_str(scanned.trim()).ok()?;
    let id = value.as_object()?.get("studentId")?.as_str()?;

    if id.trim().is_empty() {
        return None;
    }

    Some(StudentId::new(id))
}

fn decode_legacy(scanned: &str) -> Option<LegacyToken> {
    let fields: Vec<&str> = scanned.trim().split('|').collect();
    if fields.len() != LEGACY_FIELD_COUNT {
        return None;
    }

    let email = fields[1].trim();
    if email.is_empty() || !email.contains('@') {
        return None;
    }

    Some(LegacyToken {
        name: fields[0].trim().to_string(),
        email: email.to_string(),
        phone: fields[2].trim().to_string(),
        college: fields[3].trim().to_string(),
        department: fields[4].trim().to_string(),
    })
}
