//! Document-store records consumed by the relay
//!
//! The relay does not own these schemas. Decoding is lenient: a field with
//! an unexpected JSON type is treated as absent instead of failing the record.

use serde_json::{Map, Value};

/// Field set of a stored document
pub type Fields = Map<String, Value>;

/// Status value that marks an emergency as live
pub const ACTIVE_STATUS: &str = "active";

/// Display name used when the triggering user has none
pub const FALLBACK_USER_NAME: &str = "Un usuario";

/// An emergency record as created by the client app
#[derive(Debug, Clone, PartialEq)]
pub struct EmergencyEvent {
    pub user_id: Option<String>,
    pub status: Option<String>,
    /// Raw coordinate values; see [`coordinate_string`]
    pub lat: Value,
    pub lng: Value,
    pub notified_contact_ids: Vec<String>,
}

impl EmergencyEvent {
    pub fn from_fields(fields: &Fields) -> Self {
        let notified_contact_ids = match fields.get("notifiedContactIds") {
            Some(Value::Array(ids)) => ids
                .iter()
                .filter_map(|id| id.as_str().map(str::to_owned))
                .collect(),
            _ => Vec::new(),
        };

        Self {
            user_id: string_field(fields, "userId"),
            status: string_field(fields, "status"),
            lat: fields.get("lat").cloned().unwrap_or(Value::Null),
            lng: fields.get("lng").cloned().unwrap_or(Value::Null),
            notified_contact_ids,
        }
    }

    /// Only an exact `"active"` status triggers notifications
    pub fn is_active(&self) -> bool {
        self.status.as_deref() == Some(ACTIVE_STATUS)
    }
}

/// A user document from the `users` collection
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserProfile {
    pub name: Option<String>,
    pub fcm_token: Option<String>,
}

impl UserProfile {
    pub fn from_fields(fields: &Fields) -> Self {
        Self {
            name: string_field(fields, "name"),
            fcm_token: string_field(fields, "fcmToken"),
        }
    }

    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => FALLBACK_USER_NAME,
        }
    }

    /// Push token, if the user has registered a non-empty one
    pub fn delivery_token(&self) -> Option<&str> {
        self.fcm_token.as_deref().filter(|token| !token.is_empty())
    }
}

fn string_field(fields: &Fields, key: &str) -> Option<String> {
    fields.get(key).and_then(Value::as_str).map(str::to_owned)
}

/// Render a coordinate for the string-only notification data block.
///
/// Falsy values (absent, null, false, zero, NaN, empty string) become `"0"`.
/// Integral numbers print without a fractional part. Numbers always print in
/// plain decimal notation, so magnitudes below `1e-6` or from `1e21` upward
/// do not switch to exponent form the way a JavaScript string conversion
/// would. Real coordinates never reach that range.
pub fn coordinate_string(value: &Value) -> String {
    match value {
        Value::Null | Value::Bool(false) => "0".into(),
        Value::Bool(true) => "true".into(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return i.to_string();
            }
            if let Some(u) = n.as_u64() {
                return u.to_string();
            }
            match n.as_f64() {
                Some(f) if f == 0.0 || f.is_nan() => "0".into(),
                Some(f) if f.fract() == 0.0 && f.abs() < 1e21 => format!("{:.0}", f),
                Some(f) => f.to_string(),
                None => n.to_string(),
            }
        }
        Value::String(s) if s.is_empty() => "0".into(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
