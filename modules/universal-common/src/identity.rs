//! Stable identities for actions, used to recognise repeats across render passes.

use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::action::Action;
use crate::error::ActionError;

/// Identity of an action for cycle detection.
///
/// Records compare by their `type` value only; thunks by a fingerprint of
/// their source text. Two LOAD_USER records with different ids are the
/// same identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ActionIdentity {
    Type(String),
    Fingerprint(u32),
}

impl fmt::Display for ActionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionIdentity::Type(kind) => f.write_str(kind),
            ActionIdentity::Fingerprint(hash) => write!(f, "thunk:{hash}"),
        }
    }
}

/// Identify an action. Records without a `type` field are malformed.
pub fn identify(action: &Action) -> Result<ActionIdentity, ActionError> {
    match action {
        Action::Thunk(thunk) => Ok(ActionIdentity::Fingerprint(fingerprint(thunk.source()))),
        Action::Record(record) => match record.get("type") {
            Some(Value::String(kind)) => Ok(ActionIdentity::Type(kind.clone())),
            // Non-string discriminators compare by their JSON text.
            Some(other) => Ok(ActionIdentity::Type(other.to_string())),
            None => Err(ActionError::MalformedAction(record.to_string())),
        },
    }
}

/// 32-bit rolling hash (`h = h * 31 + unit`, wrapping) over the UTF-16 code
/// units of `source`, returned as its absolute value.
pub fn fingerprint(source: &str) -> u32 {
    source
        .encode_utf16()
        .fold(0i32, |hash, unit| {
            hash.wrapping_mul(31).wrapping_add(i32::from(unit))
        })
        .unsigned_abs()
}
