use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// The mutation a change envelope carries.
///
/// Serialized as the upper-case name (`"CREATE"`, `"UPDATE"`, `"DELETE"`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventKind {
    /// A record appeared upstream.
    Create,
    /// A record changed upstream.
    Update,
    /// A record was removed upstream.
    Delete,
}

impl EventKind {
    /// Every known kind, in wire order.
    pub const ALL: [EventKind; 3] = [Self::Create, Self::Update, Self::Delete];

    /// The wire name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| TypeError::UnknownKind(s.to_string()))
    }
}
