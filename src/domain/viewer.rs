//! Viewer identity and badges attached to outgoing chat messages.

use serde::{Deserialize, Serialize};

/// Wire value of the guest sentinel.
pub const GUEST: &str = "guest";

/// Resolved identity of a signed-in viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewerIdentity {
    /// Identity-provider user id.
    pub id: String,
    /// Display name; absent for accounts registered without one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// Who sent a chat message.
///
/// Serialized as the JSON string `"guest"` or as the identity object
/// `{"id": .., "username": ..}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ViewerRepr", into = "ViewerRepr")]
pub enum Viewer {
    /// Anonymous read-only participant.
    Guest,
    /// Viewer whose session token was accepted by the identity provider.
    Identified(ViewerIdentity),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ViewerRepr {
    Sentinel(String),
    Identity(ViewerIdentity),
}

impl TryFrom<ViewerRepr> for Viewer {
    type Error = String;

    fn try_from(repr: ViewerRepr) -> Result<Self, Self::Error> {
        match repr {
            ViewerRepr::Sentinel(s) if s == GUEST => Ok(Self::Guest),
            ViewerRepr::Sentinel(other) => Err(format!("unknown viewer sentinel: {other}")),
            ViewerRepr::Identity(identity) => Ok(Self::Identified(identity)),
        }
    }
}

impl From<Viewer> for ViewerRepr {
    fn from(viewer: Viewer) -> Self {
        match viewer {
            Viewer::Guest => Self::Sentinel(GUEST.to_string()),
            Viewer::Identified(identity) => Self::Identity(identity),
        }
    }
}

impl Viewer {
    /// Returns `true` for the guest sentinel.
    #[must_use]
    pub const fn is_guest(&self) -> bool {
        matches!(self, Self::Guest)
    }

    /// Serialized form stored as a presence-set member.
    ///
    /// The same representation is used for insertion and removal.
    ///
    /// # Errors
    ///
    /// Returns a [`serde_json::Error`] if serialization fails.
    pub fn presence_member(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Cosmetic marker derived from group membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Badge {
    /// Badge label.
    pub name: String,
    /// Icon identifier understood by the client.
    pub icon: String,
    /// Hex colour without the leading `#`.
    pub color: String,
}

impl Badge {
    /// Returns the badge granted by membership in the named group, if any.
    #[must_use]
    pub fn for_group(group_name: &str) -> Option<Self> {
        match group_name {
            "Founder" => Some(Self {
                name: "Founder".to_string(),
                icon: "code".to_string(),
                color: "D66853".to_string(),
            }),
            _ => None,
        }
    }
}
