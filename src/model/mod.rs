//! Domain records stored in the document store and the request payloads that
//! create or change them.

use thiserror::Error;

/// Declares a closed set of wire tags, each with a human readable label.
///
/// Generates `ALL`, `as_str`, `label`, case-insensitive `FromStr` and `Display`.
macro_rules! tag_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $($variant:ident => ($tag:literal, $label:literal)),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub enum $name {
            $(#[serde(rename = $tag)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $tag),+
                }
            }

            pub fn label(self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::model::UnknownTag;

            fn from_str(raw: &str) -> Result<Self, Self::Err> {
                let raw = raw.trim();
                $name::ALL
                    .iter()
                    .copied()
                    .find(|candidate| candidate.as_str().eq_ignore_ascii_case(raw))
                    .ok_or_else(|| $crate::model::UnknownTag {
                        kind: stringify!($name),
                        value: raw.to_string(),
                    })
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

pub mod campaign;
pub mod event;
pub mod ids;
pub mod lead;
pub mod time;
pub mod user;

pub use campaign::{Campaign, CampaignDraft, CampaignPatch};
pub use event::{Event, EventDraft, EventPatch};
pub use ids::{CampaignId, EventId, LeadId, UserId};
pub use lead::{Lead, LeadDraft, LeadPatch, LeadSource, LeadStatus, Priority};
pub use user::{NewUser, Role, User, UserProfile};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown {kind} value '{value}'")]
pub struct UnknownTag {
    pub kind: &'static str,
    pub value: String,
}

/// Validation failure raised while turning a payload into a record.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

pub(crate) fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
}
