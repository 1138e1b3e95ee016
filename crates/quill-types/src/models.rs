use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Returned when a stored or submitted string is not one of an enum's values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! string_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

string_enum!(Role, "role", { User => "user", Admin => "admin" });

impl Role {
    /// The other role; used by the admin role toggle.
    pub fn flipped(self) -> Self {
        match self {
            Self::User => Self::Admin,
            Self::Admin => Self::User,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    #[default]
    Draft,
    Published,
}

string_enum!(PostStatus, "post status", { Draft => "draft", Published => "published" });

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

string_enum!(CommentStatus, "comment status", {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
});

impl CommentStatus {
    /// Moderators may only move a comment to a final state.
    pub fn is_moderation_outcome(self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_values() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("published".parse::<PostStatus>().unwrap(), PostStatus::Published);
        assert_eq!("rejected".parse::<CommentStatus>().unwrap(), CommentStatus::Rejected);
    }

    #[test]
    fn rejects_unknown_and_differently_cased_values() {
        let err = "archived".parse::<PostStatus>().unwrap_err();
        assert_eq!(err.kind, "post status");
        assert_eq!(err.to_string(), "invalid post status 'archived'");
        assert!("Draft".parse::<PostStatus>().is_err());
        assert!("owner".parse::<Role>().is_err());
    }

    #[test]
    fn role_flip_is_an_involution() {
        assert_eq!(Role::User.flipped(), Role::Admin);
        assert_eq!(Role::User.flipped().flipped(), Role::User);
    }

    #[test]
    fn only_final_comment_states_are_moderation_outcomes() {
        assert!(!CommentStatus::Pending.is_moderation_outcome());
        assert!(CommentStatus::Approved.is_moderation_outcome());
        assert!(CommentStatus::Rejected.is_moderation_outcome());
    }

    #[test]
    fn serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
        assert_eq!(serde_json::to_string(&PostStatus::Draft).unwrap(), "\"draft\"");
    }
}
