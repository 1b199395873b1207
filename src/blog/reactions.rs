// Comment reaction rules - pure, no storage access
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::blog::domain::UserId;

/// The fixed set of emoji a comment can be reacted to with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Emoji {
    #[serde(rename = "👍")]
    ThumbsUp,
    #[serde(rename = "❤️")]
    Heart,
    #[serde(rename = "😂")]
    Laugh,
    #[serde(rename = "😮")]
    Wow,
    #[serde(rename = "😢")]
    Sad,
    #[serde(rename = "🎉")]
    Party,
}

impl Emoji {
    pub const ALL: [Emoji; 6] = [
        Emoji::ThumbsUp,
        Emoji::Heart,
        Emoji::Laugh,
        Emoji::Wow,
        Emoji::Sad,
        Emoji::Party,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Emoji::ThumbsUp => "👍",
            Emoji::Heart => "❤️",
            Emoji::Laugh => "😂",
            Emoji::Wow => "😮",
            Emoji::Sad => "😢",
            Emoji::Party => "🎉",
        }
    }
}

impl fmt::Display for Emoji {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unsupported emoji: {0}")]
pub struct UnsupportedEmoji(pub String);

impl FromStr for Emoji {
    type Err = UnsupportedEmoji;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        // Clients differ on whether the heart carries its variation selector.
        if trimmed == "❤" {
            return Ok(Emoji::Heart);
        }
        Emoji::ALL
            .into_iter()
            .find(|e| e.as_str() == trimmed)
            .ok_or_else(|| UnsupportedEmoji(trimmed.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reaction {
    pub user_id: UserId,
    pub emoji: Emoji,
}

impl Reaction {
    pub fn new(user_id: UserId, emoji: Emoji) -> Self {
        Self { user_id, emoji }
    }
}

/// What a call to [`apply_reaction`] did to the user's reaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionOutcome {
    /// The user had no reaction; `emoji` is now set.
    Added(Emoji),
    /// The user re-applied the emoji they already held; it is gone.
    Removed(Emoji),
    /// The user's previous reaction was replaced.
    Switched { from: Emoji, to: Emoji },
}

/// Apply `emoji` from `user_id` to a comment's reaction set.
///
/// Re-applying the reaction the user already holds toggles it off and
/// leaves every other entry alone. Any other emoji replaces whatever the
/// user held, so a user never has more than one reaction on a comment.
pub fn apply_reaction(
    reactions: &[Reaction],
    user_id: &UserId,
    emoji: Emoji,
) -> (Vec<Reaction>, ReactionOutcome) {
    let already_held = reactions
        .iter()
        .any(|r| &r.user_id == user_id && r.emoji == emoji);

    if already_held {
        let remaining = reactions
            .iter()
            .filter(|r| !(&r.user_id == user_id && r.emoji == emoji))
            .cloned()
            .collect();
        return (remaining, ReactionOutcome::Removed(emoji));
    }

    let previous = reactions
        .iter()
        .find(|r| &r.user_id == user_id)
        .map(|r| r.emoji);

    let mut next: Vec<Reaction> = reactions
        .iter()
        .filter(|r| &r.user_id != user_id)
        .cloned()
        .collect();
    next.push(Reaction::new(user_id.clone(), emoji));

    let outcome = match previous {
        Some(from) => ReactionOutcome::Switched { from, to: emoji },
        None => ReactionOutcome::Added(emoji),
    };
    (next, outcome)
}
