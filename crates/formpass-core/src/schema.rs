// Copyright (C) 2025 The formpass authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Form schema and submitted passage types.
//!
//! A [`Form`] is the declared schema the core observes read-only. A
//! [`FormPassage`] is what a caller submits; it lives only for the duration
//! of one request before it is rejected or persisted.

use serde::{Deserialize, Serialize};

/// Wire value of `user_id` meaning "no caller identity".
pub const ANONYMOUS_USER_ID: i64 = 0;

/// Declared schema of a form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Form {
    /// Form identifier.
    pub id: i64,
    /// Display title (opaque to the core).
    pub title: String,
    /// When set, submissions need no identity and are not attributed to a user.
    pub anonymous: bool,
    /// Per-user submission cap.
    pub passage_limit: PassageLimit,
    /// Questions in declared order.
    pub questions: Vec<Question>,
}

/// A question of a form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// Question identifier, unique within the form.
    pub id: i64,
    /// Whether at least one answer must reference this question.
    pub required: bool,
    /// Presentation only; ignored by validation.
    pub shuffle: bool,
    /// Question type with its declared options.
    pub kind: QuestionKind,
}

/// Question type. Tags `1`, `2`, `3` are the stored and wire representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestionKind {
    /// Pick exactly one declared option.
    SingleChoice {
        /// Declared options.
        options: Vec<AnswerOption>,
    },
    /// Pick any number of distinct declared options.
    MultipleChoice {
        /// Declared options.
        options: Vec<AnswerOption>,
    },
    /// Free-form text; may be answered several times.
    Text,
}

impl QuestionKind {
    /// Tag for `single_choice`.
    pub const SINGLE_CHOICE_TAG: i16 = 1;
    /// Tag for `multiple_choice`.
    pub const MULTIPLE_CHOICE_TAG: i16 = 2;
    /// Tag for `text`.
    pub const TEXT_TAG: i16 = 3;

    /// Build a kind from its stored tag. Options are ignored for `text`.
    pub fn from_tag(tag: i16, options: Vec<AnswerOption>) -> Option<Self> {
        match tag {
            Self::SINGLE_CHOICE_TAG => Some(Self::SingleChoice { options }),
            Self::MULTIPLE_CHOICE_TAG => Some(Self::MultipleChoice { options }),
            Self::TEXT_TAG => Some(Self::Text),
            _ => None,
        }
    }

    /// Stored tag of this kind.
    pub fn tag(&self) -> i16 {
        match self {
            Self::SingleChoice { .. } => Self::SINGLE_CHOICE_TAG,
            Self::MultipleChoice { .. } => Self::MULTIPLE_CHOICE_TAG,
            Self::Text => Self::TEXT_TAG,
        }
    }

    /// Human-readable name, as used in schema JSON.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SingleChoice { .. } => "single_choice",
            Self::MultipleChoice { .. } => "multiple_choice",
            Self::Text => "text",
        }
    }

    /// Declared options; empty for `text`.
    pub fn options(&self) -> &[AnswerOption] {
        match self {
            Self::SingleChoice { options } | Self::MultipleChoice { options } => options,
            Self::Text => &[],
        }
    }
}

/// A declared answer option of a choice question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerOption {
    /// Option identifier, unique within its question.
    pub id: i64,
    /// Label a submitted answer must match exactly.
    pub text: String,
}

impl AnswerOption {
    /// Create an option.
    pub fn new(id: i64, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
        }
    }
}

/// Per-user submission cap of a form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PassageLimit {
    /// No cap.
    Unlimited,
    /// At most this many passages per user. `AtMost(0)` allows none.
    AtMost(u32),
}

impl PassageLimit {
    /// Interpret the stored `passage_max` column. Negative values are unlimited.
    pub fn from_raw(raw: i64) -> Self {
        if raw < 0 {
            Self::Unlimited
        } else {
            Self::AtMost(u32::try_from(raw).unwrap_or(u32::MAX))
        }
    }

    /// Stored representation; `-1` for unlimited.
    pub fn to_raw(self) -> i64 {
        match self {
            Self::Unlimited => -1,
            Self::AtMost(n) => i64::from(n),
        }
    }

    /// Whether a user with `existing` passages has used up the cap.
    pub fn is_reached(self, existing: i64) -> bool {
        match self {
            Self::Unlimited => false,
            Self::AtMost(n) => existing >= i64::from(n),
        }
    }
}

/// One submitted answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassageAnswer {
    /// Question the answer refers to.
    pub question_id: i64,
    /// Free text, or the exact label of a declared option.
    pub text: String,
}

impl PassageAnswer {
    /// Create an answer.
    pub fn new(question_id: i64, text: impl Into<String>) -> Self {
        Self {
            question_id,
            text: text.into(),
        }
    }
}

/// A submitted filling of a form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormPassage {
    /// Form the passage is for.
    pub form_id: i64,
    /// Submitted answers, in submission order.
    pub answers: Vec<PassageAnswer>,
}

/// Who a persisted passage is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Submitter {
    /// Not attributed to any user (stored as `NULL`).
    Anonymous,
    /// Attributed to this user.
    User(i64),
}

impl Submitter {
    /// Interpret a wire `user_id`; non-positive values carry no identity.
    pub fn from_wire(user_id: i64) -> Option<i64> {
        (user_id > ANONYMOUS_USER_ID).then_some(user_id)
    }

    /// Value for the nullable `user_id` column.
    pub fn user_id(self) -> Option<i64> {
        match self {
            Self::Anonymous => None,
            Self::User(id) => Some(id),
        }
    }
}
