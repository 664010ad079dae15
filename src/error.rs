use std::fmt::Debug;
use thiserror::Error;

/// Reasons a single unification step can fail.
///
/// These never escape [`System::enumerate_matches`](crate::System::enumerate_matches): the
/// engine catches them at each clause candidate and moves on to the next alternative.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UnificationError {
    /// Two concrete values disagree (a bound variable against a different literal, two glues
    /// bound to different values, or two unequal literals).
    #[error("Unification error: conflicting values {left} and {right}")]
    Conflict {
        /// `Debug` rendering of the left-hand value
        left: String,
        /// `Debug` rendering of the right-hand value
        right: String,
    },
    /// Two terms carry different names.
    #[error("Unification error: differing names {left} and {right}")]
    NameMismatch {
        /// `Debug` rendering of the left-hand name
        left: String,
        /// `Debug` rendering of the right-hand name
        right: String,
    },
    /// Two terms with the same name carry a different number of arguments.
    #[error("Unification error: differing arity {left} and {right}")]
    ArityMismatch {
        /// Arity of the left-hand term
        left: usize,
        /// Arity of the right-hand term
        right: usize,
    },
    /// A variable would be bound to a structure containing itself. Only raised when the
    /// occurs check is enabled.
    #[error("Unification error: {variable} occurs in {value}")]
    Occurs {
        /// `Debug` rendering of the variable
        variable: String,
        /// `Debug` rendering of the structure it occurs in
        value: String,
    },
}

impl UnificationError {
    pub(crate) fn conflict(left: &impl Debug, right: &impl Debug) -> Self {
        Self::Conflict {
            left: format!("{left:?}"),
            right: format!("{right:?}"),
        }
    }

    pub(crate) fn name_mismatch(left: &impl Debug, right: &impl Debug) -> Self {
        Self::NameMismatch {
            left: format!("{left:?}"),
            right: format!("{right:?}"),
        }
    }

    pub(crate) fn occurs(variable: &impl Debug, value: &impl Debug) -> Self {
        Self::Occurs {
            variable: format!("{variable:?}"),
            value: format!("{value:?}"),
        }
    }
}

/// Result alias for unification steps.
pub type Result<T, E = UnificationError> = std::result::Result<T, E>;
