//! Compile-time errors.
//!
//! Error messages are part of the interface: callers pattern-match on
//! stable substrings (`declared`, `wrong type`, `world`, `100%`,
//! `exceeded`, ...), so the wording here changes behavior.

use tally_common::Type;
use thiserror::Error;

/// A syntax error, with the 1-based source line it was detected on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

/// Errors produced while compiling a script.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// Lexer or parser rejection, surfaced verbatim.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Reference to a variable that was never declared.
    #[error("variable ${0} has not been declared")]
    UndeclaredVariable(String),

    /// The same variable name declared twice.
    #[error("variable ${0} is already declared")]
    DuplicateVariable(String),

    /// A metadata declaration's source is not an account.
    #[error("meta() source must be an account, got {0}")]
    MetaSourceNotAccount(Type),

    /// A value of the wrong type in a send expression.
    #[error("wrong type: expected {expected}, got {got}")]
    WrongType { expected: Type, got: Type },

    /// A variable of the wrong type used where a portion is needed.
    #[error("variable ${name} used as a portion has type {got}")]
    PortionVariableType { name: String, got: Type },

    /// A destination leaf that is not an account.
    #[error("destination must be an account, got {0}")]
    DestinationNotAccount(Type),

    /// `world` used before the last position of a source composition.
    #[error("world is an unbounded source and can only come last in a composition")]
    WorldNotLast,

    /// The same account drained twice in one send.
    #[error("account {name} is emptied twice in the same send")]
    AlreadyEmptied { name: String },

    /// `[ASSET *]` with `world` as a source.
    #[error("cannot take the whole balance of world")]
    TakeAllFromWorld,

    /// `[ASSET *]` with an allotment source.
    #[error("taking all from an allotment source is not supported")]
    TakeAllFromAllotment,

    /// An allotment source nested where no exact amount exists for it.
    #[error("an allotment source must be the whole source of a send")]
    NestedAllotmentSource,

    /// Portions that provably exceed, or cannot be proven to reach, 100%.
    #[error("portions of an allotment must add up to exactly 100%")]
    PortionsNot100,

    /// Portions plus `remaining` already reach or exceed 100%.
    #[error("specific portions reach 100% and leave nothing for `remaining`")]
    PortionsOver100WithRemaining,

    /// More than one `remaining` in one allotment.
    #[error("two remaining in the same allotment")]
    MultipleRemaining,

    /// The resource table hit its 16-bit address space.
    #[error("exceeded the maximum number of unique resources")]
    TooManyResources,
}
