//! Error types shared across the Tally core.

use crate::type_tag::Type;
use crate::value::Asset;
use thiserror::Error;

/// Errors that occur while decoding an instruction stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Opcode 0x00 is illegal and always rejected.
    #[error("illegal opcode 0x00")]
    IllegalOpcode,

    /// Byte does not name any opcode.
    #[error("invalid opcode: {0:#04x}")]
    InvalidOpcode(u8),
}

/// Errors from parsing a portion literal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PortionError {
    /// Not a `p/q` fraction or a percentage.
    #[error("invalid portion syntax: '{0}'")]
    InvalidSyntax(String),

    /// A fraction with denominator zero.
    #[error("portion denominator must not be zero")]
    ZeroDenominator,

    /// Outside the closed interval [0, 1].
    #[error("portion must be between 0% and 100% inclusive")]
    OutOfRange,
}

/// Errors from building an allotment out of portions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllotmentError {
    /// Two or more `remaining` portions were supplied.
    #[error("more than one remaining in the same allotment")]
    MultipleRemaining,

    /// The portions do not add up to exactly 1.
    #[error("allotment portions must add up to exactly 100%")]
    InvalidSum,
}

/// Errors from the funding algebra.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FundingError {
    /// A take asked for more than a finite funding holds.
    #[error("insufficient funding")]
    Insufficient,

    /// Two fundings of different assets cannot be combined.
    #[error("tried to concat different assets: {0} and {1}")]
    AssetMismatch(Asset, Asset),

    /// Totals are undefined for infinite fundings.
    #[error("tried to calculate the total of an infinite funding")]
    InfiniteTotal,

    /// Infinite fundings have no reversal.
    #[error("tried to reverse an infinite funding")]
    InfiniteReverse,

    /// Part amounts summed past the 64-bit range.
    #[error("funding amounts overflow")]
    Overflow,

    /// Assembling an empty sequence of fundings.
    #[error("tried to assemble zero fundings")]
    EmptyAssembly,
}

/// Errors from decoding a JSON value against a declared type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JsonDecodeError {
    /// The declared type expects a JSON string.
    #[error("expected a JSON string for a {0} value")]
    ExpectedString(Type),

    /// Numbers must be unsigned integers.
    #[error("expected an unsigned integer")]
    ExpectedUnsigned,

    /// Monetaries decode from `{asset, amount}` objects.
    #[error("expected an object with asset and amount fields")]
    ExpectedMonetary,

    /// Account names are restricted to `[A-Za-z0-9:_-]`.
    #[error("invalid account name: '{0}'")]
    InvalidAccountName(String),

    /// Asset codes must not be empty.
    #[error("empty asset code")]
    EmptyAsset,

    /// Portion strings must parse as exact rationals.
    #[error(transparent)]
    Portion(#[from] PortionError),
}

/// Errors from binding caller-supplied variables to a program's parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VariableError {
    /// A declared parameter was not supplied.
    #[error("missing variable: {name}")]
    Missing { name: String },

    /// A supplied name matches no declared parameter.
    #[error("extraneous variable: {name}")]
    Extraneous { name: String },

    /// A supplied value has the wrong type.
    #[error("invalid type for variable {name}: expected {expected}, got {got}")]
    WrongType {
        name: String,
        expected: Type,
        got: Type,
    },

    /// A JSON value failed to decode against the declared type.
    #[error("invalid value for variable {name}: {source}")]
    Json {
        name: String,
        #[source]
        source: JsonDecodeError,
    },
}
