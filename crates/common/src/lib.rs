//! Tally common types: the value model, the funding algebra, and the
//! compiled program format.
//!
//! This crate provides the foundational data structures shared by the
//! compiler and the machine:
//!
//! - [`Value`] — tagged runtime values ([`Account`], [`Asset`], numbers,
//!   strings, [`Monetary`], [`Portion`], [`Allotment`], [`Funding`])
//! - [`Funding`] — the linear per-account decomposition of an asset amount,
//!   with its take / take-max / concat / reverse / assemble operations
//! - [`Opcode`] — the straight-line instruction set
//! - [`Program`] — instruction bytes, resource table, needed balances, and
//!   declared parameters

pub mod allotment;
pub mod error;
pub mod funding;
pub mod opcode;
pub mod portion;
pub mod program;
pub mod type_tag;
pub mod value;

// Re-export commonly used types at the crate root.
pub use allotment::Allotment;
pub use error::{
    AllotmentError, DecodeError, FundingError, JsonDecodeError, PortionError, VariableError,
};
pub use funding::{Funding, FundingPart};
pub use opcode::Opcode;
pub use portion::Portion;
pub use program::{Address, Program, Resource, VarDecl, MAX_RESOURCES};
pub use type_tag::Type;
pub use value::{Account, Asset, Monetary, Value, WORLD};
