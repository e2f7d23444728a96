//! Tally virtual machine — executes compiled scripts and emits postings.
//!
//! A machine is built around a [`Program`](tally_common::Program) and is
//! single-use:
//!
//! 1. [`Machine::set_vars`] (or [`Machine::set_vars_from_json`]) binds the
//!    script's declared parameters;
//! 2. [`Machine::resolve_resources`] streams one request per
//!    metadata-sourced resource, in resource-index order;
//! 3. [`Machine::resolve_balances`] streams one request per needed
//!    (account, asset) pair;
//! 4. [`Machine::execute`] runs the straight-line bytecode and returns an
//!    [`ExitCode`]; postings, transaction metadata, and the print channel
//!    hold the outputs.
//!
//! ```
//! use tally_vm::{ExitCode, Machine};
//!
//! let program = tally_compiler::compile("print 29 + 15 - 2").unwrap();
//! let mut machine = Machine::new(&program);
//! let printer = machine.printer().unwrap();
//!
//! let mut resources = machine.resolve_resources().unwrap();
//! assert!(resources.next_request().unwrap().is_none());
//! let mut balances = machine.resolve_balances().unwrap();
//! assert!(balances.next_request().unwrap().is_none());
//!
//! assert_eq!(machine.execute().unwrap(), ExitCode::Ok);
//! assert_eq!(printer.try_iter().count(), 1);
//! ```

pub mod error;
pub mod execute;
pub mod machine;
pub mod resolver;

pub use error::MachineError;
pub use machine::{ExitCode, Machine, Posting};
pub use resolver::{BalanceRequest, BalanceResolver, MetadataRequest, ResourceResolver};
