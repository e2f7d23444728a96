//! Machine protocol errors.
//!
//! Execution failures are reported through exit codes, never through this
//! type. `MachineError` covers misuse of the machine's lifecycle (phases
//! out of order, a resolver driven wrong) and failures while binding
//! variables or resolving resources and balances.

use tally_common::{Type, VariableError};
use thiserror::Error;

/// Errors from the machine's preparation phases.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MachineError {
    /// `set_vars` called twice, or after resolution started.
    #[error("variables have already been set")]
    VarsAlreadySet,

    /// Variable binding failed.
    #[error(transparent)]
    Variable(#[from] VariableError),

    /// `resolve_resources` called twice.
    #[error("tried to resolve resources twice")]
    ResourcesAlreadyResolved,

    /// `resolve_balances` called before resources were fully resolved.
    #[error("tried to resolve balances before resources")]
    BalancesBeforeResources,

    /// `resolve_balances` called twice.
    #[error("tried to resolve balances twice")]
    BalancesAlreadyResolved,

    /// `execute` called before resources were fully resolved.
    #[error("resources have not been resolved")]
    ResourcesUnresolved,

    /// `execute` called before balances were fully resolved.
    #[error("balances have not been resolved")]
    BalancesUnresolved,

    /// The machine is single-use.
    #[error("the machine has already executed")]
    AlreadyExecuted,

    /// `respond` called with no request outstanding.
    #[error("no request is pending")]
    NoPendingRequest,

    /// `next_request` called while a request awaits its response.
    #[error("a request is still pending")]
    RequestPending,

    /// A parameter resource with no bound variable.
    #[error("missing variable: {0}")]
    MissingVariable(String),

    /// A metadata resource names a source account at an unresolved or
    /// out-of-range address.
    #[error("tried to request metadata of an account which has not been resolved")]
    MetadataSourceUnresolved,

    /// A metadata resource's source resolved to something else.
    #[error("tried to request metadata of a non-account: {0}")]
    MetadataSourceNotAccount(Type),

    /// A metadata response of the wrong type.
    #[error("wrong type for metadata response: expected {expected}, got {got}")]
    MetadataWrongType { expected: Type, got: Type },

    /// A needed-balance entry whose account address is out of range.
    #[error("invalid program (resolve balances: invalid address of account)")]
    InvalidAccountAddress,

    /// A needed-balance entry whose account resource is not an account.
    #[error("invalid program (resolve balances: not an account)")]
    NotAnAccount,

    /// A needed-balance entry whose asset address is out of range.
    #[error("invalid program (resolve balances: invalid address of monetary)")]
    InvalidMonetaryAddress,

    /// A needed-balance entry whose asset resource carries no asset.
    #[error("invalid program (resolve balances: not an asset)")]
    NotAnAsset,
}
