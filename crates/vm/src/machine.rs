//! Machine state: stack, resolved resources, balances, and outputs.
//!
//! A machine is single-use. Lifecycle: construct around a program, bind
//! variables, resolve metadata resources, resolve balances, execute, read
//! the outputs. Each preparation step may run at most once, in that order.

use std::collections::{BTreeMap, HashMap};
use std::sync::mpsc;

use crate::error::MachineError;
use crate::resolver::{BalanceResolver, ResourceResolver};
use tally_common::{Account, Address, Asset, Funding, FundingPart, Program, Value};

/// Observable exit codes.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Ok = 1,
    Fail = 2,
    /// Type mismatch, malformed program, or arithmetic overflow.
    FailInvalid = 3,
    FailInsufficientFunds = 4,
}

/// One ledger write: move `amount` of `asset` from `source` to
/// `destination`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posting {
    pub source: String,
    pub destination: String,
    pub asset: String,
    pub amount: u64,
}

/// The Tally virtual machine.
pub struct Machine<'a> {
    pub(crate) program: &'a Program,
    pub(crate) pc: usize,
    pub(crate) stack: Vec<Value>,
    pub(crate) vars: HashMap<String, Value>,
    /// Resolved resources, index-aligned with the program's table while it
    /// grows during resolution.
    pub(crate) resources: Vec<Value>,
    /// account → asset → balance, for the tracked accounts only.
    pub(crate) balances: BTreeMap<String, BTreeMap<String, u64>>,
    pub(crate) postings: Vec<Posting>,
    pub(crate) tx_meta: BTreeMap<String, Value>,
    pub(crate) print_tx: Option<mpsc::Sender<Value>>,
    print_rx: Option<mpsc::Receiver<Value>>,
    vars_set: bool,
    resolve_called: bool,
    balances_called: bool,
    pub(crate) balances_done: bool,
    pub(crate) executed: bool,
}

impl<'a> Machine<'a> {
    pub fn new(program: &'a Program) -> Machine<'a> {
        let (print_tx, print_rx) = mpsc::channel();
        Machine {
            program,
            pc: 0,
            stack: Vec::new(),
            vars: HashMap::new(),
            resources: Vec::new(),
            balances: BTreeMap::new(),
            postings: Vec::new(),
            tx_meta: BTreeMap::new(),
            print_tx: Some(print_tx),
            print_rx: Some(print_rx),
            vars_set: false,
            resolve_called: false,
            balances_called: false,
            balances_done: false,
            executed: false,
        }
    }

    /// Take the receiving end of the print channel.
    ///
    /// Values printed during execution buffer here; the sender is dropped
    /// when execution finishes, so draining the receiver after `execute`
    /// observes end-of-run. Can be taken once.
    pub fn printer(&mut self) -> Option<mpsc::Receiver<Value>> {
        self.print_rx.take()
    }

    /// Bind caller-supplied variables, validated against the program's
    /// declared parameters.
    pub fn set_vars(&mut self, vars: HashMap<String, Value>) -> Result<(), MachineError> {
        if self.vars_set || self.resolve_called {
            return Err(MachineError::VarsAlreadySet);
        }
        self.vars = self.program.parse_variables(vars)?;
        self.vars_set = true;
        Ok(())
    }

    /// Bind variables from raw JSON, decoding each against its declared
    /// type.
    pub fn set_vars_from_json(
        &mut self,
        vars: HashMap<String, serde_json::Value>,
    ) -> Result<(), MachineError> {
        if self.vars_set || self.resolve_called {
            return Err(MachineError::VarsAlreadySet);
        }
        self.vars = self.program.parse_variables_json(vars)?;
        self.vars_set = true;
        Ok(())
    }

    /// Start resource resolution.
    ///
    /// Drive the returned resolver with `next_request` / `respond` until
    /// `next_request` returns `None`. Requests come in resource-index
    /// order, one metadata fetch at a time.
    pub fn resolve_resources(&mut self) -> Result<ResourceResolver<'_, 'a>, MachineError> {
        if self.resolve_called {
            return Err(MachineError::ResourcesAlreadyResolved);
        }
        self.resolve_called = true;
        Ok(ResourceResolver::new(self))
    }

    /// Start balance resolution.
    ///
    /// One request per needed (account, asset) pair, in ascending resource
    /// address order, skipping `world`. Drive until `next_request` returns
    /// `None`.
    pub fn resolve_balances(&mut self) -> Result<BalanceResolver<'_, 'a>, MachineError> {
        if self.resources.len() != self.program.resources.len() {
            return Err(MachineError::BalancesBeforeResources);
        }
        if self.balances_called {
            return Err(MachineError::BalancesAlreadyResolved);
        }
        self.balances_called = true;
        BalanceResolver::new(self)
    }

    /// The postings emitted so far, in emission order.
    pub fn postings(&self) -> &[Posting] {
        &self.postings
    }

    /// Transaction metadata, last writer wins per key.
    pub fn tx_meta(&self) -> &BTreeMap<String, Value> {
        &self.tx_meta
    }

    /// The tracked balances as they stand.
    pub fn balances(&self) -> &BTreeMap<String, BTreeMap<String, u64>> {
        &self.balances
    }

    pub(crate) fn get_resource(&self, addr: Address) -> Option<&Value> {
        self.resources.get(addr as usize)
    }

    /// Withdraw an account's entire balance in one asset.
    ///
    /// `world` yields an infinite funding. A missing balance entry means
    /// the program and its resolved balances disagree, which is invalid.
    pub(crate) fn withdraw_all(&mut self, account: Account, asset: Asset) -> Option<Funding> {
        if account.is_world() {
            return Some(Funding {
                asset,
                parts: Vec::new(),
                infinite: true,
            });
        }
        let balance = self.balances.get_mut(&account.0)?.get_mut(&asset.0)?;
        let amount = *balance;
        *balance = 0;
        Some(Funding {
            asset,
            parts: vec![FundingPart { account, amount }],
            infinite: false,
        })
    }

    /// Credit a funding to an account's balance. Credits to `world` and to
    /// untracked accounts are discarded; postings carry the information
    /// either way.
    pub(crate) fn credit(&mut self, account: &Account, funding: &Funding) -> Option<()> {
        if account.is_world() {
            return Some(());
        }
        if let Some(balance) = self
            .balances
            .get_mut(&account.0)
            .and_then(|assets| assets.get_mut(&funding.asset.0))
        {
            for part in &funding.parts {
                *balance = balance.checked_add(part.amount)?;
            }
        }
        Some(())
    }

    /// Return a funding's parts to the accounts they came from.
    pub(crate) fn repay(&mut self, funding: Funding) -> Option<()> {
        for part in funding.parts {
            if part.account.is_world() {
                continue;
            }
            if let Some(balance) = self
                .balances
                .get_mut(&part.account.0)
                .and_then(|assets| assets.get_mut(&funding.asset.0))
            {
                *balance = balance.checked_add(part.amount)?;
            }
        }
        Some(())
    }
}
