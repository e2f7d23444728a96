//! Pull-based resolution protocols for metadata resources and balances.
//!
//! Both resolvers follow the same rendezvous: `next_request` hands out one
//! request, the caller answers it with `respond`, and the cycle repeats
//! until `next_request` returns `None`. Requests are strictly ordered and
//! each phase runs at most once per machine.

use crate::error::MachineError;
use crate::machine::Machine;
use tally_common::{Resource, Type, Value};

/// A metadata fetch the caller must answer with a [`Value`] of the
/// declared type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataRequest {
    pub account: String,
    pub key: String,
    /// The declared type the response must have.
    pub typ: Type,
}

/// Resolves the resource table in index order.
///
/// Constants and parameters resolve internally; each metadata resource
/// surfaces as one request.
pub struct ResourceResolver<'m, 'a> {
    machine: &'m mut Machine<'a>,
    pending: Option<Type>,
}

impl<'m, 'a> ResourceResolver<'m, 'a> {
    pub(crate) fn new(machine: &'m mut Machine<'a>) -> ResourceResolver<'m, 'a> {
        ResourceResolver {
            machine,
            pending: None,
        }
    }

    /// Advance resolution to the next metadata fetch, or to completion.
    pub fn next_request(&mut self) -> Result<Option<MetadataRequest>, MachineError> {
        if self.pending.is_some() {
            return Err(MachineError::RequestPending);
        }
        while self.machine.resources.len() < self.machine.program.resources.len() {
            let index = self.machine.resources.len();
            match &self.machine.program.resources[index] {
                Resource::Constant(value) => self.machine.resources.push(value.clone()),
                Resource::Parameter { name, .. } => {
                    let value = self
                        .machine
                        .vars
                        .get(name)
                        .cloned()
                        .ok_or_else(|| MachineError::MissingVariable(name.clone()))?;
                    self.machine.resources.push(value);
                }
                Resource::Metadata {
                    typ,
                    source_account,
                    key,
                } => {
                    let source = self
                        .machine
                        .get_resource(*source_account)
                        .ok_or(MachineError::MetadataSourceUnresolved)?;
                    let Value::Account(account) = source else {
                        return Err(MachineError::MetadataSourceNotAccount(source.type_tag()));
                    };
                    let request = MetadataRequest {
                        account: account.0.clone(),
                        key: key.clone(),
                        typ: *typ,
                    };
                    tracing::debug!(account = %request.account, key = %request.key, "metadata request");
                    self.pending = Some(*typ);
                    return Ok(Some(request));
                }
            }
        }
        Ok(None)
    }

    /// Answer the outstanding metadata request.
    pub fn respond(&mut self, value: Value) -> Result<(), MachineError> {
        let expected = self.pending.take().ok_or(MachineError::NoPendingRequest)?;
        let got = value.type_tag();
        if got != expected {
            return Err(MachineError::MetadataWrongType { expected, got });
        }
        self.machine.resources.push(value);
        Ok(())
    }
}

/// A balance fetch the caller must answer with the account's current
/// balance in the asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceRequest {
    pub account: String,
    pub asset: String,
}

/// Resolves the balances the program declared it will need.
pub struct BalanceResolver<'m, 'a> {
    machine: &'m mut Machine<'a>,
    plan: Vec<(String, String)>,
    cursor: usize,
    pending: Option<(String, String)>,
}

impl<'m, 'a> BalanceResolver<'m, 'a> {
    pub(crate) fn new(machine: &'m mut Machine<'a>) -> Result<BalanceResolver<'m, 'a>, MachineError> {
        let mut plan = Vec::new();
        for (account_addr, asset_addrs) in &machine.program.needed_balances {
            let account = machine
                .resources
                .get(*account_addr as usize)
                .ok_or(MachineError::InvalidAccountAddress)?;
            let Value::Account(account) = account else {
                return Err(MachineError::NotAnAccount);
            };
            if account.is_world() {
                continue;
            }
            let account_name = account.0.clone();
            for asset_addr in asset_addrs {
                let resource = machine
                    .resources
                    .get(*asset_addr as usize)
                    .ok_or(MachineError::InvalidMonetaryAddress)?;
                let asset = resource.asset().ok_or(MachineError::NotAnAsset)?;
                plan.push((account_name.clone(), asset.0.clone()));
            }
        }

        // Every tracked account gets its entry up front, so credits to it
        // are recorded even if no asset pair survives the plan.
        for (account, _) in &plan {
            machine.balances.entry(account.clone()).or_default();
        }

        Ok(BalanceResolver {
            machine,
            plan,
            cursor: 0,
            pending: None,
        })
    }

    /// Advance to the next balance fetch, or to completion.
    pub fn next_request(&mut self) -> Result<Option<BalanceRequest>, MachineError> {
        if self.pending.is_some() {
            return Err(MachineError::RequestPending);
        }
        match self.plan.get(self.cursor) {
            Some((account, asset)) => {
                self.cursor += 1;
                self.pending = Some((account.clone(), asset.clone()));
                tracing::debug!(account = %account, asset = %asset, "balance request");
                Ok(Some(BalanceRequest {
                    account: account.clone(),
                    asset: asset.clone(),
                }))
            }
            None => {
                self.machine.balances_done = true;
                Ok(None)
            }
        }
    }

    /// Answer the outstanding balance request.
    pub fn respond(&mut self, balance: u64) -> Result<(), MachineError> {
        let (account, asset) = self.pending.take().ok_or(MachineError::NoPendingRequest)?;
        self.machine
            .balances
            .entry(account)
            .or_default()
            .insert(asset, balance);
        Ok(())
    }
}
