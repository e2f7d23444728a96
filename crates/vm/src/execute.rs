//! The fetch-decode-execute loop.
//!
//! Control flow is strictly linear: the program counter only moves
//! forward, by one opcode byte plus that opcode's inline operands. Any
//! type mismatch, malformed instruction, or arithmetic overflow halts with
//! the invalid exit code; a termination that leaves values on the stack
//! degrades to it as well.

use crate::error::MachineError;
use crate::machine::{ExitCode, Machine, Posting};
use tally_common::{Account, Allotment, Asset, Funding, FundingError, Monetary, Opcode, Value};

/// Why execution stopped early.
enum Abort {
    Fail,
    Invalid,
    InsufficientFunds,
}

impl From<Abort> for ExitCode {
    fn from(abort: Abort) -> ExitCode {
        match abort {
            Abort::Fail => ExitCode::Fail,
            Abort::Invalid => ExitCode::FailInvalid,
            Abort::InsufficientFunds => ExitCode::FailInsufficientFunds,
        }
    }
}

impl Machine<'_> {
    /// Run the program to completion and return its exit code.
    ///
    /// Requires variables, resources, and balances to be fully resolved.
    /// Closing the print channel is the last thing that happens, so a
    /// drained printer receiver marks end-of-run.
    pub fn execute(&mut self) -> Result<ExitCode, MachineError> {
        if self.executed {
            return Err(MachineError::AlreadyExecuted);
        }
        if self.resources.len() != self.program.resources.len() {
            return Err(MachineError::ResourcesUnresolved);
        }
        if !self.balances_done {
            return Err(MachineError::BalancesUnresolved);
        }
        self.executed = true;

        let code = loop {
            if self.pc >= self.program.instructions.len() {
                break ExitCode::Ok;
            }
            match self.step() {
                Ok(()) => {}
                Err(abort) => break ExitCode::from(abort),
            }
        };

        // Close the print channel.
        self.print_tx = None;

        if !self.stack.is_empty() {
            return Ok(ExitCode::FailInvalid);
        }
        Ok(code)
    }

    fn step(&mut self) -> Result<(), Abort> {
        let byte = self.program.instructions[self.pc];
        let opcode = Opcode::try_from(byte).map_err(|_| Abort::Invalid)?;
        tracing::trace!(pc = self.pc, opcode = opcode.mnemonic(), depth = self.stack.len(), "tick");
        self.pc += 1;

        match opcode {
            Opcode::IPush => {
                let n = u64::from_le_bytes(self.operand::<8>()?);
                self.stack.push(Value::Number(n));
            }
            Opcode::APush => {
                let addr = u16::from_le_bytes(self.operand::<2>()?);
                let value = self.get_resource(addr).cloned().ok_or(Abort::Invalid)?;
                self.stack.push(value);
            }
            Opcode::Bump => {
                let n = self.pop_index()?;
                if n >= self.stack.len() {
                    return Err(Abort::Invalid);
                }
                let index = self.stack.len() - 1 - n;
                let value = self.stack.remove(index);
                self.stack.push(value);
            }
            Opcode::IAdd => {
                let b = self.pop_number()?;
                let a = self.pop_number()?;
                let sum = a.checked_add(b).ok_or(Abort::Invalid)?;
                self.stack.push(Value::Number(sum));
            }
            Opcode::ISub => {
                let b = self.pop_number()?;
                let a = self.pop_number()?;
                let difference = a.checked_sub(b).ok_or(Abort::Invalid)?;
                self.stack.push(Value::Number(difference));
            }
            Opcode::Print => {
                let value = self.pop()?;
                if let Some(tx) = &self.print_tx {
                    let _ = tx.send(value);
                }
            }
            Opcode::Fail => return Err(Abort::Fail),
            Opcode::Asset => {
                let asset = match self.pop()? {
                    Value::Asset(asset) => asset,
                    Value::Monetary(monetary) => monetary.asset,
                    Value::Funding(funding) => funding.asset,
                    _ => return Err(Abort::Invalid),
                };
                self.stack.push(Value::Asset(asset));
            }
            Opcode::MonetaryNew => {
                let amount = self.pop_number()?;
                let asset = self.pop_asset()?;
                self.stack.push(Value::Monetary(Monetary { asset, amount }));
            }
            Opcode::MonetaryAdd => {
                let b = self.pop_monetary()?;
                let a = self.pop_monetary()?;
                if a.asset != b.asset {
                    return Err(Abort::Invalid);
                }
                let amount = a.amount.checked_add(b.amount).ok_or(Abort::Invalid)?;
                self.stack.push(Value::Monetary(Monetary {
                    asset: a.asset,
                    amount,
                }));
            }
            Opcode::MakeAllotment => {
                let n = self.pop_index()?;
                let mut portions = Vec::with_capacity(n);
                for _ in 0..n {
                    portions.push(self.pop_portion()?);
                }
                let allotment = Allotment::new(portions).map_err(|_| Abort::Invalid)?;
                self.stack.push(Value::Allotment(allotment));
            }
            Opcode::Alloc => {
                let allotment = self.pop_allotment()?;
                let monetary = self.pop_monetary()?;
                let parts = allotment.allocate(monetary.amount);
                for amount in parts.into_iter().rev() {
                    self.stack.push(Value::Monetary(Monetary {
                        asset: monetary.asset.clone(),
                        amount,
                    }));
                }
            }
            Opcode::TakeAll => {
                let asset = self.pop_asset()?;
                let account = self.pop_account()?;
                let funding = self.withdraw_all(account, asset).ok_or(Abort::Invalid)?;
                self.stack.push(Value::Funding(funding));
            }
            Opcode::Take => {
                let monetary = self.pop_monetary()?;
                let funding = self.pop_funding()?;
                if funding.asset != monetary.asset {
                    return Err(Abort::Invalid);
                }
                let (taken, remainder) = funding.take(monetary.amount).map_err(|e| match e {
                    FundingError::Insufficient => Abort::InsufficientFunds,
                    _ => Abort::Invalid,
                })?;
                self.stack.push(Value::Funding(remainder));
                self.stack.push(Value::Funding(taken));
            }
            Opcode::TakeMax => {
                let monetary = self.pop_monetary()?;
                let funding = self.pop_funding()?;
                if funding.asset != monetary.asset {
                    return Err(Abort::Invalid);
                }
                let (taken, remainder) = funding.take_max(monetary.amount);
                self.stack.push(Value::Funding(remainder));
                self.stack.push(Value::Funding(taken));
            }
            Opcode::FundingSum => {
                let funding = self.pop_funding()?;
                let total = funding.total().map_err(|_| Abort::Invalid)?;
                let asset = funding.asset.clone();
                self.stack.push(Value::Funding(funding));
                self.stack.push(Value::Monetary(Monetary {
                    asset,
                    amount: total,
                }));
            }
            Opcode::FundingReverse => {
                let funding = self.pop_funding()?;
                let reversed = funding.reverse().map_err(|_| Abort::Invalid)?;
                self.stack.push(Value::Funding(reversed));
            }
            Opcode::FundingAssemble => {
                let n = self.pop_index()?;
                if n == 0 {
                    return Err(Abort::Invalid);
                }
                let mut fundings = Vec::with_capacity(n);
                for _ in 0..n {
                    fundings.push(self.pop_funding()?);
                }
                // The deepest funding comes first in the result.
                let assembled =
                    Funding::assemble(fundings.into_iter().rev()).map_err(|_| Abort::Invalid)?;
                self.stack.push(Value::Funding(assembled));
            }
            Opcode::Repay => {
                let funding = self.pop_funding()?;
                self.repay(funding).ok_or(Abort::Invalid)?;
            }
            Opcode::Send => {
                let destination = self.pop_account()?;
                let funding = self.pop_funding()?;
                self.credit(&destination, &funding).ok_or(Abort::Invalid)?;
                for part in &funding.parts {
                    if part.amount == 0 {
                        continue;
                    }
                    if part.account.is_world() && destination.is_world() {
                        continue;
                    }
                    self.postings.push(Posting {
                        source: part.account.0.clone(),
                        destination: destination.0.clone(),
                        asset: funding.asset.0.clone(),
                        amount: part.amount,
                    });
                }
            }
            Opcode::TxMeta => {
                let key = self.pop_string()?;
                let value = self.pop()?;
                self.tx_meta.insert(key, value);
            }
        }
        Ok(())
    }

    /// Read this opcode's inline operand bytes and advance past them.
    fn operand<const N: usize>(&mut self) -> Result<[u8; N], Abort> {
        let end = self.pc.checked_add(N).ok_or(Abort::Invalid)?;
        let bytes = self
            .program
            .instructions
            .get(self.pc..end)
            .ok_or(Abort::Invalid)?;
        self.pc = end;
        Ok(bytes.try_into().expect("slice is exactly N bytes"))
    }

    // -- typed pops -------------------------------------------------------

    fn pop(&mut self) -> Result<Value, Abort> {
        self.stack.pop().ok_or(Abort::Invalid)
    }

    fn pop_number(&mut self) -> Result<u64, Abort> {
        match self.pop()? {
            Value::Number(n) => Ok(n),
            _ => Err(Abort::Invalid),
        }
    }

    fn pop_index(&mut self) -> Result<usize, Abort> {
        usize::try_from(self.pop_number()?).map_err(|_| Abort::Invalid)
    }

    fn pop_account(&mut self) -> Result<Account, Abort> {
        match self.pop()? {
            Value::Account(account) => Ok(account),
            _ => Err(Abort::Invalid),
        }
    }

    fn pop_asset(&mut self) -> Result<Asset, Abort> {
        match self.pop()? {
            Value::Asset(asset) => Ok(asset),
            _ => Err(Abort::Invalid),
        }
    }

    fn pop_monetary(&mut self) -> Result<Monetary, Abort> {
        match self.pop()? {
            Value::Monetary(monetary) => Ok(monetary),
            _ => Err(Abort::Invalid),
        }
    }

    fn pop_portion(&mut self) -> Result<tally_common::Portion, Abort> {
        match self.pop()? {
            Value::Portion(portion) => Ok(portion),
            _ => Err(Abort::Invalid),
        }
    }

    fn pop_allotment(&mut self) -> Result<Allotment, Abort> {
        match self.pop()? {
            Value::Allotment(allotment) => Ok(allotment),
            _ => Err(Abort::Invalid),
        }
    }

    fn pop_funding(&mut self) -> Result<Funding, Abort> {
        match self.pop()? {
            Value::Funding(funding) => Ok(funding),
            _ => Err(Abort::Invalid),
        }
    }

    fn pop_string(&mut self) -> Result<String, Abort> {
        match self.pop()? {
            Value::String(s) => Ok(s),
            _ => Err(Abort::Invalid),
        }
    }
}
