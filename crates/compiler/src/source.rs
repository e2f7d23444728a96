//! Send lowering, source side.
//!
//! A send first synthesizes a funding of the requested amount from the
//! source tree, then hands it to the destination side, and finally repays
//! whatever the destinations left over. Every send leaves the stack empty.

use std::collections::HashSet;

use crate::ast::{Destination, Expr, Literal, MonetaryAmount, Source};
use crate::compile::{check_portion_slots, Compiler};
use crate::error::CompileError;
use tally_common::{Address, Opcode, Type, WORLD};

/// The amount of a send: an exact monetary, or an asset for the `[A *]`
/// form that drains sources whole.
#[derive(Debug, Clone, Copy)]
pub(crate) enum SendAmount {
    Exact(Address),
    All(Address),
}

impl SendAmount {
    fn addr(&self) -> Address {
        match self {
            SendAmount::Exact(addr) | SendAmount::All(addr) => *addr,
        }
    }
}

/// Per-send state for the flow checks, updated leaf by leaf in lexical
/// order.
#[derive(Default)]
struct SourceCtx {
    /// Accounts already drained whole in this send.
    emptied: HashSet<Address>,
    /// Set once `world` has been drawn from; nothing may follow it.
    bottomless: bool,
}

impl Compiler {
    pub(crate) fn compile_send(
        &mut self,
        amount: &Expr,
        source: &Source,
        destination: &Destination,
    ) -> Result<(), CompileError> {
        let amount = self.send_amount(amount)?;
        let mut ctx = SourceCtx::default();

        match amount {
            SendAmount::Exact(_) => self.source_exact(source, &amount, &mut ctx)?,
            SendAmount::All(_) => {
                if contains_world(source) {
                    return Err(CompileError::TakeAllFromWorld);
                }
                if contains_allotment(source) {
                    return Err(CompileError::TakeAllFromAllotment);
                }
                self.source_all(source, &amount, &mut ctx)?;
            }
        }

        self.compile_destination(destination)?;
        self.emit(Opcode::Repay);
        Ok(())
    }

    fn send_amount(&mut self, amount: &Expr) -> Result<SendAmount, CompileError> {
        if let Expr::Literal(Literal::Monetary {
            amount: MonetaryAmount::All,
            ..
        }) = amount
        {
            return Ok(SendAmount::All(self.addr_of(amount)?));
        }
        let typ = self.static_type(amount)?;
        if typ != Type::Monetary {
            return Err(CompileError::WrongType {
                expected: Type::Monetary,
                got: typ,
            });
        }
        Ok(SendAmount::Exact(self.addr_of(amount)?))
    }

    /// Produce a funding of exactly the requested amount.
    fn source_exact(
        &mut self,
        source: &Source,
        amount: &SendAmount,
        ctx: &mut SourceCtx,
    ) -> Result<(), CompileError> {
        match source {
            Source::Account(expr) => {
                self.source_full_leaf(expr, amount, ctx)?;
                self.take_needed(amount);
            }
            Source::Concat(subs) => {
                self.source_full_concat(subs, amount, ctx)?;
                if !contains_world(source) {
                    self.emit(Opcode::FundingReverse);
                }
                self.take_needed(amount);
            }
            Source::Allotment(entries) => {
                check_portion_slots(entries.iter().map(|(slot, _)| slot))?;
                self.emit_apush(amount.addr());
                for (slot, _) in entries.iter().rev() {
                    self.compile_portion_slot(slot)?;
                }
                self.emit_ipush(entries.len() as u64);
                self.emit(Opcode::MakeAllotment);
                self.emit(Opcode::Alloc);

                // The first sub-source's share sits on top; deeper shares
                // are rotated up as the already-taken fundings pile on.
                for (i, (_, sub)) in entries.iter().enumerate() {
                    if i > 0 {
                        self.emit_ipush(i as u64);
                        self.emit(Opcode::Bump);
                    }
                    self.source_full(sub, amount, ctx)?;
                    if matches!(sub, Source::Concat(_)) && !contains_world(sub) {
                        self.emit(Opcode::FundingReverse);
                    }
                    self.emit_ipush(1);
                    self.emit(Opcode::Bump);
                    self.emit(Opcode::Take);
                    self.emit_ipush(1);
                    self.emit(Opcode::Bump);
                    self.emit(Opcode::Repay);
                }
                self.emit_ipush(entries.len() as u64);
                self.emit(Opcode::FundingAssemble);
            }
        }
        Ok(())
    }

    /// Take the send amount off a full funding and repay the surplus.
    fn take_needed(&mut self, amount: &SendAmount) {
        self.emit_apush(amount.addr());
        self.emit(Opcode::Take);
        self.emit_ipush(1);
        self.emit(Opcode::Bump);
        self.emit(Opcode::Repay);
    }

    /// Produce the whole available funding for a `[A *]` send.
    fn source_all(
        &mut self,
        source: &Source,
        amount: &SendAmount,
        ctx: &mut SourceCtx,
    ) -> Result<(), CompileError> {
        match source {
            Source::Account(expr) => self.source_full_leaf(expr, amount, ctx),
            Source::Concat(subs) => {
                for sub in subs {
                    self.source_all(sub, amount, ctx)?;
                }
                self.emit_ipush(subs.len() as u64);
                self.emit(Opcode::FundingAssemble);
                Ok(())
            }
            Source::Allotment(_) => Err(CompileError::TakeAllFromAllotment),
        }
    }

    /// Produce a funding of everything a source tree has, as fodder for an
    /// enclosing take.
    fn source_full(
        &mut self,
        source: &Source,
        amount: &SendAmount,
        ctx: &mut SourceCtx,
    ) -> Result<(), CompileError> {
        match source {
            Source::Account(expr) => self.source_full_leaf(expr, amount, ctx),
            Source::Concat(subs) => self.source_full_concat(subs, amount, ctx),
            Source::Allotment(_) => Err(CompileError::NestedAllotmentSource),
        }
    }

    fn source_full_concat(
        &mut self,
        subs: &[Source],
        amount: &SendAmount,
        ctx: &mut SourceCtx,
    ) -> Result<(), CompileError> {
        for sub in subs {
            self.source_full(sub, amount, ctx)?;
        }
        self.emit_ipush(subs.len() as u64);
        self.emit(Opcode::FundingAssemble);
        Ok(())
    }

    /// Drain one account whole: `TAKE_ALL` on it in the send's asset.
    fn source_full_leaf(
        &mut self,
        expr: &Expr,
        amount: &SendAmount,
        ctx: &mut SourceCtx,
    ) -> Result<(), CompileError> {
        let typ = self.static_type(expr)?;
        if typ != Type::Account {
            return Err(CompileError::WrongType {
                expected: Type::Account,
                got: typ,
            });
        }
        let addr = self.addr_of(expr)?;
        let is_world = matches!(expr, Expr::Literal(Literal::Account(name)) if name == WORLD);

        if !is_world && ctx.emptied.contains(&addr) {
            return Err(CompileError::AlreadyEmptied {
                name: leaf_display(expr),
            });
        }
        if ctx.bottomless {
            return Err(CompileError::WorldNotLast);
        }
        if is_world {
            ctx.bottomless = true;
        } else {
            ctx.emptied.insert(addr);
        }

        self.emit_apush(addr);
        self.emit_apush(amount.addr());
        if matches!(amount, SendAmount::Exact(_)) {
            self.emit(Opcode::Asset);
        }
        self.emit(Opcode::TakeAll);
        self.record_needed_balance(addr, amount.addr());
        Ok(())
    }
}

fn leaf_display(expr: &Expr) -> String {
    match expr {
        Expr::Literal(Literal::Account(name)) => format!("@{name}"),
        Expr::Variable(name) => format!("${name}"),
        _ => "<expression>".to_string(),
    }
}

pub(crate) fn contains_world(source: &Source) -> bool {
    match source {
        Source::Account(Expr::Literal(Literal::Account(name))) => name == WORLD,
        Source::Account(_) => false,
        Source::Concat(subs) => subs.iter().any(contains_world),
        Source::Allotment(entries) => entries.iter().any(|(_, sub)| contains_world(sub)),
    }
}

fn contains_allotment(source: &Source) -> bool {
    match source {
        Source::Account(_) => false,
        Source::Concat(subs) => subs.iter().any(contains_allotment),
        Source::Allotment(_) => true,
    }
}
