//! Send lowering, destination side.
//!
//! Each destination form consumes the funding on top of the stack and
//! leaves a single leftover funding there; the send statement repays that
//! leftover at the end. All iteration over sub-destinations is unrolled
//! here, so the emitted code stays straight-line.

use crate::ast::Destination;
use crate::compile::{check_portion_slots, Compiler};
use crate::error::CompileError;
use tally_common::{Opcode, Type};

impl Compiler {
    pub(crate) fn compile_destination(
        &mut self,
        destination: &Destination,
    ) -> Result<(), CompileError> {
        match destination {
            Destination::Account(expr) => {
                let typ = self.static_type(expr)?;
                if typ != Type::Account {
                    return Err(CompileError::DestinationNotAccount(typ));
                }
                let addr = self.addr_of(expr)?;

                // Normalize to the funding's own total, credit, and leave
                // the (empty) remainder as the leftover.
                self.emit(Opcode::FundingSum);
                self.emit(Opcode::Take);
                self.emit_apush(addr);
                self.emit(Opcode::Send);
            }
            Destination::Allotment(entries) => {
                check_portion_slots(entries.iter().map(|(slot, _)| slot))?;

                self.emit(Opcode::FundingSum);
                for (slot, _) in entries.iter().rev() {
                    self.compile_portion_slot(slot)?;
                }
                self.emit_ipush(entries.len() as u64);
                self.emit(Opcode::MakeAllotment);
                self.emit(Opcode::Alloc);

                // Slices sit above the funding, first sub-destination's on
                // top. For each one: rotate the funding up, peel the slice,
                // disburse it, and fold the leftover back into the carry.
                self.emit_ipush(entries.len() as u64);
                self.emit(Opcode::Bump);
                for (_, sub) in entries {
                    self.emit_ipush(1);
                    self.emit(Opcode::Bump);
                    self.emit(Opcode::Take);
                    self.compile_destination(sub)?;
                    self.emit_ipush(1);
                    self.emit(Opcode::Bump);
                    self.emit_ipush(2);
                    self.emit(Opcode::FundingAssemble);
                }
            }
            Destination::Ordered { steps, remaining } => {
                // A running monetary under the funding accumulates the
                // leftover totals of the capped steps.
                self.emit(Opcode::FundingSum);
                self.emit(Opcode::Asset);
                self.emit_ipush(0);
                self.emit(Opcode::MonetaryNew);
                self.emit_ipush(1);
                self.emit(Opcode::Bump);

                for (cap, sub) in steps {
                    let typ = self.static_type(cap)?;
                    if typ != Type::Monetary {
                        return Err(CompileError::WrongType {
                            expected: Type::Monetary,
                            got: typ,
                        });
                    }
                    let cap_addr = self.addr_of(cap)?;

                    self.emit_apush(cap_addr);
                    self.emit(Opcode::TakeMax);
                    self.compile_destination(sub)?;
                    self.emit(Opcode::FundingSum);
                    self.emit_ipush(3);
                    self.emit(Opcode::Bump);
                    self.emit(Opcode::MonetaryAdd);
                    self.emit_ipush(1);
                    self.emit(Opcode::Bump);
                    self.emit_ipush(2);
                    self.emit(Opcode::Bump);
                    self.emit_ipush(2);
                    self.emit(Opcode::FundingAssemble);
                }

                // Set the accumulated amount aside from the tail end, hand
                // the rest to the final destination, then fold the pieces
                // back together.
                self.emit(Opcode::FundingReverse);
                self.emit_ipush(1);
                self.emit(Opcode::Bump);
                self.emit(Opcode::Take);
                self.emit(Opcode::FundingReverse);
                self.emit_ipush(1);
                self.emit(Opcode::Bump);
                self.emit(Opcode::FundingReverse);
                self.compile_destination(remaining)?;
                self.emit_ipush(1);
                self.emit(Opcode::Bump);
                self.emit_ipush(2);
                self.emit(Opcode::FundingAssemble);
            }
        }
        Ok(())
    }
}
