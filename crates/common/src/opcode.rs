//! Opcode definitions for the Tally instruction set.
//!
//! Instructions are a raw byte stream: a one-byte opcode followed by zero
//! or more operand bytes. `IPUSH` carries an 8-byte little-endian number,
//! `APUSH` a 2-byte little-endian resource address; every other opcode
//! takes its operands from the stack.

use crate::error::DecodeError;

/// Identifies the operation to perform.
///
/// The `#[repr(u8)]` attribute ensures each variant has a stable byte
/// value; 0x00 is permanently illegal.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// Push the following 8-byte little-endian u64 as a Number.
    IPush = 0x01,
    /// Push the resource at the following 2-byte little-endian address.
    APush = 0x02,
    /// Pop n (Number); rotate the n-th-from-top element to the top.
    Bump = 0x03,
    /// Pop two Numbers, push their sum.
    IAdd = 0x04,
    /// Pop two Numbers, push their difference. Fails if negative.
    ISub = 0x05,
    /// Pop any value, emit it to the printer.
    Print = 0x06,
    /// Halt with the failure exit code.
    Fail = 0x07,
    /// Pop an Asset, Monetary, or Funding; push its Asset.
    Asset = 0x08,
    /// Pop a Number then an Asset, push a Monetary.
    MonetaryNew = 0x09,
    /// Pop two Monetaries of the same asset, push their sum.
    MonetaryAdd = 0x0A,
    /// Pop n (Number) then n Portions; push an Allotment.
    MakeAllotment = 0x0B,
    /// Pop an Allotment then a Monetary; push one Monetary per portion,
    /// in reverse portion order.
    Alloc = 0x0C,
    /// Pop an Asset then an Account; withdraw the whole balance, push a
    /// Funding.
    TakeAll = 0x0D,
    /// Pop a Monetary then a Funding of the same asset; push the remainder
    /// then the taken piece.
    Take = 0x0E,
    /// As TAKE, but saturating instead of failing on a shortfall.
    TakeMax = 0x0F,
    /// Pop a Funding, push it back, then push a Monetary of its total.
    FundingSum = 0x10,
    /// Pop a Funding, push its reversal.
    FundingReverse = 0x11,
    /// Pop n (Number) then n Fundings (topmost last in result order);
    /// push their concatenation.
    FundingAssemble = 0x12,
    /// Pop a Funding; credit each non-world part back to its account.
    Repay = 0x13,
    /// Pop an Account then a Funding; credit the account and emit one
    /// posting per non-zero part.
    Send = 0x14,
    /// Pop a String key then any value; store as transaction metadata.
    TxMeta = 0x15,
}

/// All valid opcodes, in definition order. Useful for exhaustive testing.
pub const ALL_OPCODES: [Opcode; 21] = [
    Opcode::IPush,
    Opcode::APush,
    Opcode::Bump,
    Opcode::IAdd,
    Opcode::ISub,
    Opcode::Print,
    Opcode::Fail,
    Opcode::Asset,
    Opcode::MonetaryNew,
    Opcode::MonetaryAdd,
    Opcode::MakeAllotment,
    Opcode::Alloc,
    Opcode::TakeAll,
    Opcode::Take,
    Opcode::TakeMax,
    Opcode::FundingSum,
    Opcode::FundingReverse,
    Opcode::FundingAssemble,
    Opcode::Repay,
    Opcode::Send,
    Opcode::TxMeta,
];

impl TryFrom<u8> for Opcode {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Err(DecodeError::IllegalOpcode),
            0x01 => Ok(Opcode::IPush),
            0x02 => Ok(Opcode::APush),
            0x03 => Ok(Opcode::Bump),
            0x04 => Ok(Opcode::IAdd),
            0x05 => Ok(Opcode::ISub),
            0x06 => Ok(Opcode::Print),
            0x07 => Ok(Opcode::Fail),
            0x08 => Ok(Opcode::Asset),
            0x09 => Ok(Opcode::MonetaryNew),
            0x0A => Ok(Opcode::MonetaryAdd),
            0x0B => Ok(Opcode::MakeAllotment),
            0x0C => Ok(Opcode::Alloc),
            0x0D => Ok(Opcode::TakeAll),
            0x0E => Ok(Opcode::Take),
            0x0F => Ok(Opcode::TakeMax),
            0x10 => Ok(Opcode::FundingSum),
            0x11 => Ok(Opcode::FundingReverse),
            0x12 => Ok(Opcode::FundingAssemble),
            0x13 => Ok(Opcode::Repay),
            0x14 => Ok(Opcode::Send),
            0x15 => Ok(Opcode::TxMeta),
            _ => Err(DecodeError::InvalidOpcode(value)),
        }
    }
}

impl Opcode {
    /// Returns the listing mnemonic for this opcode.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Opcode::IPush => "IPUSH",
            Opcode::APush => "APUSH",
            Opcode::Bump => "BUMP",
            Opcode::IAdd => "IADD",
            Opcode::ISub => "ISUB",
            Opcode::Print => "PRINT",
            Opcode::Fail => "FAIL",
            Opcode::Asset => "ASSET",
            Opcode::MonetaryNew => "MONETARY_NEW",
            Opcode::MonetaryAdd => "MONETARY_ADD",
            Opcode::MakeAllotment => "MAKE_ALLOTMENT",
            Opcode::Alloc => "ALLOC",
            Opcode::TakeAll => "TAKE_ALL",
            Opcode::Take => "TAKE",
            Opcode::TakeMax => "TAKE_MAX",
            Opcode::FundingSum => "FUNDING_SUM",
            Opcode::FundingReverse => "FUNDING_REVERSE",
            Opcode::FundingAssemble => "FUNDING_ASSEMBLE",
            Opcode::Repay => "REPAY",
            Opcode::Send => "SEND",
            Opcode::TxMeta => "TX_META",
        }
    }

    /// The number of inline operand bytes that follow this opcode.
    pub fn operand_len(&self) -> usize {
        match self {
            Opcode::IPush => 8,
            Opcode::APush => 2,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_opcodes_count() {
        assert_eq!(ALL_OPCODES.len(), 21);
    }

    #[test]
    fn roundtrip_all_valid_opcodes() {
        for &opcode in &ALL_OPCODES {
            let byte = opcode as u8;
            let decoded = Opcode::try_from(byte).unwrap();
            assert_eq!(opcode, decoded, "roundtrip failed for {opcode:?} ({byte:#04x})");
        }
    }

    #[test]
    fn illegal_opcode_zero() {
        assert_eq!(Opcode::try_from(0x00), Err(DecodeError::IllegalOpcode));
    }

    #[test]
    fn every_byte_value_resolves() {
        for byte in 0..=255u8 {
            match Opcode::try_from(byte) {
                Ok(_) | Err(DecodeError::IllegalOpcode) | Err(DecodeError::InvalidOpcode(_)) => {}
                other => panic!("unexpected result for byte {byte:#04x}: {other:?}"),
            }
        }
    }

    #[test]
    fn invalid_bytes_above_range() {
        for byte in 0x16..=0xFFu8 {
            assert_eq!(
                Opcode::try_from(byte),
                Err(DecodeError::InvalidOpcode(byte)),
                "byte {byte:#04x} should be invalid"
            );
        }
    }

    #[test]
    fn operand_lengths() {
        assert_eq!(Opcode::IPush.operand_len(), 8);
        assert_eq!(Opcode::APush.operand_len(), 2);
        assert_eq!(Opcode::Send.operand_len(), 0);
    }

    #[test]
    fn mnemonics_are_uppercase_and_unique() {
        let mut seen = std::collections::HashSet::new();
        for &opcode in &ALL_OPCODES {
            let m = opcode.mnemonic();
            assert_eq!(m, m.to_uppercase());
            assert!(seen.insert(m), "duplicate mnemonic {m}");
        }
    }
}
