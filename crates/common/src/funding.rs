//! The funding algebra.
//!
//! A funding is a linear token: an amount of one asset decomposed by source
//! account, in the order those parts should be spent or credited. Fundings
//! are moved, not shared; every operation consumes its inputs and returns
//! the pieces, so a part can never be spent twice.

use crate::error::FundingError;
use crate::value::{Account, Asset, WORLD};

/// One slice of a funding: an amount owed to (or drawn from) one account.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FundingPart {
    pub account: Account,
    pub amount: u64,
}

/// A per-account decomposition of an asset amount.
///
/// `infinite` marks a funding drawn from the `world` account: an unbounded
/// supplier that yields `world` parts on demand and never takes credits
/// back.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Funding {
    pub asset: Asset,
    pub parts: Vec<FundingPart>,
    pub infinite: bool,
}

impl Funding {
    /// An empty, finite funding of the given asset.
    pub fn empty(asset: Asset) -> Funding {
        Funding {
            asset,
            parts: Vec::new(),
            infinite: false,
        }
    }

    /// The sum of all part amounts. Undefined for infinite fundings, and an
    /// overflow means the program that built this funding is invalid.
    pub fn total(&self) -> Result<u64, FundingError> {
        if self.infinite {
            return Err(FundingError::InfiniteTotal);
        }
        let mut total: u64 = 0;
        for part in &self.parts {
            total = total
                .checked_add(part.amount)
                .ok_or(FundingError::Overflow)?;
        }
        Ok(total)
    }

    /// Split off exactly `amount`, walking parts left to right.
    ///
    /// Parts are taken whole until the requested amount is covered; a part
    /// with excess is split, its surplus staying in the remainder at the
    /// same position, and the untouched tail follows it. The `infinite`
    /// flag survives only on the remainder. A shortfall on an infinite
    /// funding is covered by a synthetic `world` part; on a finite funding
    /// it is an error.
    pub fn take(self, amount: u64) -> Result<(Funding, Funding), FundingError> {
        let infinite = self.infinite;
        let (mut taken, remainder, shortfall) = self.split(amount);
        if shortfall > 0 {
            if infinite {
                taken.parts.push(FundingPart {
                    account: Account(WORLD.to_string()),
                    amount: shortfall,
                });
            } else {
                return Err(FundingError::Insufficient);
            }
        }
        Ok((taken, remainder))
    }

    /// Like [`Funding::take`], but a shortfall on a finite funding simply
    /// yields a smaller taken piece.
    pub fn take_max(self, amount: u64) -> (Funding, Funding) {
        let infinite = self.infinite;
        let (mut taken, remainder, shortfall) = self.split(amount);
        if shortfall > 0 && infinite {
            taken.parts.push(FundingPart {
                account: Account(WORLD.to_string()),
                amount: shortfall,
            });
        }
        (taken, remainder)
    }

    fn split(self, amount: u64) -> (Funding, Funding, u64) {
        let mut taken = Funding::empty(self.asset.clone());
        let mut remainder = Funding {
            asset: self.asset,
            parts: Vec::new(),
            infinite: self.infinite,
        };
        let mut need = amount;

        for part in self.parts {
            if need == 0 {
                remainder.parts.push(part);
            } else if part.amount > need {
                remainder.parts.push(FundingPart {
                    account: part.account.clone(),
                    amount: part.amount - need,
                });
                taken.parts.push(FundingPart {
                    account: part.account,
                    amount: need,
                });
                need = 0;
            } else {
                need -= part.amount;
                taken.parts.push(part);
            }
        }

        (taken, remainder, need)
    }

    /// Append another funding of the same asset.
    ///
    /// When the seam joins two parts of the same account they merge into
    /// one. An infinite funding is terminal: concatenating anything onto it
    /// keeps only its own parts, and the result of any concatenation
    /// involving an infinite operand is infinite.
    pub fn concat(mut self, other: Funding) -> Result<Funding, FundingError> {
        if self.asset != other.asset {
            return Err(FundingError::AssetMismatch(self.asset, other.asset));
        }
        let infinite = self.infinite || other.infinite;
        if !self.infinite {
            let mut incoming = other.parts.into_iter();
            if let Some(first) = incoming.next() {
                match self.parts.last_mut() {
                    Some(last) if last.account == first.account => {
                        last.amount = last
                            .amount
                            .checked_add(first.amount)
                            .ok_or(FundingError::Overflow)?;
                    }
                    _ => self.parts.push(first),
                }
                self.parts.extend(incoming);
            }
        }
        self.infinite = infinite;
        Ok(self)
    }

    /// Reverse the part order. Fails on infinite fundings.
    pub fn reverse(mut self) -> Result<Funding, FundingError> {
        if self.infinite {
            return Err(FundingError::InfiniteReverse);
        }
        self.parts.reverse();
        Ok(self)
    }

    /// Left-fold concatenation over a sequence of fundings.
    pub fn assemble<I>(fundings: I) -> Result<Funding, FundingError>
    where
        I: IntoIterator<Item = Funding>,
    {
        let mut iter = fundings.into_iter();
        let mut result = iter.next().ok_or(FundingError::EmptyAssembly)?;
        for funding in iter {
            result = result.concat(funding)?;
        }
        Ok(result)
    }
}

impl std::fmt::Display for Funding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}", self.asset)?;
        for part in &self.parts {
            write!(f, " @{} {}", part.account, part.amount)?;
        }
        if self.infinite {
            write!(f, " @{WORLD} *")?;
        }
        f.write_str("]")
    }
}
