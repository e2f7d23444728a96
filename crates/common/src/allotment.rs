//! Allotments: ordered portion tuples summing to exactly 1, and the
//! integer allocation of a total across them.

use crate::error::AllotmentError;
use crate::portion::Portion;
use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, ToPrimitive, Zero};

/// An ordered sequence of non-negative rationals summing to exactly 1.
///
/// Built at run time from portion values; at most one of them may be
/// `remaining`, which absorbs whatever the specific portions leave over.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Allotment(Vec<BigRational>);

impl Allotment {
    /// Resolve a list of portions into an allotment.
    ///
    /// Fails if more than one portion is `remaining`, or if the resolved
    /// portions do not sum to exactly 1.
    pub fn new(portions: Vec<Portion>) -> Result<Allotment, AllotmentError> {
        let mut remaining_idx = None;
        let mut total = BigRational::zero();
        let mut slots = vec![BigRational::zero(); portions.len()];

        for (i, portion) in portions.into_iter().enumerate() {
            match portion {
                Portion::Remaining => {
                    if remaining_idx.is_some() {
                        return Err(AllotmentError::MultipleRemaining);
                    }
                    remaining_idx = Some(i);
                }
                Portion::Specific(r) => {
                    total += &r;
                    slots[i] = r;
                }
            }
        }

        let one = BigRational::one();
        if total > one || (remaining_idx.is_none() && total != one) {
            return Err(AllotmentError::InvalidSum);
        }
        if let Some(i) = remaining_idx {
            slots[i] = one - total;
        }

        Ok(Allotment(slots))
    }

    /// The resolved portions, in order.
    pub fn portions(&self) -> &[BigRational] {
        &self.0
    }

    /// Split `amount` into one integer share per portion, totalling exactly
    /// `amount`.
    ///
    /// Each share starts at `floor(amount * portion)`; the unit remainder is
    /// then handed out one unit per share starting at index 0.
    pub fn allocate(&self, amount: u64) -> Vec<u64> {
        let big_amount = BigInt::from(amount);
        let mut allocated: u64 = 0;
        let mut parts: Vec<u64> = self
            .0
            .iter()
            .map(|portion| {
                let share = (portion.numer() * &big_amount) / portion.denom();
                let share = share
                    .to_u64()
                    .expect("a portion in [0, 1] of a u64 fits in a u64");
                allocated += share;
                share
            })
            .collect();

        for part in parts.iter_mut() {
            if allocated >= amount {
                break;
            }
            *part += 1;
            allocated += 1;
        }

        parts
    }
}

impl std::fmt::Display for Allotment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("{")?;
        for (i, portion) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" : ")?;
            }
            write!(f, "{}/{}", portion.numer(), portion.denom())?;
        }
        f.write_str("}")
    }
}
