use serde::{Deserialize, Serialize};

/// Number of satoshis.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    /// Split into the distinct powers of two summing to self, ascending.
    ///
    /// This is the binary decomposition: the mint only signs power-of-two
    /// denominations, so any amount travels as its set bits.
    pub fn split(&self) -> Vec<Self> {
        (0_u64..64)
            .filter_map(|bit| {
                let part = 1 << bit;
                ((self.0 & part) == part).then_some(Self(part))
            })
            .collect()
    }

    pub fn to_u64(&self) -> u64 {
        self.0
    }

    pub fn checked_sub(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_sub(rhs.0).map(Amount)
    }
}

impl From<u64> for Amount {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Amount> for u64 {
    fn from(value: Amount) -> Self {
        value.0
    }
}

impl std::ops::Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Amount) -> Self::Output {
        Amount(self.0 + rhs.0)
    }
}

impl std::ops::AddAssign for Amount {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl std::ops::Sub for Amount {
    type Output = Amount;

    fn sub(self, rhs: Amount) -> Self::Output {
        Amount(self.0 - rhs.0)
    }
}

impl core::iter::Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        Amount(iter.map(|amt| amt.0).sum())
    }
}

use std::fmt;
impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_amount() {
        assert_eq!(Amount::ZERO.split(), vec![]);
        assert_eq!(Amount::from(1).split(), vec![Amount::from(1)]);
        assert_eq!(Amount::from(2).split(), vec![Amount::from(2)]);
        assert_eq!(
            Amount::from(3).split(),
            vec![Amount::from(1), Amount::from(2)]
        );
        let amounts: Vec<Amount> = [1, 4, 8].iter().map(|a| Amount::from(*a)).collect();
        assert_eq!(Amount::from(13).split(), amounts);
        let amounts: Vec<Amount> = [1, 2, 4, 8, 16, 32, 64, 128]
            .iter()
            .map(|a| Amount::from(*a))
            .collect();
        assert_eq!(Amount::from(255).split(), amounts);
    }

    #[test]
    fn test_split_conserves_sum() {
        for n in [0u64, 1, 5, 13, 64, 255, 1023, 4096, u64::from(u32::MAX)] {
            let parts = Amount::from(n).split();
            assert_eq!(parts.iter().copied().sum::<Amount>(), Amount::from(n));
            assert_eq!(parts.len(), n.count_ones() as usize);
            for p in &parts {
                assert!(p.to_u64().is_power_of_two());
            }
        }
    }

    #[test]
    fn test_checked_sub() {
        assert_eq!(
            Amount::from(13).checked_sub(5.into()),
            Some(Amount::from(8))
        );
        assert_eq!(Amount::from(5).checked_sub(13.into()), None);
    }
}
