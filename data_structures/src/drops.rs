use std::{fmt, iter::Sum};

use serde::{Deserialize, Serialize};

/// 1 drop is the minimal unit of value
/// 1 unit = 10^6 drops
pub const DROPS_PER_UNIT: u64 = 1_000_000;
// 10 ^ DROPS_DECIMAL_PLACES
/// Number of decimal places used in the string representation of a drops value.
pub const DROPS_DECIMAL_PLACES: u8 = 6;

/// Unit of value
#[derive(
    Clone, Copy, Debug, Deserialize, Default, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize,
)]
pub struct Drops(u64);

impl Drops {
    /// Create from whole units
    #[inline]
    pub fn from_units(units: u64) -> Self {
        Self(units.checked_mul(DROPS_PER_UNIT).expect("overflow"))
    }

    /// Create from drops
    #[inline]
    pub fn from_drops(drops: u64) -> Self {
        Self(drops)
    }

    /// Retrieve the drops value within.
    #[inline]
    pub fn drops(self) -> u64 {
        self.0
    }

    /// The zero value, without having to import `num_traits::Zero`
    #[inline]
    pub fn zero() -> Self {
        Drops(0)
    }

    /// Return integer and fractional part, useful for pretty printing
    pub fn units_and_drops(self) -> (u64, u64) {
        let drops = self.0;
        let amount_units = drops / DROPS_PER_UNIT;
        let amount_drops = drops % DROPS_PER_UNIT;

        (amount_units, amount_drops)
    }
}

impl fmt::Display for Drops {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (amount_units, amount_drops) = self.units_and_drops();
        let width = usize::from(DROPS_DECIMAL_PLACES);

        write!(
            f,
            "{}.{:0width$}",
            amount_units,
            amount_drops,
            width = width
        )
    }
}

impl std::ops::Add for Drops {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.drops() + rhs.drops())
    }
}

impl std::ops::AddAssign for Drops {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.drops();
    }
}

impl std::ops::Sub for Drops {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.drops() - rhs.drops())
    }
}

impl Sum for Drops {
    fn sum<I: Iterator<Item = Drops>>(iter: I) -> Self {
        iter.fold(Drops::zero(), |acc, x| acc + x)
    }
}

impl num_traits::Zero for Drops {
    #[inline]
    fn zero() -> Self {
        Drops(0)
    }

    #[inline]
    fn is_zero(&self) -> bool {
        matches!(self, &Drops(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_decimal_places() {
        // 10 ^ DROPS_DECIMAL_PLACES == DROPS_PER_UNIT
        assert_eq!(10u64.pow(u32::from(DROPS_DECIMAL_PLACES)), DROPS_PER_UNIT);
    }

    #[test]
    fn drops_pretty_print() {
        assert_eq!(Drops::from_drops(0).to_string(), "0.000000");
        assert_eq!(Drops::from_drops(1).to_string(), "0.000001");
        assert_eq!(Drops::from_drops(890).to_string(), "0.000890");
        assert_eq!(Drops::from_drops(67_890).to_string(), "0.067890");
        assert_eq!(Drops::from_drops(1_234_567).to_string(), "1.234567");
        assert_eq!(Drops::from_drops(2_500_000).to_string(), "2.500000");
        assert_eq!(Drops::from_drops(21_234_567_890).to_string(), "21234.567890");
    }

    #[test]
    fn drops_arithmetic() {
        let a = Drops::from_drops(1_500_000);
        let b = Drops::from_units(1);
        assert_eq!(a + b, Drops::from_drops(2_500_000));
        assert_eq!(a - b, Drops::from_drops(500_000));
        assert_eq!(
            vec![a, b, Drops::zero()].into_iter().sum::<Drops>(),
            Drops::from_drops(2_500_000)
        );
    }
}
