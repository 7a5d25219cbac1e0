// core/src/domain/money.rs

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::Add;

/// A monetary amount in minor currency units (paise, cents).
///
/// On the wire it is a decimal number of major units, so `300` means 300.00 and
/// `12.5` means 12.50. Conversion from major units rounds half away from zero, which is
/// the `round(total * 100)` used when sizing a gateway intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Money(i64);

impl Money {
  pub const ZERO: Money = Money(0);

  pub const fn from_minor(minor: i64) -> Self {
    Money(minor)
  }

  /// `None` for NaN, infinities, and amounts that do not fit in minor units.
  pub fn from_major(major: f64) -> Option<Self> {
    if !major.is_finite() {
      return None;
    }
    let minor = (major * 100.0).round();
    if minor < i64::MIN as f64 || minor > i64::MAX as f64 {
      return None;
    }
    Some(Money(minor as i64))
  }

  pub const fn minor(self) -> i64 {
    self.0
  }

  pub fn to_major(self) -> f64 {
    self.0 as f64 / 100.0
  }

  pub fn is_positive(self) -> bool {
    self.0 > 0
  }

  pub fn is_negative(self) -> bool {
    self.0 < 0
  }

  pub fn checked_add(self, other: Money) -> Option<Money> {
    self.0.checked_add(other.0).map(Money)
  }

  pub fn checked_mul(self, quantity: u32) -> Option<Money> {
    self.0.checked_mul(i64::from(quantity)).map(Money)
  }
}

impl Add for Money {
  type Output = Money;

  fn add(self, rhs: Money) -> Money {
    Money(self.0.saturating_add(rhs.0))
  }
}

impl Sum for Money {
  fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
    iter.fold(Money::ZERO, Add::add)
  }
}

impl fmt::Display for Money {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let sign = if self.0 < 0 { "-" } else { "" };
    let abs = self.0.unsigned_abs();
    write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
  }
}

impl Serialize for Money {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(self.to_major())
  }
}

impl<'de> Deserialize<'de> for Money {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let major = f64::deserialize(deserializer)?;
    Money::from_major(major).ok_or_else(|| de::Error::custom(format!("invalid monetary amount: {}", major)))
  }
}
