//! Conversion of time-counter ticks into human units.

use std::fmt;

/// A tick count scaled to seconds, milliseconds, microseconds, or nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickDuration
{
    /// Scaled value; ten times the real value when `times_ten` is set.
    pub value: u64,
    /// `s`, `ms`, `us`, `ns`, or empty when the counter frequency is unknown.
    pub unit: &'static str,
    pub times_ten: bool,
}

impl TickDuration
{
    /// Whole part of the value.
    #[must_use]
    pub fn whole(&self) -> u64
    {
        if self.times_ten {
            self.value / 10
        } else {
            self.value
        }
    }

    /// Tenths digit, meaningful only when `times_ten` is set.
    #[must_use]
    pub fn tenths(&self) -> u64
    {
        self.value % 10
    }
}

impl fmt::Display for TickDuration
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        if self.times_ten {
            write!(f, "{}.{}{:<2}", self.whole(), self.tenths(), self.unit)
        } else {
            write!(f, "{}{:<2}", self.value, self.unit)
        }
    }
}

/// Scale `ticks` of a counter running at `frequency` ticks per second.
///
/// Ten seconds or more print in whole seconds. Shorter spans start in
/// nanoseconds and step up through microseconds and milliseconds, keeping one
/// decimal digit while the value stays below one hundred.
#[must_use]
pub fn duration(ticks: u64, frequency: u64) -> TickDuration
{
    let mut result = TickDuration {
        value: ticks,
        unit: "",
        times_ten: false,
    };

    if frequency != 0 {
        if ticks / frequency >= 10 {
            result.value = ticks / frequency;
            result.unit = "s";
        } else {
            let nanoseconds = u128::from(ticks) * 1_000_000_000 / u128::from(frequency);
            result.value = u64::try_from(nanoseconds).unwrap_or(u64::MAX);
            result.unit = "ns";
            if result.value > 1000 {
                result.value /= 100;
                result.unit = "us";
                result.times_ten = true;
                if result.value > 10_000 {
                    result.value /= 1000;
                    result.unit = "ms";
                    if result.value > 10_000 {
                        result.value /= 1000;
                        result.unit = "s";
                    }
                }
            }
        }
    }

    if result.times_ten && result.value > 100 {
        result.value /= 10;
        result.times_ten = false;
    }

    result
}
