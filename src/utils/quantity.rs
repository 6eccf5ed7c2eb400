// Copyright 2025 RustFS Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Exact arithmetic over Kubernetes resource quantities.
//!
//! Quantities are parsed into nano-units held in an `i128`, which covers every
//! suffix from `n` up to `Ei` without loss. Sums are rendered back in the
//! coarsest unit that represents them exactly.

use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use snafu::{OptionExt, Snafu};
use std::fmt;
use std::ops::Add;

const NANOS_PER_UNIT: i128 = 1_000_000_000;
const MAX_DECIMAL_EXPONENT: i32 = 18;

#[derive(Snafu, Debug, PartialEq, Eq)]
pub enum Error {
    #[snafu(display("quantity is empty"))]
    Empty,

    #[snafu(display("invalid quantity '{}': {}", value, reason))]
    Invalid { value: String, reason: String },

    #[snafu(display("quantity '{}' is out of range", value))]
    Overflow { value: String },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NanoQuantity(i128);

impl NanoQuantity {
    pub const ZERO: NanoQuantity = NanoQuantity(0);

    pub fn from_units(units: i64) -> Self {
        NanoQuantity(i128::from(units) * NANOS_PER_UNIT)
    }

    pub fn nanos(self) -> i128 {
        self.0
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub fn checked_add(self, other: NanoQuantity) -> Option<NanoQuantity> {
        self.0.checked_add(other.0).map(NanoQuantity)
    }

    pub fn as_f64(self) -> f64 {
        self.0 as f64
    }

    pub fn to_quantity(self) -> Quantity {
        Quantity(self.to_string())
    }
}

impl Add for NanoQuantity {
    type Output = NanoQuantity;

    fn add(self, rhs: Self) -> Self::Output {
        NanoQuantity(self.0.saturating_add(rhs.0))
    }
}

impl fmt::Display for NanoQuantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = self.0;
        if n % NANOS_PER_UNIT == 0 {
            write!(f, "{}", n / NANOS_PER_UNIT)
        } else if n % 1_000_000 == 0 {
            write!(f, "{}m", n / 1_000_000)
        } else if n % 1_000 == 0 {
            write!(f, "{}u", n / 1_000)
        } else {
            write!(f, "{n}n")
        }
    }
}

/// Scale factor of a suffix as a `numerator / denominator` pair.
fn suffix_scale(value: &str, suffix: &str) -> Result<(i128, i128), Error> {
    let binary = |power: u32| -> Result<(i128, i128), Error> { Ok((1i128 << (10 * power), 1)) };
    match suffix {
        "" => decimal_scale(value, 0),
        "n" => decimal_scale(value, -9),
        "u" => decimal_scale(value, -6),
        "m" => decimal_scale(value, -3),
        "k" => decimal_scale(value, 3),
        "M" => decimal_scale(value, 6),
        "G" => decimal_scale(value, 9),
        "T" => decimal_scale(value, 12),
        "P" => decimal_scale(value, 15),
        "E" => decimal_scale(value, 18),
        "Ki" => binary(1),
        "Mi" => binary(2),
        "Gi" => binary(3),
        "Ti" => binary(4),
        "Pi" => binary(5),
        "Ei" => binary(6),
        s if s.starts_with(['e', 'E']) => {
            let exponent: i32 = s[1..].parse().map_err(|_| Error::Invalid {
                value: value.to_owned(),
                reason: format!("bad exponent '{s}'"),
            })?;
            decimal_scale(value, exponent)
        }
        s => InvalidSnafu {
            value,
            reason: format!("unknown suffix '{s}'"),
        }
        .fail(),
    }
}

fn decimal_scale(value: &str, exponent: i32) -> Result<(i128, i128), Error> {
    if exponent.abs() > MAX_DECIMAL_EXPONENT {
        return OverflowSnafu { value }.fail();
    }
    let pow = 10i128.pow(exponent.unsigned_abs());
    Ok(if exponent >= 0 { (pow, 1) } else { (1, pow) })
}

pub fn parse_str(value: &str) -> Result<NanoQuantity, Error> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return EmptySnafu.fail();
    }

    let (negative, unsigned) = match trimmed.as_bytes()[0] {
        b'-' => (true, &trimmed[1..]),
        b'+' => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let number_len = unsigned
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(unsigned.len());
    let (number, suffix) = unsigned.split_at(number_len);

    let (int_part, frac_part) = number.split_once('.').unwrap_or((number, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return InvalidSnafu {
            value,
            reason: "missing digits",
        }
        .fail();
    }
    if frac_part.contains('.') {
        return InvalidSnafu {
            value,
            reason: "more than one decimal point",
        }
        .fail();
    }

    let overflow = || Error::Overflow {
        value: value.to_owned(),
    };

    let mut mantissa: i128 = 0;
    for digit in int_part.bytes().chain(frac_part.bytes()) {
        mantissa = mantissa
            .checked_mul(10)
            .and_then(|m| m.checked_add(i128::from(digit - b'0')))
            .with_context(|| OverflowSnafu { value })?;
    }

    let (numerator, denominator) = suffix_scale(value, suffix)?;
    let frac_scale = u32::try_from(frac_part.len())
        .ok()
        .and_then(|len| 10i128.checked_pow(len))
        .ok_or_else(overflow)?;

    let scaled = mantissa
        .checked_mul(NANOS_PER_UNIT)
        .and_then(|m| m.checked_mul(numerator))
        .ok_or_else(overflow)?;
    let divisor = denominator.checked_mul(frac_scale).ok_or_else(overflow)?;

    // precision below a nano-unit rounds up, away from zero
    let mut nanos = scaled / divisor;
    if scaled % divisor != 0 {
        nanos += 1;
    }

    Ok(NanoQuantity(if negative { -nanos } else { nanos }))
}

pub fn parse(quantity: &Quantity) -> Result<NanoQuantity, Error> {
    parse_str(&quantity.0)
}
