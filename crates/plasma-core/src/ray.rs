// crates/plasma-core/src/ray.rs
//
// 27-decimal fixed-point arithmetic ("ray") over 256-bit integers.
//
// All monetary quantities in the staking engine are rays. TON balances use the
// 18-decimal "wad" scale; conversions between scales truncate toward zero.
// Products and quotients are computed over a 512-bit intermediate, so the
// only rounding is the final truncation.

use std::fmt;
use std::str::FromStr;

use primitive_types::{U256, U512};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::PlasmaError;

/// Number of decimal digits carried by a ray.
pub const RAY_DECIMALS: u32 = 27;

/// Number of decimal digits carried by a wad.
pub const WAD_DECIMALS: u32 = 18;

/// 10^27, the ray unit.
pub const RAY: U256 = U256([0x9fd0_803c_e800_0000, 0x033b_2e3c, 0, 0]);

/// 10^18, the wad unit.
pub const WAD: U256 = U256([1_000_000_000_000_000_000, 0, 0, 0]);

/// 10^9, the factor between the wad and ray scales.
const WAD_TO_RAY: U256 = U256([1_000_000_000, 0, 0, 0]);

/// A non-negative 27-decimal fixed-point number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Ray(U256);

impl Ray {
    /// The value 0.
    pub const ZERO: Ray = Ray(U256([0, 0, 0, 0]));

    /// The value 1.0.
    pub const ONE: Ray = Ray(RAY);

    /// Wrap a raw 27-decimal integer.
    pub fn from_raw(raw: U256) -> Self {
        Ray(raw)
    }

    /// The raw 27-decimal integer.
    pub fn raw(self) -> U256 {
        self.0
    }

    /// Whole token units, e.g. `Ray::from_units(100)` is 100.0.
    pub fn from_units(units: u64) -> Self {
        // u64::MAX * 10^27 < 2^157, so this cannot overflow.
        Ray(U256::from(units) * RAY)
    }

    /// Convert an 18-decimal wad amount to a ray.
    pub fn from_wad(wad: U256) -> Result<Self, PlasmaError> {
        wad.checked_mul(WAD_TO_RAY)
            .map(Ray)
            .ok_or_else(|| PlasmaError::Arithmetic(format!("wad {} overflows ray", wad)))
    }

    /// Convert to an 18-decimal wad amount, truncating toward zero.
    pub fn to_wad(self) -> U256 {
        self.0 / WAD_TO_RAY
    }

    /// Convert an amount carried with `decimals` digits (at most 27) to a ray.
    pub fn from_scaled(value: U256, decimals: u32) -> Result<Self, PlasmaError> {
        let factor = scale_gap(decimals)?;
        value
            .checked_mul(factor)
            .map(Ray)
            .ok_or_else(|| PlasmaError::Arithmetic(format!("{} overflows ray", value)))
    }

    /// Convert to an amount carried with `decimals` digits, truncating toward zero.
    pub fn to_scaled(self, decimals: u32) -> Result<U256, PlasmaError> {
        Ok(self.0 / scale_gap(decimals)?)
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    /// Checked addition.
    ///
    /// # Errors
    /// Returns `PlasmaError::Arithmetic` on overflow.
    pub fn checked_add(self, rhs: Ray) -> Result<Ray, PlasmaError> {
        self.0
            .checked_add(rhs.0)
            .map(Ray)
            .ok_or_else(|| PlasmaError::Arithmetic(format!("{} + {} overflows", self, rhs)))
    }

    /// Checked subtraction.
    ///
    /// # Errors
    /// Returns `PlasmaError::Arithmetic` if `rhs > self`.
    pub fn checked_sub(self, rhs: Ray) -> Result<Ray, PlasmaError> {
        self.0
            .checked_sub(rhs.0)
            .map(Ray)
            .ok_or_else(|| PlasmaError::Arithmetic(format!("{} - {} underflows", self, rhs)))
    }

    pub fn saturating_sub(self, rhs: Ray) -> Ray {
        Ray(self.0.saturating_sub(rhs.0))
    }

    /// Multiply by a plain integer (e.g. seigniorage per block times blocks).
    pub fn mul_int(self, n: u64) -> Result<Ray, PlasmaError> {
        self.0
            .checked_mul(U256::from(n))
            .map(Ray)
            .ok_or_else(|| PlasmaError::Arithmetic(format!("{} * {} overflows", self, n)))
    }

    /// `self * rhs / RAY`, truncated toward zero.
    pub fn rmul(self, rhs: Ray) -> Result<Ray, PlasmaError> {
        narrow(self.0.full_mul(rhs.0) / U512::from(RAY))
    }

    /// `self * RAY / rhs`, truncated toward zero.
    ///
    /// # Errors
    /// Returns `PlasmaError::Arithmetic` on division by zero or overflow.
    pub fn rdiv(self, rhs: Ray) -> Result<Ray, PlasmaError> {
        if rhs.is_zero() {
            return Err(PlasmaError::Arithmetic(format!("{} / 0", self)));
        }
        narrow(self.0.full_mul(RAY) / U512::from(rhs.0))
    }

    /// `self * RAY / rhs`, rounded up.
    pub fn rdiv_up(self, rhs: Ray) -> Result<Ray, PlasmaError> {
        if rhs.is_zero() {
            return Err(PlasmaError::Arithmetic(format!("{} / 0", self)));
        }
        let numerator = self.0.full_mul(RAY);
        let denominator = U512::from(rhs.0);
        let mut quotient = numerator / denominator;
        if !(numerator % denominator).is_zero() {
            quotient += U512::one();
        }
        narrow(quotient)
    }

    /// `self * numerator / denominator` with a single truncation.
    pub fn mul_div(self, numerator: Ray, denominator: Ray) -> Result<Ray, PlasmaError> {
        if denominator.is_zero() {
            return Err(PlasmaError::Arithmetic(format!(
                "{} * {} / 0",
                self, numerator
            )));
        }
        narrow(self.0.full_mul(numerator.0) / U512::from(denominator.0))
    }
}

fn narrow(value: U512) -> Result<Ray, PlasmaError> {
    U256::try_from(value)
        .map(Ray)
        .map_err(|_| PlasmaError::Arithmetic("result exceeds 256 bits".to_string()))
}

fn scale_gap(decimals: u32) -> Result<U256, PlasmaError> {
    if decimals > RAY_DECIMALS {
        return Err(PlasmaError::Arithmetic(format!(
            "cannot represent {} decimals in a ray",
            decimals
        )));
    }
    Ok(U256::exp10((RAY_DECIMALS - decimals) as usize))
}

impl fmt::Display for Ray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let int = self.0 / RAY;
        let frac = self.0 % RAY;
        if frac.is_zero() {
            return write!(f, "{}", int);
        }
        let digits = format!("{:0>27}", frac.to_string());
        write!(f, "{}.{}", int, digits.trim_end_matches('0'))
    }
}

impl FromStr for Ray {
    type Err = PlasmaError;

    /// Parse a decimal literal such as `"100"` or `"3.91615931"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || PlasmaError::Serialization(format!("invalid decimal amount {:?}", s));
        let s = s.trim();
        let (int_part, frac_part) = s.split_once('.').unwrap_or((s, ""));
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid());
        }
        let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if !all_digits(int_part) || !all_digits(frac_part) {
            return Err(invalid());
        }
        if frac_part.len() > RAY_DECIMALS as usize {
            return Err(invalid());
        }

        let int = if int_part.is_empty() {
            U256::zero()
        } else {
            U256::from_dec_str(int_part).map_err(|_| invalid())?
        };
        let frac = if frac_part.is_empty() {
            U256::zero()
        } else {
            let padded = format!("{:0<27}", frac_part);
            U256::from_dec_str(&padded).map_err(|_| invalid())?
        };

        int.checked_mul(RAY)
            .and_then(|v| v.checked_add(frac))
            .map(Ray)
            .ok_or_else(invalid)
    }
}

impl Serialize for Ray {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Ray {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ray(s: &str) -> Ray {
        s.parse().unwrap()
    }

    #[test]
    fn test_constants() {
        assert_eq!(RAY, U256::exp10(27));
        assert_eq!(WAD, U256::exp10(18));
        assert_eq!(Ray::ONE, Ray::from_units(1));
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!(ray("3.91615931").to_string(), "3.91615931");
        assert_eq!(ray("100").to_string(), "100");
        assert_eq!(ray(".5").to_string(), "0.5");
        assert_eq!(Ray::ZERO.to_string(), "0");
        assert_eq!(Ray::from_raw(U256::one()).to_string(), "0.000000000000000000000000001");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("".parse::<Ray>().is_err());
        assert!(".".parse::<Ray>().is_err());
        assert!("1.2.3".parse::<Ray>().is_err());
        assert!("-1".parse::<Ray>().is_err());
        assert!("0.0000000000000000000000000001".parse::<Ray>().is_err());
    }

    #[test]
    fn test_rmul_truncates() {
        assert_eq!(ray("1.5").rmul(ray("2")).unwrap(), ray("3"));
        // 1e-27 * 0.5 truncates to zero.
        let tiny = Ray::from_raw(U256::one());
        assert_eq!(tiny.rmul(ray("0.5")).unwrap(), Ray::ZERO);
    }

    #[test]
    fn test_rdiv_truncates() {
        assert_eq!(ray("3").rdiv(ray("2")).unwrap(), ray("1.5"));
        let third = Ray::ONE.rdiv(ray("3")).unwrap();
        assert_eq!(third.to_string(), "0.333333333333333333333333333");
        assert!(Ray::ONE.rdiv(Ray::ZERO).is_err());
    }

    #[test]
    fn test_rdiv_up_rounds_up() {
        let third = Ray::ONE.rdiv_up(ray("3")).unwrap();
        assert_eq!(third.to_string(), "0.333333333333333333333333334");
        assert_eq!(ray("3").rdiv_up(ray("2")).unwrap(), ray("1.5"));
    }

    #[test]
    fn test_mul_div_single_truncation() {
        let v = ray("100").mul_div(ray("200"), ray("100")).unwrap();
        assert_eq!(v, ray("200"));
        let v = ray("10").mul_div(ray("1"), ray("3")).unwrap();
        assert_eq!(v.to_string(), "3.333333333333333333333333333");
    }

    #[test]
    fn test_wad_conversion_truncates() {
        let one_wad = WAD;
        assert_eq!(Ray::from_wad(one_wad).unwrap(), Ray::ONE);
        let odd = ray("1.0000000000000000009");
        assert_eq!(odd.to_wad(), WAD);
        assert_eq!(Ray::from_scaled(U256::from(150u64), 2).unwrap(), ray("1.5"));
        assert_eq!(ray("1.239").to_scaled(2).unwrap(), U256::from(123u64));
        assert!(Ray::ONE.to_scaled(28).is_err());
    }

    #[test]
    fn test_checked_sub_underflow() {
        assert!(ray("1").checked_sub(ray("2")).is_err());
        assert_eq!(ray("1").saturating_sub(ray("2")), Ray::ZERO);
        assert_eq!(ray("2").checked_sub(ray("0.5")).unwrap(), ray("1.5"));
    }

    #[test]
    fn test_serde_as_decimal_string() {
        let json = serde_json::to_string(&ray("3.91615931")).unwrap();
        assert_eq!(json, "\"3.91615931\"");
        let back: Ray = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ray("3.91615931"));
    }
}
