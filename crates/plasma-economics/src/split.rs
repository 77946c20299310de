// crates/plasma-economics/src/split.rs
//
// How one round of seigniorage is divided.
//
// For `max_seig = seig_per_block * blocks`:
//   1. staked_seig   = max_seig * tot_supply / total_token_supply
//   2. pseig         = (max_seig - staked_seig) * relative_seig_rate
//   3. unstaked_seig = max_seig - staked_seig - pseig
//   4. powerton_seig = unstaked_seig * powerton_seig_rate
//      dao_seig      = unstaked_seig * dao_seig_rate
//
// staked_seig and pseig grow `tot`; the pool shares are minted directly.
// Whatever is left of unstaked_seig is never minted.

use serde::{Deserialize, Serialize};

use plasma_core::{PlasmaError, Ray};

/// Configured fractions (each in [0, 1]) of the seigniorage split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeigRates {
    pub powerton: Ray,
    pub dao: Ray,
    pub relative: Ray,
}

impl SeigRates {
    /// Everything unstaked goes to PowerTON.
    pub fn powerton_only() -> Self {
        Self {
            powerton: Ray::ONE,
            dao: Ray::ZERO,
            relative: Ray::ZERO,
        }
    }

    /// # Errors
    /// Returns `PlasmaError::Config` if a rate exceeds 1 or the pool rates
    /// together exceed 1.
    pub fn validate(&self) -> Result<(), PlasmaError> {
        for (name, rate) in [
            ("powerton_seig_rate", self.powerton),
            ("dao_seig_rate", self.dao),
            ("relative_seig_rate", self.relative),
        ] {
            if rate > Ray::ONE {
                return Err(PlasmaError::Config(format!("{} {} exceeds 1", name, rate)));
            }
        }
        if self.powerton.checked_add(self.dao)? > Ray::ONE {
            return Err(PlasmaError::Config(format!(
                "powerton_seig_rate {} plus dao_seig_rate {} exceeds 1",
                self.powerton, self.dao
            )));
        }
        Ok(())
    }
}

/// The result of dividing one round of seigniorage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeigSplit {
    pub total_seig: Ray,
    pub staked_seig: Ray,
    pub pseig: Ray,
    pub unstaked_seig: Ray,
    pub powerton_seig: Ray,
    pub dao_seig: Ray,
}

impl SeigSplit {
    /// The amount by which `tot` grows.
    pub fn tot_growth(&self) -> Result<Ray, PlasmaError> {
        self.staked_seig.checked_add(self.pseig)
    }
}

/// Divide `max_seig` between stakers and the reward pools.
///
/// When all supply is staked (or the supply figure lags behind `tot`), every
/// unit of `max_seig` goes to stakers.
pub fn compute_split(
    max_seig: Ray,
    tot_supply: Ray,
    total_token_supply: Ray,
    rates: &SeigRates,
) -> Result<SeigSplit, PlasmaError> {
    let staked_seig = if tot_supply >= total_token_supply {
        max_seig
    } else {
        max_seig.mul_div(tot_supply, total_token_supply)?
    };
    let pseig = max_seig.checked_sub(staked_seig)?.rmul(rates.relative)?;
    let unstaked_seig = max_seig.checked_sub(staked_seig)?.checked_sub(pseig)?;
    Ok(SeigSplit {
        total_seig: max_seig,
        staked_seig,
        pseig,
        unstaked_seig,
        powerton_seig: unstaked_seig.rmul(rates.powerton)?,
        dao_seig: unstaked_seig.rmul(rates.dao)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ray(s: &str) -> Ray {
        s.parse().unwrap()
    }

    #[test]
    fn test_fully_staked_supply() {
        let split = compute_split(
            Ray::from_units(100),
            Ray::from_units(400),
            Ray::from_units(400),
            &SeigRates::powerton_only(),
        )
        .unwrap();
        assert_eq!(split.staked_seig, Ray::from_units(100));
        assert!(split.unstaked_seig.is_zero());
        assert!(split.powerton_seig.is_zero());
    }

    #[test]
    fn test_partially_staked_supply() {
        // 400 of 10000 staked: 4% of seigniorage to stakers.
        let split = compute_split(
            Ray::from_units(100),
            Ray::from_units(400),
            Ray::from_units(10_000),
            &SeigRates::powerton_only(),
        )
        .unwrap();
        assert_eq!(split.staked_seig, Ray::from_units(4));
        assert_eq!(split.unstaked_seig, Ray::from_units(96));
        assert_eq!(split.powerton_seig, Ray::from_units(96));
        assert!(split.dao_seig.is_zero());
        assert_eq!(split.tot_growth().unwrap(), Ray::from_units(4));
    }

    #[test]
    fn test_relative_and_dao_rates() {
        let rates = SeigRates {
            powerton: ray("0.5"),
            dao: ray("0.25"),
            relative: ray("0.2"),
        };
        let split = compute_split(
            Ray::from_units(100),
            Ray::from_units(50),
            Ray::from_units(100),
            &rates,
        )
        .unwrap();
        assert_eq!(split.staked_seig, Ray::from_units(50));
        assert_eq!(split.pseig, Ray::from_units(10));
        assert_eq!(split.unstaked_seig, Ray::from_units(40));
        assert_eq!(split.powerton_seig, Ray::from_units(20));
        assert_eq!(split.dao_seig, Ray::from_units(10));
        assert_eq!(split.tot_growth().unwrap(), Ray::from_units(60));
    }

    #[test]
    fn test_rates_validation() {
        assert!(SeigRates::powerton_only().validate().is_ok());
        let too_much = SeigRates {
            powerton: ray("0.7"),
            dao: ray("0.4"),
            relative: Ray::ZERO,
        };
        assert!(matches!(too_much.validate(), Err(PlasmaError::Config(_))));
        let over_one = SeigRates {
            powerton: Ray::ZERO,
            dao: Ray::ZERO,
            relative: ray("1.5"),
        };
        assert!(over_one.validate().is_err());
    }
}
