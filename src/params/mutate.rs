use super::{ParamValue, ParameterVector};
use rand::Rng;
use strum_macros::{Display, EnumString};

/// What to do when a perturbation comes out as exactly zero (the base value is 0,
/// or the drawn percentage is exactly 0).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum ZeroDeltaPolicy {
    /// Leave the value alone.
    #[default]
    Keep,
    /// Move by one step in a random direction.
    RandomSign,
}

/// The subset of parameters a run is allowed to touch.
#[derive(Debug, Clone)]
pub struct MutationPlan {
    names: Vec<String>,
    zero_delta: ZeroDeltaPolicy,
}

impl MutationPlan {
    pub fn new(names: Vec<String>, zero_delta: ZeroDeltaPolicy) -> Self {
        Self { names, zero_delta }
    }

    pub fn all(base: &ParameterVector, zero_delta: ZeroDeltaPolicy) -> Self {
        Self::new(base.names(), zero_delta)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    // A scalar is picked with probability 1/ceil(n/5), each table entry with 1/ceil(n/3)
    fn scalar_odds(&self) -> u32 {
        (self.names.len() as u32).div_ceil(5).max(1)
    }

    fn table_odds(&self) -> u32 {
        (self.names.len() as u32).div_ceil(3).max(1)
    }

    /// Returns a perturbed copy of `base`. `noise` is the maximum relative change.
    pub fn mutate<R: Rng>(
        &self,
        base: &ParameterVector,
        noise: f64,
        rng: &mut R,
    ) -> ParameterVector {
        let mut candidate = base.clone();
        let scalar_odds = self.scalar_odds();
        let table_odds = self.table_odds();

        for name in &self.names {
            let Some(value) = candidate.get_mut(name) else {
                continue;
            };

            match value {
                ParamValue::Table(entries) => {
                    for entry in entries.iter_mut() {
                        if rng.random_range(1..=table_odds) == 1 {
                            *entry += self.delta(*entry, noise, rng);
                        }
                    }
                }
                ParamValue::Scalar(scalar) => {
                    if rng.random_range(1..=scalar_odds) == 1 {
                        *scalar = (*scalar + self.delta(*scalar, noise, rng)).max(0);
                    }
                }
            }
        }

        candidate
    }

    fn delta<R: Rng>(&self, value: i64, noise: f64, rng: &mut R) -> i64 {
        let percent = rng.random_range(-noise..=noise);
        let raw = value as f64 * percent;

        match round_away(raw) {
            0 => match self.zero_delta {
                ZeroDeltaPolicy::Keep => 0,
                ZeroDeltaPolicy::RandomSign => {
                    if rng.random_bool(0.5) {
                        1
                    } else {
                        -1
                    }
                }
            },
            delta => delta,
        }
    }
}

/// Rounds to the nearest integer, but never to zero unless `x` is zero.
pub fn round_away(x: f64) -> i64 {
    if x > 0.0 {
        (x.round() as i64).max(1)
    } else if x < 0.0 {
        (x.round() as i64).min(-1)
    } else {
        0
    }
}
