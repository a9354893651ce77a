//! RNG stream and simulation contexts (spec.md §4.A).

pub mod context;

pub use context::{EthnicityClassification, ImmutableContext, MutableContext};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use std::f64::consts::PI;

/// A single logical RNG stream, seedable and resettable so simulation runs
/// are reproducible given a fixed seed (spec.md §4.A, §5 "shared resource
/// policy"). The teacher threads `&mut dyn rand::RngCore` through its
/// systems (see `model/population.rs::stochastic_round`); we keep that
/// plain-`rand` idiom rather than a templated RNG type parameter.
#[derive(Debug, Clone)]
pub struct SimRng {
    seed: u64,
    draws: u64,
    rng: SmallRng,
    #[cfg(test)]
    fixed_stream: Option<std::collections::VecDeque<f64>>,
}

impl SimRng {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            draws: 0,
            rng: SmallRng::seed_from_u64(seed),
            #[cfg(test)]
            fixed_stream: None,
        }
    }

    /// Test-only seam: replays `values` for `next_uniform` instead of
    /// drawing from the underlying RNG, so scenario tests can pin an
    /// exact u-stream (spec.md's scenarios give concrete `u` sequences).
    #[cfg(test)]
    pub fn set_stream(&mut self, values: Vec<f64>) {
        self.fixed_stream = Some(values.into());
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Number of draws issued since the last `reset`. Exposed for tests
    /// that want to assert on stream position rather than reconstruct it.
    pub fn draws(&self) -> u64 {
        self.draws
    }

    /// Reinitialize the stream from its original seed.
    pub fn reset(&mut self) {
        self.rng = SmallRng::seed_from_u64(self.seed);
        self.draws = 0;
    }

    /// Advance the stream by `n` draws without using the values.
    pub fn skip(&mut self, n: u64) {
        for _ in 0..n {
            self.next_uniform();
        }
    }

    /// Uniform draw in `[0, 1)`.
    pub fn next_uniform(&mut self) -> f64 {
        self.draws += 1;
        #[cfg(test)]
        if let Some(stream) = self.fixed_stream.as_mut() {
            return stream.pop_front().expect("SimRng: fixed stream exhausted");
        }
        self.rng.random::<f64>()
    }

    /// Uniform integer draw in `[0, n]` (inclusive, per spec.md §4.A).
    pub fn next_uniform_int(&mut self, n: u64) -> u64 {
        self.draws += 1;
        self.rng.random_range(0..=n)
    }

    /// Standard-normal draw, `N(0, 1)`.
    pub fn next_gaussian(&mut self) -> f64 {
        self.draws += 1;
        self.rng.sample(StandardNormal)
    }

    /// Symmetric alpha-stable draw for `alpha` in `(0, 2]`, via the
    /// Chambers-Mallows-Stuck method (`alpha = 2` degenerates to a scaled
    /// Gaussian; spec.md §4.A requires this for heavy-tailed trait
    /// dynamics the original's `core/rng.hpp` drives hazard/increment
    /// noise with).
    pub fn next_alpha_stable(&mut self, alpha: f64) -> f64 {
        assert!(
            alpha > 0.0 && alpha <= 2.0,
            "next_alpha_stable: alpha {alpha} must be in (0, 2]"
        );
        let theta = (self.next_uniform() - 0.5) * PI;
        let w = -self.next_uniform().ln().max(f64::MIN_POSITIVE.ln());
        if (alpha - 1.0).abs() < 1e-12 {
            let half_pi = PI / 2.0;
            (2.0 / PI) * ((half_pi + theta) * theta.tan() - (w * theta.cos() / (half_pi + theta)).ln())
        } else {
            let num = (alpha * theta).sin();
            let denom = theta.cos().powf(1.0 / alpha);
            let factor = (theta - alpha * theta).cos() / w;
            num / denom * factor.powf((1.0 - alpha) / alpha)
        }
    }

    /// Stochastic rounding: a fractional `exact` in `(0, 1)` rounds to 1
    /// with probability `exact`, else 0; `exact <= 0` rounds to 0;
    /// anything else rounds normally. Avoids systematic bias when
    /// repeatedly rounding small expected counts (spec.md §4.F's
    /// migration `Δx`; mirrors `model/population.rs::stochastic_round`).
    pub fn stochastic_round(&mut self, exact: f64) -> u64 {
        if exact <= 0.0 {
            0
        } else if exact < 1.0 {
            if self.next_uniform() < exact {
                1
            } else {
                0
            }
        } else {
            exact.round() as u64
        }
    }

    /// Draw a vector of correlated Gaussians given a mixing (e.g. Cholesky
    /// factor of a covariance/correlation matrix) matrix in row-major
    /// form: `result[i] = sum_j mixing[i][j] * z_j` for iid standard
    /// normal `z` (spec.md §4.A "correlated-Gaussian draws given a mixing
    /// matrix"; used by `operator::inheritance`'s Gaussian copula).
    pub fn next_correlated_gaussian(&mut self, mixing: &[Vec<f64>]) -> Vec<f64> {
        let dim = mixing.first().map_or(0, Vec::len);
        let z: Vec<f64> = (0..dim).map(|_| self.next_gaussian()).collect();
        mixing
            .iter()
            .map(|row| row.iter().zip(&z).map(|(m, zi)| m * zi).sum())
            .collect()
    }
}
