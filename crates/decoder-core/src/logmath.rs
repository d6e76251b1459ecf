//! Log-domain arithmetic in a configurable base.
//!
//! Every score in the decoder is a logarithm in the base held by a
//! `LogMath` value. The value is passed around explicitly; there is no
//! process-wide instance.

use crate::settings::Settings;

/// The log of zero probability. Adding anything to it stays at zero.
pub const LOG_ZERO: f32 = -f32::MAX;
/// The log of probability one.
pub const LOG_ONE: f32 = 0.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogMath {
    log_base: f64,
    ln_base: f64,
}

impl Default for LogMath {
    fn default() -> Self {
        Self::natural()
    }
}

impl LogMath {
    /// Create a log math context for `log_base`, which must exceed 1.
    pub fn new(log_base: f64) -> Self {
        debug_assert!(log_base > 1.0, "log base must exceed 1, got {log_base}");
        Self {
            log_base,
            ln_base: log_base.ln(),
        }
    }

    /// Natural logarithms.
    pub fn natural() -> Self {
        Self::new(std::f64::consts::E)
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.log_math.log_base)
    }

    pub fn log_base(&self) -> f64 {
        self.log_base
    }

    pub fn linear_to_log(&self, linear: f64) -> f32 {
        if linear <= 0.0 {
            return LOG_ZERO;
        }
        let log = linear.ln() / self.ln_base;
        if log <= LOG_ZERO as f64 {
            LOG_ZERO
        } else {
            log as f32
        }
    }

    pub fn log_to_linear(&self, log: f32) -> f64 {
        if log <= LOG_ZERO {
            return 0.0;
        }
        (log as f64 * self.ln_base).exp()
    }

    /// Convert a natural log value into this base.
    pub fn ln_to_log(&self, ln: f64) -> f32 {
        if ln == f64::NEG_INFINITY {
            return LOG_ZERO;
        }
        (ln / self.ln_base).max(LOG_ZERO as f64) as f32
    }

    /// `log(b^a + b^b)`: the log of the sum of two linear values.
    pub fn add_as_linear(&self, a: f32, b: f32) -> f32 {
        let (hi, lo) = if a >= b { (a, b) } else { (b, a) };
        if lo <= LOG_ZERO {
            return hi;
        }
        let diff = (lo as f64 - hi as f64) * self.ln_base;
        hi + (diff.exp().ln_1p() / self.ln_base) as f32
    }
}

/// `a + b` in the log domain, pinned at `LOG_ZERO` instead of overflowing.
pub fn log_mul(a: f32, b: f32) -> f32 {
    if a <= LOG_ZERO || b <= LOG_ZERO {
        LOG_ZERO
    } else {
        (a + b).max(LOG_ZERO)
    }
}
