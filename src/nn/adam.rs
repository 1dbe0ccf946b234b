//! Adam optimizer (Kingma & Ba, 2015).
//!
//! Update rule:
//! ```text
//! m_t = β₁ * m_{t-1} + (1 - β₁) * grad
//! v_t = β₂ * v_{t-1} + (1 - β₂) * grad²
//! m̂_t = m_t / (1 - β₁ᵗ)
//! v̂_t = v_t / (1 - β₂ᵗ)
//! param = param - lr * m̂_t / (√v̂_t + ε)
//! ```

use crate::error::{FarmacoError, Result};

/// Adam state for one parameter buffer.
///
/// The training loop holds one `Adam` per weight or bias buffer and calls
/// [`step`](Self::step) once per minibatch.
#[derive(Debug, Clone)]
pub struct Adam {
    lr: f32,
    beta1: f32,
    beta2: f32,
    eps: f32,
    /// First moment estimates, lazily sized on the first step.
    m: Vec<f32>,
    /// Second moment estimates.
    v: Vec<f32>,
    /// Steps taken, for bias correction.
    t: usize,
}

impl Adam {
    /// Creates an optimizer with default betas (0.9, 0.999) and ε = 1e-8.
    #[must_use]
    pub fn new(lr: f32) -> Self {
        Self {
            lr,
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
            m: Vec::new(),
            v: Vec::new(),
            t: 0,
        }
    }

    /// Overrides the beta parameters.
    #[must_use]
    pub fn betas(mut self, beta1: f32, beta2: f32) -> Self {
        self.beta1 = beta1;
        self.beta2 = beta2;
        self
    }

    /// Current learning rate.
    #[must_use]
    pub fn lr(&self) -> f32 {
        self.lr
    }

    /// Applies one update to `params` in place.
    ///
    /// # Errors
    ///
    /// Returns an error if `gradients` and `params` differ in length, or
    /// if the buffer length changes between steps.
    pub fn step(&mut self, params: &mut [f32], gradients: &[f32]) -> Result<()> {
        if params.len() != gradients.len() {
            return Err(FarmacoError::DimensionMismatch {
                expected: format!("{} gradients", params.len()),
                actual: format!("{} gradients", gradients.len()),
            });
        }
        if self.t == 0 {
            self.m = vec![0.0; params.len()];
            self.v = vec![0.0; params.len()];
        } else if self.m.len() != params.len() {
            return Err(FarmacoError::DimensionMismatch {
                expected: format!("{} parameters", self.m.len()),
                actual: format!("{} parameters", params.len()),
            });
        }

        self.t += 1;
        let bias_correction1 = 1.0 - self.beta1.powi(self.t as i32);
        let bias_correction2 = 1.0 - self.beta2.powi(self.t as i32);

        for i in 0..params.len() {
            let g = gradients[i];
            self.m[i] = self.beta1 * self.m[i] + (1.0 - self.beta1) * g;
            self.v[i] = self.beta2 * self.v[i] + (1.0 - self.beta2) * g * g;
            let m_hat = self.m[i] / bias_correction1;
            let v_hat = self.v[i] / bias_correction2;
            params[i] -= self.lr * m_hat / (v_hat.sqrt() + self.eps);
        }
        Ok(())
    }
}
