//! Variable-step embedded Runge-Kutta integrator core.
//!
//! The integrator owns its integration state: it advances one adaptive step
//! at a time, keeps a one-level rollback snapshot of the most recent accepted
//! step, and can drive itself to a target value of the independent variable.
//! Step acceptance uses the embedded pair of the supplied coefficient set:
//! both candidate solutions are formed from the same stage derivatives and
//! their scaled difference, reduced with the maximum norm, decides whether
//! the step is kept or shrunk and retried.
//!
//! Reference: Hairer, Nørsett & Wanner, "Solving Ordinary Differential
//! Equations I", Springer, ch. II.4 (step-size control).

use thiserror::Error;

use crate::coefficients::ButcherTableau;
use crate::state::OdeState;

/// State derivative of an ODE system: `dy/dt = f(t, y)`.
///
/// The function must be pure: it may be called several times per step with
/// different stage arguments and again across retries with different step
/// sizes, in no particular order. Any `Fn(f64, &S) -> S` closure qualifies
/// through the blanket implementation.
pub trait StateDerivative<S: OdeState> {
    /// Evaluate the derivative at independent variable `t` and state `y`.
    fn evaluate(&self, t: f64, y: &S) -> S;
}

impl<S, F> StateDerivative<S> for F
where
    S: OdeState,
    F: Fn(f64, &S) -> S,
{
    fn evaluate(&self, t: f64, y: &S) -> S {
        self(t, y)
    }
}

/// Errors surfaced by the integrator.
///
/// All errors are returned synchronously to the caller of the operation that
/// detected them; the integrator performs no suppression or retry beyond the
/// documented step-shrinking loop.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IntegratorError {
    /// Invalid construction or call parameters.
    #[error("invalid configuration: {message}")]
    InvalidConfiguration {
        /// Description of the offending parameter.
        message: String,
    },
    /// Satisfying the error tolerance would require a step magnitude below
    /// the configured minimum. The integrator state is unchanged; the caller
    /// may loosen the tolerances or lower the minimum and retry.
    #[error("minimum step size {minimum_step_size} exceeded at t = {independent_variable}")]
    MinimumStepSizeExceeded {
        /// The configured minimum step size.
        minimum_step_size: f64,
        /// Independent variable at which the attempt was abandoned.
        independent_variable: f64,
    },
    /// The drive-to-target loop exceeded its step budget.
    #[error("maximum number of integration steps exceeded")]
    MaximumStepsExceeded,
    /// A non-finite state component was produced during integration.
    #[error("non-finite state detected at t = {independent_variable}")]
    NonFiniteState {
        /// Independent variable at which the non-finite state appeared.
        independent_variable: f64,
    },
}

/// Outcome of a single accepted integration step.
#[derive(Debug, Clone, Copy)]
pub struct StepResult {
    /// Signed step size actually taken.
    pub step_taken: f64,
    /// Recommended (signed) step size for the next attempt, clamped to the
    /// configured step bounds.
    pub next_step_size: f64,
    /// Normalized error estimate of the accepted step (at most 1.0).
    pub error: f64,
}

/// Integration statistics for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    /// Total number of derivative evaluations.
    pub function_evaluations: u64,
    /// Number of accepted steps.
    pub accepted_steps: u64,
    /// Number of rejected step attempts.
    pub rejected_steps: u64,
}

/// Step-size controller using an I-controller
///
/// h_new = safety * h * error^(-1/(p+1))
/// where p is the order of the embedded lower-order formula.
#[derive(Debug, Clone, Copy)]
struct StepController {
    /// Safety factor (0.8-0.9 typical)
    safety: f64,
    /// Maximum growth factor per step
    max_factor: f64,
    /// Minimum reduction factor per step
    min_factor: f64,
    /// Exponent = 1/(lower_order + 1)
    exponent: f64,
}

impl StepController {
    fn for_lower_order(lower_order: u8) -> Self {
        Self {
            safety: 0.9,
            max_factor: 5.0,
            min_factor: 0.2,
            exponent: 1.0 / (f64::from(lower_order) + 1.0),
        }
    }

    /// Compute the step size adjustment factor
    fn factor(&self, error: f64) -> f64 {
        if error == 0.0 {
            return self.max_factor;
        }
        if !error.is_finite() {
            // A wild stage evaluation can poison the estimate; shrink hard so
            // the retry loop still terminates at the minimum-step floor.
            return self.min_factor;
        }
        (self.safety * error.powf(-self.exponent)).clamp(self.min_factor, self.max_factor)
    }
}

/// Variable-step embedded Runge-Kutta integrator.
///
/// Generic over the state container `S` (see [`OdeState`]) and the derivative
/// function `F` (see [`StateDerivative`]). The integrator borrows its
/// coefficient set read-only for its whole lifetime.
///
/// # Example
/// ```
/// use nalgebra::Vector2;
/// use rkvar::{coefficients, VariableStepIntegrator};
///
/// // Harmonic oscillator: y'' + y = 0, state [y, y']
/// let derivative = |_t: f64, y: &Vector2<f64>| Vector2::new(y[1], -y[0]);
///
/// let mut integrator = VariableStepIntegrator::new(
///     &coefficients::RKF78,
///     derivative,
///     0.0,
///     Vector2::new(1.0, 0.0),
///     0.1,            // initial step-size guess
///     f64::INFINITY,  // maximum step size
///     1e-12,          // relative tolerance
///     1e-12,          // absolute tolerance
/// )
/// .unwrap();
///
/// let period = 2.0 * std::f64::consts::PI;
/// integrator.integrate_to(period, 0.1).unwrap();
/// assert!((integrator.current_state()[0] - 1.0).abs() < 1e-9);
/// ```
pub struct VariableStepIntegrator<'a, S, F>
where
    S: OdeState,
    F: StateDerivative<S>,
{
    /// Coefficient set, borrowed read-only.
    tableau: &'a ButcherTableau,
    /// Caller-supplied derivative function.
    derivative: F,
    current_independent_variable: f64,
    current_state: S,
    /// Snapshot taken immediately before the last accepted step. Before the
    /// first step it holds the initial condition.
    previous_independent_variable: f64,
    previous_state: S,
    /// Signed magnitude of the most recently accepted step; 0.0 before the
    /// first step.
    last_step_size: f64,
    /// Recommended (signed) step size for the next attempt.
    next_step_size: f64,
    minimum_step_size: f64,
    maximum_step_size: f64,
    relative_tolerance: f64,
    absolute_tolerance: f64,
    controller: StepController,
    /// Step budget for `integrate_to`.
    max_steps: u64,
    /// Stage derivatives (reused workspace).
    stages: Vec<S>,
    /// Integration statistics.
    pub stats: Stats,
}

impl<'a, S, F> VariableStepIntegrator<'a, S, F>
where
    S: OdeState,
    F: StateDerivative<S>,
{
    /// Create an integrator with a defaulted minimum step size.
    ///
    /// The minimum defaults to a small multiple of machine epsilon scaled by
    /// the magnitude of the initial independent variable. See
    /// [`with_minimum_step_size`](Self::with_minimum_step_size) for the full
    /// parameter list and validation rules.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tableau: &'a ButcherTableau,
        derivative: F,
        initial_independent_variable: f64,
        initial_state: S,
        initial_step_size: f64,
        maximum_step_size: f64,
        relative_tolerance: f64,
        absolute_tolerance: f64,
    ) -> Result<Self, IntegratorError> {
        let minimum = 16.0 * f64::EPSILON * initial_independent_variable.abs().max(1.0);
        Self::with_minimum_step_size(
            tableau,
            derivative,
            initial_independent_variable,
            initial_state,
            initial_step_size,
            minimum,
            maximum_step_size,
            relative_tolerance,
            absolute_tolerance,
        )
    }

    /// Create an integrator with an explicit minimum step size.
    ///
    /// # Errors
    /// Returns [`IntegratorError::InvalidConfiguration`] when the minimum
    /// step is not positive and finite, the maximum step is smaller than the
    /// minimum, a tolerance is negative or non-finite, the initial condition
    /// or step guess is non-finite, the step guess is zero, or the tableau
    /// fails its consistency check.
    #[allow(clippy::too_many_arguments)]
    pub fn with_minimum_step_size(
        tableau: &'a ButcherTableau,
        derivative: F,
        initial_independent_variable: f64,
        initial_state: S,
        initial_step_size: f64,
        minimum_step_size: f64,
        maximum_step_size: f64,
        relative_tolerance: f64,
        absolute_tolerance: f64,
    ) -> Result<Self, IntegratorError> {
        tableau
            .validate()
            .map_err(|message| IntegratorError::InvalidConfiguration { message })?;
        if !minimum_step_size.is_finite() || minimum_step_size <= 0.0 {
            return Err(invalid_configuration(format!(
                "minimum step size must be positive and finite, got {}",
                minimum_step_size
            )));
        }
        if maximum_step_size.is_nan() || maximum_step_size < minimum_step_size {
            return Err(invalid_configuration(format!(
                "maximum step size {} must be at least the minimum step size {}",
                maximum_step_size, minimum_step_size
            )));
        }
        for (value, label) in [
            (relative_tolerance, "relative tolerance"),
            (absolute_tolerance, "absolute tolerance"),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(invalid_configuration(format!(
                    "{} must be non-negative and finite, got {}",
                    label, value
                )));
            }
        }
        if !initial_independent_variable.is_finite() {
            return Err(invalid_configuration(
                "initial independent variable must be finite".to_string(),
            ));
        }
        if !initial_state.is_finite() {
            return Err(invalid_configuration(
                "initial state must be finite".to_string(),
            ));
        }
        if !initial_step_size.is_finite() || initial_step_size == 0.0 {
            return Err(invalid_configuration(format!(
                "initial step size must be non-zero and finite, got {}",
                initial_step_size
            )));
        }

        let controller = StepController::for_lower_order(tableau.lower_order);
        Ok(Self {
            tableau,
            derivative,
            current_independent_variable: initial_independent_variable,
            current_state: initial_state.clone(),
            previous_independent_variable: initial_independent_variable,
            previous_state: initial_state,
            last_step_size: 0.0,
            next_step_size: initial_step_size,
            minimum_step_size,
            maximum_step_size,
            relative_tolerance,
            absolute_tolerance,
            controller,
            max_steps: 10_000_000,
            stages: Vec::with_capacity(tableau.stages),
            stats: Stats::default(),
        })
    }

    /// Current value of the independent variable.
    pub fn current_independent_variable(&self) -> f64 {
        self.current_independent_variable
    }

    /// Current state.
    pub fn current_state(&self) -> &S {
        &self.current_state
    }

    /// Independent variable of the rollback snapshot.
    pub fn previous_independent_variable(&self) -> f64 {
        self.previous_independent_variable
    }

    /// State of the rollback snapshot.
    pub fn previous_state(&self) -> &S {
        &self.previous_state
    }

    /// Signed size of the most recently accepted step, or 0.0 before the
    /// first step.
    pub fn last_step_size(&self) -> f64 {
        self.last_step_size
    }

    /// Recommended (signed) step size for the next attempt.
    pub fn next_step_size(&self) -> f64 {
        self.next_step_size
    }

    /// Configured minimum step magnitude.
    pub fn minimum_step_size(&self) -> f64 {
        self.minimum_step_size
    }

    /// Configured maximum step magnitude.
    pub fn maximum_step_size(&self) -> f64 {
        self.maximum_step_size
    }

    /// Replace the step budget of [`integrate_to`](Self::integrate_to).
    pub fn set_max_steps(&mut self, max_steps: u64) {
        self.max_steps = max_steps;
    }

    /// Reset the diagnostic counters.
    pub fn reset_stats(&mut self) {
        self.stats = Stats::default();
    }

    /// Attempt one adaptive integration step of roughly `step_size_guess`.
    ///
    /// The guess is clamped in magnitude to the maximum step size, then the
    /// stages are evaluated and the embedded error estimate decides
    /// acceptance. A rejected attempt shrinks the step by the controller
    /// ratio and retries without touching observable state; the retry loop
    /// terminates because a step below the minimum magnitude aborts with
    /// [`IntegratorError::MinimumStepSizeExceeded`].
    ///
    /// On success the state has advanced by exactly one accepted step, the
    /// rollback snapshot holds the pre-step state, and the returned
    /// [`StepResult`] carries the recommended next step size. On failure the
    /// observable state is exactly as before the call.
    pub fn perform_integration_step(
        &mut self,
        step_size_guess: f64,
    ) -> Result<StepResult, IntegratorError> {
        if !step_size_guess.is_finite() || step_size_guess == 0.0 {
            return Err(invalid_configuration(format!(
                "step size guess must be non-zero and finite, got {}",
                step_size_guess
            )));
        }

        let direction = step_size_guess.signum();
        let mut h = direction * step_size_guess.abs().min(self.maximum_step_size);

        loop {
            if h.abs() < self.minimum_step_size {
                return Err(IntegratorError::MinimumStepSizeExceeded {
                    minimum_step_size: self.minimum_step_size,
                    independent_variable: self.current_independent_variable,
                });
            }

            self.evaluate_stages(h);
            self.stats.function_evaluations += self.tableau.stages as u64;

            // Two candidate next-states from the same stage derivatives
            let mut high = self.current_state.clone();
            let mut low = self.current_state.clone();
            for (i, stage) in self.stages.iter().enumerate() {
                if self.tableau.b_high[i] != 0.0 {
                    high.add_scaled(h * self.tableau.b_high[i], stage);
                }
                if self.tableau.b_low[i] != 0.0 {
                    low.add_scaled(h * self.tableau.b_low[i], stage);
                }
            }

            let error = high.scaled_error_norm(
                &low,
                &self.current_state,
                self.absolute_tolerance,
                self.relative_tolerance,
            );
            let factor = self.controller.factor(error);

            if error <= 1.0 {
                self.stats.accepted_steps += 1;
                self.previous_independent_variable = self.current_independent_variable;
                self.previous_state = std::mem::replace(&mut self.current_state, high);
                self.current_independent_variable += h;
                self.last_step_size = h;
                self.next_step_size = direction
                    * (h.abs() * factor).clamp(self.minimum_step_size, self.maximum_step_size);
                return Ok(StepResult {
                    step_taken: h,
                    next_step_size: self.next_step_size,
                    error,
                });
            }

            self.stats.rejected_steps += 1;
            h = direction * (h.abs() * factor).min(self.maximum_step_size);
        }
    }

    /// Integrate until the independent variable reaches `target`.
    ///
    /// Issues adaptive steps seeded by `initial_step_size_guess` and then by
    /// each step's recommendation; the direction is inferred from the sign of
    /// `target - current`, and the final step is clamped to land exactly on
    /// the target. Step errors propagate unchanged, leaving the state at the
    /// last accepted internal step. After success the rollback snapshot
    /// reflects the last internal step taken, not the overall starting point.
    pub fn integrate_to(
        &mut self,
        target: f64,
        initial_step_size_guess: f64,
    ) -> Result<(), IntegratorError> {
        if !target.is_finite() {
            return Err(invalid_configuration(format!(
                "integration target must be finite, got {}",
                target
            )));
        }
        if !initial_step_size_guess.is_finite() || initial_step_size_guess == 0.0 {
            return Err(invalid_configuration(format!(
                "step size guess must be non-zero and finite, got {}",
                initial_step_size_guess
            )));
        }
        if target == self.current_independent_variable {
            return Ok(());
        }

        let direction = (target - self.current_independent_variable).signum();
        let mut h = direction * initial_step_size_guess.abs();
        let mut step_count = 0u64;

        while (target - self.current_independent_variable) * direction > 0.0 {
            // Clamp the final step so the target is not overshot
            let remaining = target - self.current_independent_variable;
            let is_final = (self.current_independent_variable + h - target) * direction >= 0.0;
            if is_final {
                h = remaining;
            }

            let result = self.perform_integration_step(h)?;

            if !self.current_state.is_finite() {
                return Err(IntegratorError::NonFiniteState {
                    independent_variable: self.current_independent_variable,
                });
            }

            // The clamped final step lands on the target up to one rounding;
            // snap so the postcondition holds exactly. A shrunk-and-retried
            // final attempt takes a shorter step and the loop continues.
            if is_final && result.step_taken == remaining {
                self.current_independent_variable = target;
            }

            h = direction * result.next_step_size.abs();

            step_count += 1;
            if step_count > self.max_steps {
                return Err(IntegratorError::MaximumStepsExceeded);
            }
        }

        Ok(())
    }

    /// Restore the state saved immediately before the last accepted step.
    ///
    /// Only one level of undo exists: calling this twice in a row without an
    /// intervening accepted step restores the same snapshot again
    /// (idempotent), and calling it before any step restores the initial
    /// condition. Neither case is an error. The recommended next step size
    /// is left untouched.
    pub fn rollback_to_previous_state(&mut self) {
        self.current_independent_variable = self.previous_independent_variable;
        self.current_state = self.previous_state.clone();
    }

    /// Evaluate all stage derivatives for a step of size `h` via the
    /// Runge-Kutta stage recurrence.
    fn evaluate_stages(&mut self, h: f64) {
        let t = self.current_independent_variable;
        self.stages.clear();
        self.stages
            .push(self.derivative.evaluate(t, &self.current_state));

        for i in 1..self.tableau.stages {
            // y_i = y + h * sum_{j<i} a[i][j] * k_j
            let mut y = self.current_state.clone();
            for (j, &coupling) in self.tableau.a[i].iter().enumerate() {
                if coupling != 0.0 {
                    y.add_scaled(h * coupling, &self.stages[j]);
                }
            }
            self.stages
                .push(self.derivative.evaluate(t + self.tableau.c[i] * h, &y));
        }
    }
}

fn invalid_configuration(message: String) -> IntegratorError {
    IntegratorError::InvalidConfiguration { message }
}
