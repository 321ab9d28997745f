//! # rkvar: Variable-Step Embedded Runge-Kutta Integration
//!
//! An adaptive ODE integrator built on embedded Runge-Kutta pairs: the same
//! stage derivatives yield a higher-order solution and a lower-order
//! companion whose difference estimates the local truncation error, driving
//! automatic step-size control.
//!
//! ## Features
//!
//! - Generic over the state container: scalars, `nalgebra` vectors, and
//!   matrices all satisfy the same [`OdeState`] contract
//! - Coefficient catalogue with RKF4(5), Dormand-Prince 5(4), and the
//!   13-stage RKF7(8) pair (NASA TR R-287)
//! - Ratio-based step growth and shrinkage with a hard minimum-step floor
//!   surfaced as a structured error
//! - One-level rollback of the most recent accepted step
//! - Forward and backward integration to an exact target
//!
//! ## Basic Usage
//!
//! ```rust
//! use nalgebra::Vector2;
//! use rkvar::{coefficients, VariableStepIntegrator};
//!
//! // Harmonic oscillator: y'' + ω²y = 0, state [y, y']
//! let omega: f64 = 1.0;
//! let derivative =
//!     move |_t: f64, y: &Vector2<f64>| Vector2::new(y[1], -omega * omega * y[0]);
//!
//! let mut integrator = VariableStepIntegrator::new(
//!     &coefficients::RKF78,
//!     derivative,
//!     0.0,                      // initial independent variable
//!     Vector2::new(1.0, 0.0),   // initial state
//!     0.1,                      // initial step-size guess
//!     f64::INFINITY,            // maximum step size
//!     1e-12,                    // relative tolerance
//!     1e-12,                    // absolute tolerance
//! )
//! .unwrap();
//!
//! integrator.integrate_to(2.0 * std::f64::consts::PI, 0.1).unwrap();
//! assert!((integrator.current_state()[0] - 1.0).abs() < 1e-9);
//!
//! // Undo the last accepted step if the result is not wanted
//! integrator.rollback_to_previous_state();
//! ```
//!
//! ## Error Control
//!
//! Each attempted step forms a per-component error
//! `|y_high - y_low| / (atol + rtol * max(|y|, |y_high|))`, reduced with the
//! maximum norm over components. Estimates of at most 1.0 are accepted; the
//! next step is scaled by `safety * error^(-1/(p+1))` with `p` the embedded
//! lower order. When shrinking would push the step magnitude below the
//! configured minimum, the attempt is abandoned with
//! [`IntegratorError::MinimumStepSizeExceeded`] and the integrator state is
//! left untouched, so the caller can loosen tolerances and retry.
//!
//! ## References
//!
//! 1. Fehlberg, E. (1968). "Classical Fifth-, Sixth-, Seventh-, and
//!    Eighth-Order Runge-Kutta Formulas with Stepsize Control".
//!    NASA TR R-287.
//! 2. Hairer, E., Nørsett, S.P., & Wanner, G. (1993). "Solving
//!    Ordinary Differential Equations I: Nonstiff Problems". Springer.
//! 3. Dormand, J.R., & Prince, P.J. (1980). "A family of embedded
//!    Runge-Kutta formulae". J. Comp. Appl. Math. 6(1).

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod coefficients;
pub mod integrator;
pub mod state;

pub use coefficients::ButcherTableau;
pub use integrator::{
    IntegratorError, StateDerivative, Stats, StepResult, VariableStepIntegrator,
};
pub use state::OdeState;
