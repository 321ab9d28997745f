//! Two-body orbit propagation with rollback.
//!
//! Propagates a circular low-Earth orbit one step at a time, then undoes the
//! last accepted step to show the one-level rollback buffer.
//!
//! Run with:
//!   cargo run --example two_body_rollback

use nalgebra::Vector6;
use rkvar::{coefficients, VariableStepIntegrator};

fn main() {
    let mu: f64 = 398600.4418; // km³/s² (Earth)
    let derivative = move |_t: f64, y: &Vector6<f64>| {
        let r = (y[0] * y[0] + y[1] * y[1] + y[2] * y[2]).sqrt();
        let mu_r3 = mu / (r * r * r);
        Vector6::new(y[3], y[4], y[5], -mu_r3 * y[0], -mu_r3 * y[1], -mu_r3 * y[2])
    };

    // Circular orbit at 500 km altitude
    let r0: f64 = 6878.0;
    let v0 = (mu / r0).sqrt();
    let y0 = Vector6::new(r0, 0.0, 0.0, 0.0, v0, 0.0);

    let mut integrator = VariableStepIntegrator::new(
        &coefficients::RKF78,
        derivative,
        0.0,
        y0,
        60.0,
        f64::INFINITY,
        1e-12,
        1e-12,
    )
    .expect("valid configuration");

    let mut guess = 60.0;
    for _ in 0..5 {
        let result = integrator
            .perform_integration_step(guess)
            .expect("step within tolerance");
        println!(
            "t = {:8.2} s  step = {:7.2} s  error = {:.3e}",
            integrator.current_independent_variable(),
            result.step_taken,
            result.error
        );
        guess = result.next_step_size;
    }

    let t_last = integrator.current_independent_variable();
    integrator.rollback_to_previous_state();
    println!(
        "rolled back: t = {:.2} s (was {:.2} s)",
        integrator.current_independent_variable(),
        t_last
    );
    println!("stats = {:?}", integrator.stats);
}
