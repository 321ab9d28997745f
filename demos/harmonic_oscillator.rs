//! Basic adaptive integration — harmonic oscillator.
//!
//! Integrates y'' + ω²y = 0 for one period and compares with the exact
//! solution.
//!
//! Run with:
//!   cargo run --example harmonic_oscillator

use nalgebra::Vector2;
use rkvar::{coefficients, VariableStepIntegrator};

fn main() {
    let omega: f64 = 2.0;
    let derivative =
        move |_t: f64, y: &Vector2<f64>| Vector2::new(y[1], -omega * omega * y[0]);

    // One full period: T = 2π/ω
    let period = 2.0 * std::f64::consts::PI / omega;

    let mut integrator = VariableStepIntegrator::new(
        &coefficients::RKF78,
        derivative,
        0.0,
        Vector2::new(1.0, 0.0), // y(0) = 1, y'(0) = 0
        0.01,
        f64::INFINITY,
        1e-12,
        1e-12,
    )
    .expect("valid configuration");

    integrator.integrate_to(period, 0.01).expect("integration");

    let tf = integrator.current_independent_variable();
    let yf = integrator.current_state();

    // Exact solution: y(t) = cos(ωt), y'(t) = -ω sin(ωt)
    let y_exact = (omega * tf).cos();
    let v_exact = -omega * (omega * tf).sin();

    println!("t = {:.6}", tf);
    println!("y       = {:.15}  (exact {:.15})", yf[0], y_exact);
    println!("y'      = {:.15}  (exact {:.15})", yf[1], v_exact);
    println!("|error| = {:.3e}", (yf[0] - y_exact).abs());
    println!("stats   = {:?}", integrator.stats);
}
