//! Embedded Runge-Kutta coefficient sets (Butcher tableaux).
//!
//! Each tableau describes a pair of Runge-Kutta formulas of adjacent order
//! sharing the same stage evaluations: the higher-order weights advance the
//! solution while the difference against the lower-order weights yields a
//! local truncation error estimate at no extra derivative cost.
//!
//! References:
//! - Fehlberg, E. (1968). "Classical Fifth-, Sixth-, Seventh-, and
//!   Eighth-Order Runge-Kutta Formulas with Stepsize Control". NASA TR R-287.
//! - Dormand, J.R., Prince, P.J. (1980). "A family of embedded Runge-Kutta
//!   formulae". J. Comp. Appl. Math. 6(1).

/// Immutable description of an embedded Runge-Kutta method.
///
/// The coupling matrix `a` is stored ragged: row `i` holds the `i`
/// coefficients `a[i][0..i]` of the lower-triangular stage recurrence.
/// Consumers treat a tableau as an opaque, read-only lookup.
#[derive(Debug, Clone, Copy)]
pub struct ButcherTableau {
    /// Human-readable method name, e.g. `"RKF4(5)"`.
    pub name: &'static str,
    /// Number of stages `s`.
    pub stages: usize,
    /// Node offsets `c[0..s]`: stage `i` is evaluated at `t + c[i] * h`.
    pub c: &'static [f64],
    /// Lower-triangular stage coupling matrix, row `i` of length `i`.
    pub a: &'static [&'static [f64]],
    /// Weights of the higher-order combination, used to advance the solution.
    pub b_high: &'static [f64],
    /// Weights of the embedded lower-order combination, used for the error
    /// estimate.
    pub b_low: &'static [f64],
    /// Order of the `b_high` combination.
    pub higher_order: u8,
    /// Order of the `b_low` combination; drives the step-size control
    /// exponent `1 / (lower_order + 1)`.
    pub lower_order: u8,
}

impl ButcherTableau {
    /// Check internal consistency of the tableau.
    ///
    /// Verifies the table shapes, the row-sum condition
    /// `sum_j a[i][j] == c[i]`, that both weight vectors sum to one, and that
    /// the embedded orders are adjacent. Returns a description of the first
    /// violation found.
    pub fn validate(&self) -> Result<(), String> {
        // Summation of ~13 f64 terms accumulates roundoff; 1e-12 leaves
        // headroom over the strict 1e-14 used in the coefficient tests.
        const TOL: f64 = 1e-12;

        if self.stages == 0 {
            return Err(format!("{}: stage count must be at least 1", self.name));
        }
        if self.c.len() != self.stages
            || self.a.len() != self.stages
            || self.b_high.len() != self.stages
            || self.b_low.len() != self.stages
        {
            return Err(format!(
                "{}: c/a/b_high/b_low must all have {} entries",
                self.name, self.stages
            ));
        }
        for (i, row) in self.a.iter().enumerate() {
            if row.len() != i {
                return Err(format!(
                    "{}: coupling row {} has {} entries, expected {}",
                    self.name,
                    i,
                    row.len(),
                    i
                ));
            }
            let row_sum: f64 = row.iter().sum();
            if (row_sum - self.c[i]).abs() > TOL {
                return Err(format!(
                    "{}: row {} sums to {}, expected c[{}] = {}",
                    self.name, i, row_sum, i, self.c[i]
                ));
            }
        }
        for (weights, label) in [(self.b_high, "b_high"), (self.b_low, "b_low")] {
            let sum: f64 = weights.iter().sum();
            if (sum - 1.0).abs() > TOL {
                return Err(format!("{}: {} sums to {}, expected 1", self.name, label, sum));
            }
        }
        if self.higher_order != self.lower_order + 1 {
            return Err(format!(
                "{}: embedded orders {} and {} are not adjacent",
                self.name, self.higher_order, self.lower_order
            ));
        }
        Ok(())
    }
}

/// Runge-Kutta-Fehlberg 4(5): 6 stages, 5th-order solution with 4th-order
/// error estimate.
///
/// From NASA TR R-287, Table III.
pub const RKF45: ButcherTableau = ButcherTableau {
    name: "RKF4(5)",
    stages: 6,
    c: &[0.0, 1.0 / 4.0, 3.0 / 8.0, 12.0 / 13.0, 1.0, 1.0 / 2.0],
    a: &[
        &[],
        &[1.0 / 4.0],
        &[3.0 / 32.0, 9.0 / 32.0],
        &[1932.0 / 2197.0, -7200.0 / 2197.0, 7296.0 / 2197.0],
        &[439.0 / 216.0, -8.0, 3680.0 / 513.0, -845.0 / 4104.0],
        &[-8.0 / 27.0, 2.0, -3544.0 / 2565.0, 1859.0 / 4104.0, -11.0 / 40.0],
    ],
    b_high: &[
        16.0 / 135.0,
        0.0,
        6656.0 / 12825.0,
        28561.0 / 56430.0,
        -9.0 / 50.0,
        2.0 / 55.0,
    ],
    b_low: &[
        25.0 / 216.0,
        0.0,
        1408.0 / 2565.0,
        2197.0 / 4104.0,
        -1.0 / 5.0,
        0.0,
    ],
    higher_order: 5,
    lower_order: 4,
};

/// Dormand-Prince 5(4): 7 stages, 5th-order solution with 4th-order error
/// estimate.
///
/// From Dormand & Prince (1980), Table 2. The last stage reuses the 5th-order
/// weights (FSAL structure); this implementation does not exploit the reuse.
pub const DOPRI54: ButcherTableau = ButcherTableau {
    name: "DOPRI5(4)",
    stages: 7,
    c: &[0.0, 1.0 / 5.0, 3.0 / 10.0, 4.0 / 5.0, 8.0 / 9.0, 1.0, 1.0],
    a: &[
        &[],
        &[1.0 / 5.0],
        &[3.0 / 40.0, 9.0 / 40.0],
        &[44.0 / 45.0, -56.0 / 15.0, 32.0 / 9.0],
        &[
            19372.0 / 6561.0,
            -25360.0 / 2187.0,
            64448.0 / 6561.0,
            -212.0 / 729.0,
        ],
        &[
            9017.0 / 3168.0,
            -355.0 / 33.0,
            46732.0 / 5247.0,
            49.0 / 176.0,
            -5103.0 / 18656.0,
        ],
        &[
            35.0 / 384.0,
            0.0,
            500.0 / 1113.0,
            125.0 / 192.0,
            -2187.0 / 6784.0,
            11.0 / 84.0,
        ],
    ],
    b_high: &[
        35.0 / 384.0,
        0.0,
        500.0 / 1113.0,
        125.0 / 192.0,
        -2187.0 / 6784.0,
        11.0 / 84.0,
        0.0,
    ],
    b_low: &[
        5179.0 / 57600.0,
        0.0,
        7571.0 / 16695.0,
        393.0 / 640.0,
        -92097.0 / 339200.0,
        187.0 / 2100.0,
        1.0 / 40.0,
    ],
    higher_order: 5,
    lower_order: 4,
};

/// Runge-Kutta-Fehlberg 7(8): 13 stages, 8th-order solution with 7th-order
/// error estimate.
///
/// From NASA TR R-287, Table X (pages 64-65). The 8th-order weights use
/// stages 5-12; stages 11 and 12 replace stages 0 and 10 of the 7th-order
/// combination.
pub const RKF78: ButcherTableau = ButcherTableau {
    name: "RKF7(8)",
    stages: 13,
    c: &[
        0.0,
        2.0 / 27.0,
        1.0 / 9.0,
        1.0 / 6.0,
        5.0 / 12.0,
        1.0 / 2.0,
        5.0 / 6.0,
        1.0 / 6.0,
        2.0 / 3.0,
        1.0 / 3.0,
        1.0,
        0.0,
        1.0,
    ],
    a: &[
        &[],
        &[2.0 / 27.0],
        &[1.0 / 36.0, 1.0 / 12.0],
        &[1.0 / 24.0, 0.0, 1.0 / 8.0],
        &[5.0 / 12.0, 0.0, -25.0 / 16.0, 25.0 / 16.0],
        &[1.0 / 20.0, 0.0, 0.0, 1.0 / 4.0, 1.0 / 5.0],
        &[
            -25.0 / 108.0,
            0.0,
            0.0,
            125.0 / 108.0,
            -65.0 / 27.0,
            125.0 / 54.0,
        ],
        &[
            31.0 / 300.0,
            0.0,
            0.0,
            0.0,
            61.0 / 225.0,
            -2.0 / 9.0,
            13.0 / 900.0,
        ],
        &[
            2.0,
            0.0,
            0.0,
            -53.0 / 6.0,
            704.0 / 45.0,
            -107.0 / 9.0,
            67.0 / 90.0,
            3.0,
        ],
        &[
            -91.0 / 108.0,
            0.0,
            0.0,
            23.0 / 108.0,
            -976.0 / 135.0,
            311.0 / 54.0,
            -19.0 / 60.0,
            17.0 / 6.0,
            -1.0 / 12.0,
        ],
        &[
            2383.0 / 4100.0,
            0.0,
            0.0,
            -341.0 / 164.0,
            4496.0 / 1025.0,
            -301.0 / 82.0,
            2133.0 / 4100.0,
            45.0 / 82.0,
            45.0 / 164.0,
            18.0 / 41.0,
        ],
        &[
            3.0 / 205.0,
            0.0,
            0.0,
            0.0,
            0.0,
            -6.0 / 41.0,
            -3.0 / 205.0,
            -3.0 / 41.0,
            3.0 / 41.0,
            6.0 / 41.0,
            0.0,
        ],
        &[
            -1777.0 / 4100.0,
            0.0,
            0.0,
            -341.0 / 164.0,
            4496.0 / 1025.0,
            -289.0 / 82.0,
            2193.0 / 4100.0,
            51.0 / 82.0,
            33.0 / 164.0,
            12.0 / 41.0,
            0.0,
            1.0,
        ],
    ],
    b_high: &[
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        34.0 / 105.0,
        9.0 / 35.0,
        9.0 / 35.0,
        9.0 / 280.0,
        9.0 / 280.0,
        0.0,
        41.0 / 840.0,
        41.0 / 840.0,
    ],
    b_low: &[
        41.0 / 840.0,
        0.0,
        0.0,
        0.0,
        0.0,
        34.0 / 105.0,
        9.0 / 35.0,
        9.0 / 35.0,
        9.0 / 280.0,
        9.0 / 280.0,
        41.0 / 840.0,
        0.0,
        0.0,
    ],
    higher_order: 8,
    lower_order: 7,
};

#[cfg(test)]
mod tests {
    use super::*;

    // Summation of up to 13 f64 terms accumulates ~O(n*eps) roundoff
    const TOL: f64 = 1e-14;

    const ALL: [&ButcherTableau; 3] = [&RKF45, &DOPRI54, &RKF78];

    #[test]
    fn test_all_tableaus_validate() {
        for tableau in ALL {
            tableau.validate().unwrap();
        }
    }

    #[test]
    fn test_row_sum_condition() {
        for tableau in ALL {
            for i in 0..tableau.stages {
                let row_sum: f64 = tableau.a[i].iter().sum();
                assert!(
                    (row_sum - tableau.c[i]).abs() < TOL,
                    "{}: row {} sum = {}, expected c[{}] = {}",
                    tableau.name,
                    i,
                    row_sum,
                    i,
                    tableau.c[i]
                );
            }
        }
    }

    #[test]
    fn test_weights_sum_to_one() {
        for tableau in ALL {
            let high_sum: f64 = tableau.b_high.iter().sum();
            let low_sum: f64 = tableau.b_low.iter().sum();
            assert!(
                (high_sum - 1.0).abs() < TOL,
                "{}: b_high sums to {}",
                tableau.name,
                high_sum
            );
            assert!(
                (low_sum - 1.0).abs() < TOL,
                "{}: b_low sums to {}",
                tableau.name,
                low_sum
            );
        }
    }

    #[test]
    fn test_rkf78_error_weight_structure() {
        // From NASA TR R-287, the truncation error term reduces to
        // (41/840) * (k_0 + k_10 - k_11 - k_12) * h
        for i in 0..RKF78.stages {
            let diff = RKF78.b_low[i] - RKF78.b_high[i];
            let expected = match i {
                0 | 10 => 41.0 / 840.0,
                11 | 12 => -41.0 / 840.0,
                _ => 0.0,
            };
            assert!(
                (diff - expected).abs() < TOL,
                "stage {}: b_low - b_high = {}, expected {}",
                i,
                diff,
                expected
            );
        }
    }

    #[test]
    fn test_validate_rejects_inconsistent_tableau() {
        // Same shape as RKF45 but with a broken row sum
        let broken = ButcherTableau {
            name: "broken",
            a: &[
                &[],
                &[1.0 / 2.0], // should be 1/4 to match c[1]
                &[3.0 / 32.0, 9.0 / 32.0],
                &[1932.0 / 2197.0, -7200.0 / 2197.0, 7296.0 / 2197.0],
                &[439.0 / 216.0, -8.0, 3680.0 / 513.0, -845.0 / 4104.0],
                &[
                    -8.0 / 27.0,
                    2.0,
                    -3544.0 / 2565.0,
                    1859.0 / 4104.0,
                    -11.0 / 40.0,
                ],
            ],
            ..RKF45
        };
        assert!(broken.validate().is_err());
    }
}
