//! State container contract for the integrator.
//!
//! The integrator is generic over the state representation: a scalar, a
//! vector, or a matrix all work as long as the container supports elementwise
//! addition, scalar scaling, and the mixed-tolerance error norm used for step
//! acceptance. A blanket implementation covers `f64` and every `nalgebra`
//! matrix shape with `f64` entries (static or dynamic, vector or matrix).

use nalgebra::allocator::Allocator;
use nalgebra::{DefaultAllocator, Dim, OMatrix};

/// Capability set the integrator requires of a state container.
///
/// Implementations must treat the container as a flat collection of `f64`
/// components; the integrator never inspects the shape beyond what these
/// methods expose.
pub trait OdeState: Clone {
    /// Additive identity with the same shape as `self`.
    fn zeros_like(&self) -> Self;

    /// Elementwise `self += factor * other`.
    fn add_scaled(&mut self, factor: f64, other: &Self);

    /// Normalized error between `self` (the higher-order candidate) and
    /// `lower` (the lower-order candidate).
    ///
    /// Each component is scaled by `atol + rtol * max(|reference_i|, |self_i|)`
    /// and the result is reduced with the maximum norm over components. A
    /// value of at most 1.0 means the step satisfies the tolerances.
    fn scaled_error_norm(&self, lower: &Self, reference: &Self, atol: f64, rtol: f64) -> f64;

    /// True when every component is finite.
    fn is_finite(&self) -> bool;
}

/// Scaled error contribution of a single component.
fn component_error(high: f64, low: f64, reference: f64, atol: f64, rtol: f64) -> f64 {
    let scale = atol + rtol * high.abs().max(reference.abs());
    let difference = (high - low).abs();
    if scale > 0.0 {
        difference / scale
    } else if difference == 0.0 {
        0.0
    } else {
        f64::INFINITY
    }
}

impl OdeState for f64 {
    fn zeros_like(&self) -> Self {
        0.0
    }

    fn add_scaled(&mut self, factor: f64, other: &Self) {
        *self += factor * other;
    }

    fn scaled_error_norm(&self, lower: &Self, reference: &Self, atol: f64, rtol: f64) -> f64 {
        component_error(*self, *lower, *reference, atol, rtol)
    }

    fn is_finite(&self) -> bool {
        f64::is_finite(*self)
    }
}

impl<R, C> OdeState for OMatrix<f64, R, C>
where
    R: Dim,
    C: Dim,
    DefaultAllocator: Allocator<R, C>,
{
    fn zeros_like(&self) -> Self {
        let (nrows, ncols) = self.shape_generic();
        OMatrix::zeros_generic(nrows, ncols)
    }

    fn add_scaled(&mut self, factor: f64, other: &Self) {
        self.zip_apply(other, |value, rhs| *value += factor * rhs);
    }

    fn scaled_error_norm(&self, lower: &Self, reference: &Self, atol: f64, rtol: f64) -> f64 {
        let mut max_error: f64 = 0.0;
        for ((high, low), previous) in self.iter().zip(lower.iter()).zip(reference.iter()) {
            max_error = max_error.max(component_error(*high, *low, *previous, atol, rtol));
        }
        max_error
    }

    fn is_finite(&self) -> bool {
        self.iter().all(|value| value.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{DMatrix, Matrix3, Vector3};

    #[test]
    fn test_add_scaled_vector() {
        let mut y = Vector3::new(1.0, 2.0, 3.0);
        let k = Vector3::new(10.0, 20.0, 30.0);
        y.add_scaled(0.5, &k);
        assert_eq!(y, Vector3::new(6.0, 12.0, 18.0));
    }

    #[test]
    fn test_zeros_like_preserves_shape() {
        let m = DMatrix::from_element(4, 2, 7.0);
        let z = m.zeros_like();
        assert_eq!(z.nrows(), 4);
        assert_eq!(z.ncols(), 2);
        assert!(z.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_scalar_error_norm() {
        // high = 1.0, low = 1.0 + 1e-6, reference = 1.0
        // scale = 1e-3 + 1e-3 * 1.0 = 2e-3, error = 1e-6 / 2e-3 = 5e-4
        let high = 1.0_f64;
        let error = high.scaled_error_norm(&(1.0 + 1e-6), &1.0, 1e-3, 1e-3);
        assert!((error - 5e-4).abs() < 1e-12, "error = {}", error);
    }

    #[test]
    fn test_error_norm_is_max_over_components() {
        let high = Matrix3::from_element(1.0);
        let mut low = high;
        low[(2, 2)] = 1.0 + 1e-4; // single worst component
        let error = high.scaled_error_norm(&low, &high, 1e-3, 0.0);
        assert!((error - 0.1).abs() < 1e-12, "error = {}", error);
    }

    #[test]
    fn test_zero_difference_with_zero_tolerances() {
        let y = Vector3::zeros();
        assert_eq!(y.scaled_error_norm(&y, &y, 0.0, 0.0), 0.0);
    }

    #[test]
    fn test_is_finite() {
        assert!(Vector3::new(1.0, 2.0, 3.0).is_finite());
        assert!(!Vector3::new(1.0, f64::NAN, 3.0).is_finite());
        assert!(!f64::INFINITY.is_finite());
    }
}
