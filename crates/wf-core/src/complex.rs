use serde::{Deserialize, Serialize};

use crate::constants::EPSILON;

/// Complex amplitude as a (re, im) pair.
///
/// All operations are pure and return new values. NaN components are not
/// sanitized — callers own the hygiene of what they feed in.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Complex {
    pub re: f64,
    pub im: f64,
}

pub const ZERO: Complex = Complex { re: 0.0, im: 0.0 };

impl Complex {
    pub fn new(re: f64, im: f64) -> Self {
        Self { re, im }
    }

    /// Unit amplitude on the real axis.
    pub fn one() -> Self {
        Self { re: 1.0, im: 0.0 }
    }

    /// e^{iθ} — the phase rotor used by phase gates.
    pub fn from_phase(theta: f64) -> Self {
        Self {
            re: theta.cos(),
            im: theta.sin(),
        }
    }

    pub fn add(self, other: Self) -> Self {
        Self {
            re: self.re + other.re,
            im: self.im + other.im,
        }
    }

    pub fn sub(self, other: Self) -> Self {
        Self {
            re: self.re - other.re,
            im: self.im - other.im,
        }
    }

    pub fn mul(self, other: Self) -> Self {
        Self {
            re: self.re * other.re - self.im * other.im,
            im: self.re * other.im + self.im * other.re,
        }
    }

    pub fn conj(self) -> Self {
        Self {
            re: self.re,
            im: -self.im,
        }
    }

    pub fn scale(self, factor: f64) -> Self {
        Self {
            re: self.re * factor,
            im: self.im * factor,
        }
    }

    /// Squared magnitude: re² + im².
    pub fn magnitude_sq(self) -> f64 {
        self.re * self.re + self.im * self.im
    }

    pub fn is_zero(self) -> bool {
        self.magnitude_sq() < EPSILON
    }
}

impl PartialEq for Complex {
    fn eq(&self, other: &Self) -> bool {
        (self.re - other.re).abs() < EPSILON && (self.im - other.im).abs() < EPSILON
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_sub() {
        let a = Complex::new(1.0, 2.0);
        let b = Complex::new(0.5, -1.0);
        assert_eq!(a.add(b), Complex::new(1.5, 1.0));
        assert_eq!(a.sub(b), Complex::new(0.5, 3.0));
    }

    #[test]
    fn test_mul() {
        // (1 + 2i)(3 + 4i) = 3 + 4i + 6i + 8i² = -5 + 10i
        let a = Complex::new(1.0, 2.0);
        let b = Complex::new(3.0, 4.0);
        assert_eq!(a.mul(b), Complex::new(-5.0, 10.0));
    }

    #[test]
    fn test_mul_by_conjugate_is_magnitude() {
        let a = Complex::new(3.0, -4.0);
        let prod = a.mul(a.conj());
        assert!((prod.re - 25.0).abs() < 1e-12);
        assert!(prod.im.abs() < 1e-12);
    }

    #[test]
    fn test_phase_rotor_unit_magnitude() {
        for i in 0..8 {
            let theta = i as f64 * std::f64::consts::FRAC_PI_4;
            let r = Complex::from_phase(theta);
            assert!((r.magnitude_sq() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_phase_rotor_quarter_turn() {
        let r = Complex::from_phase(std::f64::consts::FRAC_PI_2);
        let rotated = Complex::one().mul(r);
        assert_eq!(rotated, Complex::new(0.0, 1.0));
    }

    #[test]
    fn test_scale() {
        let a = Complex::new(2.0, -6.0);
        assert_eq!(a.scale(0.5), Complex::new(1.0, -3.0));
    }

    #[test]
    fn test_magnitude_sq() {
        assert!((Complex::new(3.0, 4.0).magnitude_sq() - 25.0).abs() < 1e-12);
        assert_eq!(ZERO.magnitude_sq(), 0.0);
    }
}
