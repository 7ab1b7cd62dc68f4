//! Search domain of a function such as bound constraints for variables.

use std::iter::FromIterator;

use nalgebra::DVector;
use rand::Rng;
use rand_distr::{Distribution, Normal};

use super::real::Real;

/// Box domain of a function.
#[derive(Debug, Clone, PartialEq)]
pub struct Domain<T: Real> {
    lower: DVector<T>,
    upper: DVector<T>,
}

impl<T: Real> Domain<T> {
    /// Creates unconstrained domain with given dimension.
    pub fn unconstrained(dim: usize) -> Self {
        assert!(dim > 0, "empty domain");

        let inf = T::from_f64(f64::INFINITY);

        Self {
            lower: DVector::from_element(dim, -inf),
            upper: DVector::from_element(dim, inf),
        }
    }

    /// Creates rectangular domain with given bounds.
    ///
    /// Positive and negative infinity can be used to indicate value unbounded
    /// in that dimension and direction. If the entire domain is unconstrained,
    /// use [`Domain::unconstrained`] instead.
    pub fn rect(lower: DVector<T>, upper: DVector<T>) -> Self {
        assert!(
            lower.nrows() == upper.nrows(),
            "lower and upper have different size"
        );
        assert!(lower.nrows() > 0, "empty domain");

        Self { lower, upper }
    }

    /// Gets the dimension of the domain.
    pub fn dim(&self) -> usize {
        self.lower.nrows()
    }

    /// Lower bounds.
    pub fn lower(&self) -> &DVector<T> {
        &self.lower
    }

    /// Upper bounds.
    pub fn upper(&self) -> &DVector<T> {
        &self.upper
    }

    /// Returns `true` if every variable has finite bounds on both sides.
    pub fn is_bounded(&self) -> bool {
        self.lower
            .iter()
            .chain(self.upper.iter())
            .all(|b| b.is_finite())
    }

    /// Checks whether the point lies in the domain.
    pub fn contains(&self, x: &DVector<T>) -> bool {
        x.nrows() == self.dim()
            && x
                .iter()
                .zip(self.lower.iter().zip(self.upper.iter()))
                .all(|(xi, (li, ui))| li <= xi && xi <= ui)
    }

    /// Projects given point into the domain. Returns `true` if the point was
    /// not feasible.
    pub fn project(&self, x: &mut DVector<T>) -> bool {
        let mut not_feasible = false;

        for i in 0..self.dim() {
            not_feasible |= self.project_in(x, i);
        }

        not_feasible
    }

    /// Projects given point into the domain in given dimension.
    pub fn project_in(&self, x: &mut DVector<T>, i: usize) -> bool {
        let li = self.lower[i];
        let ui = self.upper[i];
        let xi = &mut x[i];

        if *xi < li {
            *xi = li;
            true
        } else if *xi > ui {
            *xi = ui;
            true
        } else {
            false
        }
    }

    /// Converts the domain into another representation.
    pub fn cast<U: Real>(&self) -> Domain<U> {
        let cast = |v: &DVector<T>| v.map(|vi| U::from_f64(vi.to_f64()));

        Domain {
            lower: cast(&self.lower),
            upper: cast(&self.upper),
        }
    }
}

impl Domain<f64> {
    /// Samples a point in the domain.
    ///
    /// Bounded variables are sampled uniformly. Variables with an infinite
    /// bound are sampled from a normal distribution around `center` with
    /// standard deviation `spread` and reflected back into the domain if they
    /// fall outside.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        center: &DVector<f64>,
        spread: f64,
        rng: &mut R,
    ) -> DVector<f64> {
        let sigma = if spread.is_finite() && spread > 0.0 {
            spread
        } else {
            1.0
        };
        let normal = match Normal::new(0.0, sigma) {
            Ok(normal) => normal,
            Err(_) => return center.clone(),
        };

        DVector::from_iterator(
            self.dim(),
            (0..self.dim()).map(|i| {
                let (li, ui) = (self.lower[i], self.upper[i]);

                if li.is_finite() && ui.is_finite() {
                    if li == ui {
                        li
                    } else {
                        rng.gen_range(li..=ui)
                    }
                } else {
                    let random = center[i] + normal.sample(&mut *rng);
                    let clamped = random.max(li).min(ui);
                    let delta = clamped - random;
                    (clamped + delta).max(li).min(ui)
                }
            }),
        )
    }

    /// Corner of the box selected by the bit mask `mask` (bit `i` selects the
    /// upper bound of variable `i`). Only meaningful for bounded domains.
    pub fn corner(&self, mask: u64) -> DVector<f64> {
        DVector::from_iterator(
            self.dim(),
            (0..self.dim()).map(|i| {
                if i < 64 && mask & (1 << i) != 0 {
                    self.upper[i]
                } else {
                    self.lower[i]
                }
            }),
        )
    }
}

impl<T: Real> FromIterator<(T, T)> for Domain<T> {
    fn from_iter<I: IntoIterator<Item = (T, T)>>(iter: I) -> Self {
        let (lower, upper): (Vec<_>, Vec<_>) = iter.into_iter().unzip();
        Self::rect(DVector::from_vec(lower), DVector::from_vec(upper))
    }
}

#[cfg(test)]
mod tests {
    use nalgebra::dvector;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn projection() {
        let dom: Domain<f64> = [(-1.0, 1.0), (0.0, f64::INFINITY)].into_iter().collect();
        let mut x = dvector![2.0, -3.0];

        assert!(dom.project(&mut x));
        assert_eq!(x, dvector![1.0, 0.0]);
        assert!(!dom.project(&mut x));
        assert!(dom.contains(&x));
        assert!(!dom.is_bounded());
    }

    #[test]
    fn sampling_stays_inside() {
        let dom: Domain<f64> = [(-5.0, 5.0), (1.0, f64::INFINITY)].into_iter().collect();
        let center = dvector![0.0, 1.0];
        let mut rng = StdRng::seed_from_u64(3);

        for _ in 0..100 {
            let x = dom.sample(&center, 10.0, &mut rng);
            assert!(dom.contains(&x), "{:?}", x);
        }
    }

    #[test]
    fn corners() {
        let dom: Domain<f64> = [(-1.0, 1.0), (-2.0, 2.0)].into_iter().collect();
        assert_eq!(dom.corner(0b10), dvector![-1.0, 2.0]);
    }
}
