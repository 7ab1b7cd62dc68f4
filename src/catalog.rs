//! Built-in catalog of benchmark functions.
//!
//! Every function is written once, generically over [`Real`](crate::core::Real),
//! and comes with an analytic gradient. Recorded minima are accurate to at
//! least `1e-9` in value.
//!
//! | Function | Dimension | Notes |
//! |---|---|---|
//! | sphere, sum_squares, zakharov | scalable | convex |
//! | rosenbrock | scalable | curved valley |
//! | rastrigin, ackley, griewank, levy | scalable | many local minima |
//! | styblinski_tang | scalable | minimum value proportional to `n` |
//! | alpine_n1 | scalable | non-differentiable |
//! | powell | scalable, no default | minimizer recorded for `n = 4` |
//! | quartic_noise | scalable | noisy |
//! | beale, booth, matyas, three_hump_camel, easom | 2 | |
//! | himmelblau, six_hump_camel, branin | 2 | several global minima |
//! | mishra_bird | 2 | undefined outside of a disk |
//!
//! # References
//!
//! \[1\] [A Literature Survey of Benchmark Functions For Global Optimization
//! Problems](https://arxiv.org/abs/1308.4008)
//!
//! \[2\] [Virtual Library of Simulation
//! Experiments](https://www.sfu.ca/~ssurjano/optimization.html)

mod planar;
mod scalable;
mod special;

pub use planar::{Beale, Booth, Branin, Easom, Himmelblau, Matyas, SixHumpCamel, ThreeHumpCamel};
pub use scalable::{
    Ackley, AlpineN1, Griewank, Levy, Powell, Rastrigin, Rosenbrock, Sphere, StyblinskiTang,
    SumSquares, Zakharov,
};
pub use special::{MishraBird, QuarticNoise};

use crate::record::EntryDef;

pub(crate) const JAMIL_YANG: &str = "Jamil, M., Yang, X.-S. (2013). A literature survey of \
     benchmark functions for global optimisation problems. International Journal of \
     Mathematical Modelling and Numerical Optimisation, 4(2), 150-194.";

pub(crate) const SURJANOVIC_BINGHAM: &str = "Surjanovic, S., Bingham, D. (2013). Virtual \
     Library of Simulation Experiments: Test Functions and Datasets. Simon Fraser University.";

/// Definitions of all built-in functions, in catalog order.
pub fn builtin() -> Vec<EntryDef> {
    let mut defs = scalable::defs();
    defs.extend(special::defs());
    defs.extend(planar::defs());
    defs
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use nalgebra::{dvector, DVector};

    use super::*;
    use crate::audit::{PropertyValidator, Verdict};
    use crate::consistency::ConsistencyChecker;
    use crate::core::{Domain, MinimumSource, Property};
    use crate::derivatives::{dual_gradient, relative_difference};
    use crate::refine::{ChangeLog, PrecisionRefiner, RefineOutcome};
    use crate::registry::Registry;

    fn registry() -> Registry {
        let (registry, errors) = Registry::load(builtin());
        assert!(errors.is_empty(), "{:?}", errors);
        registry
    }

    #[test]
    fn all_entries_register() {
        let registry = registry();
        assert_eq!(registry.len(), 21);

        for name in registry.names() {
            assert_eq!(name, name.to_lowercase());
        }
    }

    #[test]
    fn sphere_at_origin() {
        let sphere = registry().lookup("sphere").unwrap();
        assert_eq!(sphere.evaluate(&dvector![0.0, 0.0]).unwrap(), 0.0);
    }

    #[test]
    fn rosenbrock_at_ones() {
        let rosenbrock = registry().lookup("rosenbrock").unwrap();
        let x = dvector![1.0, 1.0];

        assert_eq!(rosenbrock.evaluate(&x).unwrap(), 0.0);
        let g: DVector<f64> = rosenbrock.gradient(&x).unwrap();
        assert_abs_diff_eq!(g, dvector![0.0, 0.0]);
    }

    #[test]
    fn rastrigin_in_ten_dimensions() {
        let rastrigin = registry().lookup("rastrigin").unwrap();
        assert_eq!(rastrigin.evaluate(&DVector::<f64>::zeros(10)).unwrap(), 0.0);
    }

    #[test]
    fn powell_dimension_is_probed() {
        let registry = registry();
        let powell = registry.lookup("powell").unwrap();

        assert_eq!(registry.resolver().resolve(&powell, None), Ok(4));
        assert!(powell.evaluate(&DVector::<f64>::zeros(3)).unwrap().is_nan());
    }

    #[test]
    fn mishra_bird_is_undefined_outside_of_disk() {
        let mishra = registry().lookup("mishra_bird").unwrap();

        assert!(mishra.evaluate(&dvector![0.0, 0.0]).unwrap().is_nan());
        assert!(mishra.evaluate(&dvector![-3.0, -1.5]).unwrap().is_finite());
    }

    #[test]
    fn noise_differs_between_evaluations() {
        let noisy = registry().lookup("quartic_noise").unwrap();
        let x = dvector![0.5, 0.5];

        let values: Vec<f64> = (0..8).map(|_| noisy.evaluate(&x).unwrap()).collect();
        assert!(values.windows(2).any(|w| w[0] != w[1]));
    }

    #[test]
    fn literature_minima_are_consistent() {
        let registry = registry();
        let (results, summary) = ConsistencyChecker::new().check_all(&registry);

        for (name, result) in &results {
            let report = result.as_ref().unwrap();
            assert!(report.is_consistent(), "{}: {:?}", name, report.discrepancies);
            assert_eq!(report.source, MinimumSource::Literature);
        }
        assert_eq!(summary.skipped, 1);
        assert!(summary.is_clean());
    }

    #[test]
    fn gradients_agree_with_automatic_differentiation() {
        let registry = registry();

        for entry in registry.iter() {
            if !entry.has(Property::Differentiable) {
                continue;
            }

            let n = registry.resolver().resolve(&entry, None).unwrap();
            let domain = entry.domain_or_unconstrained(n).unwrap();
            let start = entry.start(n).unwrap();

            // Deterministic points between the start and the box center.
            let points = (0..5).map(|k| {
                let t = k as f64 / 5.0;
                clamp_center(&domain, &start, t)
            });

            for x in points {
                if !entry.evaluate(&x).unwrap().is_finite() {
                    continue;
                }
                let analytic: DVector<f64> = entry.gradient(&x).unwrap();
                let ad = dual_gradient(&entry, &x).unwrap();
                assert!(
                    relative_difference(&analytic, &ad) < 1e-9,
                    "{} at {:?}: {:?} vs {:?}",
                    entry.name(),
                    x.as_slice(),
                    analytic.as_slice(),
                    ad.as_slice()
                );
            }
        }
    }

    fn clamp_center(domain: &Domain<f64>, start: &DVector<f64>, t: f64) -> DVector<f64> {
        DVector::from_iterator(
            start.len(),
            (0..start.len()).map(|i| {
                let (lo, hi) = (domain.lower()[i], domain.upper()[i]);
                let center = if lo.is_finite() && hi.is_finite() {
                    0.5 * (lo + hi) + 0.1 * (i as f64 + 1.0)
                } else {
                    0.3 * (i as f64 + 1.0)
                };
                start[i] + t * (center - start[i])
            }),
        )
    }

    #[test]
    fn property_claims_are_not_violated() {
        let (reports, summary) = PropertyValidator::new().audit_all(&registry());

        for (name, report) in &reports {
            let report = report.as_ref().unwrap();
            let violations: Vec<_> = report.violations().collect();
            assert!(violations.is_empty(), "{}: {:?}", name, violations);
        }
        assert!(summary.is_clean());

        let noisy = reports
            .iter()
            .find(|(name, _)| name == "quartic_noise")
            .and_then(|(_, report)| report.as_ref().ok())
            .unwrap();
        assert_eq!(noisy.verdict(Property::HasNoise), Some(Verdict::Confirmed));
    }

    #[test]
    fn refined_minima_pass_the_tight_check() {
        let registry = registry();
        let (outcomes, summary) = PrecisionRefiner::new()
            .run(&registry, &ChangeLog::discard())
            .unwrap();

        for (name, outcome) in &outcomes {
            assert!(
                outcome.is_refined() || matches!(outcome, RefineOutcome::Skipped(_)),
                "{}: {:?}",
                name,
                outcome
            );
        }
        assert_eq!(summary.succeeded, 19);
        assert_eq!(summary.skipped, 2);

        let checker = ConsistencyChecker::new();
        for entry in registry.iter().filter(|entry| entry.refined().is_some()) {
            let n = registry.resolver().resolve(&entry, None).unwrap();
            let report = checker.check(&entry, n).unwrap();
            assert_eq!(report.source, MinimumSource::Refined);
            assert!(report.max_residual() < 1e-12, "{}", entry.name());
        }

        let count = |name: &str| {
            registry
                .lookup(name)
                .unwrap()
                .refined()
                .map(|r| r.positions.len())
        };
        assert_eq!(count("himmelblau"), Some(4));
        assert_eq!(count("six_hump_camel"), Some(2));
        assert_eq!(count("branin"), Some(3));
    }

    #[test]
    fn exact_minimizer_survives_refinement() {
        let registry = registry();
        PrecisionRefiner::new()
            .run(&registry, &ChangeLog::discard())
            .unwrap();

        // Singular Hessian at the origin, BFGS from the start point stops short.
        let refined = registry.lookup("powell").unwrap().refined().cloned().unwrap();
        assert_eq!(refined.value, 0.0);
        assert_eq!(refined.positions, vec![vec![0.0; 4]]);
    }

    #[test]
    fn second_refinement_changes_nothing() {
        let registry = registry();
        let refiner = PrecisionRefiner::new();
        let log = ChangeLog::discard();

        refiner.run(&registry, &log).unwrap();
        let first: Vec<_> = registry
            .iter()
            .filter_map(|entry| entry.refined().cloned())
            .collect();

        refiner.run(&registry, &log).unwrap();
        let second: Vec<_> = registry
            .iter()
            .filter_map(|entry| entry.refined().cloned())
            .collect();

        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(&second) {
            assert_abs_diff_eq!(a.value, b.value, epsilon = 1e-15);
            assert_eq!(a.positions.len(), b.positions.len());
            for (pa, pb) in a.positions.iter().zip(&b.positions) {
                for (va, vb) in pa.iter().zip(pb) {
                    assert_abs_diff_eq!(va, vb, epsilon = 1e-12);
                }
            }
        }
    }

    #[test]
    fn ineligible_entries_are_skipped() {
        let defs = builtin()
            .into_iter()
            .filter(|def| ["quartic_noise", "mishra_bird"].contains(&def.name()));
        let (registry, _) = Registry::load(defs);

        let (outcomes, summary) = PrecisionRefiner::new()
            .run(&registry, &ChangeLog::discard())
            .unwrap();

        assert!(outcomes
            .iter()
            .all(|(_, outcome)| matches!(outcome, RefineOutcome::Skipped(_))));
        assert_eq!(summary.skipped, 2);
        assert!(registry.iter().all(|entry| entry.refined().is_none()));
    }
}
