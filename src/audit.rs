//! Sampling-based audit of declared property tags.
//!
//! Property tags are descriptive claims copied from the literature. The
//! validator tests each claim numerically on a reproducible random sample of
//! points and reports a verdict per tag:
//!
//! * `Confirmed` when the sample supports the claim (for claims that a finite
//!   sample can support at all),
//! * `Violated` when a counterexample was found,
//! * `Inconclusive` otherwise, including tags that are not checked.
//!
//! The audit is advisory. It never modifies entries, and a violated claim is
//! logged as a warning for a human to resolve.

use getset::{CopyGetters, Setters};
use log::{info, warn};
use nalgebra::DVector;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::algo::bfgs::{Bfgs, BfgsOptions, Termination};
use crate::batch::BatchSummary;
use crate::core::{Domain, FunctionEntry, GradientError, Property};
use crate::derivatives::{dual_gradient, relative_difference};
use crate::dimension::{DimensionError, DimensionResolver};
use crate::registry::Registry;

/// Options for [`PropertyValidator`].
#[derive(Debug, Clone, CopyGetters, Setters)]
#[getset(get_copy = "pub", set = "pub")]
pub struct AuditOptions {
    /// Number of sampled points (or pairs, or rays) per check. Default: `64`.
    samples: usize,
    /// Seed of the random generator. Default: `0x5eed`.
    seed: u64,
    /// Relative tolerance of equality tests. Default: `1e-8`.
    rel_tol: f64,
    /// Standard deviation of sampling around the starting point in unbounded
    /// directions. Default: `2`.
    spread: f64,
}

impl Default for AuditOptions {
    fn default() -> Self {
        Self {
            samples: 64,
            seed: 0x5eed,
            rel_tol: 1e-8,
            spread: 2.0,
        }
    }
}

/// Outcome of checking one property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The sample supports the claim.
    Confirmed,
    /// A counterexample was found.
    Violated,
    /// The sample neither supports nor refutes the claim.
    Inconclusive,
}

/// Verdict on one property with a human-readable detail.
#[derive(Debug, Clone, PartialEq)]
pub struct Finding {
    /// The checked property.
    pub property: Property,
    /// The verdict.
    pub verdict: Verdict,
    /// What was found.
    pub detail: String,
}

impl Finding {
    fn new(property: Property, verdict: Verdict, detail: impl Into<String>) -> Self {
        Self {
            property,
            verdict,
            detail: detail.into(),
        }
    }
}

/// Audit result of one entry.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditReport {
    /// Entry name.
    pub name: String,
    /// Dimension the audit was done in.
    pub n: usize,
    /// One finding per declared property.
    pub findings: Vec<Finding>,
}

impl AuditReport {
    /// Pairs of property and verdict.
    pub fn verdicts(&self) -> Vec<(Property, Verdict)> {
        self.findings
            .iter()
            .map(|f| (f.property, f.verdict))
            .collect()
    }

    /// Verdict for a property, if it was declared.
    pub fn verdict(&self, property: Property) -> Option<Verdict> {
        self.findings
            .iter()
            .find(|f| f.property == property)
            .map(|f| f.verdict)
    }

    /// Findings with a counterexample.
    pub fn violations(&self) -> impl Iterator<Item = &Finding> + '_ {
        self.findings
            .iter()
            .filter(|f| f.verdict == Verdict::Violated)
    }
}

/// Property validator.
///
/// See [module](self) documentation for more details.
#[derive(Debug, Clone, Default)]
pub struct PropertyValidator {
    options: AuditOptions,
    resolver: DimensionResolver,
}

struct Context<'a> {
    entry: &'a FunctionEntry,
    n: usize,
    domain: Domain<f64>,
    center: DVector<f64>,
    rng: StdRng,
    options: &'a AuditOptions,
}

impl Context<'_> {
    fn sample(&mut self) -> DVector<f64> {
        self.domain
            .sample(&self.center, self.options.spread, &mut self.rng)
    }

    fn eval(&self, x: &DVector<f64>) -> f64 {
        self.entry.evaluate(x).unwrap_or(f64::NAN)
    }

    fn close(&self, a: f64, b: f64, scale: f64) -> bool {
        (a - b).abs() <= self.options.rel_tol * scale.max(1.0)
    }
}

impl PropertyValidator {
    /// Initializes the validator with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Initializes the validator with given options and dimension resolver.
    pub fn with_options(options: AuditOptions, resolver: DimensionResolver) -> Self {
        Self { options, resolver }
    }

    /// Audits the entry at its working dimension.
    pub fn audit(&self, entry: &FunctionEntry) -> Result<AuditReport, DimensionError> {
        let n = self.resolver.resolve(entry, None)?;
        Ok(self.audit_at(entry, n))
    }

    /// Audits the entry at dimension `n`.
    pub fn audit_at(&self, entry: &FunctionEntry, n: usize) -> AuditReport {
        let domain = entry
            .domain_or_unconstrained(n)
            .unwrap_or_else(|_| Domain::unconstrained(n.max(1)));
        let center = entry
            .start(n)
            .unwrap_or_else(|_| DVector::zeros(domain.dim()));

        let mut ctx = Context {
            entry,
            n,
            domain,
            center,
            rng: StdRng::seed_from_u64(self.options.seed),
            options: &self.options,
        };

        let findings: Vec<_> = entry
            .properties()
            .iter()
            .map(|property| {
                let finding = match property {
                    Property::Separable => check_separable(&mut ctx, false),
                    Property::NonSeparable => check_separable(&mut ctx, true),
                    Property::Bounded => check_bounded(&mut ctx),
                    Property::Convex => check_convex(&mut ctx),
                    Property::Unimodal => check_unimodal(&mut ctx),
                    Property::Scalable => check_scalable(&ctx),
                    Property::Differentiable => check_differentiable(&mut ctx),
                    Property::HasNoise => check_noise(&ctx),
                    Property::Continuous
                    | Property::Multimodal
                    | Property::Constrained
                    | Property::Controversial => {
                        Finding::new(property, Verdict::Inconclusive, "not checked")
                    }
                };

                if finding.verdict == Verdict::Violated {
                    warn!(
                        "{}: property `{}` violated: {}",
                        entry.name(),
                        property,
                        finding.detail
                    );
                }

                finding
            })
            .collect();

        AuditReport {
            name: entry.name().to_string(),
            n,
            findings,
        }
    }

    /// Audits all entries of the registry.
    ///
    /// An entry counts as succeeded when none of its properties is violated.
    pub fn audit_all(
        &self,
        registry: &Registry,
    ) -> (
        Vec<(String, Result<AuditReport, DimensionError>)>,
        BatchSummary,
    ) {
        let mut summary = BatchSummary::new("clean");

        let results = registry
            .iter()
            .map(|entry| {
                let result = registry
                    .resolver()
                    .resolve(&entry, None)
                    .map(|n| self.audit_at(&entry, n));

                match &result {
                    Ok(report) if report.violations().next().is_none() => summary.success(),
                    Ok(_) => summary.failure(),
                    Err(error) => {
                        warn!("{}: {}", entry.name(), error);
                        summary.failure();
                    }
                }

                (entry.name().to_string(), result)
            })
            .collect();

        info!("property audit: {}", summary);
        (results, summary)
    }
}

// f(x) - f(a) == sum_i [f(a with x_i) - f(a)] for separable functions.
fn check_separable(ctx: &mut Context<'_>, expect_counterexample: bool) -> Finding {
    let property = if expect_counterexample {
        Property::NonSeparable
    } else {
        Property::Separable
    };

    if ctx.entry.has(Property::HasNoise) {
        return Finding::new(property, Verdict::Inconclusive, "noisy function");
    }

    let anchor = ctx.center.clone();
    let fa = ctx.eval(&anchor);
    if !fa.is_finite() {
        return Finding::new(property, Verdict::Inconclusive, "anchor point undefined");
    }

    let mut checked = 0;
    let mut counterexample = None;

    for _ in 0..ctx.options.samples {
        let x = ctx.sample();
        let fx = ctx.eval(&x);

        let mut sum = 0.0;
        let mut scale = fx.abs() + fa.abs();
        let mut defined = fx.is_finite();

        for i in 0..ctx.n {
            let mut xi = anchor.clone();
            xi[i] = x[i];
            let term = ctx.eval(&xi) - fa;
            defined &= term.is_finite();
            sum += term;
            scale += term.abs();
        }

        if !defined {
            continue;
        }
        checked += 1;

        if !ctx.close(fx - fa, sum, scale) {
            counterexample = Some((x, (fx - fa - sum).abs()));
            break;
        }
    }

    match (counterexample, expect_counterexample) {
        (Some((x, gap)), true) => Finding::new(
            property,
            Verdict::Confirmed,
            format!("additive decomposition fails by {:e} at {:?}", gap, x.as_slice()),
        ),
        (Some((x, gap)), false) => Finding::new(
            property,
            Verdict::Violated,
            format!("additive decomposition fails by {:e} at {:?}", gap, x.as_slice()),
        ),
        (None, _) if checked == 0 => {
            Finding::new(property, Verdict::Inconclusive, "no defined sample")
        }
        (None, true) => Finding::new(
            property,
            Verdict::Inconclusive,
            format!("no counterexample in {} samples", checked),
        ),
        (None, false) => Finding::new(
            property,
            Verdict::Confirmed,
            format!("decomposition holds in {} samples", checked),
        ),
    }
}

fn check_bounded(ctx: &mut Context<'_>) -> Finding {
    let property = Property::Bounded;

    let domain = match ctx.entry.domain(ctx.n) {
        Ok(Some(domain)) if domain.is_bounded() => domain,
        Ok(_) => return Finding::new(property, Verdict::Violated, "no finite bounds recorded"),
        Err(error) => return Finding::new(property, Verdict::Violated, error.to_string()),
    };

    if let Ok(minimum) = ctx.entry.minimum(ctx.n) {
        if let Some(outside) = minimum.positions.iter().find(|p| !domain.contains(p)) {
            return Finding::new(
                property,
                Verdict::Violated,
                format!("minimizer {:?} outside of bounds", outside.as_slice()),
            );
        }
    }

    if !domain.contains(&ctx.center) {
        return Finding::new(property, Verdict::Violated, "starting point outside of bounds");
    }

    // Undefined values are expected outside of the feasible region.
    let nan_allowed = ctx.entry.has(Property::Constrained);
    let acceptable = |v: f64| v.is_finite() || (nan_allowed && v.is_nan());

    let corners = if ctx.n < 63 { 1u64 << ctx.n } else { u64::MAX };
    let masks: Vec<u64> = if corners <= ctx.options.samples as u64 {
        (0..corners).collect()
    } else {
        (0..ctx.options.samples)
            .map(|_| ctx.rng.gen::<u64>())
            .collect()
    };

    for mask in masks {
        let corner = domain.corner(mask);
        if !acceptable(ctx.eval(&corner)) {
            return Finding::new(
                property,
                Verdict::Violated,
                format!("non-finite value at corner {:?}", corner.as_slice()),
            );
        }
    }

    for _ in 0..ctx.options.samples {
        let x = ctx.sample();
        if !acceptable(ctx.eval(&x)) {
            return Finding::new(
                property,
                Verdict::Violated,
                format!("non-finite value at {:?}", x.as_slice()),
            );
        }
    }

    Finding::new(property, Verdict::Confirmed, "bounds, minimizers and samples consistent")
}

// Midpoint convexity on sampled pairs.
fn check_convex(ctx: &mut Context<'_>) -> Finding {
    let property = Property::Convex;

    for _ in 0..ctx.options.samples {
        let x = ctx.sample();
        let y = ctx.sample();
        let mid = (&x + &y) * 0.5;

        let (fx, fy, fm) = (ctx.eval(&x), ctx.eval(&y), ctx.eval(&mid));
        if !(fx.is_finite() && fy.is_finite() && fm.is_finite()) {
            continue;
        }

        let chord = 0.5 * (fx + fy);
        if fm > chord && !ctx.close(fm, chord, fm.abs() + chord.abs()) {
            return Finding::new(
                property,
                Verdict::Violated,
                format!(
                    "midpoint value {:e} above chord {:e} between {:?} and {:?}",
                    fm,
                    chord,
                    x.as_slice(),
                    y.as_slice()
                ),
            );
        }
    }

    Finding::new(
        property,
        Verdict::Inconclusive,
        format!("no counterexample in {} pairs", ctx.options.samples),
    )
}

// Local descent from sampled points must not end in another local minimum.
fn check_unimodal(ctx: &mut Context<'_>) -> Finding {
    let property = Property::Unimodal;

    let minimum = match ctx.entry.minimum(ctx.n) {
        Ok(minimum) => minimum,
        Err(error) => return Finding::new(property, Verdict::Inconclusive, error.to_string()),
    };

    let mut options = BfgsOptions::default();
    options
        .set_gtol(1e-9)
        .set_stall_gtol(1e-6)
        .set_max_iters(500);
    let bfgs = Bfgs::with_options(options);
    let domain = ctx.entry.domain(ctx.n).ok().flatten();

    let runs = ctx.options.samples.min(16);
    for _ in 0..runs {
        let x0 = ctx.sample();
        // Stalled runs near singular minima are not trusted as minima.
        let report = match bfgs.minimize(ctx.entry, x0, domain.as_ref()) {
            Ok(report) if report.termination == Termination::Gradient => report,
            _ => continue,
        };

        let elsewhere = minimum
            .positions
            .iter()
            .all(|m| relative_difference(m, &report.x) > 1e-4);
        let higher = report.fx - minimum.value > 1e-6 * minimum.value.abs().max(1.0);

        if elsewhere && higher {
            return Finding::new(
                property,
                Verdict::Violated,
                format!(
                    "local minimum {:e} at {:?}",
                    report.fx,
                    report.x.as_slice()
                ),
            );
        }
    }

    Finding::new(
        property,
        Verdict::Inconclusive,
        format!("no other local minimum in {} descents", runs),
    )
}

fn check_scalable(ctx: &Context<'_>) -> Finding {
    let property = Property::Scalable;
    let nan_allowed = ctx.entry.has(Property::Constrained);

    for n in [ctx.n, 2 * ctx.n] {
        let x = match ctx.entry.start(n) {
            Ok(x) => x,
            Err(error) => {
                return Finding::new(
                    property,
                    Verdict::Violated,
                    format!("no starting point at n = {}: {}", n, error),
                )
            }
        };

        match ctx.entry.evaluate(&x) {
            Ok(v) if v.is_finite() || nan_allowed => {}
            Ok(v) => {
                return Finding::new(
                    property,
                    Verdict::Violated,
                    format!("value {} at n = {}", v, n),
                )
            }
            Err(error) => {
                return Finding::new(property, Verdict::Violated, error.to_string());
            }
        }

        if let Err(error @ GradientError::InvalidDimensionality { .. }) =
            ctx.entry.gradient::<f64>(&x)
        {
            return Finding::new(property, Verdict::Violated, error.to_string());
        }
    }

    Finding::new(
        property,
        Verdict::Confirmed,
        format!("evaluates at n = {} and n = {}", ctx.n, 2 * ctx.n),
    )
}

// Analytic gradient against forward-mode automatic differentiation.
fn check_differentiable(ctx: &mut Context<'_>) -> Finding {
    let property = Property::Differentiable;
    let mut checked = 0;
    let mut kinks = 0;

    for _ in 0..ctx.options.samples {
        let x = ctx.sample();
        if !ctx.eval(&x).is_finite() {
            continue;
        }

        let analytic = match ctx.entry.gradient::<f64>(&x) {
            Ok(g) => g,
            Err(_) => {
                kinks += 1;
                continue;
            }
        };
        let ad = match dual_gradient(ctx.entry, &x) {
            Some(g) => g,
            None => continue,
        };

        checked += 1;
        let diff = relative_difference(&analytic, &ad);
        if diff > 1e-7 {
            return Finding::new(
                property,
                Verdict::Violated,
                format!(
                    "analytic gradient differs from automatic differentiation by {:e} at {:?}",
                    diff,
                    x.as_slice()
                ),
            );
        }
    }

    if checked == 0 {
        Finding::new(property, Verdict::Inconclusive, "no differentiable sample")
    } else {
        Finding::new(
            property,
            Verdict::Confirmed,
            format!("gradient agrees at {} samples ({} kinks skipped)", checked, kinks),
        )
    }
}

fn check_noise(ctx: &Context<'_>) -> Finding {
    let property = Property::HasNoise;
    let values: Vec<f64> = (0..4).map(|_| ctx.eval(&ctx.center)).collect();

    if values.windows(2).any(|w| w[0] != w[1]) {
        Finding::new(property, Verdict::Confirmed, "repeated evaluations differ")
    } else {
        Finding::new(property, Verdict::Violated, "repeated evaluations are identical")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Layout;
    use crate::testing::*;

    #[test]
    fn paraboloid_claims() {
        let record = paraboloid_record("bowl")
            .with_bounds(Layout::Repeat(vec![-5.0]), Layout::Repeat(vec![5.0]))
            .with_properties([
                "scalable",
                "separable",
                "convex",
                "unimodal",
                "differentiable",
                "bounded",
                "continuous",
            ]);
        let entry = build(record);
        let report = PropertyValidator::new().audit(&entry).unwrap();

        assert_eq!(report.n, 2);
        assert_eq!(report.verdict(Property::Separable), Some(Verdict::Confirmed));
        assert_eq!(report.verdict(Property::Convex), Some(Verdict::Inconclusive));
        assert_eq!(report.verdict(Property::Unimodal), Some(Verdict::Inconclusive));
        assert_eq!(report.verdict(Property::Bounded), Some(Verdict::Confirmed));
        assert_eq!(report.verdict(Property::Scalable), Some(Verdict::Confirmed));
        assert_eq!(
            report.verdict(Property::Differentiable),
            Some(Verdict::Confirmed)
        );
        assert_eq!(
            report.verdict(Property::Continuous),
            Some(Verdict::Inconclusive)
        );
        assert_eq!(report.violations().count(), 0);
    }

    #[test]
    fn false_claims_are_violated() {
        let record = coupled_record("saddle").with_properties(["separable", "convex", "bounded"]);
        let entry = build_coupled(record);
        let report = PropertyValidator::new().audit(&entry).unwrap();

        assert_eq!(report.verdict(Property::Separable), Some(Verdict::Violated));
        assert_eq!(report.verdict(Property::Convex), Some(Verdict::Violated));
        assert_eq!(report.verdict(Property::Bounded), Some(Verdict::Violated));
    }

    #[test]
    fn noise_claim_on_deterministic_function_is_violated() {
        let entry = build_coupled(coupled_record("saddle").with_properties(["has_noise"]));
        let report = PropertyValidator::new().audit(&entry).unwrap();

        assert_eq!(report.verdict(Property::HasNoise), Some(Verdict::Violated));
    }

    #[test]
    fn non_separable_is_confirmed_by_counterexample() {
        let entry = build_coupled(coupled_record("saddle").with_properties(["non_separable"]));
        let report = PropertyValidator::new().audit(&entry).unwrap();

        assert_eq!(
            report.verdict(Property::NonSeparable),
            Some(Verdict::Confirmed)
        );
    }

    #[test]
    fn noise_is_detected() {
        let entry = noisy_def("noisy").build().unwrap();
        let report = PropertyValidator::new().audit(&entry).unwrap();

        assert_eq!(report.verdict(Property::HasNoise), Some(Verdict::Confirmed));
    }

    #[test]
    fn audit_is_reproducible() {
        let entry = build_coupled(coupled_record("saddle").with_properties(["convex"]));
        let validator = PropertyValidator::new();

        assert_eq!(validator.audit(&entry), validator.audit(&entry));
    }

    #[test]
    fn second_local_minimum_violates_unimodality() {
        let entry = double_well(|record| record.with_properties(["unimodal"]));
        let report = PropertyValidator::new().audit(&entry).unwrap();

        assert_eq!(report.verdict(Property::Unimodal), Some(Verdict::Violated));
    }
}
