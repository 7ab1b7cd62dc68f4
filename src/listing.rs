//! Human-readable catalog in Markdown.
//!
//! The listing is derived from [`FunctionEntry`] fields only, so it can be
//! regenerated from the registry at any time.

use std::fmt::Write;

use crate::core::FunctionEntry;
use crate::registry::Registry;

/// Renders all entries of the registry, in registration order.
pub fn render(registry: &Registry) -> String {
    let mut out = String::from("# Benchmark functions\n");

    for entry in registry.iter() {
        let n = registry.resolver().resolve(&entry, None).ok();
        out.push('\n');
        out.push_str(&render_entry(&entry, n));
    }

    out
}

/// Renders one entry. Dimension-dependent metadata (bounds and minimum) is
/// shown for dimension `n` if given.
pub fn render_entry(entry: &FunctionEntry, n: Option<usize>) -> String {
    let mut out = String::new();

    // Writing into a String cannot fail.
    let _ = writeln!(out, "## {}\n", entry.name());
    if !entry.description().is_empty() {
        let _ = writeln!(out, "{}\n", entry.description());
    }
    if !entry.formula().is_empty() {
        let _ = writeln!(out, "* Formula: `{}`", entry.formula());
    }
    let _ = writeln!(out, "* Dimension: {}", entry.dimension());

    match n {
        Some(n) => {
            match entry.domain(n) {
                Ok(Some(domain)) => {
                    let _ = writeln!(
                        out,
                        "* Bounds (n = {}): lower {}, upper {}",
                        n,
                        vector(domain.lower().as_slice()),
                        vector(domain.upper().as_slice())
                    );
                }
                Ok(None) => {
                    let _ = writeln!(out, "* Bounds: none");
                }
                Err(error) => {
                    let _ = writeln!(out, "* Bounds: unavailable ({})", error);
                }
            }

            match entry.minimum(n) {
                Ok(minimum) => {
                    let positions = minimum
                        .positions
                        .iter()
                        .map(|p| vector(p.as_slice()))
                        .collect::<Vec<_>>()
                        .join(", ");
                    let _ = writeln!(
                        out,
                        "* Minimum (n = {}, {}): f = {} at {}",
                        n, minimum.source, minimum.value, positions
                    );
                }
                Err(error) => {
                    let _ = writeln!(out, "* Minimum: unavailable ({})", error);
                }
            }
        }
        None => {
            let _ = writeln!(out, "* Minimum: no working dimension");
        }
    }

    if !entry.properties().is_empty() {
        let _ = writeln!(out, "* Properties: {}", entry.properties());
    }
    if !entry.reference().is_empty() {
        let _ = writeln!(out, "* Reference: {}", entry.reference());
    }

    out
}

fn vector(values: &[f64]) -> String {
    let items = values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    format!("`[{}]`", items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Layout;
    use crate::testing::*;

    #[test]
    fn entry_section() {
        let record = paraboloid_record("bowl")
            .with_reference("Folklore")
            .with_bounds(Layout::Repeat(vec![-1.0]), Layout::Repeat(vec![2.5]));
        let text = render_entry(&build(record), Some(2));

        assert!(text.starts_with("## bowl\n\nSum of squares\n"));
        assert!(text.contains("* Dimension: scalable (default 2)\n"));
        assert!(text.contains("* Bounds (n = 2): lower `[-1, -1]`, upper `[2.5, 2.5]`\n"));
        assert!(text.contains("* Minimum (n = 2, literature): f = 0 at `[0, 0]`\n"));
        assert!(text.contains("* Reference: Folklore\n"));
    }

    #[test]
    fn registry_listing_in_order() {
        let (registry, _) = Registry::load(vec![
            paraboloid_def("cup"),
            paraboloid_def("bowl"),
            legacy_def("legacy"),
        ]);
        let text = render(&registry);

        let cup = text.find("## cup").unwrap();
        let bowl = text.find("## bowl").unwrap();
        assert!(text.starts_with("# Benchmark functions\n"));
        assert!(cup < bowl);
        // Resolved by probing.
        assert!(text.contains("* Minimum (n = 4, literature)"));
    }
}
