//! Safe-area reconciliation across independently updating inset sources.
//!
//! Additive sources describe independent reservations (platform notch insets, host chrome,
//! app-requested padding) and stack edge by edge. Floor sources (CSS `env()` values, heuristic
//! overlay regions) only raise an edge when the additive total falls short of them.

use crate::insets::{Insets, PartialInsets, ViewportInsets};

/// Custom properties read from the document root for the CSS floor source.
pub const CSS_SAFE_AREA_PROPERTIES: [&str; 4] = [
    "--safe-area-inset-top",
    "--safe-area-inset-right",
    "--safe-area-inset-bottom",
    "--safe-area-inset-left",
];

/// Inputs to [`compute_combined_safe_area`]. Every source is optional.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SafeAreaSources {
    /// Platform-pushed insets (native notch, host config).
    pub environment: Option<PartialInsets>,
    /// Viewport API insets; both inner fields are additive.
    pub viewport: Option<ViewportInsets>,
    /// CSS custom property values, applied as a floor.
    pub css: Option<PartialInsets>,
    /// Extra insets to stack on top of the platform values.
    pub additions: Option<PartialInsets>,
    /// Minimum insets, applied as a floor after `css`.
    pub minimum: Option<PartialInsets>,
}

/// Merges every source into one inset.
///
/// Starts from zero, sums `environment`, `viewport.safe_area`, `viewport.content_safe_area` and
/// `additions`, then raises each edge to at least `css` and `minimum`. Non-finite values count
/// as zero. The function keeps no state between calls.
pub fn compute_combined_safe_area(sources: &SafeAreaSources) -> Insets {
    let mut combined = Insets::ZERO;

    add_insets(&mut combined, sources.environment.as_ref());
    if let Some(viewport) = sources.viewport.as_ref() {
        add_insets(&mut combined, viewport.safe_area.as_ref());
        add_insets(&mut combined, viewport.content_safe_area.as_ref());
    }
    add_insets(&mut combined, sources.additions.as_ref());

    apply_floor(&mut combined, sources.css.as_ref());
    apply_floor(&mut combined, sources.minimum.as_ref());

    combined
}

fn add_insets(target: &mut Insets, source: Option<&PartialInsets>) {
    let Some(source) = source else {
        return;
    };
    for (edge, value) in target.edges_mut().into_iter().zip(source.edges()) {
        if let Some(value) = value.filter(|value| value.is_finite()) {
            *edge += value;
        }
    }
}

fn apply_floor(target: &mut Insets, source: Option<&PartialInsets>) {
    let Some(source) = source else {
        return;
    };
    for (edge, value) in target.edges_mut().into_iter().zip(source.edges()) {
        if let Some(value) = value.filter(|value| value.is_finite()) {
            *edge = edge.max(value);
        }
    }
}

/// Parses a computed-style length the way `parseFloat` does: leading whitespace is skipped, the
/// longest numeric prefix is read and any unit suffix ignored. Returns `0.0` when no finite
/// number can be read.
pub fn parse_css_length(raw: &str) -> f64 {
    let trimmed = raw.trim_start();
    let mut end = 0;
    let mut seen_digit = false;
    let mut seen_dot = false;
    let mut seen_exp = false;
    let bytes = trimmed.as_bytes();

    while end < bytes.len() {
        let byte = bytes[end];
        match byte {
            b'0'..=b'9' => seen_digit = true,
            b'+' | b'-' if end == 0 => {}
            b'+' | b'-' if seen_exp && matches!(bytes[end - 1], b'e' | b'E') => {}
            b'.' if !seen_dot && !seen_exp => seen_dot = true,
            b'e' | b'E' if seen_digit && !seen_exp => seen_exp = true,
            _ => break,
        }
        end += 1;
    }

    // Trim a dangling exponent marker or sign ("12e", "3e-").
    let mut candidate = &trimmed[..end];
    while let Some(last) = candidate.chars().last() {
        if matches!(last, 'e' | 'E' | '+' | '-') {
            candidate = &candidate[..candidate.len() - 1];
        } else {
            break;
        }
    }

    candidate
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .unwrap_or(0.0)
}

/// Builds the CSS floor source from raw `--safe-area-inset-*` strings.
///
/// Returns `None` when every edge reads as zero so an unset stylesheet contributes nothing.
pub fn css_safe_area_from_values(
    top: &str,
    right: &str,
    bottom: &str,
    left: &str,
) -> Option<Insets> {
    let insets = Insets::new(
        parse_css_length(top),
        parse_css_length(right),
        parse_css_length(bottom),
        parse_css_length(left),
    );
    if insets.is_zero() {
        None
    } else {
        Some(insets)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn edges(top: f64, right: f64, bottom: f64, left: f64) -> Option<PartialInsets> {
        Some(Insets::new(top, right, bottom, left).into())
    }

    #[test]
    fn empty_sources_yield_zero() {
        assert_eq!(
            compute_combined_safe_area(&SafeAreaSources::default()),
            Insets::ZERO
        );
    }

    #[test]
    fn css_floor_wins_when_larger_than_additive_sum() {
        let combined = compute_combined_safe_area(&SafeAreaSources {
            css: edges(20.0, 0.0, 0.0, 0.0),
            environment: edges(10.0, 0.0, 0.0, 0.0),
            ..SafeAreaSources::default()
        });
        assert_eq!(combined.top, 20.0);
    }

    #[test]
    fn additive_sum_beyond_floor_is_kept() {
        let combined = compute_combined_safe_area(&SafeAreaSources {
            environment: edges(30.0, 0.0, 0.0, 0.0),
            css: edges(20.0, 0.0, 0.0, 0.0),
            ..SafeAreaSources::default()
        });
        assert_eq!(combined.top, 30.0);
    }

    #[test]
    fn additive_sources_stack_and_floors_do_not_double_count() {
        let combined = compute_combined_safe_area(&SafeAreaSources {
            environment: edges(10.0, 0.0, 34.0, 0.0),
            viewport: Some(ViewportInsets {
                safe_area: edges(4.0, 1.0, 0.0, 0.0),
                content_safe_area: Some(PartialInsets::top(46.0)),
            }),
            additions: edges(0.0, 0.0, 8.0, 2.0),
            css: edges(0.0, 0.0, 20.0, 0.0),
            minimum: edges(56.0, 88.0, 0.0, 0.0),
        });
        assert_eq!(combined, Insets::new(60.0, 88.0, 42.0, 2.0));
    }

    #[test]
    fn output_dominates_additive_sum_and_every_floor() {
        let environment = Insets::new(3.0, 7.5, 0.0, 1.0);
        let additions = Insets::new(2.0, 0.5, 9.0, 0.0);
        let css = Insets::new(4.0, 12.0, 1.0, 0.0);
        let minimum = Insets::new(6.0, 1.0, 8.0, 5.0);
        let combined = compute_combined_safe_area(&SafeAreaSources {
            environment: Some(environment.into()),
            additions: Some(additions.into()),
            css: Some(css.into()),
            minimum: Some(minimum.into()),
            ..SafeAreaSources::default()
        });

        let pairs = [
            (combined.top, environment.top + additions.top, css.top, minimum.top),
            (combined.right, environment.right + additions.right, css.right, minimum.right),
            (combined.bottom, environment.bottom + additions.bottom, css.bottom, minimum.bottom),
            (combined.left, environment.left + additions.left, css.left, minimum.left),
        ];
        for (edge, sum, css_floor, min_floor) in pairs {
            assert!(edge >= sum);
            assert!(edge >= css_floor);
            assert!(edge >= min_floor);
        }
    }

    #[test]
    fn non_finite_values_contribute_nothing() {
        let combined = compute_combined_safe_area(&SafeAreaSources {
            environment: Some(PartialInsets {
                top: Some(f64::NAN),
                right: Some(f64::INFINITY),
                bottom: Some(5.0),
                left: None,
            }),
            css: Some(PartialInsets {
                top: Some(f64::NAN),
                ..PartialInsets::default()
            }),
            ..SafeAreaSources::default()
        });
        assert_eq!(combined, Insets::new(0.0, 0.0, 5.0, 0.0));
    }

    #[test]
    fn css_length_parsing_follows_parse_float() {
        assert_eq!(parse_css_length("  24px"), 24.0);
        assert_eq!(parse_css_length("12.5"), 12.5);
        assert_eq!(parse_css_length("-3px"), -3.0);
        assert_eq!(parse_css_length("1e1px"), 10.0);
        assert_eq!(parse_css_length("7e"), 7.0);
        assert_eq!(parse_css_length(""), 0.0);
        assert_eq!(parse_css_length("env(safe-area-inset-top)"), 0.0);
        assert_eq!(parse_css_length("NaN"), 0.0);
    }

    #[test]
    fn css_values_all_zero_are_absent() {
        assert_eq!(css_safe_area_from_values("0px", "", "0", "auto"), None);
        assert_eq!(
            css_safe_area_from_values("47px", "0px", "34px", "0px"),
            Some(Insets::new(47.0, 0.0, 34.0, 0.0))
        );
    }
}
