//! Progressive profit-target schedule.
//!
//! Later-session exits demand more of the theta decay: the required
//! profit percentage rises with hours held, piecewise-linear between the
//! configured knots and clamped at both ends.

use gexbot_core::config::TargetKnot;

/// Interpolate the required profit percentage after `age_hours` held.
pub fn progressive_target(age_hours: f64, knots: &[TargetKnot]) -> f64 {
    let Some(first) = knots.first() else {
        return 1.0; // no schedule, never triggers
    };
    if age_hours <= first.hours {
        return first.pct;
    }
    for pair in knots.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if age_hours <= b.hours {
            let span = b.hours - a.hours;
            if span <= 0.0 {
                return b.pct;
            }
            let t = (age_hours - a.hours) / span;
            return a.pct + t * (b.pct - a.pct);
        }
    }
    knots[knots.len() - 1].pct
}

#[cfg(test)]
mod tests {
    use super::*;
    use gexbot_core::config::ExitConfig;

    fn knots() -> Vec<TargetKnot> {
        ExitConfig::default().target_knots
    }

    #[test]
    fn endpoints_clamp() {
        let k = knots();
        assert_eq!(progressive_target(-1.0, &k), 0.50);
        assert_eq!(progressive_target(0.0, &k), 0.50);
        assert_eq!(progressive_target(4.0, &k), 0.80);
        assert_eq!(progressive_target(9.0, &k), 0.80);
    }

    #[test]
    fn interpolates_between_knots() {
        let k = knots();
        let mid = progressive_target(1.0, &k);
        assert!((mid - 0.575).abs() < 1e-12);
        let late = progressive_target(3.0, &k);
        assert!((late - 0.725).abs() < 1e-12);
    }

    #[test]
    fn schedule_is_monotone_and_bounded() {
        let k = knots();
        let mut prev = 0.0;
        for i in 0..=100 {
            let hours = i as f64 * 0.06;
            let target = progressive_target(hours, &k);
            assert!(target >= prev, "target decreased at {hours}");
            assert!((0.50..=0.80).contains(&target));
            prev = target;
        }
    }
}
