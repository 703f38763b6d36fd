use crate::error::{DebtError, Result};

pub fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}

/// `count / total * 100`. A cohort without commits has no rate.
pub fn rate_per_100(count: u64, total: u64) -> Result<f64> {
    if total == 0 {
        return Err(DebtError::DataInsufficient(
            "no commits to normalize against".to_string(),
        ));
    }
    Ok(count as f64 / total as f64 * 100.0)
}

/// Open issues per 1,000 stars. Unstarred repositories have no ratio.
pub fn issues_per_1k_stars(open_issues: u64, stars: u64) -> Result<f64> {
    if stars == 0 {
        return Err(DebtError::DataInsufficient(format!(
            "0 stars with {open_issues} open issues"
        )));
    }
    Ok(open_issues as f64 / (stars as f64 / 1000.0))
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Sample standard deviation (n - 1). Needs at least two values.
pub fn sample_std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(var.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_commits_has_no_rate() {
        assert!(matches!(
            rate_per_100(3, 0),
            Err(DebtError::DataInsufficient(_))
        ));
    }

    #[test]
    fn debt_rate_regression_fixture() {
        // 19 todo + 151 broken + 70 other debt hits over 9,555 commits
        let count = 19 + 151 + 70;
        let rate = rate_per_100(count, 9_555).unwrap();
        assert!((round_to(rate, 2) - 2.51).abs() < 0.01);
    }

    #[test]
    fn rate_round_trips_to_count() {
        for total in [1u64, 7, 100, 333, 9_555, 123_457] {
            for count in [0u64, 1, 2, total / 3, total, total * 2] {
                let rate = rate_per_100(count, total).unwrap();
                let back = (rate * total as f64 / 100.0).round() as u64;
                assert_eq!(back, count, "count={count} total={total}");
            }
        }
    }

    #[test]
    fn zero_stars_has_no_ratio() {
        assert!(matches!(
            issues_per_1k_stars(5, 0),
            Err(DebtError::DataInsufficient(_))
        ));
        assert_eq!(issues_per_1k_stars(50, 2_000).unwrap(), 25.0);
    }

    #[test]
    fn median_handles_even_and_odd() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn std_dev_matches_sample_definition() {
        let sd = sample_std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert!((sd - 2.138_089_935).abs() < 1e-6);
        assert_eq!(sample_std_dev(&[1.0]), None);
    }

    #[test]
    fn rounding_for_display() {
        assert_eq!(round_to(2.511_775, 2), 2.51);
        assert_eq!(round_to(0.125, 1), 0.1);
        assert_eq!(round_to(12.0, 0), 12.0);
    }
}
