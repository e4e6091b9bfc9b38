use std::ops::RangeInclusive;

use uuid::Uuid;

use super::{dto::RatingSummary, repo};
use crate::backend::{BackendError, Db};

pub const ALLOWED: RangeInclusive<i16> = 1..=5;

pub fn validate(value: i16) -> Result<i16, String> {
    if ALLOWED.contains(&value) {
        Ok(value)
    } else {
        Err(format!(
            "Rating must be between {} and {}",
            ALLOWED.start(),
            ALLOWED.end()
        ))
    }
}

/// Mean rounded to one decimal place; no ratings reads as `{0, 0}`.
pub fn summarize(values: &[i16]) -> RatingSummary {
    if values.is_empty() {
        return RatingSummary {
            average: 0.0,
            count: 0,
        };
    }
    let sum: f64 = values.iter().map(|&v| f64::from(v)).sum();
    let mean = sum / values.len() as f64;
    RatingSummary {
        average: (mean * 10.0).round() / 10.0,
        count: values.len(),
    }
}

pub async fn summary_for(db: &Db<'_>, recipe_id: Uuid) -> Result<RatingSummary, BackendError> {
    let values: Vec<i16> = repo::list_for_recipe(db, recipe_id)
        .await?
        .into_iter()
        .map(|r| r.rating)
        .collect();
    Ok(summarize(&values))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_summary_is_zero() {
        assert_eq!(
            summarize(&[]),
            RatingSummary {
                average: 0.0,
                count: 0
            }
        );
    }

    #[test]
    fn summary_rounds_to_one_decimal() {
        assert_eq!(summarize(&[5, 4, 3]), RatingSummary { average: 4.0, count: 3 });
        assert_eq!(summarize(&[5, 5, 4]), RatingSummary { average: 4.7, count: 3 });
        assert_eq!(summarize(&[1, 2]), RatingSummary { average: 1.5, count: 2 });
    }

    #[test]
    fn values_outside_one_to_five_are_rejected() {
        assert_eq!(validate(1), Ok(1));
        assert_eq!(validate(5), Ok(5));
        assert_eq!(validate(0).unwrap_err(), "Rating must be between 1 and 5");
        assert!(validate(6).is_err());
        assert!(validate(-3).is_err());
    }
}
