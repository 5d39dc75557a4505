//! Exam arithmetic: hint penalties, percentages, letter grades.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use rust_decimal::RoundingStrategy;

pub const MAX_QUESTION_SCORE: i64 = 10;
pub const MAX_HINTS_PER_QUESTION: u32 = 3;
/// Fraction of the question's max score deducted per hint.
pub const HINT_PENALTY_FRACTION: Decimal = Decimal::from_parts(15, 0, 0, false, 2);
pub const PASS_PERCENTAGE: f64 = 50.0;

pub fn max_question_score() -> Decimal {
    Decimal::from(MAX_QUESTION_SCORE)
}

pub fn round1(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero)
}

/// Converts a model-reported score, clamped to `[0, max]`.
pub fn clamp_score(raw: f64) -> Decimal {
    if !raw.is_finite() {
        return Decimal::ZERO;
    }
    let bounded = raw.clamp(0.0, MAX_QUESTION_SCORE as f64);
    round1(Decimal::from_f64(bounded).unwrap_or(Decimal::ZERO))
}

/// Cumulative penalty fraction after `hints` hints (0.15 per hint).
pub fn penalty_fraction(hints: u32) -> Decimal {
    HINT_PENALTY_FRACTION * Decimal::from(hints)
}

pub fn hint_penalty_points(hints: u32) -> Decimal {
    round1(penalty_fraction(hints) * max_question_score())
}

/// Score after subtracting the hint penalty; never negative.
pub fn apply_hint_penalty(score: Decimal, hints: u32) -> Decimal {
    round1((score - hint_penalty_points(hints)).max(Decimal::ZERO))
}

pub fn percentage(total: Decimal, question_count: i32) -> f64 {
    if question_count <= 0 {
        return 0.0;
    }
    let max = max_question_score() * Decimal::from(question_count);
    let pct = round1(total / max * Decimal::from(100));
    pct.to_f64().unwrap_or(0.0)
}

pub fn grade_letter(percentage: f64) -> &'static str {
    if percentage >= 90.0 {
        "A"
    } else if percentage >= 80.0 {
        "B"
    } else if percentage >= 70.0 {
        "C"
    } else if percentage >= 60.0 {
        "D"
    } else {
        "F"
    }
}

pub fn passed(percentage: f64) -> bool {
    percentage >= PASS_PERCENTAGE
}

/// Letter for a single question score out of the per-question max.
pub fn question_grade_letter(score: Decimal) -> &'static str {
    grade_letter(percentage(score, 1))
}

/// A question counts as correct at half the max score or above.
pub fn question_passed(score: Decimal) -> bool {
    passed(percentage(score, 1))
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreSummary {
    pub total_score: Decimal,
    pub max_score: Decimal,
    pub percentage: f64,
    pub grade_letter: &'static str,
    pub passed: bool,
}

pub fn summarize(scores: &[Decimal], question_count: i32) -> ScoreSummary {
    let total_score: Decimal = scores.iter().copied().sum();
    let pct = percentage(total_score, question_count);
    ScoreSummary {
        total_score,
        max_score: max_question_score() * Decimal::from(question_count.max(0)),
        percentage: pct,
        grade_letter: grade_letter(pct),
        passed: passed(pct),
    }
}

pub fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(v: i64) -> Decimal {
        Decimal::from(v)
    }

    #[test]
    fn aggregates_scores_into_grade() {
        let summary = summarize(&[d(8), d(6), d(10)], 3);
        assert_eq!(summary.total_score, d(24));
        assert_eq!(summary.max_score, d(30));
        assert_eq!(summary.percentage, 80.0);
        assert_eq!(summary.grade_letter, "B");
        assert!(summary.passed);
    }

    #[test]
    fn grade_cutoffs() {
        assert_eq!(grade_letter(90.0), "A");
        assert_eq!(grade_letter(89.9), "B");
        assert_eq!(grade_letter(70.0), "C");
        assert_eq!(grade_letter(60.0), "D");
        assert_eq!(grade_letter(59.9), "F");
        assert!(passed(50.0));
        assert!(!passed(49.9));
    }

    #[test]
    fn hint_penalty_is_fifteen_percent_of_max_per_hint() {
        assert_eq!(penalty_fraction(2), Decimal::new(30, 2));
        assert_eq!(hint_penalty_points(1), Decimal::new(15, 1));
        assert_eq!(apply_hint_penalty(d(9), 2), Decimal::new(60, 1));
        assert_eq!(apply_hint_penalty(d(2), 3), Decimal::ZERO);
        assert_eq!(apply_hint_penalty(d(7), 0), d(7));
    }

    #[test]
    fn clamps_model_scores() {
        assert_eq!(clamp_score(14.0), d(10));
        assert_eq!(clamp_score(-3.0), Decimal::ZERO);
        assert_eq!(clamp_score(7.25), Decimal::new(73, 1));
        assert_eq!(clamp_score(f64::NAN), Decimal::ZERO);
        assert_eq!(clamp_score(1e30), d(10));
        assert_eq!(clamp_score(-1e30), Decimal::ZERO);
    }

    #[test]
    fn empty_exam_scores_zero() {
        let summary = summarize(&[], 0);
        assert_eq!(summary.percentage, 0.0);
        assert_eq!(summary.grade_letter, "F");
        assert!(!summary.passed);
    }

    #[test]
    fn single_question_verdicts() {
        assert!(question_passed(Decimal::new(50, 1)));
        assert!(!question_passed(Decimal::new(49, 1)));
        assert_eq!(question_grade_letter(d(9)), "A");
    }
}
