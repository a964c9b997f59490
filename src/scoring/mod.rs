//! Score arithmetic.
//!
//! Pure functions over note tallies. Rounding mirrors the values the game
//! displays: accuracy to 4 decimals, rating to 2.

pub mod rank;

pub use rank::Rank;

/// Base rating per level before accuracy and rank scaling.
const RATING_PER_LEVEL: f64 = 42.0;
/// Bonus factor for PLUS charts.
const PLUS_BONUS: f64 = 1.02;

/// Judgement counts of one play, best tier first.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NoteTally {
    pub top_high: u32,
    pub top: u32,
    pub mid: u32,
    pub low: u32,
    pub miss: u32,
}

impl NoteTally {
    pub fn new(top_high: u32, top: u32, mid: u32, low: u32, miss: u32) -> Self {
        Self {
            top_high,
            top,
            mid,
            low,
            miss,
        }
    }

    /// Sum of all five tiers.
    pub fn judged(&self) -> u64 {
        [self.top_high, self.top, self.mid, self.low, self.miss]
            .iter()
            .map(|&n| n as u64)
            .sum()
    }
}

/// Rounds the exact value of `value` to `decimals` places, ties to even.
///
/// Scaling by a power of ten first would round the product instead, which
/// moves values like 423.04500000000002 (stored for 423.045) onto a tie.
pub fn round_to(value: f64, decimals: usize) -> f64 {
    format!("{:.*}", decimals, value).parse().unwrap_or(value)
}

/// Accuracy percentage (0-100) of a tally, 4 decimals. 0.0 for an empty tally.
pub fn accuracy(tally: &NoteTally) -> f64 {
    let judged = tally.judged();
    if judged == 0 {
        return 0.0;
    }
    let points = (tally.top_high as u64 + tally.top as u64) * 100
        + tally.mid as u64 * 70
        + tally.low as u64 * 30;
    round_to(points as f64 / judged as f64, 4)
}

/// In-game score of a tally.
pub fn score(tally: &NoteTally) -> u64 {
    200 * tally.top_high as u64 + 150 * tally.top as u64 + 100 * tally.mid as u64
}

/// P.A.T.C.H. rating, 2 decimals. Rank F yields 0.0.
pub fn rating(level: u32, rank: Rank, is_plus: bool, accuracy: f64) -> f64 {
    if rank == Rank::F {
        return 0.0;
    }
    let mut base = level as f64 * RATING_PER_LEVEL * (accuracy / 100.0) * rank.ratio();
    if is_plus {
        base *= PLUS_BONUS;
    }
    round_to(base, 2)
}

/// Makes the five tiers agree with the displayed total.
///
/// Assumes at most one tier was misread. The first tier (best first) whose
/// count exceeds the total is recomputed from the others; if no tier exceeds
/// it, the miss count is recomputed. A consistent tally is returned unchanged.
pub fn repair_tally(total: u32, tally: NoteTally) -> NoteTally {
    if tally.judged() == total as u64 {
        return tally;
    }

    let mut tiers = [tally.top_high, tally.top, tally.mid, tally.low, tally.miss];
    let idx = tiers
        .iter()
        .position(|&n| n > total)
        .unwrap_or(tiers.len() - 1);

    let others: u64 = tiers
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != idx)
        .map(|(_, &n)| n as u64)
        .sum();
    tiers[idx] = (total as u64).saturating_sub(others) as u32;

    log::debug!(
        "Repaired note tally against total {}: {:?} -> {:?}",
        total,
        tally,
        tiers
    );
    NoteTally::new(tiers[0], tiers[1], tiers[2], tiers[3], tiers[4])
}

/// Chooses between the formula rating and the rating read off the screen.
///
/// The displayed value wins when it is within `agreement` of the formula
/// (it carries the game's own rounding) and on perfect plays (it includes a
/// bonus the formula does not model).
pub fn cross_validate_rating(formula: f64, ocr: f64, accuracy: f64, agreement: f64) -> f64 {
    if (ocr - formula).abs() <= agreement || accuracy == 100.0 {
        ocr
    } else {
        formula
    }
}

/// Maximum P.A.T.C.H.: a perfect play whose top-high share reaches `ratio`.
pub fn is_max_rating(accuracy: f64, total: u32, top_high: u32, ratio: f64) -> bool {
    if total == 0 || accuracy != 100.0 {
        return false;
    }
    top_high as f64 / total as f64 >= ratio
}

/// Additional top-high judgements needed to reach maximum P.A.T.C.H.
pub fn top_high_needed_for_max(total: u32, top_high: u32, ratio: f64) -> u32 {
    let required = (total as f64 * ratio).ceil() as u32;
    required.saturating_sub(top_high)
}
