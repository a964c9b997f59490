use serde::{Deserialize, Serialize};
use std::fmt;

/// Letter rank of a play. Ordered from worst to best.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Rank {
    /// Failed play. Only detectable from the rank glyph, never from accuracy.
    F,
    C,
    B,
    A,
    APlus,
    AA,
    AAPlus,
    S,
    SPlus,
    SS,
    SSPlus,
}

/// Minimum accuracy per rank, best first.
const THRESHOLDS: &[(f64, Rank)] = &[
    (99.8, Rank::SSPlus),
    (99.5, Rank::SS),
    (99.0, Rank::SPlus),
    (98.0, Rank::S),
    (97.0, Rank::AAPlus),
    (95.0, Rank::AA),
    (90.0, Rank::APlus),
    (80.0, Rank::A),
    (70.0, Rank::B),
];

impl Rank {
    /// Rank earned by an accuracy percentage (0-100). Never returns `F`.
    pub fn from_accuracy(accuracy: f64) -> Self {
        THRESHOLDS
            .iter()
            .find(|(min, _)| accuracy >= *min)
            .map(|(_, rank)| *rank)
            .unwrap_or(Rank::C)
    }

    /// Rating multiplier of the rank.
    pub fn ratio(&self) -> f64 {
        match self {
            Rank::F => 0.0,
            Rank::C => 0.2,
            Rank::B => 0.3,
            Rank::A => 0.4,
            Rank::APlus => 0.5,
            Rank::AA => 0.6,
            Rank::AAPlus => 0.7,
            Rank::S => 0.8,
            Rank::SPlus => 0.9,
            Rank::SS => 0.95,
            Rank::SSPlus => 1.0,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Rank::F => "F",
            Rank::C => "C",
            Rank::B => "B",
            Rank::A => "A",
            Rank::APlus => "A+",
            Rank::AA => "AA",
            Rank::AAPlus => "AA+",
            Rank::S => "S",
            Rank::SPlus => "S+",
            Rank::SS => "SS",
            Rank::SSPlus => "SS+",
        }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundaries_are_inclusive() {
        assert_eq!(Rank::from_accuracy(100.0), Rank::SSPlus);
        assert_eq!(Rank::from_accuracy(99.8), Rank::SSPlus);
        assert_eq!(Rank::from_accuracy(99.7999), Rank::SS);
        assert_eq!(Rank::from_accuracy(99.5), Rank::SS);
        assert_eq!(Rank::from_accuracy(99.0), Rank::SPlus);
        assert_eq!(Rank::from_accuracy(98.0), Rank::S);
        assert_eq!(Rank::from_accuracy(97.0), Rank::AAPlus);
        assert_eq!(Rank::from_accuracy(95.0), Rank::AA);
        assert_eq!(Rank::from_accuracy(90.0), Rank::APlus);
        assert_eq!(Rank::from_accuracy(80.0), Rank::A);
        assert_eq!(Rank::from_accuracy(70.0), Rank::B);
        assert_eq!(Rank::from_accuracy(69.9999), Rank::C);
        assert_eq!(Rank::from_accuracy(0.0), Rank::C);
    }

    #[test]
    fn test_monotonic_in_accuracy() {
        let mut previous = Rank::from_accuracy(0.0);
        for step in 0..=10_000 {
            let rank = Rank::from_accuracy(step as f64 / 100.0);
            assert!(rank >= previous, "rank dropped at {}", step as f64 / 100.0);
            previous = rank;
        }
    }

    #[test]
    fn test_labels() {
        assert_eq!(Rank::SSPlus.to_string(), "SS+");
        assert_eq!(Rank::AAPlus.to_string(), "AA+");
        assert_eq!(Rank::F.to_string(), "F");
    }

    #[test]
    fn test_ratio_grows_with_rank() {
        let ranks = [
            Rank::F,
            Rank::C,
            Rank::B,
            Rank::A,
            Rank::APlus,
            Rank::AA,
            Rank::AAPlus,
            Rank::S,
            Rank::SPlus,
            Rank::SS,
            Rank::SSPlus,
        ];
        for pair in ranks.windows(2) {
            assert!(pair[0].ratio() < pair[1].ratio());
        }
    }
}
