//! Best-record reconciliation.
//!
//! A new result replaces the stored best when its accuracy is higher; on
//! equal accuracy when its score is higher; on equal accuracy and score when
//! it is a full combo and the stored best is not. Improvements are pushed to
//! the archive service; a failed push never blocks the local update.

use anyhow::Result;
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use super::{ArchiveKey, ArchiveStore, BestRecord};
use crate::analysis::report::{badge, group_thousands};
use crate::analysis::AnalysisResult;
use crate::catalog::Difficulty;
use crate::scoring::round_to;

/// Record pushed to the archive service after an improvement.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SyncRecord {
    pub song_id: u32,
    pub line: u8,
    pub difficulty: Difficulty,
    pub level: u32,
    pub judge: f64,
    pub score: u64,
    pub patch: f64,
    pub is_full_combo: bool,
    pub is_max_patch: bool,
}

impl SyncRecord {
    pub fn new(key: ArchiveKey, result: &AnalysisResult) -> Self {
        Self {
            song_id: key.song_id,
            line: key.line,
            difficulty: key.difficulty,
            level: key.level,
            judge: result.accuracy,
            score: result.score,
            patch: result.rating,
            is_full_combo: result.is_full_combo,
            is_max_patch: result.is_max_rating,
        }
    }
}

/// Destination for improved records.
pub trait ArchiveSync: Send + Sync {
    fn push(&self, record: &SyncRecord) -> Result<()>;
}

/// Change between the previous and the new best.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RecordDelta {
    pub accuracy: f64,
    pub score: i64,
    pub rating: f64,
}

impl RecordDelta {
    fn between(previous: &BestRecord, current: &BestRecord) -> Self {
        Self {
            accuracy: round_to(current.accuracy() - previous.accuracy(), 4),
            score: current.score() as i64 - previous.score() as i64,
            rating: round_to(current.rating() - previous.rating(), 2),
        }
    }
}

/// What reconciling one result did.
#[derive(Clone, Debug, PartialEq)]
pub enum Reconciliation {
    /// The result replaced the stored best.
    Improved {
        key: ArchiveKey,
        title: String,
        previous: BestRecord,
        current: BestRecord,
        delta: RecordDelta,
        /// Whether the archive service accepted the record
        synced: bool,
        /// Top-high judgements missing for maximum P.A.T.C.H.
        top_high_needed: Option<u32>,
    },
    /// The stored best stands.
    NotImproved {
        key: ArchiveKey,
        title: String,
        best: BestRecord,
        elapsed: TimeDelta,
    },
    /// Difficulty or level unknown, so the result belongs to no chart.
    Unattributed { title: String },
}

impl Reconciliation {
    pub fn is_improved(&self) -> bool {
        matches!(self, Reconciliation::Improved { .. })
    }
}

/// True if `result` should replace `best`.
pub fn is_improvement(result: &AnalysisResult, best: &BestRecord) -> bool {
    if result.accuracy != best.accuracy() {
        return result.accuracy > best.accuracy();
    }
    if result.score != best.score() {
        return result.score > best.score();
    }
    result.is_full_combo && !best.is_full_combo()
}

/// Compares results against the archive and records improvements.
pub struct ArchiveReconciler {
    store: ArchiveStore,
    sync: Option<Arc<dyn ArchiveSync>>,
    max_rating_ratio: f64,
}

impl ArchiveReconciler {
    /// `sync` is None when running without an archive account.
    pub fn new(store: ArchiveStore, sync: Option<Arc<dyn ArchiveSync>>, max_rating_ratio: f64) -> Self {
        Self {
            store,
            sync,
            max_rating_ratio,
        }
    }

    pub fn store(&self) -> &ArchiveStore {
        &self.store
    }

    pub fn reconcile(&mut self, result: &AnalysisResult, now: DateTime<Utc>) -> Reconciliation {
        let title = result.song.title.clone();
        let Some(key) = ArchiveKey::of(result) else {
            log::warn!("'{}': chart unknown, result not recorded", title);
            return Reconciliation::Unattributed { title };
        };

        let previous = self
            .store
            .get(&key)
            .cloned()
            .unwrap_or_else(|| BestRecord::placeholder(now));

        if !is_improvement(result, &previous) {
            log::info!("{}: best record stands", key);
            return Reconciliation::NotImproved {
                key,
                title,
                elapsed: now - previous.decoded_at(),
                best: previous,
            };
        }

        let current = self.store.apply(key, result, now);
        log::info!(
            "{}: new best {:.4}% / {}",
            key,
            current.accuracy(),
            current.score()
        );
        let synced = self.push(key, result);

        Reconciliation::Improved {
            key,
            title,
            delta: RecordDelta::between(&previous, &current),
            previous,
            current,
            synced,
            top_high_needed: result.top_high_needed_for_max(self.max_rating_ratio),
        }
    }

    fn push(&self, key: ArchiveKey, result: &AnalysisResult) -> bool {
        let Some(sync) = &self.sync else {
            log::debug!("{}: no archive account, not synced", key);
            return false;
        };
        match sync.push(&SyncRecord::new(key, result)) {
            Ok(()) => true,
            Err(e) => {
                log::error!("{}: failed to sync record: {:#}", key, e);
                false
            }
        }
    }
}

fn chart_label(title: &str, key: &ArchiveKey) -> String {
    format!("{} {}L {} Lv.{}", title, key.line, key.difficulty, key.level)
}

impl fmt::Display for Reconciliation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reconciliation::Improved {
                key,
                title,
                previous,
                current,
                delta,
                synced,
                top_high_needed,
            } => {
                writeln!(f, " [갱신] {}", chart_label(title, key))?;
                writeln!(
                    f,
                    "Judge: {:.4}%{} -> {:.4}%{} ({:+.4}%p)",
                    previous.accuracy(),
                    badge(previous.is_max_rating(), previous.is_perfect(), previous.is_full_combo()),
                    current.accuracy(),
                    badge(current.is_max_rating(), current.is_perfect(), current.is_full_combo()),
                    delta.accuracy
                )?;
                let sign = if delta.score >= 0 { "+" } else { "" };
                writeln!(
                    f,
                    "Score: {} -> {} ({}{})",
                    group_thousands(previous.score() as i64),
                    group_thousands(current.score() as i64),
                    sign,
                    group_thousands(delta.score)
                )?;
                write!(
                    f,
                    "P.A.T.C.H.: {:.2} -> {:.2} ({:+.2})",
                    previous.rating(),
                    current.rating(),
                    delta.rating
                )?;
                if let Some(needed) = top_high_needed {
                    write!(f, "\n패론치까지 단 {}개!", needed)?;
                }
                if !synced {
                    write!(f, "\n(not synced to the archive)")?;
                }
                Ok(())
            }
            Reconciliation::NotImproved {
                key,
                title,
                best,
                elapsed,
            } => {
                writeln!(
                    f,
                    " [미갱신] {} ({}일, {}시간 전)",
                    chart_label(title, key),
                    elapsed.num_days(),
                    elapsed.num_hours() % 24
                )?;
                writeln!(
                    f,
                    "Best Judge: {:.4}%{}",
                    best.accuracy(),
                    badge(best.is_max_rating(), best.is_perfect(), best.is_full_combo())
                )?;
                writeln!(f, "Best Score: {}", group_thousands(best.score() as i64))?;
                write!(f, "Best P.A.T.C.H.: {:.2}", best.rating())
            }
            Reconciliation::Unattributed { title } => {
                write!(f, " [미기록] {}: difficulty or level unknown", title)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::report::tests::result;
    use crate::analysis::report::NoteBreakdown;
    use anyhow::anyhow;
    use chrono::TimeZone;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSync {
        pushed: Mutex<Vec<SyncRecord>>,
        fail: bool,
    }

    impl ArchiveSync for RecordingSync {
        fn push(&self, record: &SyncRecord) -> Result<()> {
            if self.fail {
                return Err(anyhow!("HTTP 500"));
            }
            self.pushed.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, day, hour, 0, 0).unwrap()
    }

    fn reconciler_with(sync: &Arc<RecordingSync>) -> ArchiveReconciler {
        let sync: Arc<dyn ArchiveSync> = sync.clone();
        ArchiveReconciler::new(ArchiveStore::new(), Some(sync), 0.98)
    }

    #[test]
    fn test_first_play_improves_placeholder() {
        let sync = Arc::new(RecordingSync::default());
        let mut reconciler = reconciler_with(&sync);

        let outcome = reconciler.reconcile(&result(97.5, 150_000), at(1, 0));
        match &outcome {
            Reconciliation::Improved {
                previous,
                delta,
                synced,
                ..
            } => {
                assert_eq!(previous.score(), 0);
                assert_eq!(delta.score, 150_000);
                assert!(*synced);
            }
            other => panic!("unexpected {:?}", other),
        }

        let pushed = sync.pushed.lock().unwrap();
        assert_eq!(pushed.len(), 1);
        assert_eq!(pushed[0].judge, 97.5);
        assert_eq!(pushed[0].difficulty, Difficulty::Over);
    }

    #[test]
    fn test_improvement_criteria() {
        let sync = Arc::new(RecordingSync::default());
        let mut reconciler = reconciler_with(&sync);
        reconciler.reconcile(&result(98.0, 100_000), at(1, 0));

        // (a) lower accuracy, higher score: no
        assert!(!reconciler.reconcile(&result(97.9, 200_000), at(2, 0)).is_improved());
        // (b) equal accuracy, higher score: yes
        assert!(reconciler.reconcile(&result(98.0, 100_001), at(2, 0)).is_improved());
        // (c) equal both, full combo over non-full-combo: yes
        let mut fc = result(98.0, 100_001);
        fc.is_full_combo = true;
        assert!(reconciler.reconcile(&fc, at(3, 0)).is_improved());
        // Equal again, already a full combo: no
        assert!(!reconciler.reconcile(&fc, at(4, 0)).is_improved());
        // (a) higher accuracy, lower score: yes
        assert!(reconciler.reconcile(&result(98.1, 50_000), at(5, 0)).is_improved());

        assert_eq!(sync.pushed.lock().unwrap().len(), 4);
    }

    #[test]
    fn test_not_improved_leaves_store_untouched() {
        let sync = Arc::new(RecordingSync::default());
        let mut reconciler = reconciler_with(&sync);
        let best = result(99.0, 180_000);
        reconciler.reconcile(&best, at(1, 0));

        let outcome = reconciler.reconcile(&result(95.0, 120_000), at(3, 5));
        match &outcome {
            Reconciliation::NotImproved { best, elapsed, .. } => {
                assert_eq!(best.accuracy(), 99.0);
                assert_eq!(best.decoded_at(), at(1, 0));
                assert_eq!(elapsed.num_days(), 2);
                assert_eq!(elapsed.num_hours() % 24, 5);
            }
            other => panic!("unexpected {:?}", other),
        }
        let key = ArchiveKey::of(&best).unwrap();
        assert_eq!(reconciler.store().get(&key).unwrap().accuracy(), 99.0);
        assert_eq!(sync.pushed.lock().unwrap().len(), 1);

        let text = outcome.to_string();
        assert!(text.starts_with(" [미갱신] Alpha 6L OVER Lv.15 (2일, 5시간 전)\n"));
        assert!(text.contains("Best Score: 180,000"));
    }

    #[test]
    fn test_failed_sync_still_updates_locally() {
        let sync = Arc::new(RecordingSync {
            fail: true,
            ..Default::default()
        });
        let mut reconciler = reconciler_with(&sync);
        let r = result(99.9, 199_000);

        match reconciler.reconcile(&r, at(1, 0)) {
            Reconciliation::Improved { synced, .. } => assert!(!synced),
            other => panic!("unexpected {:?}", other),
        }
        let key = ArchiveKey::of(&r).unwrap();
        assert_eq!(reconciler.store().get(&key).unwrap().score(), 199_000);
    }

    #[test]
    fn test_offline_reconciler_does_not_sync() {
        let mut reconciler = ArchiveReconciler::new(ArchiveStore::new(), None, 0.98);
        let outcome = reconciler.reconcile(&result(90.0, 100_000), at(1, 0));
        assert!(matches!(
            outcome,
            Reconciliation::Improved { synced: false, .. }
        ));
        assert!(outcome.to_string().ends_with("(not synced to the archive)"));
    }

    #[test]
    fn test_unknown_chart_is_unattributed() {
        let sync = Arc::new(RecordingSync::default());
        let mut reconciler = reconciler_with(&sync);
        let mut r = result(99.0, 180_000);
        r.difficulty = Difficulty::Unknown;

        assert_eq!(
            reconciler.reconcile(&r, at(1, 0)),
            Reconciliation::Unattributed {
                title: "Alpha".to_string()
            }
        );
        assert!(reconciler.store().is_empty());
        assert!(sync.pushed.lock().unwrap().is_empty());
    }

    #[test]
    fn test_improved_display() {
        let sync = Arc::new(RecordingSync::default());
        let mut reconciler = reconciler_with(&sync);
        reconciler.reconcile(&result(99.5, 190_000), at(1, 0));

        let mut perfect = result(100.0, 199_800);
        perfect.is_full_combo = true;
        perfect.rating = 630.0;
        perfect.notes = Some(NoteBreakdown {
            total: 1000,
            top_high: 970,
        });

        let text = reconciler.reconcile(&perfect, at(2, 0)).to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], " [갱신] Alpha 6L OVER Lv.15");
        assert_eq!(
            lines[1],
            "Judge: 99.5000% -> 100.0000% [PERFECT DECODE] (+0.5000%p)"
        );
        assert_eq!(lines[2], "Score: 190,000 -> 199,800 (+9,800)");
        assert_eq!(lines[3], "P.A.T.C.H.: 600.00 -> 630.00 (+30.00)");
        assert_eq!(lines[4], "패론치까지 단 10개!");
        assert_eq!(lines.len(), 5);
    }

    #[test]
    fn test_score_regression_display() {
        let sync = Arc::new(RecordingSync::default());
        let mut reconciler = reconciler_with(&sync);
        reconciler.reconcile(&result(98.0, 150_000), at(1, 0));

        let text = reconciler.reconcile(&result(98.5, 140_000), at(2, 0)).to_string();
        assert!(text.contains("Score: 150,000 -> 140,000 (-10,000)"));
    }
}
