//! Analysis service: serializes analysis triggers and records improvements.
//!
//! Triggers are single-flight. A trigger arriving while an analysis is in
//! progress is dropped and reported as busy. The analyzer can be swapped for
//! one with a reloaded catalog at any time; analyses already running finish
//! on the analyzer they started with.

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread::{self, JoinHandle};

use crate::analysis::{AnalysisError, AnalysisOutcome, AnalysisResult, ScreenshotAnalyzer};
use crate::archive::{ArchiveReconciler, Reconciliation};
use crate::capture::{ImageInput, UnavailableReason};
use crate::catalog::SongCatalog;
use crate::config::Locale;

/// Outcome of one trigger.
#[derive(Debug)]
pub enum ServiceOutcome {
    /// Another analysis was in progress; this trigger was dropped
    Busy,
    NoImage(UnavailableReason),
    Rejected(AnalysisError),
    Completed {
        result: Box<AnalysisResult>,
        reconciliation: Reconciliation,
    },
}

impl ServiceOutcome {
    /// User-facing text for the outcome.
    pub fn report(&self, locale: Locale) -> String {
        match self {
            ServiceOutcome::Busy => "Analysis already in progress, trigger ignored.".to_string(),
            ServiceOutcome::NoImage(reason) => reason.to_string(),
            ServiceOutcome::Rejected(e) => format!("Error: {}", e.localized(locale)),
            ServiceOutcome::Completed {
                result,
                reconciliation,
            } => format!(
                "--- Analysis Complete ---\n{}\n{}",
                result, reconciliation
            ),
        }
    }
}

/// Clears the busy flag when dropped.
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    /// Sets the flag, or returns None if it was already set.
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        if flag.swap(true, Ordering::SeqCst) {
            None
        } else {
            Some(Self(flag))
        }
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct AnalysisService {
    analyzer: RwLock<Arc<ScreenshotAnalyzer>>,
    reconciler: Mutex<ArchiveReconciler>,
    busy: AtomicBool,
}

impl AnalysisService {
    pub fn new(analyzer: ScreenshotAnalyzer, reconciler: ArchiveReconciler) -> Self {
        Self {
            analyzer: RwLock::new(Arc::new(analyzer)),
            reconciler: Mutex::new(reconciler),
            busy: AtomicBool::new(false),
        }
    }

    /// The analyzer new triggers will use.
    pub fn analyzer(&self) -> Arc<ScreenshotAnalyzer> {
        let guard = self.analyzer.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Rebuilds the analyzer around a new catalog and swaps it in.
    pub fn replace_catalog(&self, catalog: SongCatalog) -> Result<()> {
        let previous = self.analyzer();
        let rebuilt = Arc::new(previous.with_catalog(catalog)?);
        log::info!(
            "Song catalog replaced ({} -> {} songs)",
            previous.catalog().len(),
            rebuilt.catalog().len()
        );
        *self.analyzer.write().unwrap_or_else(PoisonError::into_inner) = rebuilt;
        Ok(())
    }

    /// Analyzes one input and reconciles the result with the archive.
    pub fn run(&self, input: &ImageInput) -> ServiceOutcome {
        self.run_at(input, Utc::now())
    }

    pub fn run_at(&self, input: &ImageInput, now: DateTime<Utc>) -> ServiceOutcome {
        let Some(_guard) = BusyGuard::acquire(&self.busy) else {
            log::warn!("Analysis already running, ignoring trigger for {}", input);
            return ServiceOutcome::Busy;
        };

        log::info!("Analyzing {}", input);
        let analyzer = self.analyzer();
        let result = match analyzer.extract_info(input) {
            Ok(AnalysisOutcome::Analyzed(result)) => result,
            Ok(AnalysisOutcome::NoImage(reason)) => return ServiceOutcome::NoImage(reason),
            Err(e) => {
                log::error!("Analysis rejected: {}", e);
                return ServiceOutcome::Rejected(e);
            }
        };

        let reconciliation = self
            .reconciler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .reconcile(&result, now);

        ServiceOutcome::Completed {
            result,
            reconciliation,
        }
    }

    /// Runs an analysis on a background thread.
    pub fn spawn(self: &Arc<Self>, input: ImageInput) -> JoinHandle<ServiceOutcome> {
        let service = Arc::clone(self);
        thread::spawn(move || service.run(&input))
    }
}
