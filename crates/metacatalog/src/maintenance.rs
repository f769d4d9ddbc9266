//! # Index Maintenance
//!
//! Rebuilds the hierarchy indexes in three phases, each committed on its own:
//!
//! ```text
//! Idle -> Cleaning -> Preparing -> Refreshing -> Idle
//! ```
//!
//! - **Cleaning** drops staging left by an earlier, possibly interrupted run.
//! - **Preparing** builds fresh staging from the base tables.
//! - **Refreshing** publishes staging atomically.
//!
//! A failure stops the run and returns the machine to `Idle`. The published
//! index stays as it was (stale, still consistent) and any staging garbage is
//! removed by the next run's cleaning phase. No in-call retry happens.
//!
//! Runs are single-flighted: a refresh started while another is in progress
//! fails with [`CatalogError::RefreshConflict`] instead of waiting.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use serde::Serialize;

use crate::error::{CatalogError, Result};
use crate::store::CatalogBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MaintenancePhase {
    Idle,
    Cleaning,
    Preparing,
    Refreshing,
}

impl MaintenancePhase {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Cleaning => "cleaning",
            Self::Preparing => "preparing",
            Self::Refreshing => "refreshing",
        }
    }
}

impl fmt::Display for MaintenancePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub struct ViewMaintenance {
    phase: Mutex<MaintenancePhase>,
}

impl Default for ViewMaintenance {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewMaintenance {
    pub fn new() -> Self {
        Self {
            phase: Mutex::new(MaintenancePhase::Idle),
        }
    }

    pub fn phase(&self) -> MaintenancePhase {
        *self.lock_phase()
    }

    /// Run cleanup, prepare and publish against `backend`, in order.
    pub fn refresh<B: CatalogBackend + ?Sized>(&self, backend: &B) -> Result<()> {
        let run = self.begin()?;
        let start = Instant::now();
        tracing::info!("starting hierarchy index refresh");

        run.phase(MaintenancePhase::Cleaning, || backend.cleanup_staging())?;
        run.phase(MaintenancePhase::Preparing, || backend.prepare_staging())?;
        run.phase(MaintenancePhase::Refreshing, || backend.publish_staging())?;

        tracing::info!(
            duration_secs = start.elapsed().as_secs_f64(),
            "hierarchy index refresh complete"
        );
        Ok(())
    }

    fn lock_phase(&self) -> MutexGuard<'_, MaintenancePhase> {
        // The phase is a plain value; a panicked holder cannot leave it torn.
        self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin(&self) -> Result<Run<'_>> {
        let mut phase = self.lock_phase();
        if *phase != MaintenancePhase::Idle {
            tracing::warn!(phase = %*phase, "index refresh rejected: another run in progress");
            return Err(CatalogError::RefreshConflict);
        }
        *phase = MaintenancePhase::Cleaning;
        Ok(Run { owner: self })
    }
}

/// An in-flight run. Dropping it returns the machine to `Idle`.
struct Run<'a> {
    owner: &'a ViewMaintenance,
}

impl Run<'_> {
    fn phase(&self, phase: MaintenancePhase, op: impl FnOnce() -> Result<()>) -> Result<()> {
        *self.owner.lock_phase() = phase;
        let start = Instant::now();
        tracing::info!(%phase, "index maintenance phase started");
        match op() {
            Ok(()) => {
                tracing::info!(
                    %phase,
                    duration_secs = start.elapsed().as_secs_f64(),
                    "index maintenance phase committed"
                );
                Ok(())
            }
            Err(e) => {
                tracing::error!(%phase, error = %e, "index maintenance phase failed");
                Err(e)
            }
        }
    }
}

impl Drop for Run<'_> {
    fn drop(&mut self) {
        *self.owner.lock_phase() = MaintenancePhase::Idle;
    }
}
