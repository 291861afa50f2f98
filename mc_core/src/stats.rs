//! Per-run counters (`spec.md` §4.8.4): one atomic set shared across workers,
//! incremented once per terminal packet and emitted to the log at run
//! completion.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::RuntimeError;

#[derive(Default)]
pub struct Stats {
    pub scatters: AtomicU64,
    pub raman_scatters: AtomicU64,
    pub escaped: AtomicU64,
    pub escaped_into_ccd_raman: AtomicU64,
    pub escaped_into_ccd_non_raman: AtomicU64,
    pub loop_limit_kills: AtomicU64,
    pub rouletted: AtomicU64,
    pub packets_completed: AtomicU64,
    pub non_unit_direction: AtomicU64,
    pub empty_medium_stack: AtomicU64,
    pub outside_grid_at_emission: AtomicU64,
    pub material_wavelength_out_of_range: AtomicU64,
}

impl Stats {
    pub fn record_scatter(&self) {
        self.scatters.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_raman_scatter(&self) {
        self.raman_scatters.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_escaped(&self) {
        self.escaped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_ccd_hit(&self, raman_shifted: bool) {
        if raman_shifted {
            self.escaped_into_ccd_raman.fetch_add(1, Ordering::Relaxed);
        } else {
            self.escaped_into_ccd_non_raman
                .fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_loop_limit(&self) {
        self.loop_limit_kills.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rouletted(&self) {
        self.rouletted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_packet_done(&self) {
        self.packets_completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one of the `spec.md` §7 runtime-invariant errors (plus the
    /// defensive `MaterialWavelengthOutOfRange` case): logged by the caller
    /// and tallied here for the end-of-run report, rather than propagated,
    /// since the offending packet is simply terminated.
    pub fn record_runtime_error(&self, err: RuntimeError) {
        let counter = match err {
            RuntimeError::NonUnitDirection => &self.non_unit_direction,
            RuntimeError::EmptyMediumStack => &self.empty_medium_stack,
            RuntimeError::OutsideGridAtEmission => &self.outside_grid_at_emission,
            RuntimeError::MaterialWavelengthOutOfRange => &self.material_wavelength_out_of_range,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            scatters: self.scatters.load(Ordering::Relaxed),
            raman_scatters: self.raman_scatters.load(Ordering::Relaxed),
            escaped: self.escaped.load(Ordering::Relaxed),
            escaped_into_ccd_raman: self.escaped_into_ccd_raman.load(Ordering::Relaxed),
            escaped_into_ccd_non_raman: self.escaped_into_ccd_non_raman.load(Ordering::Relaxed),
            loop_limit_kills: self.loop_limit_kills.load(Ordering::Relaxed),
            rouletted: self.rouletted.load(Ordering::Relaxed),
            packets_completed: self.packets_completed.load(Ordering::Relaxed),
            non_unit_direction: self.non_unit_direction.load(Ordering::Relaxed),
            empty_medium_stack: self.empty_medium_stack.load(Ordering::Relaxed),
            outside_grid_at_emission: self.outside_grid_at_emission.load(Ordering::Relaxed),
            material_wavelength_out_of_range: self
                .material_wavelength_out_of_range
                .load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StatsSnapshot {
    pub scatters: u64,
    pub raman_scatters: u64,
    pub escaped: u64,
    pub escaped_into_ccd_raman: u64,
    pub escaped_into_ccd_non_raman: u64,
    pub loop_limit_kills: u64,
    pub rouletted: u64,
    pub packets_completed: u64,
    pub non_unit_direction: u64,
    pub empty_medium_stack: u64,
    pub outside_grid_at_emission: u64,
    pub material_wavelength_out_of_range: u64,
}
