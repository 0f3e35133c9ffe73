//! Grid-intensity based CO2 estimation.
//!
//! Models a single compute unit drawing a fixed wattage at full load and
//! prices the energy with the grid intensity of the region it runs in. The
//! numbers are demo-grade: plausible magnitudes that differ by region and
//! load, not a lifecycle analysis.

use crate::config::types::CarbonConfig;
use std::collections::HashMap;

pub const WATTS_AT_FULL_LOAD: f64 = 50.0;
pub const DEFAULT_INTENSITY_G_PER_KWH: f64 = 450.0;

/// Grams of CO2 per kWh by region, with a fallback for regions not listed.
#[derive(Debug, Clone)]
pub struct GridIntensityTable {
    by_region: HashMap<String, f64>,
    default_intensity: f64,
}

impl GridIntensityTable {
    pub fn new(by_region: HashMap<String, f64>, default_intensity: f64) -> Self {
        Self {
            by_region,
            default_intensity,
        }
    }

    pub fn intensity_for(&self, region: &str) -> f64 {
        self.by_region
            .get(region)
            .copied()
            .unwrap_or(self.default_intensity)
    }

    pub fn default_intensity(&self) -> f64 {
        self.default_intensity
    }
}

impl Default for GridIntensityTable {
    fn default() -> Self {
        let carbon = CarbonConfig::default();
        Self::new(
            carbon.grid_intensity_g_per_kwh,
            carbon.default_intensity_g_per_kwh,
        )
    }
}

/// Estimates grams of CO2 for a utilization level sustained over a window.
///
/// Shared by the metrics and incident generators so emissions and wasted
/// emissions are priced with the same table.
#[derive(Debug, Clone)]
pub struct EmissionsEstimator {
    watts_at_full_load: f64,
    intensities: GridIntensityTable,
}

impl EmissionsEstimator {
    pub fn new(watts_at_full_load: f64, intensities: GridIntensityTable) -> Self {
        Self {
            watts_at_full_load,
            intensities,
        }
    }

    pub fn from_config(carbon: &CarbonConfig) -> Self {
        Self::new(
            carbon.watts_at_full_load,
            GridIntensityTable::new(
                carbon.grid_intensity_g_per_kwh.clone(),
                carbon.default_intensity_g_per_kwh,
            ),
        )
    }

    pub fn intensities(&self) -> &GridIntensityTable {
        &self.intensities
    }

    /// Grams of CO2 emitted running at `utilization_pct` for `window_minutes` in `region`.
    ///
    /// Returns 0 for non-positive (or NaN) utilization or window. Utilization
    /// above 100 is clamped.
    pub fn estimate(&self, utilization_pct: f64, region: &str, window_minutes: f64) -> f64 {
        if window_minutes.is_nan() || utilization_pct.is_nan() {
            return 0.0;
        }
        if window_minutes <= 0.0 || utilization_pct <= 0.0 {
            return 0.0;
        }

        let utilization = utilization_pct.clamp(0.0, 100.0) / 100.0;
        let watt_hours = self.watts_at_full_load * utilization * (window_minutes / 60.0);
        let kilowatt_hours = watt_hours / 1000.0;

        kilowatt_hours * self.intensities.intensity_for(region)
    }
}

impl Default for EmissionsEstimator {
    fn default() -> Self {
        Self::new(WATTS_AT_FULL_LOAD, GridIntensityTable::default())
    }
}
