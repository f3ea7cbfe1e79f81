//! CD4 and viral-load strata.
//!
//! Absolute CD4 counts and HIV viral loads are bucketed into ordered
//! strata. Stratum boundaries follow the strictly-less-than rule: a
//! value sitting exactly on a boundary belongs to the upper stratum.

use serde::{Deserialize, Serialize};

/// Upper bounds (exclusive) of the CD4 strata below the top one.
pub const CD4_STRATA_BOUNDS: [f64; 5] = [50.0, 100.0, 200.0, 350.0, 500.0];

/// Midpoint viral load of each HVL stratum, in copies/mL.
pub const HVL_STRATA_MIDPOINTS: [f64; 7] = [
    10.0, 250.0, 1_750.0, 6_500.0, 20_000.0, 65_000.0, 550_000.0,
];

/// CD4 count strata, ordered from very low to very high.
///
/// # Examples
///
/// ```
/// use tsukihi_core::strata::Cd4Strata;
///
/// assert_eq!(Cd4Strata::from_count(25.0), Cd4Strata::VeryLow);
/// // Boundary values belong to the upper stratum.
/// assert_eq!(Cd4Strata::from_count(200.0), Cd4Strata::MidHigh);
/// assert_eq!(Cd4Strata::from_count(800.0), Cd4Strata::VeryHigh);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Cd4Strata {
    VeryLow,
    Low,
    MidLow,
    MidHigh,
    High,
    VeryHigh,
}

impl Cd4Strata {
    /// All strata in ascending order.
    pub const ALL: [Cd4Strata; 6] = [
        Cd4Strata::VeryLow,
        Cd4Strata::Low,
        Cd4Strata::MidLow,
        Cd4Strata::MidHigh,
        Cd4Strata::High,
        Cd4Strata::VeryHigh,
    ];

    /// Number of strata.
    pub const COUNT: usize = 6;

    /// Bucket an absolute CD4 count.
    pub fn from_count(cd4: f64) -> Self {
        for (i, bound) in CD4_STRATA_BOUNDS.iter().enumerate() {
            if cd4 < *bound {
                return Self::ALL[i];
            }
        }
        Cd4Strata::VeryHigh
    }

    /// Index into per-stratum parameter tables.
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Short label used in output files.
    pub fn label(&self) -> &'static str {
        match self {
            Cd4Strata::VeryLow => "CD4vlo",
            Cd4Strata::Low => "CD4_lo",
            Cd4Strata::MidLow => "CD4mlo",
            Cd4Strata::MidHigh => "CD4mhi",
            Cd4Strata::High => "CD4_hi",
            Cd4Strata::VeryHigh => "CD4vhi",
        }
    }
}

/// Viral-load strata, ordered from very low to very high.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum HvlStrata {
    VeryLow,
    Low,
    MidLow,
    Medium,
    MidHigh,
    High,
    VeryHigh,
}

impl HvlStrata {
    /// All strata in ascending order.
    pub const ALL: [HvlStrata; 7] = [
        HvlStrata::VeryLow,
        HvlStrata::Low,
        HvlStrata::MidLow,
        HvlStrata::Medium,
        HvlStrata::MidHigh,
        HvlStrata::High,
        HvlStrata::VeryHigh,
    ];

    /// Number of strata.
    pub const COUNT: usize = 7;

    /// Index into per-stratum parameter tables.
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Midpoint viral load used by the transmission math.
    pub fn midpoint(&self) -> f64 {
        HVL_STRATA_MIDPOINTS[self.index()]
    }

    /// Stratum from a table index, clamped to the valid range.
    pub fn from_index(index: usize) -> Self {
        Self::ALL[index.min(Self::COUNT - 1)]
    }

    /// One stratum lower, saturating at the bottom.
    pub fn step_down(&self) -> Self {
        Self::from_index(self.index().saturating_sub(1))
    }

    /// One stratum higher, saturating at the top.
    pub fn step_up(&self) -> Self {
        Self::from_index(self.index() + 1)
    }

    /// Short label used in output files.
    pub fn label(&self) -> &'static str {
        match self {
            HvlStrata::VeryLow => "HVLvlo",
            HvlStrata::Low => "HVL_lo",
            HvlStrata::MidLow => "HVLmlo",
            HvlStrata::Medium => "HVLmed",
            HvlStrata::MidHigh => "HVLmhi",
            HvlStrata::High => "HVL_hi",
            HvlStrata::VeryHigh => "HVLvhi",
        }
    }
}
