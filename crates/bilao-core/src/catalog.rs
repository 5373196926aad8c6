//! # Size Catalog
//!
//! Static table of product sizes, their variety-count constraints, and total
//! yield. Loaded once; never mutated at runtime.
//!
//! ## Catalog
//! ```text
//! ┌─────────────┬─────────┬───────────┬───────┬──────────────────────────┐
//! │ Size        │ Price   │ Varieties │ Yield │ Notes                    │
//! ├─────────────┼─────────┼───────────┼───────┼──────────────────────────┤
//! │ Big Bilao   │ ₱520.00 │ 1-4       │ 60    │ no Cassava               │
//! │ Tray        │ ₱420.00 │ 1-4       │ 48    │                          │
//! │ Small       │ ₱280.00 │ 1         │ 30    │ Bibingka only, fixed     │
//! │ Half Tray   │ ₱240.00 │ 1-2       │ 24    │                          │
//! │ Solo        │ ₱200.00 │ 1         │ 20    │ Bibingka only, fixed     │
//! │ 1/4 Slice   │ ₱140.00 │ 1-5       │ 12    │ quarter-cut deduction    │
//! └─────────────┴─────────┴───────────┴───────┴──────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// The known kakanin varieties.
pub const VARIETIES: &[&str] = &["Bibingka", "Sapin-Sapin", "Kutsinta", "Kalamay", "Cassava"];

// =============================================================================
// Size Class
// =============================================================================

/// How a size deducts from stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeClass {
    /// Single-variety format tracked in whole units (no fraction math).
    FixedUnit,
    /// The 1/4 slice format: a fixed 0.25-bilao deduction.
    QuarterCut,
    /// Multi-variety bilao/tray format with per-variety fractions.
    Tray,
}

// =============================================================================
// Size Config
// =============================================================================

/// One row of the size catalog. Immutable.
#[derive(Debug, Clone, Serialize)]
pub struct SizeConfig {
    /// Display name, e.g. "Big Bilao".
    pub name: &'static str,
    /// Deduction behavior for this size.
    pub class: SizeClass,
    /// Unit price in centavos.
    pub unit_price_cents: i64,
    /// Minimum number of varieties per item.
    pub min_varieties: usize,
    /// Maximum number of varieties per item.
    pub max_varieties: usize,
    /// Total slice yield of one unit.
    pub total_yield_units: u32,
    /// If non-empty, only these varieties may be chosen.
    pub allowed_varieties: &'static [&'static str],
    /// Varieties that may never be chosen for this size.
    pub excluded_varieties: &'static [&'static str],
}

/// The built-in size catalog.
static SIZE_CATALOG: &[SizeConfig] = &[
    SizeConfig {
        name: "Big Bilao",
        class: SizeClass::Tray,
        unit_price_cents: 52_000,
        min_varieties: 1,
        max_varieties: 4,
        total_yield_units: 60,
        allowed_varieties: &[],
        excluded_varieties: &["Cassava"],
    },
    SizeConfig {
        name: "Tray",
        class: SizeClass::Tray,
        unit_price_cents: 42_000,
        min_varieties: 1,
        max_varieties: 4,
        total_yield_units: 48,
        allowed_varieties: &[],
        excluded_varieties: &[],
    },
    SizeConfig {
        name: "Small",
        class: SizeClass::FixedUnit,
        unit_price_cents: 28_000,
        min_varieties: 1,
        max_varieties: 1,
        total_yield_units: 30,
        allowed_varieties: &["Bibingka"],
        excluded_varieties: &[],
    },
    SizeConfig {
        name: "Half Tray",
        class: SizeClass::Tray,
        unit_price_cents: 24_000,
        min_varieties: 1,
        max_varieties: 2,
        total_yield_units: 24,
        allowed_varieties: &[],
        excluded_varieties: &[],
    },
    SizeConfig {
        name: "Solo",
        class: SizeClass::FixedUnit,
        unit_price_cents: 20_000,
        min_varieties: 1,
        max_varieties: 1,
        total_yield_units: 20,
        allowed_varieties: &["Bibingka"],
        excluded_varieties: &[],
    },
    SizeConfig {
        name: "1/4 Slice",
        class: SizeClass::QuarterCut,
        unit_price_cents: 14_000,
        min_varieties: 1,
        max_varieties: 5,
        total_yield_units: 12,
        allowed_varieties: &[],
        excluded_varieties: &[],
    },
];

/// Returns the full catalog.
pub fn all_sizes() -> &'static [SizeConfig] {
    SIZE_CATALOG
}

/// Looks up a size by name (case-insensitive; "1/4" matches "1/4 Slice").
pub fn size_by_name(name: &str) -> CoreResult<&'static SizeConfig> {
    let wanted = name.trim();
    SIZE_CATALOG
        .iter()
        .find(|s| {
            s.name.eq_ignore_ascii_case(wanted)
                || (s.class == SizeClass::QuarterCut && wanted.eq_ignore_ascii_case("1/4"))
        })
        .ok_or_else(|| CoreError::UnknownSize(wanted.to_string()))
}

/// Checks whether a variety name is in the known list (case-insensitive).
pub fn is_known_variety(variety: &str) -> bool {
    VARIETIES.iter().any(|v| v.eq_ignore_ascii_case(variety.trim()))
}

// =============================================================================
// Unit Tests
// =============================================================================
