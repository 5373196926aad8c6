//! # Deduction Calculator
//!
//! Pure function mapping (size, variety count, order quantity) to the stock
//! each variety gives up. No side effects; deterministic; table-tested.
//!
//! ## Fraction Table
//! ```text
//! ┌──────────────────────┬───────────────────────────────────────────────┐
//! │ Size class           │ Deduction per variety, per unit ordered       │
//! ├──────────────────────┼───────────────────────────────────────────────┤
//! │ FixedUnit            │ 1 whole unit (no fraction math)               │
//! │ QuarterCut           │ 0.25 bilao, regardless of variety count       │
//! │ Tray, 1 variety      │ 1.00 bilao                                    │
//! │ Tray, 2 varieties    │ 0.50 bilao each                               │
//! │ Tray, 3 varieties    │ 0.34 bilao each  (historical rounding rule:   │
//! │                      │  intentionally NOT 1/3)                       │
//! │ Tray, 4 varieties    │ 0.25 bilao each                               │
//! │ Tray, 5+ varieties   │ 0.25 bilao each                               │
//! └──────────────────────┴───────────────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;

use crate::catalog::{SizeClass, SizeConfig};
use crate::quantity::BatchQty;
use crate::types::{OrderItem, StockKey};

/// Deduction per selected variety for one unit of the given size.
///
/// For `FixedUnit` sizes the result is one whole unit; callers should route
/// those through the fixed-size pool rather than per-variety stock.
pub fn deduction_per_variety(size: &SizeConfig, variety_count: usize) -> BatchQty {
    match size.class {
        SizeClass::FixedUnit => BatchQty::from_units(1),
        // always a quarter bilao for the 1/4 slice, whatever the count
        SizeClass::QuarterCut => BatchQty::from_hundredths(25),
        SizeClass::Tray => match variety_count {
            0 | 1 => BatchQty::from_hundredths(100),
            2 => BatchQty::from_hundredths(50),
            3 => BatchQty::from_hundredths(34),
            4 => BatchQty::from_hundredths(25),
            _ => BatchQty::from_hundredths(25),
        },
    }
}

/// Expands one order item into its stock demands.
///
/// - Fixed-size items demand whole units from the size's own pool.
/// - Quarter-cut and tray items demand the per-variety fraction, scaled by
///   the order quantity, from each selected variety's pool.
pub fn item_demands(size: &SizeConfig, item: &OrderItem) -> Vec<(StockKey, BatchQty)> {
    match size.class {
        SizeClass::FixedUnit => {
            vec![(
                StockKey::fixed_size(size.name),
                BatchQty::from_units(item.quantity),
            )]
        }
        SizeClass::QuarterCut | SizeClass::Tray => {
            let per_variety = deduction_per_variety(size, item.varieties.len());
            item.varieties
                .iter()
                .map(|variety| (StockKey::variety(variety.clone()), per_variety * item.quantity))
                .collect()
        }
    }
}

/// Aggregates demands across a whole order, summing repeats of the same key.
///
/// Two items that both include Kutsinta must check and deduct their combined
/// requirement, not race each other per item.
pub fn aggregate_demands(
    demands: impl IntoIterator<Item = (StockKey, BatchQty)>,
) -> BTreeMap<StockKey, BatchQty> {
    let mut totals: BTreeMap<StockKey, BatchQty> = BTreeMap::new();
    for (key, qty) in demands {
        *totals.entry(key).or_insert_with(BatchQty::zero) += qty;
    }
    totals
}

// =============================================================================
// Unit Tests
// =============================================================================
