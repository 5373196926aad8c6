//! # Validation Module
//!
//! Catalog-rule validation for order items and stock batches.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Caller (storefront / walk-in counter)                        │
//! │  └── Basic form checks, immediate feedback                             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE - catalog and business rule validation           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  └── NOT NULL / CHECK / foreign key constraints                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDate;

use crate::catalog::{is_known_variety, size_by_name};
use crate::error::{CoreResult, ValidationError};
use crate::quantity::BatchQty;
use crate::types::{DraftItem, StockKind};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Maximum quantity of a single item in one order.
///
/// Prevents accidental over-ordering (e.g. typing 100 instead of 10);
/// the bakery never fills triple-digit tray counts from one checkout.
pub const MAX_ITEM_QUANTITY: i64 = 50;

/// Maximum line items in one order.
pub const MAX_ORDER_ITEMS: usize = 20;

// =============================================================================
// Order Item Validation
// =============================================================================

/// Validates a draft item against the size catalog.
///
/// ## Rules
/// - Size must exist in the catalog
/// - Quantity must be in `1..=MAX_ITEM_QUANTITY`
/// - Variety count must respect the size's min/max bounds
/// - Every variety must be known, unique within the item, inside the
///   size's allowed list (when present), and outside its excluded list
pub fn validate_draft_item(item: &DraftItem) -> CoreResult<()> {
    let size = size_by_name(&item.size)?;

    validate_quantity(item.quantity)?;

    let count = item.varieties.len();
    if count < size.min_varieties || count > size.max_varieties {
        return Err(ValidationError::VarietyCount {
            size: size.name.to_string(),
            min: size.min_varieties,
            max: size.max_varieties,
            got: count,
        }
        .into());
    }

    for (idx, variety) in item.varieties.iter().enumerate() {
        let variety = variety.trim();
        if variety.is_empty() {
            return Err(ValidationError::Required {
                field: "variety".to_string(),
            }
            .into());
        }
        if !is_known_variety(variety) {
            return Err(ValidationError::UnknownVariety(variety.to_string()).into());
        }
        if item.varieties[..idx]
            .iter()
            .any(|prev| prev.eq_ignore_ascii_case(variety))
        {
            return Err(ValidationError::DuplicateVariety {
                variety: variety.to_string(),
            }
            .into());
        }
        if !size.allowed_varieties.is_empty()
            && !size
                .allowed_varieties
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(variety))
        {
            return Err(ValidationError::VarietyNotAllowed {
                size: size.name.to_string(),
                variety: variety.to_string(),
            }
            .into());
        }
        if size
            .excluded_varieties
            .iter()
            .any(|excluded| excluded.eq_ignore_ascii_case(variety))
        {
            return Err(ValidationError::VarietyNotAllowed {
                size: size.name.to_string(),
                variety: variety.to_string(),
            }
            .into());
        }
    }

    Ok(())
}

/// Validates an order quantity.
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }
    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }
    Ok(())
}

/// Validates the item list of a whole draft order.
pub fn validate_draft_items(items: &[DraftItem]) -> CoreResult<()> {
    if items.is_empty() {
        return Err(ValidationError::Required {
            field: "items".to_string(),
        }
        .into());
    }
    if items.len() > MAX_ORDER_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "items".to_string(),
            min: 1,
            max: MAX_ORDER_ITEMS as i64,
        }
        .into());
    }
    for item in items {
        validate_draft_item(item)?;
    }
    Ok(())
}

// =============================================================================
// Batch Validation
// =============================================================================

/// Validates a new batch's dates and quantities before insert.
///
/// ## Rules
/// - Initial quantity and thresholds must be non-negative
/// - Expiry must be strictly after production
/// - Fixed-size batches hold whole units only
pub fn validate_new_batch(
    kind: StockKind,
    label: &str,
    initial: BatchQty,
    minimum: BatchQty,
    critical: BatchQty,
    production_date: NaiveDate,
    expiry_date: NaiveDate,
) -> ValidationResult<()> {
    if label.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "label".to_string(),
        });
    }
    if initial.is_negative() {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }
    if minimum.is_negative() || critical.is_negative() {
        return Err(ValidationError::MustBePositive {
            field: "threshold".to_string(),
        });
    }
    if expiry_date <= production_date {
        return Err(ValidationError::ExpiryBeforeProduction {
            production: production_date.to_string(),
            expiry: expiry_date.to_string(),
        });
    }
    if kind == StockKind::FixedSize && !initial.is_whole_units() {
        return Err(ValidationError::FractionalFixedStock {
            label: label.to_string(),
            got: initial.hundredths(),
        });
    }
    Ok(())
}

/// Validates a size class's variety shape at the allocation boundary.
///
/// Fixed-size demands must be whole units; callers hit this only if a
/// draft bypassed [`validate_draft_item`].
pub fn validate_demand(kind: StockKind, label: &str, qty: BatchQty) -> ValidationResult<()> {
    if !qty.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "demand".to_string(),
        });
    }
    if kind == StockKind::FixedSize && !qty.is_whole_units() {
        return Err(ValidationError::FractionalFixedStock {
            label: label.to_string(),
            got: qty.hundredths(),
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;

    fn draft(size: &str, varieties: &[&str], quantity: i64) -> DraftItem {
        DraftItem {
            size: size.to_string(),
            varieties: varieties.iter().map(|v| v.to_string()).collect(),
            quantity,
        }
    }

    #[test]
    fn test_valid_items() {
        assert!(validate_draft_item(&draft("Tray", &["Kutsinta", "Kalamay"], 2)).is_ok());
        assert!(validate_draft_item(&draft("Solo", &["Bibingka"], 1)).is_ok());
        assert!(validate_draft_item(&draft(
            "1/4 Slice",
            &["Bibingka", "Sapin-Sapin", "Kutsinta", "Kalamay", "Cassava"],
            4
        ))
        .is_ok());
    }

    #[test]
    fn test_cassava_excluded_from_big_bilao() {
        let err = validate_draft_item(&draft("Big Bilao", &["Cassava"], 1)).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::VarietyNotAllowed { .. })
        ));
    }

    #[test]
    fn test_solo_is_bibingka_only() {
        assert!(validate_draft_item(&draft("Solo", &["Kutsinta"], 1)).is_err());
        // two varieties on a single-variety size
        assert!(validate_draft_item(&draft("Solo", &["Bibingka", "Kutsinta"], 1)).is_err());
    }

    #[test]
    fn test_variety_count_bounds() {
        // Half Tray takes at most 2
        assert!(validate_draft_item(&draft(
            "Half Tray",
            &["Bibingka", "Kutsinta", "Kalamay"],
            1
        ))
        .is_err());
        // zero varieties
        assert!(validate_draft_item(&draft("Tray", &[], 1)).is_err());
    }

    #[test]
    fn test_quantity_bounds() {
        assert!(validate_draft_item(&draft("Tray", &["Kutsinta"], 0)).is_err());
        assert!(validate_draft_item(&draft("Tray", &["Kutsinta"], -2)).is_err());
        assert!(validate_draft_item(&draft("Tray", &["Kutsinta"], 51)).is_err());
    }

    #[test]
    fn test_duplicate_and_unknown_varieties() {
        assert!(validate_draft_item(&draft("Tray", &["Kutsinta", "kutsinta"], 1)).is_err());
        assert!(validate_draft_item(&draft("Tray", &["Leche Flan"], 1)).is_err());
    }

    #[test]
    fn test_empty_order() {
        assert!(validate_draft_items(&[]).is_err());
    }

    #[test]
    fn test_new_batch_rules() {
        let prod = NaiveDate::from_ymd_opt(2026, 8, 1).unwrap();
        let exp = NaiveDate::from_ymd_opt(2026, 8, 8).unwrap();

        assert!(validate_new_batch(
            StockKind::Variety,
            "Kutsinta",
            BatchQty::from_hundredths(500),
            BatchQty::from_hundredths(200),
            BatchQty::from_hundredths(100),
            prod,
            exp
        )
        .is_ok());

        // expiry not after production
        assert!(validate_new_batch(
            StockKind::Variety,
            "Kutsinta",
            BatchQty::from_hundredths(500),
            BatchQty::zero(),
            BatchQty::zero(),
            exp,
            prod
        )
        .is_err());

        // fractional fixed-size stock
        assert!(validate_new_batch(
            StockKind::FixedSize,
            "Small",
            BatchQty::from_hundredths(150),
            BatchQty::zero(),
            BatchQty::zero(),
            prod,
            exp
        )
        .is_err());
    }

    #[test]
    fn test_demand_validation() {
        assert!(validate_demand(StockKind::Variety, "Kutsinta", BatchQty::from_hundredths(34)).is_ok());
        assert!(validate_demand(StockKind::FixedSize, "Small", BatchQty::from_units(2)).is_ok());
        assert!(validate_demand(StockKind::FixedSize, "Small", BatchQty::from_hundredths(50)).is_err());
        assert!(validate_demand(StockKind::Variety, "Kutsinta", BatchQty::zero()).is_err());
    }
}
