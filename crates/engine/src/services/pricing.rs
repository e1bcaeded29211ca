//! Pluggable tax/shipping/discount calculation.

use common::Currency;
use domain::{OrderCharges, OrderItem};

/// Computes the non-item charge components of an order total.
///
/// The engine treats tax, shipping, and discount as opaque inputs; real
/// deployments plug in jurisdiction-aware calculators here.
pub trait PricingCalculator: Send + Sync {
    /// Returns the charges for the given line items.
    fn charges(&self, items: &[OrderItem], currency: &Currency) -> OrderCharges;
}

/// Default calculator: zero tax, zero shipping, zero discount.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroCharges;

impl PricingCalculator for ZeroCharges {
    fn charges(&self, _items: &[OrderItem], _currency: &Currency) -> OrderCharges {
        OrderCharges::default()
    }
}
