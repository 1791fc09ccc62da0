//! Annualisation of investments.
use crate::units::{Dimensionless, Year};

/// The capital recovery factor, which turns a one-off investment into equal annual payments over
/// the economic lifetime.
///
/// Lifetimes need not be whole years. A non-positive lifetime gives zero and a zero interest rate
/// gives `1 / lifetime`.
pub fn capital_recovery_factor(lifetime: Year, interest_rate: Dimensionless) -> Dimensionless {
    if lifetime.value() <= 0.0 {
        return Dimensionless(0.0);
    }
    if interest_rate.value() == 0.0 {
        return Dimensionless(1.0) / lifetime;
    }

    let factor = (Dimensionless(1.0) + interest_rate).powf(lifetime.value());
    (interest_rate * factor) / (factor - Dimensionless(1.0))
}
