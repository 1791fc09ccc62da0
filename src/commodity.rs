//! Commodities are the goods (electricity, hydrogen, heat...) which components convert and store.
use crate::id::{define_id_getter, define_id_type};
use anyhow::{Result, ensure};
use indexmap::IndexMap;
use serde::Deserialize;

define_id_type! {CommodityID}

/// A map of [`Commodity`]s, keyed by commodity ID
pub type CommodityMap = IndexMap<CommodityID, Commodity>;

/// A commodity within the energy system
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Commodity {
    /// Unique identifier for the commodity (e.g. "electricity")
    pub id: CommodityID,
    /// The physical unit of the commodity's flow rate (e.g. "GW_el")
    pub unit: String,
}
define_id_getter! {Commodity, CommodityID}

impl Commodity {
    /// Create a new commodity
    pub fn new(id: &str, unit: &str) -> Result<Self> {
        ensure!(!id.trim().is_empty(), "Commodity IDs cannot be empty");
        ensure!(!unit.trim().is_empty(), "Commodity {id} has no unit");

        Ok(Self {
            id: id.into(),
            unit: unit.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;

    #[test]
    fn test_commodity_new() {
        let commodity = Commodity::new("electricity", "GW_el").unwrap();
        assert_eq!(commodity.id, "electricity".into());
        assert_error!(
            Commodity::new("hydrogen", " "),
            "Commodity hydrogen has no unit"
        );
    }
}
