//! The host container describing the energy system which component models are built for.
use crate::commodity::{Commodity, CommodityID, CommodityMap};
use crate::error::ConfigurationError;
use crate::component::ComponentID;
use crate::id::HasID;
use crate::location::{LocationID, check_locations};
use crate::settings::Settings;
use crate::temporal::TimeStructure;
use anyhow::{Result, ensure};
use indexmap::IndexSet;

/// Locations, commodities and time structure shared by all component models
#[derive(Debug, Clone)]
pub struct EnergySystem {
    /// The locations of the energy system, in a fixed order
    pub locations: IndexSet<LocationID>,
    /// The commodities of the energy system
    pub commodities: CommodityMap,
    /// The temporal structure of the model
    pub time: TimeStructure,
    /// Unit of costs (e.g. "1e9 Euro")
    pub cost_unit: String,
    /// Verbosity of diagnostics: 0 reports everything and 2 suppresses warnings
    pub verbose: u8,
}

impl EnergySystem {
    /// Create a new energy system
    pub fn new<L, C>(locations: L, commodities: C, time: TimeStructure, cost_unit: &str) -> Result<Self>
    where
        L: IntoIterator<Item = LocationID>,
        C: IntoIterator<Item = Commodity>,
    {
        let locations: IndexSet<_> = locations.into_iter().collect();
        check_locations(&locations)?;

        let mut map = CommodityMap::new();
        for commodity in commodities {
            let id = commodity.get_id().clone();
            ensure!(
                map.insert(id.clone(), commodity).is_none(),
                "Duplicate commodity {id}"
            );
        }

        Ok(Self {
            locations,
            commodities: map,
            time,
            cost_unit: cost_unit.to_string(),
            verbose: 0,
        })
    }

    /// Take verbosity from the program settings
    pub fn with_settings(mut self, settings: &Settings) -> Self {
        self.verbose = settings.verbose;
        self
    }

    /// Look up a commodity used by a component, failing with a [`ConfigurationError`]
    pub fn commodity(&self, component: &ComponentID, id: &CommodityID) -> Result<&Commodity> {
        let commodity =
            self.commodities
                .get(id)
                .ok_or_else(|| ConfigurationError::UnknownCommodity {
                    component: component.to_string(),
                    commodity: id.to_string(),
                })?;

        Ok(commodity)
    }
}
