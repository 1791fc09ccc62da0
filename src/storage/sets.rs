//! Sparse index sets of the storage model.
use super::Storage;
use crate::component::design::DesignSets;
use crate::component::{ComponentID, LocationComponent};
use crate::energy_system::EnergySystem;
use crate::error::Direction;
use indexmap::{IndexMap, IndexSet};

/// The (location, component) pairs constrained by each operation mode of one flow direction
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationModeSets {
    /// Limited by capacity and the constant rate
    pub rate_limited: IndexSet<LocationComponent>,
    /// Fixed relative to capacity
    pub fix_relative: IndexSet<LocationComponent>,
    /// Limited relative to capacity
    pub max_relative: IndexSet<LocationComponent>,
    /// Fixed to an absolute time series
    pub fix_absolute: IndexSet<LocationComponent>,
    /// Limited by an absolute time series
    pub max_absolute: IndexSet<LocationComponent>,
}

impl OperationModeSets {
    fn new(
        operation: &IndexSet<LocationComponent>,
        components: &IndexMap<ComponentID, Storage>,
        direction: Direction,
    ) -> Self {
        let mut sets = Self::default();
        for key in operation {
            let storage = &components[&key.1];
            let rates = storage.rates(direction);
            let set = match (
                storage.design.has_capacity_variable,
                &rates.processed_fix,
                &rates.processed_max,
            ) {
                (true, None, None) => &mut sets.rate_limited,
                (true, Some(_), _) => &mut sets.fix_relative,
                (true, None, Some(_)) => &mut sets.max_relative,
                (false, Some(_), _) => &mut sets.fix_absolute,
                (false, None, Some(_)) => &mut sets.max_absolute,
                (false, None, None) => continue,
            };
            set.insert(key.clone());
        }

        sets
    }
}

/// All index sets of the storage model
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StorageSets {
    /// Pairs with operation variables
    pub operation: IndexSet<LocationComponent>,
    /// Pairs bounded by per-period SOC envelopes under time series aggregation
    pub simple_tsa: IndexSet<LocationComponent>,
    /// Pairs bounded at every time step under time series aggregation
    pub precise_tsa: IndexSet<LocationComponent>,
    /// Pairs with upward SOC offsets
    pub offset_up: IndexSet<LocationComponent>,
    /// Pairs with downward SOC offsets
    pub offset_down: IndexSet<LocationComponent>,
    /// Pairs whose charged energy is limited by the cyclic lifetime
    pub cyclic_lifetime: IndexSet<LocationComponent>,
    /// Pairs whose inter-period SOC repeats
    pub periodical: IndexSet<LocationComponent>,
    /// Pairs with binary operation variables enforcing a minimum part load
    pub part_load: IndexSet<LocationComponent>,
    /// Design variable sets
    pub design: DesignSets,
    /// Operation modes of charging
    pub charge_modes: OperationModeSets,
    /// Operation modes of discharging
    pub discharge_modes: OperationModeSets,
}

impl StorageSets {
    /// Build the sets for the given components
    pub fn new(system: &EnergySystem, components: &IndexMap<ComponentID, Storage>) -> Self {
        let operation: IndexSet<LocationComponent> = system
            .locations
            .iter()
            .flat_map(|loc| {
                components
                    .values()
                    .filter(|storage| storage.design.is_eligible(loc))
                    .map(|storage| (loc.clone(), storage.id.clone()))
            })
            .collect();

        let subset = |predicate: &dyn Fn(&Storage) -> bool| {
            operation
                .iter()
                .filter(|(_, id)| predicate(&components[id]))
                .cloned()
                .collect::<IndexSet<_>>()
        };

        let (simple_tsa, precise_tsa) = if system.time.has_aggregation() {
            (
                subset(&|s| !s.do_precise_tsa_modeling),
                subset(&|s| s.do_precise_tsa_modeling),
            )
        } else {
            (IndexSet::new(), IndexSet::new())
        };

        let design = DesignSets::new(components.iter().map(|(id, s)| (id, &s.design)));
        let cyclic_lifetime = design
            .capacity
            .iter()
            .filter(|(_, id)| components[id].cyclic_lifetime.is_some())
            .cloned()
            .collect();
        let part_load = design
            .capacity
            .iter()
            .filter(|(_, id)| components[id].design.part_load_min.is_some())
            .cloned()
            .collect();

        Self {
            simple_tsa,
            precise_tsa,
            offset_up: subset(&Storage::has_offset_up),
            offset_down: subset(&Storage::has_offset_down),
            cyclic_lifetime,
            periodical: subset(&|s| s.is_periodical_storage),
            part_load,
            charge_modes: OperationModeSets::new(&operation, components, Direction::Charge),
            discharge_modes: OperationModeSets::new(&operation, components, Direction::Discharge),
            design,
            operation,
        }
    }

    /// The operation mode sets of a flow direction
    pub fn modes(&self, direction: Direction) -> &OperationModeSets {
        match direction {
            Direction::Charge => &self.charge_modes,
            Direction::Discharge => &self.discharge_modes,
        }
    }
}
