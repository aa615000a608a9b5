//! Property tests for the activation pass.
//!
//! A model target with random garbage/always-active/passing sets drives
//! `update_entity_activation`; once settled, the lists must stop moving.

use std::collections::HashSet;

use proptest::prelude::*;
use tessera_ecs::activator::{update_entity_activation, ActivationLists, ActivationTarget};
use tessera_ecs::entity::EntityId;

#[derive(Debug, Default)]
struct Model {
    garbage: HashSet<EntityId>,
    always: HashSet<EntityId>,
    passing: HashSet<EntityId>,
    calls: usize,
    disposed: Vec<EntityId>,
}

impl ActivationTarget for Model {
    fn is_garbage(&self, id: EntityId) -> bool {
        self.garbage.contains(&id)
    }
    fn is_always_active(&self, id: EntityId) -> bool {
        self.always.contains(&id)
    }
    fn check(&self, id: EntityId) -> bool {
        self.passing.contains(&id)
    }
    fn activate(&mut self, _id: EntityId) {
        self.calls += 1;
    }
    fn deactivate(&mut self, _id: EntityId) {
        self.calls += 1;
    }
    fn dispose(&mut self, id: EntityId) {
        self.calls += 1;
        self.disposed.push(id);
    }
}

/// Per entity: (list 0..4, garbage, always active, passing).
fn population() -> impl Strategy<Value = Vec<(u8, bool, bool, bool)>> {
    prop::collection::vec((0u8..4, any::<bool>(), any::<bool>(), any::<bool>()), 0..40)
}

fn build(population: &[(u8, bool, bool, bool)]) -> (ActivationLists, Model) {
    let mut lists = ActivationLists::default();
    let mut model = Model::default();
    for (i, (list, garbage, always, passing)) in population.iter().enumerate() {
        let id = EntityId::new(i as u32, 0);
        match list {
            0 => lists.actives.push(id),
            1 => lists.deactives.push(id),
            2 => lists.always_actives.push(id),
            _ => lists.new_entities.push(id),
        }
        if *garbage {
            model.garbage.insert(id);
        }
        if *always {
            model.always.insert(id);
        }
        if *passing {
            model.passing.insert(id);
        }
    }
    (lists, model)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(2_000))]

    #[test]
    fn settled_lists_are_a_fixed_point(population in population()) {
        let (mut lists, mut model) = build(&population);
        update_entity_activation(&mut lists, &mut model);
        update_entity_activation(&mut lists, &mut model);
        prop_assert!(lists.new_entities.is_empty());

        let settled = lists.clone();
        let calls = model.calls;
        update_entity_activation(&mut lists, &mut model);
        prop_assert_eq!(&lists, &settled);
        prop_assert_eq!(model.calls, calls);
    }

    #[test]
    fn no_new_entities_means_one_pass_settles(population in population()) {
        let population: Vec<_> = population.into_iter().filter(|(list, ..)| *list != 3).collect();
        let (mut lists, mut model) = build(&population);
        update_entity_activation(&mut lists, &mut model);

        let settled = lists.clone();
        let calls = model.calls;
        update_entity_activation(&mut lists, &mut model);
        prop_assert_eq!(&lists, &settled);
        prop_assert_eq!(model.calls, calls);
    }

    #[test]
    fn every_entity_is_kept_or_disposed_once(population in population()) {
        let (mut lists, mut model) = build(&population);
        for _ in 0..3 {
            update_entity_activation(&mut lists, &mut model);
        }

        let mut seen: Vec<EntityId> = lists.all_ids();
        seen.extend(&model.disposed);
        seen.sort();
        let expected: Vec<EntityId> = (0..population.len()).map(|i| EntityId::new(i as u32, 0)).collect();
        prop_assert_eq!(seen, expected);

        for id in lists.all_ids() {
            prop_assert!(!model.garbage.contains(&id));
        }
        for id in &lists.actives {
            prop_assert!(model.passing.contains(id));
        }
    }
}
