#![allow(missing_docs)]

use std::collections::HashMap;
use std::sync::Arc;

use proptest::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use routestore::{
    directory::{MmapDirectory, RamDirectory},
    encoding::{EncodingRegistry, FlagValue},
    storage::{BaseGraph, GraphBuilder},
    types::{EdgeId, NodeId, Result, StoreError},
};
use tempfile::tempdir;

fn registry() -> Result<Arc<EncodingRegistry>> {
    Ok(Arc::new(EncodingRegistry::from_profiles(
        "car|speed_bits=5|speed_factor=5|max_turn_costs=1400",
    )?))
}

fn ram_graph() -> Result<BaseGraph> {
    GraphBuilder::new(Arc::new(RamDirectory::new()), registry()?)
        .segment_size(128)
        .with_turn_costs(true)
        .create(100)
}

#[test]
fn turn_cost_store_grows_one_segment_at_a_time() -> Result<()> {
    let tmp = tempdir()?;
    let reg = registry()?;
    let mut g = GraphBuilder::new(Arc::new(MmapDirectory::new(tmp.path())?), reg.clone())
        .segment_size(128)
        .with_turn_costs(true)
        .create(100)?;
    assert_eq!(g.turn_cost_capacity()?, 128);

    let access = reg.boolean("car_access")?;
    let tc = reg.turn_cost("car")?;
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    for n in 0..100u32 {
        g.set_node(NodeId(n), 90.0 * rng.gen::<f64>(), 180.0 * rng.gen::<f64>())?;
    }
    for n in 51..100u32 {
        g.edge(NodeId(50), NodeId(n))?
            .set_distance(rng.gen())?
            .set_both(&access, true, true)?;
    }
    for n in 0..50u32 {
        g.edge(NodeId(n), NodeId(50))?
            .set_distance(rng.gen())?
            .set_both(&access, true, true)?;
    }
    for e in 0..50u32 {
        g.set_turn_cost(&tc, EdgeId(e), NodeId(50), EdgeId(e + 50), 1337.0)?;
        g.set_turn_cost(&tc, EdgeId(e + 50), NodeId(50), EdgeId(e), 1337.0)?;
    }

    g.set_turn_cost(&tc, EdgeId(0), NodeId(50), EdgeId(1), 1337.0)?;
    assert_eq!(g.turn_cost_capacity()? / 16, 104);

    g.set_turn_cost(&tc, EdgeId(0), NodeId(50), EdgeId(2), 1337.0)?;
    assert_eq!(g.turn_cost_capacity()? / 16, 112);

    // rewriting an existing triple never grows the store
    g.set_turn_cost(&tc, EdgeId(0), NodeId(50), EdgeId(2), 10.0)?;
    assert_eq!(g.turn_cost_capacity()? / 16, 112);
    assert_eq!(g.turn_cost_count()?, 102);
    g.close()
}

#[test]
fn setting_a_pair_twice_keeps_one_record() -> Result<()> {
    let mut g = ram_graph()?;
    let tc = g.registry().turn_cost("car")?;
    g.set_turn_cost(&tc, EdgeId(3), NodeId(7), EdgeId(4), 100.0)?;
    g.set_turn_cost(&tc, EdgeId(4), NodeId(7), EdgeId(3), 50.0)?;
    let capacity = g.turn_cost_capacity()?;
    g.set_turn_cost(&tc, EdgeId(3), NodeId(7), EdgeId(4), 200.0)?;

    assert_eq!(g.turn_cost_capacity()?, capacity);
    assert_eq!(g.turn_cost(&tc, EdgeId(3), NodeId(7), EdgeId(4))?, 200.0);
    assert_eq!(g.turn_cost(&tc, EdgeId(4), NodeId(7), EdgeId(3))?, 50.0);
    let entries = g.turn_costs_of(NodeId(7))?;
    assert_eq!(entries.len(), 2);
    assert_eq!((entries[0].from, entries[0].to), (EdgeId(4), EdgeId(3)));
    assert_eq!(tc.read(&entries[1].flags, false)?, 200.0);
    Ok(())
}

#[test]
fn unknown_triples_read_as_zero() -> Result<()> {
    let mut g = ram_graph()?;
    let tc = g.registry().turn_cost("car")?;
    assert_eq!(g.turn_cost(&tc, EdgeId(0), NodeId(0), EdgeId(1))?, 0.0);
    g.set_turn_cost(&tc, EdgeId(0), NodeId(0), EdgeId(1), 5.0)?;
    assert_eq!(g.turn_cost(&tc, EdgeId(1), NodeId(0), EdgeId(0))?, 0.0);
    assert_eq!(g.turn_cost(&tc, EdgeId(0), NodeId(1), EdgeId(1))?, 0.0);
    // far beyond the node table
    assert_eq!(g.turn_cost(&tc, EdgeId(0), NodeId(90_000), EdgeId(1))?, 0.0);
    assert!(g.turn_costs_of(NodeId(90_000))?.is_empty());
    Ok(())
}

#[test]
fn dangling_turn_cost_head_is_corruption_until_reset() -> Result<()> {
    let mut g = ram_graph()?;
    let tc = g.registry().turn_cost("car")?;
    g.set_turn_cost_index(NodeId(4), Some(12))?;
    assert_eq!(g.turn_cost_count()?, 0);
    assert!(matches!(
        g.turn_cost(&tc, EdgeId(0), NodeId(4), EdgeId(1)),
        Err(StoreError::Corruption(_))
    ));
    assert!(matches!(
        g.set_turn_cost(&tc, EdgeId(0), NodeId(4), EdgeId(1), 5.0),
        Err(StoreError::Corruption(_))
    ));

    g.set_turn_cost_index(NodeId(4), None)?;
    assert_eq!(g.turn_cost(&tc, EdgeId(0), NodeId(4), EdgeId(1))?, 0.0);
    g.set_turn_cost(&tc, EdgeId(0), NodeId(4), EdgeId(1), 5.0)?;
    assert_eq!(g.turn_cost(&tc, EdgeId(0), NodeId(4), EdgeId(1))?, 5.0);
    Ok(())
}

#[test]
fn turn_restrictions_are_infinite_costs() -> Result<()> {
    let mut g = ram_graph()?;
    let tc = g.registry().turn_cost("car")?;
    assert_eq!(tc.max_finite(), 2046.0);
    g.set_turn_cost(&tc, EdgeId(1), NodeId(2), EdgeId(3), f64::INFINITY)?;
    assert_eq!(g.turn_cost(&tc, EdgeId(1), NodeId(2), EdgeId(3))?, f64::INFINITY);
    assert!(matches!(
        g.set_turn_cost(&tc, EdgeId(1), NodeId(2), EdgeId(4), 3000.0),
        Err(StoreError::Invalid(_))
    ));
    assert!(matches!(
        g.set_turn_cost(&tc, EdgeId(1), NodeId(2), EdgeId(4), -1.0),
        Err(StoreError::Invalid(_))
    ));
    // rejected writes leave no record behind
    assert_eq!(g.turn_costs_of(NodeId(2))?.len(), 1);
    Ok(())
}

#[test]
fn turn_costs_never_disturb_node_coordinates() -> Result<()> {
    let mut g = ram_graph()?;
    let tc = g.registry().turn_cost("car")?;
    g.set_node(NodeId(5), 52.5, 13.4)?;
    g.set_turn_cost(&tc, EdgeId(0), NodeId(5), EdgeId(1), 12.0)?;
    assert_eq!((g.lat(NodeId(5))?, g.lon(NodeId(5))?), (52.5, 13.4));
    assert_eq!(g.turn_cost_index(NodeId(5))?, Some(0));
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn last_write_per_triple_wins(
        writes in proptest::collection::vec((0u32..6, 0u32..4, 0u32..6, 0u32..1400), 1..60),
    ) {
        let mut g = ram_graph().unwrap();
        let tc = g.registry().turn_cost("car").unwrap();
        let mut expected = HashMap::new();
        let mut growth = Vec::new();
        for &(from, via, to, cost) in &writes {
            let before = g.turn_cost_capacity().unwrap();
            let fresh = !expected.contains_key(&(from, via, to));
            g.set_turn_cost(&tc, EdgeId(from), NodeId(via), EdgeId(to), cost as f64).unwrap();
            let after = g.turn_cost_capacity().unwrap();
            prop_assert!(after >= before);
            prop_assert_eq!(after % 128, 0);
            if !fresh {
                prop_assert_eq!(after, before);
            }
            growth.push(after);
            expected.insert((from, via, to), cost as f64);
        }
        prop_assert_eq!(g.turn_cost_count().unwrap() as usize, expected.len());
        for (&(from, via, to), &cost) in &expected {
            prop_assert_eq!(g.turn_cost(&tc, EdgeId(from), NodeId(via), EdgeId(to)).unwrap(), cost);
        }
        for via in 0..4u32 {
            let entries = g.turn_costs_of(NodeId(via)).unwrap();
            let pairs: std::collections::HashSet<_> =
                entries.iter().map(|e| (e.from.0, e.to.0)).collect();
            prop_assert_eq!(pairs.len(), entries.len());
        }
        prop_assert!(growth.windows(2).all(|w| w[0] <= w[1]));
    }
}
