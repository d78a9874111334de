#![allow(missing_docs)]

use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use routestore::{
    directory::{Directory, RamDirectory},
    encoding::EncodingRegistry,
    storage::{BaseGraph, FetchMode, GraphBuilder, GraphState, Point, PointList},
    types::{EdgeId, NodeId, Result, StoreError},
};

fn registry() -> Result<Arc<EncodingRegistry>> {
    Ok(Arc::new(EncodingRegistry::from_profiles(
        "car|speed_bits=5|speed_factor=5|max_turn_costs=1400,foot",
    )?))
}

fn graph(three_d: bool) -> Result<BaseGraph> {
    GraphBuilder::new(Arc::new(RamDirectory::new()), registry()?)
        .segment_size(128)
        .set_3d(three_d)
        .with_turn_costs(true)
        .create(100)
}

#[test]
fn turn_cost_index_is_independent_of_elevation() -> Result<()> {
    let mut g = graph(true)?;
    g.set_node_with_elevation(NodeId(4001), 10.0, 11.0, 10.0)?;
    assert_eq!(g.turn_cost_index(NodeId(4001))?, None);

    g.set_node_with_elevation(NodeId(4000), 10.0, 11.0, 10.0)?;
    g.set_turn_cost_index(NodeId(4000), Some(12))?;
    g.set_node_with_elevation(NodeId(4000), 10.0, 11.0, 11.0)?;
    assert_eq!(g.turn_cost_index(NodeId(4000))?, Some(12));
    assert_eq!(g.elevation(NodeId(4000))?, Some(11.0));
    assert_eq!(g.node_count()?, 4002);
    g.close()
}

#[test]
fn random_coordinates_never_touch_turn_cost_heads() -> Result<()> {
    let mut g = graph(false)?;
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    for n in 0..200u32 {
        g.set_turn_cost_index(NodeId(n), Some(n * 3))?;
    }
    for _ in 0..3 {
        for n in 0..200u32 {
            g.set_node(NodeId(n), rng.gen_range(-90.0..90.0), rng.gen_range(-180.0..180.0))?;
        }
    }
    for n in 0..200u32 {
        assert_eq!(g.turn_cost_index(NodeId(n))?, Some(n * 3));
    }
    Ok(())
}

#[test]
fn flat_graph_rejects_elevation() -> Result<()> {
    let mut g = graph(false)?;
    assert!(matches!(
        g.set_node_with_elevation(NodeId(0), 1.0, 2.0, 3.0),
        Err(StoreError::Invalid(_))
    ));
    g.set_node(NodeId(0), 1.0, 2.0)?;
    assert_eq!(g.point(NodeId(0))?, Point::new(1.0, 2.0));
    let mut e = g.edge(NodeId(0), NodeId(1))?;
    assert!(e
        .set_way_geometry(&PointList::from_3d(&[1.0, 1.0, 5.0]))
        .is_err());
    Ok(())
}

#[test]
fn edges_are_listed_from_each_endpoint() -> Result<()> {
    let mut g = graph(false)?;
    let a = g.edge(NodeId(0), NodeId(1))?.set_distance(10.0)?.edge();
    let b = g.edge(NodeId(2), NodeId(0))?.set_distance(20.0)?.edge();
    let c = g.edge(NodeId(1), NodeId(2))?.set_distance(30.0)?.edge();
    assert_eq!(g.edge_count()?, 3);
    assert_eq!(g.node_count()?, 3);

    let at_0: Vec<_> = g
        .edges_of(NodeId(0))?
        .iter()
        .map(|v| (v.edge(), v.base_node(), v.adj_node()))
        .collect();
    assert_eq!(
        at_0,
        vec![(b, NodeId(0), NodeId(2)), (a, NodeId(0), NodeId(1))]
    );
    let mut at_2: Vec<_> = g.edges_of(NodeId(2))?.iter().map(|v| v.edge()).collect();
    at_2.sort_by_key(|e| e.0);
    assert_eq!(at_2, vec![b, c]);
    assert!(matches!(g.edges_of(NodeId(9)), Err(StoreError::NotFound(_))));
    Ok(())
}

#[test]
fn reversed_state_swaps_directional_values() -> Result<()> {
    let mut g = graph(false)?;
    let reg = g.registry().clone();
    let access = reg.boolean("car_access")?;
    let speed = reg.decimal("car_average_speed")?;
    let foot_speed = reg.decimal("foot_average_speed")?;
    let edge = {
        let mut e = g.edge(NodeId(0), NodeId(1))?;
        e.set_both(&access, true, false)?
            .set(&speed, 60.0)?
            .set_reverse(&speed, 25.0)?
            .set(&foot_speed, 4.0)?;
        e.edge()
    };

    let forward = g.edge_state(edge, NodeId(1))?;
    assert!(!forward.is_reversed());
    assert!(forward.get(&access)?);
    assert!(!forward.get_reverse(&access)?);
    assert_eq!(forward.get(&speed)?, 60.0);

    let backward = g.edge_state(edge, NodeId(0))?;
    assert!(backward.is_reversed());
    assert_eq!((backward.base_node(), backward.adj_node()), (NodeId(1), NodeId(0)));
    assert!(!backward.get(&access)?);
    assert!(backward.get_reverse(&access)?);
    assert_eq!(backward.get(&speed)?, 25.0);
    assert_eq!(backward.get(&foot_speed)?, 4.0);
    assert_eq!(backward.flags()?, forward.flags()?);

    assert!(matches!(
        g.edge_state(edge, NodeId(5)),
        Err(StoreError::Invalid(_))
    ));
    let mut e = g.edge_mut(edge, NodeId(1))?;
    assert!(matches!(
        e.set_both(&foot_speed, 1.0, 2.0),
        Err(StoreError::Invalid(_))
    ));
    Ok(())
}

#[test]
fn values_from_another_registry_are_rejected() -> Result<()> {
    let mut g = graph(false)?;
    let other = registry()?;
    let foreign = other.boolean("car_access")?;
    let mut e = g.edge(NodeId(0), NodeId(1))?;
    assert!(matches!(e.set(&foreign, true), Err(StoreError::Invalid(_))));
    let tc = other.turn_cost("car")?;
    assert!(matches!(
        g.turn_cost(&tc, EdgeId(0), NodeId(0), EdgeId(0)),
        Err(StoreError::Invalid(_))
    ));
    Ok(())
}

#[test]
fn geometry_follows_the_view_orientation() -> Result<()> {
    let mut g = graph(true)?;
    g.set_node_with_elevation(NodeId(0), 10.0, 10.0, 0.0)?;
    g.set_node_with_elevation(NodeId(1), 11.0, 20.0, 1.0)?;
    let edge = {
        let mut e = g.edge(NodeId(0), NodeId(1))?;
        e.set_way_geometry(&PointList::from_3d(&[1.5, 1.0, 0.0, 2.0, 3.0, 0.0]))?;
        e.edge()
    };
    let stored = g.edge_state(edge, NodeId(1))?;
    assert_eq!(
        stored.geometry(FetchMode::PillarOnly)?,
        PointList::from_3d(&[1.5, 1.0, 0.0, 2.0, 3.0, 0.0])
    );
    assert_eq!(
        stored.geometry(FetchMode::All)?,
        PointList::from_3d(&[10.0, 10.0, 0.0, 1.5, 1.0, 0.0, 2.0, 3.0, 0.0, 11.0, 20.0, 1.0])
    );
    let reversed = g.edge_state(edge, NodeId(0))?;
    assert_eq!(
        reversed.geometry(FetchMode::BaseAndPillar)?,
        PointList::from_3d(&[11.0, 20.0, 1.0, 2.0, 3.0, 0.0, 1.5, 1.0, 0.0])
    );
    assert_eq!(
        reversed.geometry(FetchMode::PillarAndAdj)?,
        PointList::from_3d(&[2.0, 3.0, 0.0, 1.5, 1.0, 0.0, 10.0, 10.0, 0.0])
    );

    // written through the reversed handle, read back in stored order
    g.edge_mut(edge, NodeId(0))?
        .set_way_geometry(&PointList::from_3d(&[7.0, 7.0, 7.0, 8.0, 8.0, 8.0, 9.0, 9.0, 9.0]))?;
    assert_eq!(
        g.edge_view(edge)?.geometry(FetchMode::PillarOnly)?,
        PointList::from_3d(&[9.0, 9.0, 9.0, 8.0, 8.0, 8.0, 7.0, 7.0, 7.0])
    );
    Ok(())
}

#[test]
fn names_and_distances_are_stored_per_edge() -> Result<()> {
    let mut g = graph(false)?;
    let a = g.edge(NodeId(0), NodeId(1))?.set_name("named street1")?.edge();
    let b = g.edge(NodeId(0), NodeId(2))?.edge();
    assert_eq!(g.edge_view(a)?.name()?.as_deref(), Some("named street1"));
    assert_eq!(g.edge_view(b)?.name()?, None);
    g.edge_mut(a, NodeId(1))?.set_name("Hauptstraße")?;
    assert_eq!(g.edge_view(a)?.name()?.as_deref(), Some("Hauptstraße"));

    let mut e = g.edge_mut(b, NodeId(2))?;
    e.set_distance(120.5)?;
    assert!(matches!(e.set_distance(-3.0), Err(StoreError::Invalid(_))));
    assert!(matches!(e.set_distance(f64::INFINITY), Err(StoreError::Invalid(_))));
    assert_eq!(g.edge_view(b)?.distance()?, 120.5);
    assert!(matches!(g.edge_view(EdgeId(2)), Err(StoreError::NotFound(_))));
    Ok(())
}

#[test]
fn lifecycle_guards_every_state() -> Result<()> {
    let dir: Arc<dyn Directory> = Arc::new(RamDirectory::new());
    let mut g = GraphBuilder::new(dir, registry()?).segment_size(128).build()?;
    assert_eq!(g.state(), GraphState::Uninitialized);
    assert!(matches!(g.node_count(), Err(StoreError::IllegalState(_))));
    assert!(matches!(
        g.set_node(NodeId(0), 1.0, 1.0),
        Err(StoreError::IllegalState(_))
    ));

    g.create(10)?;
    assert_eq!(g.state(), GraphState::Created);
    assert!(matches!(g.create(10), Err(StoreError::IllegalState(_))));
    assert!(matches!(g.load_existing(), Err(StoreError::IllegalState(_))));
    g.set_node(NodeId(0), 1.0, 1.0)?;
    g.flush()?;
    g.set_node(NodeId(1), 2.0, 2.0)?;

    g.close()?;
    g.close()?;
    assert_eq!(g.state(), GraphState::Closed);
    assert!(matches!(g.set_node(NodeId(2), 1.0, 1.0), Err(StoreError::Closed)));
    assert!(matches!(g.edge(NodeId(0), NodeId(1)), Err(StoreError::Closed)));
    assert!(matches!(g.flush(), Err(StoreError::Closed)));
    Ok(())
}

#[test]
fn failed_create_releases_every_opened_store() -> Result<()> {
    let dir: Arc<dyn Directory> = Arc::new(RamDirectory::new());
    let blocker = dir.create("graph.names", 128)?;
    let mut g = GraphBuilder::new(Arc::clone(&dir), registry()?)
        .segment_size(128)
        .with_turn_costs(true)
        .build()?;
    assert!(matches!(g.create(10), Err(StoreError::IllegalState(_))));
    assert_eq!(g.state(), GraphState::Uninitialized);

    drop(blocker);
    g.create(10)?;
    assert_eq!(g.state(), GraphState::Created);
    g.set_node(NodeId(3), 1.0, 2.0)?;
    g.close()
}

#[test]
fn graph_without_turn_costs_rejects_turn_cost_calls() -> Result<()> {
    let reg = registry()?;
    let tc = reg.turn_cost("car")?;
    let mut g = GraphBuilder::new(Arc::new(RamDirectory::new()), reg)
        .segment_size(128)
        .create(10)?;
    let e = g.edge(NodeId(0), NodeId(1))?.edge();
    assert!(matches!(
        g.set_turn_cost(&tc, e, NodeId(1), e, 10.0),
        Err(StoreError::IllegalState(_))
    ));
    assert!(matches!(
        g.turn_cost(&tc, e, NodeId(1), e),
        Err(StoreError::IllegalState(_))
    ));
    assert!(matches!(g.turn_cost_capacity(), Err(StoreError::IllegalState(_))));
    // turn-cost accessors are not edge values
    let mut handle = g.edge_mut(e, NodeId(1))?;
    assert!(matches!(handle.set(&tc, 1.0), Err(StoreError::Invalid(_))));
    Ok(())
}
