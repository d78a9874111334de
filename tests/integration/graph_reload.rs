#![allow(missing_docs)]

use std::path::Path;
use std::sync::Arc;

use routestore::{
    directory::{Directory, MmapDirectory, RamDirectory},
    encoding::EncodingRegistry,
    storage::{BaseGraph, FetchMode, GraphBuilder, GraphState, PointList},
    types::{EdgeId, NodeId, Result, StoreError},
};
use tempfile::tempdir;

const SEG: u32 = 128;
const CAR: &str = "car|speed_bits=5|speed_factor=5|max_turn_costs=1400";

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn builder(dir: Arc<dyn Directory>, profiles: &str) -> Result<GraphBuilder> {
    Ok(GraphBuilder::new(dir, Arc::new(EncodingRegistry::from_profiles(profiles)?))
        .segment_size(SEG)
        .set_3d(true)
        .with_turn_costs(true))
}

struct Built {
    street1: EdgeId,
    street2: EdgeId,
}

fn populate(g: &mut BaseGraph) -> Result<Built> {
    let reg = g.registry().clone();
    let access = reg.boolean("car_access")?;
    let tc = reg.turn_cost("car")?;
    g.set_node_with_elevation(NodeId(0), 10.0, 10.0, 0.0)?;
    g.set_node_with_elevation(NodeId(1), 11.0, 20.0, 1.0)?;
    g.set_node_with_elevation(NodeId(2), 12.0, 12.0, 0.4)?;

    let street2 = {
        let mut e = g.edge(NodeId(0), NodeId(1))?;
        e.set_distance(100.0)?
            .set_both(&access, true, true)?
            .set_way_geometry(&PointList::from_3d(&[1.5, 1.0, 0.0, 2.0, 3.0, 0.0]))?;
        e.edge()
    };
    let street1 = {
        let mut e = g.edge(NodeId(0), NodeId(2))?;
        e.set_distance(200.0)?
            .set_both(&access, true, true)?
            .set_way_geometry(&PointList::from_3d(&[3.5, 4.5, 0.0, 5.0, 6.0, 0.0]))?;
        e.edge()
    };
    g.edge(NodeId(9), NodeId(10))?
        .set_distance(200.0)?
        .set_both(&access, true, true)?;
    g.edge(NodeId(9), NodeId(11))?
        .set_distance(200.0)?
        .set_both(&access, true, true)?;
    g.edge(NodeId(1), NodeId(2))?
        .set_distance(120.0)?
        .set_both(&access, true, false)?;

    g.set_turn_cost(&tc, street1, NodeId(0), street2, 1337.0)?;
    g.set_turn_cost(&tc, street2, NodeId(0), street1, 666.0)?;
    g.set_turn_cost(&tc, street1, NodeId(1), street2, 815.0)?;

    g.edge_mut(street1, NodeId(2))?.set_name("named street1")?;
    g.edge_mut(street2, NodeId(1))?.set_name("named street2")?;
    Ok(Built { street1, street2 })
}

fn check_graph(g: &BaseGraph) -> Result<()> {
    let access = g.registry().boolean("car_access")?;
    assert!(g.is_3d());
    assert_eq!((g.lat(NodeId(0))?, g.lon(NodeId(0))?), (10.0, 10.0));
    assert_eq!((g.lat(NodeId(1))?, g.lon(NodeId(1))?), (11.0, 20.0));
    assert_eq!(g.elevation(NodeId(2))?, Some(0.4));

    let mut from_0: Vec<_> = g
        .edges_of(NodeId(0))?
        .iter()
        .map(|v| v.adj_node().0)
        .collect();
    from_0.sort_unstable();
    assert_eq!(from_0, vec![1, 2]);

    let to_1 = g
        .edges_of(NodeId(0))?
        .into_iter()
        .find(|v| v.adj_node() == NodeId(1))
        .expect("edge 0-1");
    assert_eq!(to_1.distance()?, 100.0);
    assert_eq!(
        to_1.geometry(FetchMode::All)?,
        PointList::from_3d(&[10.0, 10.0, 0.0, 1.5, 1.0, 0.0, 2.0, 3.0, 0.0, 11.0, 20.0, 1.0])
    );

    let one_way = g
        .edges_of(NodeId(1))?
        .into_iter()
        .find(|v| v.adj_node() == NodeId(2))
        .expect("edge 1-2");
    assert_eq!(one_way.distance()?, 120.0);
    assert!(one_way.get(&access)?);
    assert!(!one_way.get_reverse(&access)?);
    assert_eq!(g.edges_of(NodeId(9))?.len(), 2);
    Ok(())
}

fn check_turn_costs(g: &BaseGraph, built: &Built) -> Result<()> {
    let tc = g.registry().turn_cost("car")?;
    let Built { street1, street2 } = *built;
    assert_eq!(g.turn_cost(&tc, street1, NodeId(0), street2)?, 1337.0);
    assert_eq!(g.turn_cost(&tc, street2, NodeId(0), street1)?, 666.0);
    assert_eq!(g.turn_cost(&tc, street1, NodeId(1), street2)?, 815.0);
    assert_eq!(g.turn_cost(&tc, street1, NodeId(3), street2)?, 0.0);
    Ok(())
}

fn write_ram_store(location: &Path) -> Result<Built> {
    let mut g = builder(Arc::new(RamDirectory::persistent(location)?), CAR)?.create(100)?;
    let built = populate(&mut g)?;
    check_graph(&g)?;
    g.flush()?;
    g.close()?;
    Ok(built)
}

#[test]
fn ram_store_graph_reloads_through_mmap() -> Result<()> {
    init_tracing();
    let tmp = tempdir()?;
    let built = write_ram_store(tmp.path())?;

    let mut g = builder(Arc::new(MmapDirectory::new(tmp.path())?), CAR)?.build()?;
    assert!(g.load_existing()?);
    assert_eq!(g.state(), GraphState::Loaded);
    assert_eq!(g.node_count()?, 12);
    assert_eq!(g.edge_count()?, 5);
    check_graph(&g)?;
    check_turn_costs(&g, &built)?;
    assert_eq!(
        g.edge_state(built.street1, NodeId(2))?.name()?.as_deref(),
        Some("named street1")
    );
    assert_eq!(
        g.edge_state(built.street2, NodeId(1))?.name()?.as_deref(),
        Some("named street2")
    );

    let access = g.registry().boolean("car_access")?;
    let added = {
        let mut e = g.edge(NodeId(3), NodeId(4))?;
        e.set_distance(123.0)?
            .set_both(&access, true, true)?
            .set_way_geometry(&PointList::from_3d(&[4.4, 5.5, 0.0, 6.6, 7.7, 0.0]))?;
        e.edge()
    };
    check_graph(&g)?;
    g.close()?;

    // and back into the heap backend, including the edge added after the reload
    let mut g = builder(Arc::new(RamDirectory::persistent(tmp.path())?), CAR)?.build()?;
    assert!(g.load_existing()?);
    assert_eq!(g.edge_count()?, 6);
    check_graph(&g)?;
    check_turn_costs(&g, &built)?;
    assert_eq!(
        g.edge_view(added)?.geometry(FetchMode::PillarOnly)?,
        PointList::from_3d(&[4.4, 5.5, 0.0, 6.6, 7.7, 0.0])
    );
    g.close()
}

#[test]
fn empty_directory_has_nothing_to_load() -> Result<()> {
    let tmp = tempdir()?;
    let mut g = builder(Arc::new(MmapDirectory::new(tmp.path())?), CAR)?.build()?;
    assert!(!g.load_existing()?);
    assert_eq!(g.state(), GraphState::Uninitialized);
    let mut in_memory = builder(Arc::new(RamDirectory::new()), CAR)?.build()?;
    assert!(!in_memory.load_existing()?);
    Ok(())
}

fn assert_rejected(builder: GraphBuilder) -> Result<()> {
    let mut g = builder.build()?;
    let err = g.load_existing().err();
    assert!(matches!(err, Some(StoreError::Incompatible(_))), "{err:?}");
    assert_eq!(g.state(), GraphState::Uninitialized);
    Ok(())
}

#[test]
fn incompatible_reloads_are_rejected() -> Result<()> {
    let tmp = tempdir()?;
    write_ram_store(tmp.path())?;
    let dir: Arc<dyn Directory> = Arc::new(MmapDirectory::new(tmp.path())?);

    assert_rejected(builder(dir.clone(), &format!("{CAR},foot"))?)?;
    assert_rejected(builder(dir.clone(), "car|speed_bits=6|max_turn_costs=1400")?)?;
    assert_rejected(builder(dir.clone(), CAR)?.set_3d(false))?;
    assert_rejected(
        builder(dir.clone(), "car|speed_bits=5|speed_factor=5")?.with_turn_costs(false),
    )?;
    assert_rejected(builder(dir.clone(), CAR)?.segment_size(SEG * 2))?;

    // nothing was truncated by the rejected attempts
    let mut g = builder(dir, CAR)?.build()?;
    assert!(g.load_existing()?);
    check_graph(&g)?;
    g.close()
}

#[test]
fn loaded_graph_cannot_be_created_again() -> Result<()> {
    let tmp = tempdir()?;
    write_ram_store(tmp.path())?;
    let mut g = builder(Arc::new(RamDirectory::persistent(tmp.path())?), CAR)?.build()?;
    assert!(g.load_existing()?);
    assert!(matches!(g.create(10), Err(StoreError::IllegalState(_))));
    assert!(matches!(g.load_existing(), Err(StoreError::IllegalState(_))));
    g.close()?;
    assert!(matches!(g.load_existing(), Err(StoreError::Closed)));
    Ok(())
}

#[test]
fn every_table_lives_in_its_own_store() -> Result<()> {
    let tmp = tempdir()?;
    write_ram_store(tmp.path())?;
    let dir = MmapDirectory::new(tmp.path())?;
    assert_eq!(
        dir.store_names()?,
        vec![
            "graph.edges",
            "graph.geometry",
            "graph.names",
            "graph.nodes",
            "graph.properties",
            "graph.turn_costs",
        ]
    );
    Ok(())
}
