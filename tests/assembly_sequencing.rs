// tests/assembly_sequencing.rs
use glam::IVec2;
use uav_oracle::{
    Assembler, AssemblyConfig, AssemblyLayout, ComponentType, CutoffStage, Design, Edge,
    NodeCounter, SkipReason, decode, sequence_edges,
};

const BASELINE: &str = "*aMM0+++++*bNM2+++*cMN1+++*dLM2+++*eML1+++^ab^ac^ad^ae,5,3";

// a(0,0) - b(1,0)
//   |        |
// d(0,1) - c(1,1), with `dc` closing the loop.
const SQUARE: &str = "*aMM0*bNM1*cNN2*dMN1^ab^bc^ad^dc,0,0";

fn build(text: &str) -> (Design, AssemblyLayout) {
    build_with(text, AssemblyConfig::default())
}

fn build_with(text: &str, config: AssemblyConfig) -> (Design, AssemblyLayout) {
    let design = decode(text).unwrap();
    let mut counter = NodeCounter::new();
    let layout = Assembler::new(config).build(&design, &mut counter).unwrap();
    (design, layout)
}

fn pairs<'a>(edges: impl IntoIterator<Item = &'a Edge>) -> Vec<(usize, usize)> {
    edges.into_iter().map(|e| (e.from, e.to)).collect()
}

#[test]
fn test_baseline_sequence() {
    let (design, layout) = build(BASELINE);

    let order = sequence_edges(&design.edges);
    assert_eq!(pairs(&order), vec![(0, 1), (0, 2), (0, 3), (0, 4)]);

    assert_eq!(pairs(layout.build_order()), vec![(0, 1), (0, 2), (0, 3), (0, 4)]);
    assert!(layout.skipped.is_empty());
    assert!(layout.cutoffs.is_empty());
    assert!(layout.build_order().all(|e| e.introduces_new_node));

    // Root plus four arms, every one locked at its declared cell.
    assert_eq!(layout.joints.len(), 5);
    for node in &design.nodes {
        let joint = layout.joint_for(node.index).unwrap();
        assert_eq!(joint.cell, IVec2::new(node.grid_x, node.grid_z));
        assert!(joint.locked);
        assert_eq!(joint.component, Some((node.component, node.size)));
    }
}

#[test]
fn test_cycle_edges_are_deferred() {
    // `db` and `cd` reach destinations that already have a primary edge.
    let edges = [
        Edge::new(0, 1),
        Edge::new(0, 3),
        Edge::new(3, 1),
        Edge::new(1, 2),
        Edge::new(2, 3),
    ];
    let order = sequence_edges(&edges);

    assert_eq!(pairs(&order), vec![(0, 1), (1, 2), (0, 3), (3, 1), (2, 3)]);
}

#[test]
fn test_sequencing_validity() {
    let designs = [
        BASELINE,
        SQUARE,
        "*aMM0*bNM1*cNN2*dMN3*eLM4^ab^bc^cd^ae^ed,1,0",
        "*aMM0*bMN4*cMO4*dMP1^cd^bc^ab,0,0",
    ];
    for text in designs {
        let design = decode(text).unwrap();
        let order = sequence_edges(&design.edges);
        assert_eq!(order.len(), design.edges.len());

        let mut built = vec![0];
        for edge in &order {
            assert!(
                built.contains(&edge.from),
                "edge {}->{} built before its source in `{text}`",
                edge.from,
                edge.to
            );
            built.push(edge.to);
        }
    }
}

#[test]
fn test_square_closes_without_new_joint() {
    let (_, layout) = build(SQUARE);

    assert_eq!(layout.joints.len(), 4);
    assert_eq!(layout.steps.len(), 4);

    let closing = layout.steps.last().unwrap();
    assert_eq!((closing.edge.from, closing.edge.to), (3, 2));
    assert!(!closing.edge.introduces_new_node);
    assert_eq!(closing.start, IVec2::new(0, 1));
    assert_eq!(closing.end, IVec2::new(1, 1));
}

#[test]
fn test_identity_reconciliation() {
    // `c` is the first node built after the root, so the counter hands out
    // index 1 and reconciliation renames it.
    let design = decode("*aMM0*cNM1,0,0").unwrap();
    let design = Design {
        edges: vec![Edge::new(0, 2)],
        ..design
    };
    let mut counter = NodeCounter::new();
    let layout = Assembler::default().build(&design, &mut counter).unwrap();

    assert!(layout.joint_for(1).is_none());
    let joint = layout.joint_for(2).unwrap();
    assert_eq!(joint.cell, IVec2::new(1, 0));
    assert!(joint.locked);
    assert_eq!(joint.component, Some((ComponentType::MotorCw, 0)));
    assert_eq!(counter.peek(), 3);
}

#[test]
fn test_skip_reasons() {
    // Not a neighbour, and then nothing to build from.
    let (_, layout) = build("*aMM0*bOM1*cPM1^ab^bc,0,0");
    let reasons: Vec<_> = layout.skipped.iter().map(|s| s.reason).collect();
    assert_eq!(reasons, vec![SkipReason::NotUnitStep, SkipReason::SourceMissing]);
    assert_eq!(layout.joints.len(), 1);

    // Two arms through the same handle.
    let (_, layout) = build("*aMM0*bNM1*cNM2^ab^ac,0,0");
    assert_eq!(layout.skipped.len(), 1);
    assert_eq!(layout.skipped[0].reason, SkipReason::HandleUsed);

    // A connector back over an existing segment.
    let (_, layout) = build("*aMM0*bNM1*cNN2^ab^bc^cb,0,0");
    assert_eq!(layout.skipped.len(), 1);
    assert_eq!(layout.skipped[0].reason, SkipReason::SegmentOccupied);
    assert_eq!((layout.skipped[0].edge.from, layout.skipped[0].edge.to), (2, 1));
}

#[test]
fn test_step_bound_raises_cutoff() {
    let config = AssemblyConfig {
        max_steps: 2,
        ..AssemblyConfig::default()
    };
    let (_, layout) = build_with(BASELINE, config);

    assert_eq!(layout.steps.len(), 2);
    assert!(layout.cutoffs.iter().any(|c| c.stage == CutoffStage::Sequencing && c.limit == 2));
    assert!(layout.joint_for(3).is_none());
}

#[test]
fn test_size_bound_raises_cutoff() {
    let config = AssemblyConfig {
        max_size_steps: 2,
        ..AssemblyConfig::default()
    };
    let (_, layout) = build_with(BASELINE, config);

    assert_eq!(
        layout.joint_for(0).unwrap().component,
        Some((ComponentType::Structure, 2))
    );
    assert!(layout.cutoffs.iter().any(|c| c.stage == CutoffStage::Sizing));
}
