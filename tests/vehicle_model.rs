// tests/vehicle_model.rs
use glam::Vec3;
use uav_oracle::{
    Assembler, ComponentCategory, CutoffStage, DesignError, HeadlessPlacement, NodeCounter,
    Quadrant, VehicleConfig, VehicleModel, VehicleTotals, decode,
};

const BASELINE: &str = "*aMM0+++++*bNM2+++*cMN1+++*dLM2+++*eML1+++^ab^ac^ad^ae,5,3";

fn place(text: &str, sink: &mut HeadlessPlacement) -> VehicleModel {
    let design = decode(text).unwrap();
    let layout = Assembler::default()
        .build(&design, &mut NodeCounter::new())
        .unwrap();
    VehicleModel::place(&layout, &VehicleConfig::default(), sink)
}

#[test]
fn test_cost_formula() {
    let totals = VehicleTotals {
        structure_weight: 17.7,
        motor_count: 4,
        ..VehicleTotals::default()
    };
    let cost = totals.cost(&VehicleConfig::default());
    assert!((cost - 2878.0).abs() < 1e-2, "cost was {cost}");
}

#[test]
fn test_energy_formula() {
    let totals = VehicleTotals {
        structure_weight: 17.7,
        ..VehicleTotals::default()
    };
    let energy = totals.battery_energy(&VehicleConfig::default());
    assert!((energy - 570.0).abs() < 1e-3, "energy was {energy}");
}

#[test]
fn test_quadrant_symmetry() {
    let offsets = [
        (1.0, 0.0),
        (0.0, 1.0),
        (3.0, -2.0),
        (-7.5, 4.0),
        (10.0, 10.0),
        (0.004, 5.0),
    ];
    for (a, b) in offsets {
        let here = Quadrant::classify(Vec3::new(a, 0.0, b), 45.0, 0.01).unwrap();
        let there = Quadrant::classify(Vec3::new(-a, 0.0, -b), 45.0, 0.01).unwrap();
        assert_eq!(here.opposite(), there, "offset ({a}, {b})");
    }
}

#[test]
fn test_baseline_placement() {
    let mut sink = HeadlessPlacement::new();
    let vehicle = place(BASELINE, &mut sink);

    // Five hosted components plus four connectors.
    assert_eq!(vehicle.components().len(), 9);
    assert_eq!(sink.live(), 9);

    // The structure at node `a` sits on the staging origin.
    let main = vehicle.require_main_structure().unwrap();
    let structure = vehicle.component(main).unwrap();
    assert_eq!(structure.category, ComponentCategory::Structure);
    assert!(structure.position.distance(vehicle.staging_origin()) < 1e-3);
    assert!(structure.position.distance(Vec3::new(0.0, 1000.0, 2000.0)) < 1e-3);
    assert!((structure.scale - 4.5).abs() < 1e-6);

    let totals = vehicle.totals();
    assert_eq!(totals.motor_count, 4);
    assert!((totals.structure_weight - 17.8605).abs() < 1e-2);
    assert_eq!(totals.connection_weight, 0.0);

    for component in vehicle.components() {
        match component.category {
            ComponentCategory::Connector => assert_eq!(component.mass, 0.0),
            _ => assert!(component.mass > 0.0),
        }
    }
}

#[test]
fn test_baseline_motors() {
    let mut sink = HeadlessPlacement::new();
    let vehicle = place(BASELINE, &mut sink);

    let motors: Vec<_> = vehicle
        .components()
        .iter()
        .filter(|c| c.category.is_motor())
        .collect();
    assert_eq!(motors.len(), 4);

    for motor in &motors {
        let data = motor.motor.unwrap();
        assert!((data.max_thrust - 82.03).abs() < 1e-2, "thrust {}", data.max_thrust);
        assert!(data.quadrant.is_some());
    }

    // Arms at +x and -x land in opposite diagonal quadrants.
    assert_eq!(
        motors[0].motor.unwrap().quadrant,
        Some(Quadrant::FrontRight)
    );
    assert_eq!(motors[2].motor.unwrap().quadrant, Some(Quadrant::BackLeft));
    assert_eq!(vehicle.motors(Quadrant::FrontLeft).count(), 1);
    assert_eq!(vehicle.motors(Quadrant::Front).count(), 0);
}

#[test]
fn test_connectivity_spans_everything() {
    let mut sink = HeadlessPlacement::new();
    let vehicle = place(BASELINE, &mut sink);
    let connectivity = vehicle.connect(&VehicleConfig::default()).unwrap();

    assert_eq!(connectivity.root, vehicle.main_structure().unwrap());
    assert_eq!(connectivity.members().count(), 9);
    assert!(connectivity.unconnected.is_empty());
    assert!(connectivity.cutoff.is_none());

    // Every anchor carries mass.
    for attachment in &connectivity.attachments {
        assert!(vehicle.component(attachment.anchor).unwrap().mass > 0.0);
    }
}

#[test]
fn test_connectivity_bound_raises_cutoff() {
    let mut sink = HeadlessPlacement::new();
    let vehicle = place(BASELINE, &mut sink);
    let config = VehicleConfig {
        max_connection_passes: 3,
        ..VehicleConfig::default()
    };
    let connectivity = vehicle.connect(&config).unwrap();

    assert_eq!(connectivity.attachments.len(), 3);
    assert_eq!(connectivity.unconnected.len(), 5);
    let cutoff = connectivity.cutoff.unwrap();
    assert_eq!(cutoff.stage, CutoffStage::Connectivity);
    assert_eq!(cutoff.limit, 3);
    for loose in &connectivity.unconnected {
        assert!(!connectivity.is_connected(*loose));
    }
}

#[test]
fn test_no_structure() {
    let mut sink = HeadlessPlacement::new();
    let vehicle = place("*aMM1*bNM3^ab,0,0", &mut sink);

    assert_eq!(vehicle.main_structure(), None);
    assert_eq!(vehicle.require_main_structure(), Err(DesignError::NoStructure));
    assert_eq!(
        vehicle.connect(&VehicleConfig::default()),
        Err(DesignError::NoStructure)
    );
}

#[test]
fn test_release_returns_every_handle() {
    let mut sink = HeadlessPlacement::new();
    let mut vehicle = place(BASELINE, &mut sink);
    assert_eq!(sink.live(), 9);

    vehicle.release(&mut sink);
    assert_eq!(sink.live(), 0);
    assert!(vehicle.components().iter().all(|c| c.handle.is_none()));

    // A second release has nothing left to return.
    vehicle.release(&mut sink);
    assert_eq!(sink.live(), 0);
}
