//! Integration tests exercising the full substrate: observe → relate →
//! state space → curvature, learning → inference → merge, and teaching →
//! path queries, across an export/import boundary.

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use serde_json::json;
use wf_core::{
    Gate, GateSequence, Mode, SpinSignature, StateSpace, SymmetryStep, WavefieldSystem,
    curvature_profile, export_json, identify_collapse_regions, import_json,
};

fn spin(values: &[f64]) -> SpinSignature {
    SpinSignature::from_values(values)
}

/// Build a scene with a tight three-node cycle (high curvature) and a
/// dangling chain (no loops).
fn make_looped_system() -> WavefieldSystem {
    let mut sys = WavefieldSystem::new("test");

    let a = sys.observe(Mode::Unity, json!("alpha"));
    let b = sys.observe(Mode::Unity, json!("beta"));
    let c = sys.observe(Mode::Unity, json!("gamma"));
    let d = sys.observe(Mode::Unity, json!("delta"));
    let e = sys.observe(Mode::Unity, json!("epsilon"));

    sys.relate(a, b, 1.0).unwrap();
    sys.relate(b, c, 1.0).unwrap();
    sys.relate(c, a, 1.0).unwrap();
    sys.relate(c, d, 0.5).unwrap();
    sys.relate(d, e, 0.5).unwrap();

    sys
}

#[test]
fn curvature_separates_cycle_from_chain() {
    let sys = make_looped_system();
    let space = StateSpace::from_graph(&sys.graph, false);
    assert_eq!(space.len(), 5);

    let profile = curvature_profile(&sys.graph, &space, 6);

    // Cycle members have positive curvature, chain tail has none
    let curved: Vec<f64> = profile.iter().map(|&(_, c)| c).collect();
    assert!(curved[0] > 0.0, "cycle member should be curved");
    assert!(curved[1] > 0.0);
    assert!(curved[2] > 0.0);
    assert_eq!(curved[3], 0.0, "chain member should be flat");
    assert_eq!(curved[4], 0.0);

    // The three cycle states cluster into one collapse region
    let threshold = curved[0];
    let regions = identify_collapse_regions(&profile, threshold, 2);
    assert_eq!(regions.len(), 1);
    assert_eq!(regions[0].state_ids, vec![0, 1, 2]);
}

#[test]
fn learning_inference_merge_lifecycle() {
    let mut sys = WavefieldSystem::new("test");

    // Teach two distinguishable emotions and two near-duplicates
    sys.emotions.learn("joy", &[0.9, 0.1, 0.0, 0.0], Some("bright"));
    sys.emotions.learn("joy", &[0.8, 0.2, 0.0, 0.0], None);
    sys.emotions.learn("fear", &[0.0, 0.1, 0.9, 0.2], None);
    sys.emotions.learn("delight", &[0.85, 0.15, 0.0, 0.0], None);

    // Exact-signature inference hits
    let probe = sys.emotions.get("fear").unwrap().signature.clone();
    let hit = sys.emotions.infer(&probe);
    assert_eq!(hit.label.as_deref(), Some("fear"));
    assert!((hit.similarity - 1.0).abs() < 1e-9);

    // Orthogonal probe misses but keeps a diagnostic score
    let miss = sys.emotions.infer(&[0.0, 0.0, 0.0, 1.0]);
    assert!(miss.label.is_none());
    assert!(miss.similarity < 0.5);

    // joy and delight are nearly parallel: one restructure pass merges them
    let (absorbed, kept) = sys.emotions.restructure().expect("merge expected");
    assert_eq!(kept, "joy");
    assert_eq!(absorbed, "delight");
    assert_eq!(sys.emotions.get("joy").unwrap().count, 3);
    assert!(sys.emotions.restructure().is_none(), "fear stays separate");
}

#[test]
fn connector_learning_tracks_consistency() {
    let mut sys = WavefieldSystem::new("test");

    // "causes" is consistently up in slot 0, inconsistent in slot 1
    sys.connectors.learn("causes", &spin(&[0.5, 0.5, 0.0, 0.0, 0.0, 0.0]));
    sys.connectors.learn("causes", &spin(&[0.5, -0.5, 0.0, 0.0, 0.0, 0.0]));
    sys.connectors.learn("precedes", &spin(&[-0.5, 0.0, 0.5, 0.0, 0.0, 0.0]));

    let probe = spin(&[0.5, 0.0, 0.0, 0.0, 0.0, 0.0]);
    let hit = sys.connectors.infer(&probe);
    assert_eq!(hit.label.as_deref(), Some("causes"));
}

#[test]
fn noisy_observations_still_infer_cleanly() {
    let mut rng = SmallRng::seed_from_u64(42);
    let mut sys = WavefieldSystem::new("test");

    // 20 jittered observations per label; the running mean washes the
    // noise out and both prototypes stay separable.
    for _ in 0..20 {
        let jitter: f64 = rng.random_range(-0.1..0.1);
        sys.emotions.learn("calm", &[0.9 + jitter, 0.1, 0.0], None);
        sys.emotions.learn("alarm", &[0.0, 0.1, 0.9 + jitter], None);
    }

    let calm = sys.emotions.infer(&[0.9, 0.1, 0.0]);
    assert_eq!(calm.label.as_deref(), Some("calm"));
    assert!(calm.similarity > 0.99);

    let alarm = sys.emotions.infer(&[0.0, 0.1, 0.9]);
    assert_eq!(alarm.label.as_deref(), Some("alarm"));

    // The field-wide history holds only the newest 50 of 40+40 observations
    assert_eq!(sys.emotions.observations().count(), 50);
}

#[test]
fn symmetry_teaching_and_queries() {
    let mut sys = WavefieldSystem::new("test");

    sys.symmetry
        .record_transformation("seed", "sprout", vec![SymmetryStep::new("up")]);
    sys.symmetry.record_transformation(
        "sprout",
        "tree",
        vec![SymmetryStep::new("strange"), SymmetryStep::new("up")],
    );

    // Composed forward path
    let path = sys.symmetry.find_path("seed", "tree").expect("composed");
    assert_eq!(path.sequence(), "up->strange->up");

    // Inverted single hop
    let back = sys.symmetry.find_path("sprout", "seed").expect("inverted");
    assert_eq!(back.sequence(), "down");

    // Provenance walk and replay plan agree
    let walk = sys.symmetry.walk_back("tree", 10);
    assert!(walk.can_reproduce);
    assert_eq!(walk.chain.len(), 2);

    let plan = sys.symmetry.reproduce("tree");
    assert!(plan.success);
    assert_eq!(plan.origin, "seed");
    assert_eq!(plan.sequence, "up->strange->up");
}

#[test]
fn gates_drive_attention_and_normalization_holds() {
    let mut sys = make_looped_system();

    // Everything was observed as Unity, so channel "up" carries 5 ids
    assert_eq!(sys.attention.channel("up").unwrap().len(), 5);

    let seq = GateSequence::new()
        .then(Gate::Transfer {
            from: "up".into(),
            to: "down".into(),
            fraction: 0.5,
        })
        .then(Gate::Phase {
            channel: "down".into(),
            theta: std::f64::consts::FRAC_PI_3,
        });
    sys.apply(&seq);

    assert!(sys.attention.energy("down") > 0.0);

    sys.attention.normalize_all();
    assert!((sys.attention.energy("up") - 1.0).abs() < 1e-9);
    assert!((sys.attention.energy("down") - 1.0).abs() < 1e-9);
}

#[test]
fn export_import_then_queries_agree() {
    let mut sys = make_looped_system();
    sys.emotions.learn("joy", &[1.0, 0.0], Some("warm"));
    sys.connectors.learn("causes", &spin(&[0.5, 0.0, -0.5, 0.0, 0.0, 0.0]));
    sys.symmetry
        .record_transformation("cat", "animal", vec![SymmetryStep::new("up")]);

    let json = export_json(&sys).expect("export");
    let sys2 = import_json(&json).expect("import");

    // Graph structure survives
    assert_eq!(sys2.graph.occurrence_count(), 5);
    assert_eq!(sys2.graph.relation_count(), 5);
    let space1 = StateSpace::from_graph(&sys.graph, false);
    let space2 = StateSpace::from_graph(&sys2.graph, false);
    assert_eq!(space1.len(), space2.len());

    // Queries give the same answers on both sides
    let hit1 = sys.emotions.infer(&[1.0, 0.0]);
    let hit2 = sys2.emotions.infer(&[1.0, 0.0]);
    assert_eq!(hit1.label, hit2.label);

    let p1 = sys.symmetry.find_path("animal", "cat").unwrap();
    let p2 = sys2.symmetry.find_path("animal", "cat").unwrap();
    assert_eq!(p1.sequence(), p2.sequence());

    // A second roundtrip is stable
    let json2 = export_json(&sys2).expect("re-export");
    let sys3 = import_json(&json2).expect("re-import");
    assert_eq!(sys3.graph.occurrence_count(), 5);
    assert_eq!(sys3.graph.relation_count(), 5);
}

#[test]
fn removal_keeps_graph_and_channels_consistent() {
    let mut sys = make_looped_system();
    let ids: Vec<_> = sys.graph.occurrence_ids().collect();

    // Remove the cycle's pivot; all three cycle edges vanish
    sys.forget_occurrence(ids[2]);

    assert_eq!(sys.graph.occurrence_count(), 4);
    assert_eq!(sys.graph.relation_count(), 2);
    for rel in sys.graph.relations() {
        assert_ne!(rel.from, ids[2]);
        assert_ne!(rel.to, ids[2]);
    }

    let space = StateSpace::from_graph(&sys.graph, false);
    let profile = curvature_profile(&sys.graph, &space, 6);
    assert!(profile.iter().all(|&(_, c)| c == 0.0), "no loops remain");
}
