//! End-to-end batch adjustment through real binary observation files.

use camino::Utf8PathBuf;
use rand::rngs::StdRng;
use rand::SeedableRng;

use triaxial::adjustment::AdjustmentParams;
use triaxial::observations::{write_observations, Observation, PointFile};
use triaxial::synthetic::ellipsoid_surface_points;
use triaxial::{fit_ellipsoid, EllipsoidParams, TriaxialError};

fn temp_file(name: &str) -> Utf8PathBuf {
    let path = std::env::temp_dir().join(format!("triaxial-it-{}-{}", std::process::id(), name));
    Utf8PathBuf::from_path_buf(path).expect("temp dir is valid UTF-8")
}

fn truth() -> EllipsoidParams {
    EllipsoidParams::new(1.0, 2.0, 3.0, 10.0, 7.0, 4.0, 0.1, 0.2, 0.3)
}

#[test]
fn batch_fit_recovers_known_ellipsoid_from_files() {
    let mut rng = StdRng::seed_from_u64(2024);
    let points = ellipsoid_surface_points(&truth(), 120, 0.0, &mut rng);

    let path_a = temp_file("groupA.bin");
    let path_b = temp_file("groupB.bin");
    write_observations(&path_a, &points[..60]).unwrap();
    write_observations(&path_b, &points[60..]).unwrap();

    let mut sources = vec![
        PointFile::open(&path_a).unwrap(),
        PointFile::open(&path_b).unwrap(),
    ];
    let fit = fit_ellipsoid(&mut sources, &AdjustmentParams::default()).unwrap();

    assert!(fit.status.is_converged(), "status: {:?}", fit.status);
    let expected = truth().as_vector();
    let got = fit.params.as_vector();
    for i in 0..9 {
        assert!(
            (got[i] - expected[i]).abs() < 1e-6,
            "parameter {i}: {} vs {}",
            got[i],
            expected[i]
        );
    }
    assert!(fit.sigma0 < 1e-8);

    // Degrees-of-freedom arithmetic for c = 120 points.
    assert_eq!(fit.dof.measurements, 3 * 120);
    assert_eq!(fit.dof.unknowns, 9 + 2 * 120);
    assert_eq!(fit.dof.redundancy, 3 * 120 - (9 + 2 * 120));

    // Standard deviations of an essentially exact fit collapse toward zero.
    for i in 0..9 {
        assert!(fit.precision.std_devs[i] < 1e-6);
    }

    std::fs::remove_file(&path_a).unwrap();
    std::fs::remove_file(&path_b).unwrap();
}

#[test]
fn noisy_data_still_converges_with_realistic_spread() {
    let mut rng = StdRng::seed_from_u64(99);
    let points = ellipsoid_surface_points(&truth(), 300, 1e-4, &mut rng);

    let path = temp_file("noisy.bin");
    write_observations(&path, &points).unwrap();

    let mut sources = vec![PointFile::open(&path).unwrap()];
    let fit = fit_ellipsoid(&mut sources, &AdjustmentParams::default()).unwrap();

    assert!(fit.status.is_converged());
    let expected = truth().as_vector();
    let got = fit.params.as_vector();
    for i in 0..9 {
        assert!(
            (got[i] - expected[i]).abs() < 0.05,
            "parameter {i} drifted: {} vs {}",
            got[i],
            expected[i]
        );
    }
    assert!(fit.sigma0 > 0.0);

    std::fs::remove_file(&path).unwrap();
}

#[test]
fn coplanar_points_abort_with_a_typed_error() {
    // Points on a circle in a plane: no ellipsoid is constrained.
    let mut points = Vec::new();
    for i in 0..50 {
        let t = i as f64 * 0.13;
        points.push(Observation::new(5.0 * t.cos(), 3.0 * t.sin(), 1.0, 1.0));
    }
    let path = temp_file("coplanar.bin");
    write_observations(&path, &points).unwrap();

    let mut sources = vec![PointFile::open(&path).unwrap()];
    match fit_ellipsoid(&mut sources, &AdjustmentParams::default()) {
        Err(TriaxialError::NotPositiveDefinite { .. }) | Err(TriaxialError::DegenerateQuadric) => {}
        other => panic!("expected a degenerate-geometry error, got {other:?}"),
    }

    std::fs::remove_file(&path).unwrap();
}
