//! Integration tests for the two-sensor fusion filter

mod common;

use common::*;
use ctrv_fusion::prelude::*;

const SETTLE: usize = 40;

#[test]
fn test_tracks_weaving_object_with_both_sensors() {
    let scenario = simulate(&ScenarioConfig::default());
    let run = run_filter(FusionConfig::default(), &scenario);

    let px = rmse(&run, &scenario.truth, 0, SETTLE);
    let py = rmse(&run, &scenario.truth, 1, SETTLE);
    let v = rmse(&run, &scenario.truth, 2, SETTLE);

    assert!(px < 0.3, "px RMSE {}", px);
    assert!(py < 0.3, "py RMSE {}", py);
    assert!(v < 1.0, "speed RMSE {}", v);
}

#[test]
fn test_nis_stays_in_plausible_band() {
    let scenario = simulate(&ScenarioConfig {
        seed: 7,
        steps: 600,
        ..ScenarioConfig::default()
    });
    let run = run_filter(FusionConfig::default(), &scenario);

    assert!(run.position_nis.samples() > 200);
    assert!(run.range_bearing_nis.samples() > 200);

    // A consistent filter exceeds the 95 % value about 5 % of the time
    for monitor in [&run.position_nis, &run.range_bearing_nis] {
        let fraction = monitor.exceedance_fraction().unwrap();
        assert!(fraction < 0.2, "exceedance fraction {}", fraction);
        assert!(monitor.mean().unwrap() > 0.2, "mean NIS {:?}", monitor.mean());
    }
}

#[test]
fn test_heading_wraps_on_full_circles() {
    // 0.5 rad/s for 30 s is more than two full turns
    let scenario = simulate(&ScenarioConfig {
        seed: 3,
        steps: 600,
        start: [20.0, 0.0, 4.0, 0.3, 0.5],
        yaw_rate: steady_circle,
        ..ScenarioConfig::default()
    });
    let run = run_filter(FusionConfig::default(), &scenario);

    for estimate in &run.estimates {
        assert!(
            estimate[3] > -core::f64::consts::PI && estimate[3] <= core::f64::consts::PI,
            "heading {} outside (-π, π]",
            estimate[3]
        );
    }

    let yaw = rmse(&run, &scenario.truth, 3, 100);
    let yaw_rate = rmse(&run, &scenario.truth, 4, 100);
    assert!(yaw < 0.3, "heading RMSE {}", yaw);
    assert!(yaw_rate < 0.3, "yaw rate RMSE {}", yaw_rate);
}

#[test]
fn test_position_sensor_alone() {
    let scenario = simulate(&ScenarioConfig {
        alternate: false,
        only: SensorKind::Position,
        ..ScenarioConfig::default()
    });
    let config = FusionConfig {
        use_range_bearing: false,
        ..FusionConfig::default()
    };
    let run = run_filter(config, &scenario);

    assert!(rmse(&run, &scenario.truth, 0, SETTLE) < 0.3);
    assert!(rmse(&run, &scenario.truth, 1, SETTLE) < 0.3);
    assert_eq!(run.range_bearing_nis.samples(), 0);
}

#[test]
fn test_range_bearing_sensor_alone() {
    // Bearing noise grows with range, so stay within a few tens of meters
    let scenario = simulate(&ScenarioConfig {
        steps: 200,
        start: [8.0, 6.0, 2.0, 0.3, 0.0],
        alternate: false,
        only: SensorKind::RangeBearing,
        ..ScenarioConfig::default()
    });
    let config = FusionConfig {
        use_position: false,
        ..FusionConfig::default()
    };
    let run = run_filter(config, &scenario);

    assert!(rmse(&run, &scenario.truth, 0, SETTLE) < 1.0);
    assert!(rmse(&run, &scenario.truth, 1, SETTLE) < 1.0);
    assert_eq!(run.position_nis.samples(), 0);
}

#[test]
fn test_disabled_sensor_records_are_prediction_only() {
    // Both sensors report, only position updates are applied
    let scenario = simulate(&ScenarioConfig::default());
    let config = FusionConfig {
        use_range_bearing: false,
        ..FusionConfig::default()
    };
    let run = run_filter(config, &scenario);

    assert_eq!(run.range_bearing_nis.samples(), 0);
    assert!(run.position_nis.samples() > 100);
    assert!(rmse(&run, &scenario.truth, 0, SETTLE) < 0.4);
}

#[test]
fn test_runs_are_deterministic() {
    let scenario = simulate(&ScenarioConfig {
        steps: 100,
        ..ScenarioConfig::default()
    });
    let a = run_filter(FusionConfig::default(), &scenario);
    let b = run_filter(FusionConfig::default(), &scenario);
    assert_eq!(a.final_belief, b.final_belief);
}

#[test]
fn test_covariance_stays_symmetric_positive_definite() {
    let scenario = simulate(&ScenarioConfig {
        seed: 11,
        steps: 300,
        ..ScenarioConfig::default()
    });
    let mut filter = FusionFilter::new(FusionConfig::<f64>::default()).unwrap();

    for record in &scenario.records {
        filter.process_measurement(&record.as_record()).unwrap();
        let p = filter.covariance().unwrap();
        let m = p.as_matrix();
        assert!((m - m.transpose()).norm() < 1e-12);
        let eigen = nalgebra::SymmetricEigen::new(*m);
        assert!(eigen.eigenvalues.min() > 0.0, "eigenvalues {}", eigen.eigenvalues);
    }
}

#[test]
fn test_irregular_timing() {
    // Gaps of 0 to 300 ms, including simultaneous records from both sensors
    let scenario = simulate(&ScenarioConfig {
        steps: 200,
        step_us: 10_000,
        ..ScenarioConfig::default()
    });
    let mut filter = FusionFilter::new(FusionConfig::<f64>::default()).unwrap();
    let mut last = 0;

    for (k, record) in scenario.records.iter().enumerate() {
        if k % 7 == 3 || k % 11 == 5 {
            continue;
        }
        filter.process_measurement(&record.as_record()).unwrap();
        last = record.timestamp_us;
        if k % 5 == 0 {
            // Re-send with the same timestamp
            filter.process_measurement(&record.as_record()).unwrap();
        }
    }

    assert_eq!(filter.reference_time_us(), Some(last));
    assert!(filter.belief().unwrap().is_finite());
}

#[test]
fn test_stale_record_rejected_mid_stream() {
    let scenario = simulate(&ScenarioConfig {
        steps: 50,
        ..ScenarioConfig::default()
    });
    let mut filter = FusionFilter::new(FusionConfig::<f64>::default()).unwrap();
    for record in &scenario.records {
        filter.process_measurement(&record.as_record()).unwrap();
    }
    let before = filter.phase().clone();

    let stale = &scenario.records[10];
    assert!(matches!(
        filter.process_measurement(&stale.as_record()),
        Err(FusionError::OutOfOrder { .. })
    ));
    assert_eq!(*filter.phase(), before);
}

#[test]
fn test_single_precision() {
    let scenario = simulate(&ScenarioConfig {
        steps: 200,
        ..ScenarioConfig::default()
    });
    let mut filter = FusionFilter::new(FusionConfig::<f32>::default()).unwrap();

    for record in &scenario.records {
        let payload: Vec<f32> = record.payload.iter().map(|&x| x as f32).collect();
        let record = MeasurementRecord::new(record.sensor, &payload, record.timestamp_us);
        filter.process_measurement(&record).unwrap();
    }

    let (px, py) = filter.belief().unwrap().position();
    let truth = scenario.truth.last().unwrap();
    assert!((px as f64 - truth[0]).abs() < 1.0);
    assert!((py as f64 - truth[1]).abs() < 1.0);
}

#[test]
fn test_state_dimension_spread() {
    let scenario = simulate(&ScenarioConfig::default());
    let config = FusionConfig {
        spread: SpreadParameter::StateDimension,
        ..FusionConfig::default()
    };
    let run = run_filter(config, &scenario);
    assert!(rmse(&run, &scenario.truth, 0, SETTLE) < 0.3);
}
