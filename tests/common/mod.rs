//! Common test helpers for fusion integration tests

#![allow(dead_code)]

use ctrv_fusion::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

/// A record owning its payload, so scenarios can be generated up front.
#[derive(Debug, Clone)]
pub struct OwnedRecord {
    pub sensor: SensorKind,
    pub payload: Vec<f64>,
    pub timestamp_us: u64,
}

impl OwnedRecord {
    pub fn as_record(&self) -> MeasurementRecord<'_, f64> {
        MeasurementRecord::new(self.sensor, &self.payload, self.timestamp_us)
    }
}

/// Ground-truth state at one record's timestamp: [px, py, v, yaw, yaw_rate]
pub type TruthState = [f64; 5];

/// Yaw rate profile of the simulated object over time.
pub type YawRateProfile = fn(f64) -> f64;

pub fn gentle_weave(t: f64) -> f64 {
    0.3 * (0.2 * t).sin()
}

pub fn steady_circle(_t: f64) -> f64 {
    0.5
}

/// Simulated drive: truth and noisy records for both sensors.
pub struct Scenario {
    pub truth: Vec<TruthState>,
    pub records: Vec<OwnedRecord>,
}

/// Parameters of a simulated drive.
pub struct ScenarioConfig {
    pub seed: u64,
    pub steps: usize,
    pub step_us: u64,
    pub start: TruthState,
    pub yaw_rate: YawRateProfile,
    /// Alternate sensors; otherwise every record comes from `only`
    pub alternate: bool,
    pub only: SensorKind,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            steps: 400,
            step_us: 50_000,
            start: [8.0, 6.0, 5.0, 0.3, 0.0],
            yaw_rate: gentle_weave,
            alternate: true,
            only: SensorKind::Position,
        }
    }
}

/// Integrates CTRV truth in 1 ms substeps.
fn advance(state: &mut TruthState, t0: f64, dt: f64, yaw_rate: YawRateProfile) {
    let substeps = ((dt / 1e-3).round() as usize).max(1);
    let h = dt / substeps as f64;
    for i in 0..substeps {
        let t = t0 + i as f64 * h;
        state[4] = yaw_rate(t);
        state[0] += state[2] * state[3].cos() * h;
        state[1] += state[2] * state[3].sin() * h;
        state[3] += state[4] * h;
    }
    state[4] = yaw_rate(t0 + dt);
}

/// Noise-free range/bearing/range-rate of a state.
pub fn range_bearing_of(state: &TruthState) -> [f64; 3] {
    let [px, py, v, yaw, _] = *state;
    let range = (px * px + py * py).sqrt();
    let bearing = py.atan2(px);
    let range_rate = (px * yaw.cos() * v + py * yaw.sin() * v) / range;
    [range, bearing, range_rate]
}

/// Generates a scenario with the default sensor noise figures.
pub fn simulate(config: &ScenarioConfig) -> Scenario {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let lidar = PositionSensor::<f64>::default();
    let radar = RangeBearingSensor::<f64>::default();

    let lidar_x = Normal::new(0.0, lidar.std_px).unwrap();
    let lidar_y = Normal::new(0.0, lidar.std_py).unwrap();
    let radar_range = Normal::new(0.0, radar.std_range).unwrap();
    let radar_bearing = Normal::new(0.0, radar.std_bearing).unwrap();
    let radar_rate = Normal::new(0.0, radar.std_range_rate).unwrap();

    let mut state = config.start;
    let mut truth = Vec::with_capacity(config.steps);
    let mut records = Vec::with_capacity(config.steps);
    let dt = config.step_us as f64 / 1e6;

    for k in 0..config.steps {
        if k > 0 {
            advance(&mut state, (k - 1) as f64 * dt, dt, config.yaw_rate);
        }
        let timestamp_us = k as u64 * config.step_us;

        let sensor = if config.alternate {
            if k % 2 == 0 {
                SensorKind::Position
            } else {
                SensorKind::RangeBearing
            }
        } else {
            config.only
        };

        let payload = match sensor {
            SensorKind::Position => vec![
                state[0] + lidar_x.sample(&mut rng),
                state[1] + lidar_y.sample(&mut rng),
            ],
            SensorKind::RangeBearing => {
                let [range, bearing, range_rate] = range_bearing_of(&state);
                vec![
                    range + radar_range.sample(&mut rng),
                    normalize_angle(bearing + radar_bearing.sample(&mut rng)),
                    range_rate + radar_rate.sample(&mut rng),
                ]
            }
        };

        truth.push(state);
        records.push(OwnedRecord {
            sensor,
            payload,
            timestamp_us,
        });
    }

    Scenario { truth, records }
}

/// Per-record outcome of running a filter over a scenario.
pub struct Run {
    pub estimates: Vec<[f64; 5]>,
    pub position_nis: NisMonitor<f64>,
    pub range_bearing_nis: NisMonitor<f64>,
    pub final_belief: Belief<f64, 5>,
}

/// Feeds every record of `scenario` to a fresh filter.
pub fn run_filter(config: FusionConfig<f64>, scenario: &Scenario) -> Run {
    let mut filter = FusionFilter::new(config).unwrap();
    let mut position_nis = NisMonitor::for_sensor(SensorKind::Position);
    let mut range_bearing_nis = NisMonitor::for_sensor(SensorKind::RangeBearing);
    let mut estimates = Vec::with_capacity(scenario.records.len());

    for (k, record) in scenario.records.iter().enumerate() {
        filter.process_measurement(&record.as_record()).unwrap();

        let mean = filter.mean().unwrap();
        let mut estimate = [0.0; 5];
        estimate.copy_from_slice(mean.as_slice());
        estimates.push(estimate);

        // Skip the first record and the filter's settling period
        if k >= 40 {
            if let Some(nis) = filter.nis(record.sensor) {
                match record.sensor {
                    SensorKind::Position => position_nis.record(nis),
                    SensorKind::RangeBearing => range_bearing_nis.record(nis),
                }
            }
        }
    }

    Run {
        estimates,
        position_nis,
        range_bearing_nis,
        final_belief: *filter.belief().unwrap(),
    }
}

/// Root mean squared error of one state component after `skip` records.
pub fn rmse(run: &Run, truth: &[TruthState], component: usize, skip: usize) -> f64 {
    let errors: Vec<f64> = run
        .estimates
        .iter()
        .zip(truth)
        .skip(skip)
        .map(|(estimate, truth)| {
            let e = estimate[component] - truth[component];
            if component == 3 {
                angle_difference(estimate[component], truth[component]).powi(2)
            } else {
                e * e
            }
        })
        .collect();
    (errors.iter().sum::<f64>() / errors.len() as f64).sqrt()
}
