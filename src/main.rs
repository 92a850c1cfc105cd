//! Example usage of the CTRV-Fusion library
//!
//! Tracks a single object driving a constant turn, observed alternately by a
//! position sensor and a range/bearing sensor every 50 ms.

use ctrv_fusion::prelude::*;

/// Ground truth of the demo object: [px, py, v, yaw, yaw_rate]
fn truth_at(t: f64) -> [f64; 5] {
    let (x0, y0, v, yaw0, yaw_rate) = (15.0, -20.0, 6.0, 0.4, 0.25);
    let yaw = yaw0 + yaw_rate * t;
    let radius = v / yaw_rate;
    [
        x0 + radius * (yaw.sin() - yaw0.sin()),
        y0 + radius * (yaw0.cos() - yaw.cos()),
        v,
        yaw,
        yaw_rate,
    ]
}

fn main() -> std::result::Result<(), FusionError> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("CTRV-Fusion: unscented two-sensor tracking");
    println!("==========================================\n");

    let config = FusionConfig::<f64>::default();
    let position_sensor = config.position_sensor;
    let mut filter = FusionFilter::new(config)?;

    let mut position_nis = NisMonitor::for_sensor(SensorKind::Position);
    let mut range_bearing_nis = NisMonitor::for_sensor(SensorKind::RangeBearing);

    let step_us: u64 = 50_000;
    let steps = 500;

    for k in 0..steps {
        let timestamp_us = k * step_us;
        let t = timestamp_us as f64 / 1e6;
        let [px, py, v, yaw, _] = truth_at(t);

        // Small deterministic wobble standing in for sensor noise
        let wobble = (k as f64 * 1.7).sin();

        let position_values;
        let range_bearing_values;
        let record = if k % 2 == 0 {
            position_values = [
                px + position_sensor.std_px * wobble,
                py - position_sensor.std_py * wobble,
            ];
            MeasurementRecord::new(SensorKind::Position, &position_values[..], timestamp_us)
        } else {
            let range = (px * px + py * py).sqrt();
            let bearing = py.atan2(px);
            let range_rate = (px * yaw.cos() * v + py * yaw.sin() * v) / range;
            range_bearing_values = [
                range + 0.2 * wobble,
                normalize_angle(bearing + 0.02 * wobble),
                range_rate - 0.2 * wobble,
            ];
            MeasurementRecord::new(SensorKind::RangeBearing, &range_bearing_values[..], timestamp_us)
        };

        filter.process_measurement(&record)?;

        if k > 0 {
            if let Some(nis) = filter.nis(record.sensor) {
                match record.sensor {
                    SensorKind::Position => position_nis.record(nis),
                    SensorKind::RangeBearing => range_bearing_nis.record(nis),
                }
            }
        }

        if k % 100 == 0 || k == steps - 1 {
            if let Some(belief) = filter.belief() {
                let (ex, ey) = belief.position();
                println!(
                    "t={:5.2}s  pos=({:7.2}, {:7.2}) truth=({:7.2}, {:7.2})  v={:5.2} yaw={:5.2} yaw_rate={:5.2}  trace(P)={:.4}",
                    t,
                    ex,
                    ey,
                    px,
                    py,
                    belief.speed(),
                    belief.yaw(),
                    belief.yaw_rate(),
                    belief.uncertainty()
                );
            }
        }
    }

    println!();
    for (name, monitor) in [
        ("position", &position_nis),
        ("range/bearing", &range_bearing_nis),
    ] {
        println!(
            "NIS {:>13}: {} samples, mean {:.3}, {:.1}% above {:.3}",
            name,
            monitor.samples(),
            monitor.mean().unwrap_or(0.0),
            monitor.exceedance_fraction().unwrap_or(0.0) * 100.0,
            monitor.threshold()
        );
    }

    println!("\nTracking complete!");
    Ok(())
}
