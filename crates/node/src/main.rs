use std::time::Duration;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use smartpot_node::config::NodeConfig;
use smartpot_node::control::Controller;
use smartpot_node::hal::{MonotonicClock, ThreadDelay};
use smartpot_node::link::SerialLink;
use smartpot_node::sampler::Sampler;
use smartpot_node::valve::Valve;

#[cfg(not(any(feature = "sim", feature = "hw")))]
compile_error!("enable the `sim` or the `hw` feature");

/// Host-side pacing between loop iterations so an idle loop does not spin
/// a core. A microcontroller build would loop back-to-back.
const IDLE_POLL: Duration = Duration::from_millis(5);

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cfg = NodeConfig::from_env()?;
    let link = SerialLink::open(&cfg.serial_port, cfg.baud_rate)?;

    tracing::info!(
        interval_ms = cfg.sample_interval_ms,
        raw_dry = cfg.calibration.raw_dry,
        raw_wet = cfg.calibration.raw_wet,
        "node starting"
    );

    #[cfg(feature = "hw")]
    let (valve, sampler) = {
        use rppal::gpio::Gpio;
        use smartpot_node::{adc::Ads1115, iio::IioClimate, servo};

        let gpio = Gpio::new()?;
        let hw = &cfg.hardware;
        let valve = Valve::new(servo::PiServo::new(&gpio, hw.servo_gpio)?, cfg.servo);
        let sampler = Sampler::new(
            IioClimate::new(&hw.climate_iio_dir),
            Ads1115::new(hw.soil_adc_addr, hw.soil_adc_channel)?,
            servo::sensor_power(&gpio, hw.soil_power_gpio)?,
            cfg.calibration,
        );
        tracing::info!("hardware backend: raspberry pi");
        (valve, sampler)
    };

    #[cfg(all(feature = "sim", not(feature = "hw")))]
    let (valve, sampler) = {
        use smartpot_node::sim::{
            PlantModel, Scenario, SimClimate, SimSensorPower, SimServo, SimSoilSensor,
        };

        let scenario = Scenario::from_str_lossy(&cfg.sim_scenario);
        let plant = PlantModel::new(scenario, cfg.calibration, 600.0).shared();
        let valve = Valve::new(SimServo::new(plant.clone(), cfg.servo.open), cfg.servo);
        let sampler = Sampler::new(
            SimClimate::new(plant.clone()),
            SimSoilSensor::new(plant.clone()),
            SimSensorPower::new(plant),
            cfg.calibration,
        );
        tracing::info!(%scenario, "hardware backend: simulator");
        (valve, sampler)
    };

    let mut controller = Controller::new(
        link,
        valve,
        sampler,
        ThreadDelay,
        MonotonicClock::new(),
        cfg.sample_interval_ms,
    );

    if let Err(e) = controller.park() {
        tracing::error!("{e}");
    }

    loop {
        controller.step();
        std::thread::sleep(IDLE_POLL);
    }
}
