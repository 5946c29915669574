//! A minimal capture front-end: finds the first supported device, captures
//! one million samples from all eight probes at 1 MHz and prints the packet
//! stream to stdout.
//!
//! Pass a firmware image path as the first argument if the device needs one
//! uploaded.  All logging goes to stdout and can be controlled via the
//! `RUST_LOG` environment variable.
use fx2logic::{ConfigOption, DriverBuilder, Error, Packet, Probe};

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

fn execute() -> Result<(), Error> {
    let mut builder = DriverBuilder::new();
    if let Some(firmware) = std::env::args().nth(1) {
        builder.firmware(firmware);
    }
    let mut driver = builder.build()?;

    let count = driver.init()?;
    info!("found {} device(s)", count);
    if count == 0 {
        return Err(Error::Args {
            message: "no supported device connected".to_string(),
        });
    }

    driver.open(0)?;

    let probes: Vec<Probe> = (1..=8)
        .map(|index| Probe {
            index,
            enabled: true,
            trigger: None,
        })
        .collect();
    driver.config_set(0, ConfigOption::Probes(&probes))?;
    driver.config_set(0, ConfigOption::Samplerate(1_000_000))?;
    driver.config_set(0, ConfigOption::LimitSamples(1_000_000))?;

    let sink = |packet: Packet<'_>| match packet {
        Packet::Header(header) => {
            println!(
                "header: {} probes at {} Hz",
                header.num_probes, header.samplerate
            );
        }
        Packet::Logic(logic) => println!("logic: {} bytes", logic.data.len()),
        Packet::Trigger => println!("trigger"),
        Packet::End => println!("end"),
    };
    driver.acquisition_start(0, Box::new(sink))?;

    while driver.acquisition_poll(0)? {}

    driver.close(0)?;
    driver.cleanup()
}

fn main() {
    env_logger::builder().init();

    match execute() {
        Ok(_) => std::process::exit(0),
        Err(e) => {
            error!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
