use std::io::{self, Write};

use clap::{Arg, Command};
use miette::{IntoDiagnostic, WrapErr};

use pinward::config::{self, Config};
use pinward::devices::{Device, DeviceRegistry};
use pinward::resources::{ResourceElement, ResourceMap, ResourceRef};
use pinward::{logging, Setup};

fn main() -> miette::Result<()> {
    // Argument parsing
    // values for the name, description and version are pulled from `Cargo.toml`.
    let matches = Command::new(clap::crate_name!())
        .version(clap::crate_version!())
        .long_version(pinward::VERSION_STRING)
        .about(clap::crate_description!())
        .arg(
            Arg::new("config")
                .help("Path to the config file to use")
                .long("config")
                .short('c')
                .takes_value(true),
        )
        .arg(Arg::new("verbosity")
            .help("Increase logging verbosity")
            .long("verbose")
            .short('v')
            .multiple_occurrences(true)
            .max_occurrences(3)
            .conflicts_with("quiet")
        )
        .arg(Arg::new("quiet")
            .help("Decrease logging verbosity")
            .long("quiet")
            .conflicts_with("verbosity")
        )
        .arg(Arg::new("log format")
            .help("Use an alternative log formatter. Available: Full, Compact, Pretty")
            .long("log-format")
            .takes_value(true)
            .ignore_case(true)
            .possible_values(["Full", "Compact", "Pretty"]))
        .arg(
            Arg::new("print default")
                .help("Print a default config to stdout instead of running")
                .long("print-default"),
        )
        .arg(
            Arg::new("check config")
                .help("Check config for validity")
                .long("check"),
        )
        .arg(
            Arg::new("strict")
                .help("Fail on the first device that can not be loaded instead of skipping it")
                .long("strict"),
        )
        .get_matches();

    let configpath = matches
        .value_of("config")
        .unwrap_or("/etc/pinward.dhall");

    // Check for the --print-default option first because we don't need to do anything else in that
    // case.
    if matches.is_present("print default") {
        let config = Config::default();
        let encoded = serde_dhall::serialize(&config)
            .to_string()
            .into_diagnostic()
            .wrap_err("failed to serialize the default config")?;

        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle.write_all(encoded.as_bytes()).into_diagnostic()?;

        // Early return to exit.
        return Ok(());
    } else if matches.is_present("check config") {
        let config = config::read(configpath)?;
        let formatted = format!("{:#?}\n", config);

        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle.write_all(formatted.as_bytes()).into_diagnostic()?;

        return Ok(());
    }

    let mut config = config::read(configpath)?;

    config.verbosity = matches.occurrences_of("verbosity") as isize;
    if config.verbosity == 0 && matches.is_present("quiet") {
        config.verbosity = -1;
    }
    if let Some(format) = matches.value_of("log format") {
        config.logging.format = format.to_string();
    }
    logging::init(&config.logging, config.verbosity);

    let registry = DeviceRegistry::default();
    let setup = if matches.is_present("strict") {
        Setup::try_from_config(&config, registry)?
    } else {
        Setup::from_config(&config, registry)
    };
    tracing::info!(devices = setup.devices().len(), "setup loaded");

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    for device in setup.devices() {
        print_device(&mut handle, &**device).into_diagnostic()?;
    }

    Ok(())
}

fn print_device(out: &mut impl Write, device: &dyn Device) -> io::Result<()> {
    writeln!(out, "{} [{}]", device.name(), device.id())?;
    if let Some(resources) = device.resources() {
        print_map(out, resources, 1)?;
    }
    for channel in device.channels() {
        let state = if channel.enabled() { "enabled" } else { "disabled" };
        writeln!(out, "  {} ({}): {}", channel.path(), channel.kind(), state)?;
    }
    Ok(())
}

fn print_map(out: &mut impl Write, map: &ResourceMap, depth: usize) -> io::Result<()> {
    for (name, resource) in map.iter() {
        writeln!(out, "{:indent$}{}{}", "", name, state(resource), indent = depth * 2)?;
        if let Some(nested) = resource.downcast_ref::<ResourceMap>() {
            print_map(out, nested, depth + 1)?;
        }
    }
    Ok(())
}

fn state(resource: &ResourceRef) -> String {
    if let Some(element) = resource.downcast_ref::<ResourceElement>() {
        return match element.current_user() {
            Some(user) => format!(": used by {}", user.path()),
            None => ": free".to_string(),
        };
    }
    if resource.is_available(None) {
        String::new()
    } else {
        " (partially used)".to_string()
    }
}
