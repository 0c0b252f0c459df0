// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#![deny(clippy::all, clippy::pedantic)]

use std::path::PathBuf;

use args::{CmdArgs, Parser};
use config::Config;
use gobbler::engine::Engine;
use gobbler::logging::{self, LogHandle};
use gobbler::{LinkWait, RunContext, RunOptions, Shutdown, StartupError, lock, stats};
use nic::Nic;
use nic::kernel::KernelNic;
use nic::pool::MemoryBudget;
use nic::sim::SimNic;
use tracing::{debug, error, info, warn};

/// Build the nic backend: kernel interfaces, or simulated ports named after the configured
/// devices when no harm may be done.
fn init_nic(args: &CmdArgs, config: &Config) -> Result<Box<dyn Nic>, StartupError> {
    let memory = MemoryBudget::from_megabytes(config.memory_mb()).available();
    info!("Buffer memory: {} MiB", config.memory_mb());
    if args.no_harm() {
        let addresses = config
            .rx_devs
            .iter()
            .map(String::as_str)
            .chain(config.tx_devs.iter().map(|dev| dev.address.as_str()))
            .filter(|address| !config.duprx2tx || *address != config::DUP_ADDRESS);
        return Ok(Box::new(SimNic::mirror(addresses, memory)));
    }
    Ok(Box::new(
        KernelNic::discover(memory).map_err(StartupError::Discovery)?,
    ))
}

fn lock_path(args: &CmdArgs, config: &Config) -> PathBuf {
    if args.no_harm() {
        // no harm runs are not root and can not write the lock directory
        std::env::temp_dir().join(format!("{}.lock", config.lock_name))
    } else {
        config.lock_path()
    }
}

fn run(args: &CmdArgs, config: &Config, log: &LogHandle) -> Result<(), StartupError> {
    debug!("{config:?}");
    info!(
        "rx devices: {:?}, tx devices: {}, duplicate rx to tx: {}, xmit type: {}",
        config.rx_devs,
        config.tx_devs.len(),
        config.duprx2tx,
        config.xmit_type
    );

    if !args.no_harm() && !nix::unistd::geteuid().is_root() {
        return Err(StartupError::NotRoot);
    }
    let _lock = lock::acquire(&lock_path(args, config))?;

    let shutdown = Shutdown::default();
    shutdown.install_handler()?;

    stats::describe_metrics();
    if let Some(addr) = args.metrics_address() {
        stats::start_exporter(addr)?;
    }

    let engines = config.engine_count()?;
    if engines > 1 {
        warn!("cpu mask {} selects {engines} cpus; running a single engine", config.cpu_mask);
    }

    let mut nic = init_nic(args, config)?;
    let options = RunOptions {
        interactive: args.interactive(),
        dump_size: args.dump_size(),
    };
    let mut ctx = RunContext::build(&mut nic, config, options)?;
    ctx.start_interfaces()?;

    match gobbler::wait_for_links(&mut ctx, args.link_timeout(), &shutdown) {
        LinkWait::AllUp => {}
        LinkWait::TimedOut { down } => {
            warn!(
                "Links of {} not up after {}s, starting anyway",
                down.join(", "),
                args.link_timeout()
            );
        }
        LinkWait::Aborted => {
            info!("Shutdown while waiting for links");
            ctx.stop_all();
            return Ok(());
        }
    }

    log.set_level(config.log_level)?;
    let mut engine = Engine::new(ctx, std::io::stderr());
    engine.run(&shutdown);
    engine.into_context().stop_all();
    Ok(())
}

fn main() {
    let args = CmdArgs::parse();
    let config = match Config::load(args.config_path()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("gobbler: {e}");
            std::process::exit(1);
        }
    };
    let log = match logging::init(&config) {
        Ok(log) => log,
        Err(e) => {
            eprintln!("gobbler: {e}");
            std::process::exit(1);
        }
    };
    info!(" ━━━━━━ gobbler {} started ━━━━━━", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(&args, &config, &log) {
        error!("{e}");
        std::process::exit(1);
    }
    info!(" ━━━━━━ gobbler stopped ━━━━━━");
}
