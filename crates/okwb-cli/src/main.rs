//! `okwb`: command-line interface for the Wishbone bus master.
//!
//! ```text
//! USAGE:
//!   okwb exec <op>...        Run bus operations against the simulated gateware
//!   okwb selftest            Write/read-back check with single and burst transfers
//! ```
//!
//! Every run starts from a freshly configured simulated device; opening and
//! configuring real hardware is left to the host application.

mod ops;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use okwb_driver::backends::SimulatedFpga;
use okwb_driver::{MasterConfig, PollPolicy, TransactionOutput, WishboneMaster};
use ops::Op;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "okwb", about = "Wishbone bus master CLI", version)]
struct Cli {
    /// Status polls before the simulated gateware reports finished.
    #[arg(long, default_value_t = 0, global = true)]
    latency: u32,

    /// Completion handshake timeout in milliseconds (0 waits forever).
    #[arg(long, default_value_t = 1000, global = true)]
    timeout_ms: u64,

    /// Delay after the reset pulse in milliseconds.
    #[arg(long, default_value_t = 100, global = true)]
    settle_ms: u64,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Run operations in order: reset, r:ADDR, w:ADDR=VAL, br:ADDRxN, bw:ADDR=W0,W1,..., debug, irq.
    Exec {
        /// Operations to run.
        #[arg(required = true)]
        ops: Vec<Op>,
    },
    /// Write squares to single addresses and a ramp in bursts, then read everything back.
    Selftest {
        /// Number of words to exercise.
        #[arg(long, default_value_t = 16)]
        words: u16,
    },
}

impl Cli {
    fn master_config(&self) -> MasterConfig {
        let poll = if self.timeout_ms == 0 {
            PollPolicy::unbounded()
        } else {
            PollPolicy::default().with_timeout(Duration::from_millis(self.timeout_ms))
        };
        MasterConfig::default()
            .with_reset_settle(Duration::from_millis(self.settle_ms))
            .with_poll_policy(poll)
    }

    fn open(&self) -> WishboneMaster<SimulatedFpga> {
        let fpga = SimulatedFpga::new().with_latency(self.latency);
        WishboneMaster::with_config(fpga, self.master_config())
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();
    let mut bus = cli.open();

    match &cli.command {
        Cmd::Exec { ops } => cmd_exec(&mut bus, ops)?,
        Cmd::Selftest { words } => cmd_selftest(&mut bus, *words)?,
    }

    Ok(())
}

fn cmd_exec(bus: &mut WishboneMaster<SimulatedFpga>, ops: &[Op]) -> Result<()> {
    for op in ops {
        match op {
            Op::Bus(tx) => match bus.execute(tx)? {
                TransactionOutput::None => println!("{tx}: ok"),
                TransactionOutput::Word(value) => println!("{tx}: {value:#06x} ({value})"),
                TransactionOutput::Words(words) => println!("{tx}: {words:?}"),
            },
            Op::Debug => {
                let value = bus.read_debug()?;
                println!("debug: {value:#06x}");
            }
            Op::Irq => println!("interrupt: {}", bus.is_interrupt()?),
        }
    }
    Ok(())
}

#[allow(clippy::cast_possible_wrap)]
fn cmd_selftest(bus: &mut WishboneMaster<SimulatedFpga>, words: u16) -> Result<()> {
    let start = Instant::now();
    bus.reset()?;

    let n = u32::from(words);
    for i in 0..n {
        bus.single_write(i, i * i)?;
    }

    // Read back out of order so stale DATA_OUT values cannot pass.
    let mut failures = 0u32;
    let odd = (0..n).filter(|i| i % 2 == 1).rev();
    for i in odd.chain((0..n).filter(|i| i % 2 == 0)) {
        let got = bus.single_read(i)?;
        let want = okwb_driver::regs::mask_data(i * i);
        if got != want {
            println!("  single [{i:#06x}]: got {got:#06x}, want {want:#06x}");
            failures += 1;
        }
    }
    println!("single: {n} words, {failures} mismatches");

    let base = n;
    let ramp: Vec<i16> = (0..words).map(|w| w as i16).collect();
    let mut burst_failures = 0u32;
    for chunk in ramp.chunks(4) {
        bus.burst_write(base, chunk)?;
        let back = bus.burst_read(base, chunk.len())?;
        if back != chunk {
            println!("  burst: wrote {chunk:?}, read {back:?}");
            burst_failures += 1;
        }
    }
    println!("burst:  {} chunks, {burst_failures} mismatches", ramp.chunks(4).len());

    let stats = bus.transport().stats();
    println!(
        "{} transactions, {} status polls in {:.1?}",
        stats.transactions,
        stats.status_polls,
        start.elapsed()
    );

    if failures + burst_failures > 0 {
        bail!("selftest failed");
    }
    println!("selftest passed");
    Ok(())
}
