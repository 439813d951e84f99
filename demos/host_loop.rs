//! Simulated host tick loop.
//!
//! Spawns a service worker, sends a ping every few ticks, polls once per tick and
//! shuts down after five pongs.
//!
//! ```text
//! RUST_LOG=debug cargo run --example host_loop
//! ```

use std::time::{Duration, Instant};

use anyhow::Context;
use tickbridge::logging::{self, LogTarget};
use tickbridge::{
    Body, Bridge, BridgeConfig, Command, PingService, Reply, ServiceSet, WorkerSpec, WorkerState,
};

const TICK: Duration = Duration::from_millis(16);
const PINGS: usize = 5;

fn main() -> anyhow::Result<()> {
    logging::init(LogTarget::Stderr)?;

    let log_dir = tempfile::tempdir().context("creating log directory")?;
    let cfg = BridgeConfig {
        log_path: Some(log_dir.path().join("host_loop.log")),
        command_timeout: Duration::from_secs(2),
        ..BridgeConfig::default()
    };
    let mut bridge = Bridge::new(cfg)?;
    let worker = bridge.spawn(WorkerSpec::new("services", || {
        ServiceSet::new().with(PingService::new())
    }))?;

    let mut sent = 0;
    let mut pongs = 0;
    let mut tick = 0u64;
    let mut slowest = Duration::ZERO;
    while pongs < PINGS {
        tick += 1;
        if tick > 1_000 {
            anyhow::bail!("gave up after {tick} ticks with {pongs} pongs");
        }

        let started = Instant::now();
        let res = bridge.poll(worker)?;
        slowest = slowest.max(started.elapsed());

        for env in &res {
            match env.body() {
                Body::Result(Reply::Pong) => {
                    pongs += 1;
                    if let Some(id) = env.correlation_id() {
                        println!("tick {tick:>4}: pong for {id}");
                    }
                }
                Body::Log(record) => println!("tick {tick:>4}: worker log: {}", record.text),
                Body::Error(fault) => println!("tick {tick:>4}: error {}: {}", fault.code, fault.message),
                other => println!("tick {tick:>4}: {:?}", other.kind()),
            }
        }

        if bridge.state(worker) == Some(WorkerState::Running) && sent < PINGS && tick % 10 == 0 {
            let id = bridge.send(worker, Command::Ping)?;
            println!("tick {tick:>4}: ping {id}");
            sent += 1;
        }

        std::thread::sleep(TICK);
    }

    bridge.send(worker, Command::Stop)?;
    bridge.shutdown_all(Duration::from_secs(2))?;
    for res in bridge.poll_all() {
        for env in res {
            println!("final: {:?}", env.body());
        }
    }

    println!("slowest poll: {slowest:?}");
    let log = std::fs::read_to_string(log_dir.path().join("host_loop.log"))?;
    println!("--- diagnostic log ---\n{log}");
    Ok(())
}
