//! # engine_app — door demo
//!
//! Spawns a handful of door entities, attaches a `Door` component to each,
//! and drives them with a fixed-timestep tick loop. Doors toggle on a
//! per-door schedule, count their uses and close themselves after a delay.
//!
//! Verbosity follows `RUST_LOG`.

mod door;
mod tick;
mod world;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tick::{TickConfig, TickLoop};
use world::World;

#[derive(Parser)]
#[command(name = "engine_app", about = "Run door components on a tick loop")]
struct Args {
    /// Number of ticks to run (0 = until interrupted)
    #[arg(short, long, default_value_t = 120)]
    ticks: u64,

    /// Target ticks per second
    #[arg(short = 'r', long, default_value_t = 60.0)]
    tick_rate: f64,

    /// Number of doors to spawn
    #[arg(short, long, default_value_t = 3)]
    doors: usize,

    /// Seconds an opened door stays open (0 = until toggled)
    #[arg(long, default_value_t = 0.05)]
    auto_close: f64,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("engine_app=info,engine_component=info")),
        )
        .init();

    let args = Args::parse();
    anyhow::ensure!(args.tick_rate > 0.0, "tick rate must be positive");

    let local = tokio::task::LocalSet::new();
    local
        .run_until(async move {
            let mut world = World::new();
            for _ in 0..args.doors {
                world.spawn_door(args.auto_close)?;
            }
            info!(doors = world.entity_count(), "world ready");

            let config = TickConfig {
                tick_rate: args.tick_rate,
                max_ticks: args.ticks,
            };
            let mut tick_loop = TickLoop::new(config, world);
            tick_loop.run().await;
            info!(
                ticks = tick_loop.tick_id(),
                open = tick_loop.world().open_count(),
                "ticking finished"
            );
            tick_loop.shutdown();

            info!("door demo shut down");
            Ok::<_, anyhow::Error>(())
        })
        .await
}
