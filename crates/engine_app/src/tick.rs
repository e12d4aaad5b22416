//! Fixed-timestep tick loop driving the [`World`].
//!
//! Each tick advances the counter, lets the world toggle doors, then sleeps
//! for the remainder of the tick budget. Runs on a `LocalSet` since
//! components are `!Send`.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::world::World;

/// Configuration for the tick loop.
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Target ticks per second.
    pub tick_rate: f64,
    /// Maximum number of ticks to run (0 = unlimited).
    pub max_ticks: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60.0,
            max_ticks: 0,
        }
    }
}

pub struct TickLoop {
    tick_id: u64,
    config: TickConfig,
    world: World,
}

impl TickLoop {
    #[must_use]
    pub fn new(config: TickConfig, world: World) -> Self {
        Self {
            tick_id: 0,
            config,
            world,
        }
    }

    #[must_use]
    pub fn tick_id(&self) -> u64 {
        self.tick_id
    }

    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Run one tick.
    pub fn tick(&mut self) {
        self.tick_id += 1;
        let toggled = self.world.tick(self.tick_id);
        debug!(
            tick_id = self.tick_id,
            toggled,
            open = self.world.open_count(),
            "tick"
        );
    }

    /// Tick until `max_ticks` is reached, or forever. Yields to other local
    /// tasks between ticks so scheduled closes can run.
    pub async fn run(&mut self) {
        let tick_duration = Duration::from_secs_f64(1.0 / self.config.tick_rate);

        info!(
            tick_rate = self.config.tick_rate,
            max_ticks = self.config.max_ticks,
            "starting tick loop"
        );

        loop {
            let start = Instant::now();
            self.tick();

            if self.config.max_ticks > 0 && self.tick_id >= self.config.max_ticks {
                info!(ticks = self.tick_id, "tick loop complete");
                break;
            }

            let elapsed = start.elapsed();
            if elapsed < tick_duration {
                tokio::time::sleep(tick_duration - elapsed).await;
            } else {
                warn!(
                    tick_id = self.tick_id,
                    elapsed_ms = elapsed.as_millis() as u64,
                    budget_ms = tick_duration.as_millis() as u64,
                    "tick exceeded time budget"
                );
                tokio::task::yield_now().await;
            }
        }
    }

    /// Stop every component and hand back the world.
    pub fn shutdown(mut self) -> World {
        self.world.shutdown();
        self.world
    }
}
