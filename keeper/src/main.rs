//! Cascade Liquidation Keeper
//!
//! Service wrapper around the lending engine: monitors position health,
//! refreshes the monetary-policy rate, and triggers liquidations for
//! undercollateralized positions.

mod config;
mod queue;
mod world;

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use anyhow::Result;
use cascade_common::{Timestamp, UserId};
use config::Config;
use queue::{HealthQueue, UserHealth};
use serde::Serialize;
use tokio::time;
use world::World;

/// User id the keeper liquidates under; borrowers are seeded from 1.
const KEEPER_ID: UserId = 0;

/// Periodic status line, logged as JSON for scraping.
#[derive(Serialize)]
struct Status {
    engine_now: Timestamp,
    rate_per_sec: u128,
    total_debt: u128,
    open_loans: usize,
    queue_len: usize,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Starting cascade keeper");

    let config = Config::load().unwrap_or_else(|_| {
        log::warn!("Failed to load config, using demo defaults");
        Config::default_demo()
    });

    let start_ts = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
    let started = Instant::now();
    let mut world = World::build(&config, start_ts)?;
    log::info!(
        "Demo world ready: {} borrowers, rate {}/s, time scale {}x",
        world.borrowers.len(),
        world.controller.borrow().rate(),
        config.time_scale
    );

    let mut queue = HealthQueue::new();
    let mut interval = time::interval(Duration::from_secs(config.poll_interval_secs));
    let mut tick: u64 = 0;

    loop {
        interval.tick().await;
        tick += 1;
        let now = start_ts + started.elapsed().as_secs() * config.time_scale;

        if tick % config.rate_write_every_ticks == 0 {
            refresh_rate(&mut world, now);
            log_status(&world, &queue, now);
        }

        refresh_health(&world, &mut queue, now);

        if let Err(e) = process_liquidations(&mut world, &mut queue, &config, now) {
            log::error!("Error processing liquidations: {e}");
        }
    }
}

/// Recompute the policy rate and push it into the controller.
fn refresh_rate(world: &mut World, now: Timestamp) {
    match world.policy.rate_write(None, now) {
        Ok(rate) => {
            if let Err(e) = world.controller.borrow_mut().set_rate(rate, now) {
                log::error!("Failed to apply rate: {e}");
            }
        }
        Err(e) => log::error!("rate_write failed: {e}"),
    }
}

/// Rescan every known borrower into the health queue.
fn refresh_health(world: &World, queue: &mut HealthQueue, now: Timestamp) {
    let controller = world.controller.borrow();
    for &user in &world.borrowers {
        if !controller.loan_exists(user) {
            queue.remove(&user);
            continue;
        }
        match (controller.health(user, true, now), controller.debt(user, now)) {
            (Ok(health), Ok(debt)) => queue.push(UserHealth {
                user,
                health,
                debt,
                last_update: now,
            }),
            (Err(e), _) | (_, Err(e)) => {
                log::warn!("Health scan failed for user {user}: {e}");
            }
        }
    }
}

/// Liquidate the worst positions, up to the batch cap. Per-item failures are
/// logged and skipped; they never abort the loop.
fn process_liquidations(
    world: &mut World,
    queue: &mut HealthQueue,
    config: &Config,
    now: Timestamp,
) -> Result<()> {
    let liquidatable = queue.get_liquidatable(0);
    if liquidatable.is_empty() {
        log::debug!("No positions need liquidation");
        return Ok(());
    }

    log::info!("Found {} positions needing liquidation", liquidatable.len());
    let batch = config.max_liquidations_per_batch.min(liquidatable.len());

    for snapshot in liquidatable.iter().take(batch) {
        log::info!(
            "Liquidating user {} (health: {:.4})",
            snapshot.user,
            snapshot.health as f64 / 1e18
        );
        let result = world
            .controller
            .borrow_mut()
            .liquidate(KEEPER_ID, snapshot.user, 0, now);
        match result {
            Ok(outcome) => {
                log::info!(
                    "Liquidated user {}: repaid {} (stable in bands {}, collateral out {})",
                    snapshot.user,
                    outcome.debt_repaid,
                    outcome.stable_from_amm,
                    outcome.collateral_to_caller
                );
                queue.remove(&snapshot.user);
            }
            Err(e) => {
                log::error!("Failed to liquidate user {}: {e}", snapshot.user);
            }
        }
    }

    Ok(())
}

/// Emit a machine-readable status line.
fn log_status(world: &World, queue: &HealthQueue, now: Timestamp) {
    let controller = world.controller.borrow();
    let status = Status {
        engine_now: now,
        rate_per_sec: world.policy.rate(),
        total_debt: controller.total_debt(now).unwrap_or(0),
        open_loans: controller.n_loans(),
        queue_len: queue.len(),
    };
    match serde_json::to_string(&status) {
        Ok(line) => log::info!("status {line}"),
        Err(e) => log::warn!("status serialization failed: {e}"),
    }
}
