//! Fixed-rate tick scheduling on top of the engine handle.

use std::time::Duration;

use tokio::time::MissedTickBehavior;

use crate::orchestrator::{wall_ms, EngineHandle};

async fn tick_interval(handle: &EngineHandle) -> (f64, tokio::time::Interval) {
    let hz = {
        let engine = handle.engine().lock().await;
        engine.world().config().tick_hz.max(1)
    };
    let dt = 1.0 / f64::from(hz);
    let mut ticker = tokio::time::interval(Duration::from_secs_f64(dt));
    // A slow tick shifts the schedule instead of bursting to catch up.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    (dt, ticker)
}

/// Run the tick loop forever at the configured rate. Decisions fan out to
/// their own tasks; this loop never waits on a decider.
pub async fn run_loop(handle: EngineHandle) {
    let (dt, mut ticker) = tick_interval(&handle).await;
    tracing::info!(dt_secs = dt, "tick loop running");
    loop {
        ticker.tick().await;
        handle.step(wall_ms(), dt).await;
    }
}

/// Drive a fixed number of ticks against a synthetic clock, awaiting each
/// decision inline. For headless runs and tests.
pub async fn run_ticks(handle: &EngineHandle, ticks: u64) {
    let (hz, mut now) = {
        let engine = handle.engine().lock().await;
        (engine.world().config().tick_hz.max(1), wall_ms())
    };
    let dt = 1.0 / f64::from(hz);
    let step_ms = (dt * 1_000.0) as u64;
    for _ in 0..ticks {
        now += step_ms;
        handle.step_inline(now, dt).await;
    }
}
