//! World clock: wall-clock time plus a configured UTC offset, anchored to
//! the local midnight preceding engine start. `day` counts midnights since
//! that anchor, so the day rolls over at local midnight rather than at
//! process start.

use contracts::WorldTime;

const MS_PER_DAY: u64 = 24 * 60 * 60 * 1000;
const MS_PER_HOUR: u64 = 60 * 60 * 1000;
const MS_PER_MINUTE: u64 = 60 * 1000;

#[derive(Debug, Clone)]
pub struct WorldClock {
    anchor_local_ms: u64,
    start_local_ms: u64,
    utc_offset_ms: i64,
    time_scale: f64,
}

impl WorldClock {
    pub fn new(now_ms: u64, utc_offset_minutes: i32, time_scale: f64) -> Self {
        let utc_offset_ms = i64::from(utc_offset_minutes) * 60_000;
        let local = local_ms(now_ms, utc_offset_ms);
        Self {
            anchor_local_ms: local - local % MS_PER_DAY,
            start_local_ms: local,
            utc_offset_ms,
            time_scale: if time_scale > 0.0 { time_scale } else { 1.0 },
        }
    }

    /// Derive the simulated clock for the given wall-clock instant.
    pub fn world_time(&self, now_ms: u64) -> WorldTime {
        let local = local_ms(now_ms, self.utc_offset_ms);
        let real_elapsed = local.saturating_sub(self.start_local_ms);
        let sim_elapsed = (real_elapsed as f64 * self.time_scale) as u64;
        let since_anchor = self.start_local_ms - self.anchor_local_ms + sim_elapsed;

        WorldTime {
            day: (since_anchor / MS_PER_DAY) as u32,
            hour: (since_anchor % MS_PER_DAY / MS_PER_HOUR) as u8,
            minute: (since_anchor % MS_PER_HOUR / MS_PER_MINUTE) as u8,
        }
    }

    /// Simulated minutes covered by a real-time slice of `dt_secs`.
    pub fn sim_minutes(&self, dt_secs: f64) -> f64 {
        dt_secs.max(0.0) * self.time_scale / 60.0
    }
}

fn local_ms(now_ms: u64, utc_offset_ms: i64) -> u64 {
    let local = now_ms as i64 + utc_offset_ms;
    local.max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_time_matches_wall_clock() {
        // 10:30 into some day.
        let now = 123 * MS_PER_DAY + 10 * MS_PER_HOUR + 30 * MS_PER_MINUTE;
        let clock = WorldClock::new(now, 0, 1.0);
        let time = clock.world_time(now);
        assert_eq!(time.day, 0);
        assert_eq!(time.hour, 10);
        assert_eq!(time.minute, 30);
    }

    #[test]
    fn day_increments_at_local_midnight() {
        let now = 50 * MS_PER_DAY + 23 * MS_PER_HOUR + 59 * MS_PER_MINUTE;
        let clock = WorldClock::new(now, 0, 1.0);
        assert_eq!(clock.world_time(now).day, 0);
        let later = now + 2 * MS_PER_MINUTE;
        let time = clock.world_time(later);
        assert_eq!(time.day, 1);
        assert_eq!(time.hour, 0);
        assert_eq!(time.minute, 1);
    }

    #[test]
    fn utc_offset_shifts_local_time() {
        let now = 10 * MS_PER_DAY; // midnight UTC
        let clock = WorldClock::new(now, 9 * 60, 1.0);
        let time = clock.world_time(now);
        assert_eq!(time.hour, 9);
        assert_eq!(time.minute, 0);
    }

    #[test]
    fn time_scale_compresses_real_time() {
        let now = 20 * MS_PER_DAY + 8 * MS_PER_HOUR;
        let clock = WorldClock::new(now, 0, 60.0);
        // One real minute at 60x is one simulated hour.
        let time = clock.world_time(now + MS_PER_MINUTE);
        assert_eq!(time.hour, 9);
        assert!((clock.sim_minutes(60.0) - 60.0).abs() < 1e-9);
    }
}
