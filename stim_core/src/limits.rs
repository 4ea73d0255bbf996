//! Amplitude and timing grids accepted by the implant.
//!
//! # Pulse Atom Limits
//!
//! - Main pulse amplitude: -6120 to 0 µA, step 12 µA down to -3060 µA and
//!   and multiples of 24 µA below that
//! - Main pulse and dead zone 0 duration: 10 to 2550 µs in steps of 10 µs
//! - Counter pulse: exactly -1/4 of the main amplitude for 4x the main duration
//! - Dead zone 1 duration: 10 to 20400 µs on an 80 µs grid anchored at 0, so
//!   the legal values are 10, 80, 160, ..., 20400
//! - Pause atom duration: 10 to 2550 µs in steps of 10 µs

/// Lowest (most negative) main pulse amplitude in µA
pub const MAIN_AMPLITUDE_MIN_UA: i32 = -6120;

/// Highest main pulse amplitude in µA
pub const MAIN_AMPLITUDE_MAX_UA: i32 = 0;

/// Amplitudes at or above this value use the fine step
pub const MAIN_AMPLITUDE_FINE_LIMIT_UA: i32 = -3060;

/// Amplitude step in the range [-3060, 0]
pub const MAIN_AMPLITUDE_FINE_STEP_UA: i32 = 12;

/// Amplitude step below -3060 µA
pub const MAIN_AMPLITUDE_COARSE_STEP_UA: i32 = 24;

/// Counter pulse amplitude = main amplitude / this divisor, sign inverted
pub const COUNTER_AMPLITUDE_DIVISOR: i32 = 4;

/// Counter pulse duration = main duration x this factor
pub const COUNTER_DURATION_FACTOR: u32 = 4;

/// Step for main pulse, dead zone 0 and pause durations
pub const SHORT_DURATION_STEP_US: u32 = 10;

/// Minimum for main pulse, dead zone 0 and pause durations
pub const SHORT_DURATION_MIN_US: u32 = 10;

/// Maximum for main pulse, dead zone 0 and pause durations
pub const SHORT_DURATION_MAX_US: u32 = 2550;

/// Step for dead zone 1 durations
pub const DEAD_ZONE_1_STEP_US: u32 = 80;

/// Minimum dead zone 1 duration (off the 80 µs grid)
pub const DEAD_ZONE_1_MIN_US: u32 = 10;

/// Maximum dead zone 1 duration
pub const DEAD_ZONE_1_MAX_US: u32 = 20400;

/// Number of atoms in a complete pulse function
pub const PULSE_ATOM_COUNT: usize = 5;

/// Number of atoms in a complete pause function
pub const PAUSE_ATOM_COUNT: usize = 1;

/// True if `amplitude` is a legal main pulse amplitude
pub fn is_valid_main_amplitude(amplitude: i32) -> bool {
    if !(MAIN_AMPLITUDE_MIN_UA..=MAIN_AMPLITUDE_MAX_UA).contains(&amplitude) {
        return false;
    }
    let step = if amplitude >= MAIN_AMPLITUDE_FINE_LIMIT_UA {
        MAIN_AMPLITUDE_FINE_STEP_UA
    } else {
        MAIN_AMPLITUDE_COARSE_STEP_UA
    };
    amplitude % step == 0
}

/// True if `duration` is legal for a main pulse, dead zone 0 or pause atom
pub fn is_valid_short_duration(duration: u32) -> bool {
    (SHORT_DURATION_MIN_US..=SHORT_DURATION_MAX_US).contains(&duration)
        && duration % SHORT_DURATION_STEP_US == 0
}

/// True if `duration` is legal for a dead zone 1 atom
pub fn is_valid_dead_zone_1_duration(duration: u32) -> bool {
    if duration == DEAD_ZONE_1_MIN_US {
        return true;
    }
    (DEAD_ZONE_1_MIN_US..=DEAD_ZONE_1_MAX_US).contains(&duration)
        && duration % DEAD_ZONE_1_STEP_US == 0
}
