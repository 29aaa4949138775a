//! Input sources sampled once per client tick.

use meridian_core::{Button, InputState};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Supplies the client's input for the current tick.
pub trait InputSource: Send {
    /// Samples the input held this tick.
    fn sample(&mut self) -> InputState;
}

/// Replays a fixed list of frames, then holds the last one.
#[derive(Clone, Debug, Default)]
pub struct ScriptedInput {
    frames: Vec<InputState>,
    cursor: usize,
}

impl ScriptedInput {
    /// Creates a source from per-tick frames.
    #[must_use]
    pub fn new(frames: Vec<InputState>) -> Self {
        Self { frames, cursor: 0 }
    }

    /// Holds `input` for `ticks` ticks, then releases everything.
    #[must_use]
    pub fn hold(input: InputState, ticks: usize) -> Self {
        let mut frames = vec![input; ticks];
        frames.push(InputState::default());
        Self::new(frames)
    }
}

impl InputSource for ScriptedInput {
    fn sample(&mut self) -> InputState {
        let frame = self
            .frames
            .get(self.cursor)
            .or_else(|| self.frames.last())
            .copied()
            .unwrap_or_default();
        self.cursor = self.cursor.saturating_add(1);
        frame
    }
}

const DIRECTIONS: [&[Button]; 9] = [
    &[],
    &[Button::Up],
    &[Button::Down],
    &[Button::Left],
    &[Button::Right],
    &[Button::Up, Button::Left],
    &[Button::Up, Button::Right],
    &[Button::Down, Button::Left],
    &[Button::Down, Button::Right],
];

/// Seeded random walk: holds a random direction for a random number of ticks.
#[derive(Clone, Debug)]
pub struct RandomWalkInput {
    rng: ChaCha8Rng,
    current: InputState,
    remaining: u32,
    min_hold: u32,
    max_hold: u32,
}

impl RandomWalkInput {
    /// Creates a walk holding each direction for 10 to 60 ticks.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self::with_hold(seed, 10, 60)
    }

    /// Creates a walk holding each direction for `min_hold..=max_hold` ticks.
    #[must_use]
    pub fn with_hold(seed: u64, min_hold: u32, max_hold: u32) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            current: InputState::default(),
            remaining: 0,
            min_hold: min_hold.max(1),
            max_hold: max_hold.max(min_hold.max(1)),
        }
    }
}

impl InputSource for RandomWalkInput {
    fn sample(&mut self) -> InputState {
        if self.remaining == 0 {
            let buttons = DIRECTIONS[self.rng.gen_range(0..DIRECTIONS.len())];
            self.current = InputState::pressed(buttons);
            self.remaining = self.rng.gen_range(self.min_hold..=self.max_hold);
        }
        self.remaining -= 1;
        self.current
    }
}
