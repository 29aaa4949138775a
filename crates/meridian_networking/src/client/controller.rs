//! Client-side input pacing.

use meridian_core::InputState;

use crate::config::InputConfig;

/// Decides when sampled input goes on the wire.
///
/// A changed input is sent at most `throttle_rate` times per second. An
/// unchanged input is resent every `keepalive_ms`.
#[derive(Clone, Debug)]
pub struct ClientController {
    throttle_ms: f64,
    keepalive_ms: f64,
    sequence: u32,
    last_sent: Option<(f64, InputState)>,
}

impl ClientController {
    /// Creates a controller from input settings.
    #[must_use]
    pub fn new(config: &InputConfig) -> Self {
        Self {
            throttle_ms: 1000.0 / f64::from(config.throttle_rate.max(1)),
            keepalive_ms: config.keepalive_ms,
            sequence: 0,
            last_sent: None,
        }
    }

    /// Sequence of the last sent input, zero before the first.
    #[must_use]
    pub const fn sequence(&self) -> u32 {
        self.sequence
    }

    /// Returns the next sequence if `input` should be sent at `now`.
    pub fn poll(&mut self, input: InputState, now: f64) -> Option<u32> {
        let due = match self.last_sent {
            None => true,
            Some((at, previous)) => {
                let elapsed = now - at;
                (input != previous && elapsed >= self.throttle_ms) || elapsed >= self.keepalive_ms
            }
        };
        if !due {
            return None;
        }
        self.sequence = self.sequence.wrapping_add(1);
        self.last_sent = Some((now, input));
        Some(self.sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_core::Button;

    fn controller() -> ClientController {
        ClientController::new(&InputConfig {
            throttle_rate: 10,
            keepalive_ms: 500.0,
            server_throttle_ms: 0.0,
        })
    }

    #[test]
    fn test_change_is_throttled() {
        let mut c = controller();
        let up = InputState::pressed(&[Button::Up]);
        let down = InputState::pressed(&[Button::Down]);

        assert_eq!(c.poll(up, 0.0), Some(1));
        assert_eq!(c.poll(down, 50.0), None);
        assert_eq!(c.poll(down, 100.0), Some(2));
    }

    #[test]
    fn test_unchanged_waits_for_keepalive() {
        let mut c = controller();
        let up = InputState::pressed(&[Button::Up]);
        assert_eq!(c.poll(up, 0.0), Some(1));
        assert_eq!(c.poll(up, 200.0), None);
        assert_eq!(c.poll(up, 499.0), None);
        assert_eq!(c.poll(up, 500.0), Some(2));
    }

    #[test]
    fn test_sequence_wraps() {
        let mut c = controller();
        c.sequence = u32::MAX;
        assert_eq!(c.poll(InputState::default(), 0.0), Some(0));
    }
}
