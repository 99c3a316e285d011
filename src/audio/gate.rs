//! Silence-adaptive transmit gate
//!
//! Tracks the run of consecutive silent frames for one client. When the run
//! reaches the limit, transmission pauses; the first loud frame after that
//! resumes it. Each streaming client owns its own gate.

/// Gate transition reported for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateEvent {
    Paused,
    Resumed,
}

#[derive(Debug, Clone)]
pub struct SilenceGate {
    limit: u32,
    silent_run: u32,
    active: bool,
}

impl SilenceGate {
    /// Gate that pauses after `limit` consecutive silent frames
    pub fn new(limit: u32) -> Self {
        Self {
            limit: limit.max(1),
            silent_run: 0,
            active: true,
        }
    }

    /// Feed one frame's classification; returns whether to transmit it
    pub fn observe(&mut self, silent: bool) -> bool {
        self.observe_with_event(silent).0
    }

    /// Like [`observe`](Self::observe), also reporting a state change
    pub fn observe_with_event(&mut self, silent: bool) -> (bool, Option<GateEvent>) {
        let mut event = None;

        if silent {
            self.silent_run = self.silent_run.saturating_add(1);
            if self.silent_run == self.limit && self.active {
                self.active = false;
                event = Some(GateEvent::Paused);
            }
        } else {
            if !self.active {
                self.active = true;
                event = Some(GateEvent::Resumed);
            }
            self.silent_run = 0;
        }

        (self.active, event)
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn silent_run(&self) -> u32 {
        self.silent_run
    }
}

impl Default for SilenceGate {
    /// 25 frames, about half a second
    fn default() -> Self {
        Self::new(25)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pauses_exactly_at_limit() {
        let mut gate = SilenceGate::new(25);

        for _ in 0..24 {
            assert!(gate.observe(true));
        }
        assert_eq!(gate.observe_with_event(true), (false, Some(GateEvent::Paused)));
        assert!(!gate.is_active());

        // Still paused while silence continues
        for _ in 0..100 {
            assert!(!gate.observe(true));
        }
    }

    #[test]
    fn test_resumes_on_first_loud_frame() {
        let mut gate = SilenceGate::new(25);
        for _ in 0..25 {
            gate.observe(true);
        }

        assert_eq!(gate.observe_with_event(false), (true, Some(GateEvent::Resumed)));
        assert_eq!(gate.silent_run(), 0);
    }

    #[test]
    fn test_loud_frame_resets_run_while_active() {
        let mut gate = SilenceGate::new(25);
        for _ in 0..20 {
            gate.observe(true);
        }
        assert_eq!(gate.observe_with_event(false), (true, None));

        // A fresh run of 24 is not enough
        for _ in 0..24 {
            assert!(gate.observe(true));
        }
        assert!(gate.is_active());
    }

    #[test]
    fn test_gates_are_independent() {
        let mut quiet = SilenceGate::default();
        let mut loud = SilenceGate::default();

        for i in 0..30 {
            quiet.observe(true);
            loud.observe(i % 2 == 0);
        }

        assert!(!quiet.is_active());
        assert!(loud.is_active());
    }
}
