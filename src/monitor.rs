//! Presence classification and the absence counter.
//!
//! Each sampled frame is classified by its face count. Exactly one face is
//! normal; zero faces and multiple faces both count toward the same absence
//! counter (the quiz product treats "nobody there" and "too many people" as
//! one kind of suspicion). When the counter reaches the threshold the caller
//! escalates and the counter starts over.

/// Classification of one sampled frame by face count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameClass {
    /// Exactly one face in frame.
    Single,
    /// Nobody visible.
    NoFace,
    /// More than one face visible.
    MultipleFaces,
}

impl FrameClass {
    pub fn from_count(faces: usize) -> Self {
        match faces {
            1 => FrameClass::Single,
            0 => FrameClass::NoFace,
            _ => FrameClass::MultipleFaces,
        }
    }
}

/// Outcome of feeding one sample to the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Single face; counter reset to zero.
    Present,
    /// Non-single frame below the threshold; counter advanced.
    Suspicious { consecutive: u32 },
    /// Threshold reached. The caller must escalate; the counter is already
    /// reset when this is returned.
    Escalate { class: FrameClass },
}

/// The absence counter state machine.
///
/// The counter always sits in `[0, threshold)` between calls.
pub struct PresenceMonitor {
    absence: u32,
    threshold: u32,
}

impl PresenceMonitor {
    pub fn new(threshold: u32) -> Self {
        Self {
            absence: 0,
            threshold,
        }
    }

    /// Consecutive non-single-face samples since the last single-face sample
    /// or escalation.
    pub fn absence(&self) -> u32 {
        self.absence
    }

    pub fn observe(&mut self, faces: usize) -> Verdict {
        let class = FrameClass::from_count(faces);

        if class == FrameClass::Single {
            self.absence = 0;
            return Verdict::Present;
        }

        self.absence += 1;
        if self.absence >= self.threshold {
            self.absence = 0;
            Verdict::Escalate { class }
        } else {
            Verdict::Suspicious {
                consecutive: self.absence,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_face_count() {
        assert_eq!(FrameClass::from_count(0), FrameClass::NoFace);
        assert_eq!(FrameClass::from_count(1), FrameClass::Single);
        assert_eq!(FrameClass::from_count(2), FrameClass::MultipleFaces);
        assert_eq!(FrameClass::from_count(7), FrameClass::MultipleFaces);
    }

    #[test]
    fn counter_tracks_consecutive_non_single_samples() {
        // Face counts [1, 1, 0, 0, 1] -> counter [0, 0, 1, 2, 0]
        let mut monitor = PresenceMonitor::new(10);
        let expected = [0u32, 0, 1, 2, 0];

        for (faces, want) in [1usize, 1, 0, 0, 1].into_iter().zip(expected) {
            let verdict = monitor.observe(faces);
            assert_eq!(monitor.absence(), want);
            assert!(!matches!(verdict, Verdict::Escalate { .. }));
        }
    }

    #[test]
    fn escalates_on_tenth_consecutive_empty_frame() {
        let mut monitor = PresenceMonitor::new(10);

        for i in 1..10 {
            assert_eq!(
                monitor.observe(0),
                Verdict::Suspicious { consecutive: i },
                "sample {} should not escalate",
                i
            );
        }

        assert_eq!(
            monitor.observe(0),
            Verdict::Escalate {
                class: FrameClass::NoFace
            }
        );
        assert_eq!(monitor.absence(), 0);
    }

    #[test]
    fn multiple_faces_count_like_absence() {
        let mut monitor = PresenceMonitor::new(3);
        assert_eq!(monitor.observe(2), Verdict::Suspicious { consecutive: 1 });
        assert_eq!(monitor.observe(0), Verdict::Suspicious { consecutive: 2 });
        assert_eq!(
            monitor.observe(4),
            Verdict::Escalate {
                class: FrameClass::MultipleFaces
            }
        );
    }

    #[test]
    fn single_face_resets_a_partial_run() {
        let mut monitor = PresenceMonitor::new(10);
        for _ in 0..9 {
            monitor.observe(0);
        }
        assert_eq!(monitor.observe(1), Verdict::Present);
        assert_eq!(monitor.absence(), 0);

        // A fresh run needs the full threshold again
        for i in 1..10 {
            assert_eq!(monitor.observe(0), Verdict::Suspicious { consecutive: i });
        }
        assert!(matches!(monitor.observe(0), Verdict::Escalate { .. }));
    }

    #[test]
    fn counter_stays_below_threshold() {
        let mut monitor = PresenceMonitor::new(10);
        let samples = [0usize, 2, 0, 1, 0, 0, 3, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 0];

        for faces in samples {
            monitor.observe(faces);
            assert!(monitor.absence() < 10);
        }
    }
}
