//! Multi-stage trigger matching over the sample stream.
//!
//! A trigger is up to [`NUM_TRIGGER_STAGES`] mask/value byte patterns that
//! must match on consecutive samples.  The matcher runs byte-serially across
//! transfer boundaries, keeping its stage counter between calls, and fires
//! exactly once per acquisition.

use crate::constants::NUM_TRIGGER_STAGES;

/// Outcome of scanning one transfer's worth of samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scan {
    /// No complete match yet; the transfer carried no post-trigger data.
    Searching,
    /// The full pattern matched.  `offset` is the index of the first sample
    /// after the trigger point.
    Fired { offset: usize },
}

/// Stateful matcher over the configured stage patterns.
///
/// Constructed armed, or as a pass-through when stage 0 has no mask bits (no
/// probe configured a trigger), in which case [`TriggerMatcher::fired`] is
/// true from the start and the stream is passed through untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerMatcher {
    mask: [u8; NUM_TRIGGER_STAGES],
    value: [u8; NUM_TRIGGER_STAGES],
    /// Samples that produced the partial match so far; emitted as the first
    /// logic packet when the matcher fires
    buffer: [u8; NUM_TRIGGER_STAGES],
    stage: usize,
    fired: bool,
}

impl TriggerMatcher {
    pub fn new(mask: [u8; NUM_TRIGGER_STAGES], value: [u8; NUM_TRIGGER_STAGES]) -> Self {
        TriggerMatcher {
            mask,
            value,
            buffer: [0; NUM_TRIGGER_STAGES],
            stage: 0,
            // No active stage 0 means nothing to wait for
            fired: mask[0] == 0,
        }
    }

    /// A matcher that passes every sample through without searching.
    pub fn pass_through() -> Self {
        Self::new([0; NUM_TRIGGER_STAGES], [0; NUM_TRIGGER_STAGES])
    }

    pub fn fired(&self) -> bool {
        self.fired
    }

    /// The samples consumed by the completed match, valid once fired.
    pub fn captured(&self) -> &[u8] {
        &self.buffer[..self.stage]
    }

    /// Runs the matcher over one transfer's samples.
    ///
    /// On a partial match broken by a mismatch the scan rewinds, so that the
    /// sample after the original stage-0 hit is reconsidered as a new stage-0
    /// candidate ("0001" against "00001" must backtrack to fire on the final
    /// '1').  A partial match still open at the end of the buffer is kept for
    /// the next call.
    pub fn scan(&mut self, data: &[u8]) -> Scan {
        debug_assert!(!self.fired);

        let mut i: isize = 0;
        while (i as usize) < data.len() {
            let sample = data[i as usize];
            if sample & self.mask[self.stage] == self.value[self.stage] {
                // Match on this trigger stage
                self.buffer[self.stage] = sample;
                self.stage += 1;
                if self.stage == NUM_TRIGGER_STAGES || self.mask[self.stage] == 0 {
                    // Match on all trigger stages, we're done
                    self.fired = true;
                    return Scan::Fired {
                        offset: (i + 1) as usize,
                    };
                }
            } else if self.stage > 0 {
                i -= self.stage as isize;
                if i < -1 {
                    // Went back past this buffer
                    i = -1;
                }
                self.stage = 0;
            }
            i += 1;
        }

        Scan::Searching
    }
}
