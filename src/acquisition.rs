//! The streaming acquisition engine.
//!
//! The engine owns a pool of bulk IN transfer buffers.  The driver pops the
//! oldest submitted buffer, fills it from the device (a read timeout counts
//! as a zero-length completion) and hands it to [`Engine::on_complete`],
//! which recycles the slot, runs the trigger matcher, forwards sample data
//! to the session sink, and watches the empty-transfer and sample-limit
//! conditions.  Completions are processed strictly in submission order,
//! which preserves sample ordering within an acquisition.

use crate::constants::{FIRST_TRANSFER_SIZE, TRANSFER_SIZE};
use crate::session::{Logic, Packet, Sink};
use crate::trigger::{Scan, TriggerMatcher};

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use std::collections::VecDeque;

/// What the driver must do after a completion has been processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Action {
    /// The acquisition is still live; keep polling
    Continue,
    /// A limit was reached or the device gave up; the driver must stop the
    /// acquisition and emit the end packet
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamState {
    Running,
    /// Shutdown has begun: completions free their transfer instead of
    /// resubmitting, and nothing more reaches the sink
    Stopping,
}

pub(crate) struct Engine {
    state: StreamState,
    matcher: TriggerMatcher,
    /// Submitted transfer buffers, oldest first
    pool: VecDeque<Vec<u8>>,
    num_samples: u64,
    limit_samples: u64,
    empty_transfers: usize,
    max_empty_transfers: usize,
    /// Samples seen while the matcher was still searching, bounded to the
    /// configured window; flushed ahead of the trigger packet on fire
    pretrigger: Option<VecDeque<u8>>,
    pretrigger_capacity: usize,
}

impl Engine {
    pub fn new(
        matcher: TriggerMatcher,
        limit_samples: u64,
        num_transfers: usize,
        max_empty_transfers: usize,
        pretrigger_capacity: usize,
    ) -> Self {
        // Start with a 2K transfer, subsequently increased to 4K
        let mut pool = VecDeque::with_capacity(num_transfers);
        let mut size = FIRST_TRANSFER_SIZE;
        for _ in 0..num_transfers {
            pool.push_back(vec![0u8; size]);
            size = TRANSFER_SIZE;
        }

        Engine {
            state: StreamState::Running,
            matcher,
            pool,
            num_samples: 0,
            limit_samples,
            empty_transfers: 0,
            max_empty_transfers,
            pretrigger: (pretrigger_capacity > 0).then(VecDeque::new),
            pretrigger_capacity,
        }
    }

    /// The oldest in-flight transfer buffer, to be filled from the device.
    /// `None` once shutdown has begun.
    pub fn next_transfer(&mut self) -> Option<Vec<u8>> {
        if self.state == StreamState::Stopping {
            return None;
        }
        self.pool.pop_front()
    }

    /// Returns a buffer to the pool without processing it, used when the
    /// read itself failed and the transfer should simply be retried.
    pub fn requeue(&mut self, buffer: Vec<u8>) {
        if self.state == StreamState::Running {
            self.pool.push_back(buffer);
        }
    }

    /// Processes one completed transfer of `length` valid bytes.
    pub fn on_complete(
        &mut self,
        transfer: Vec<u8>,
        length: usize,
        sink: &mut dyn Sink,
    ) -> Action {
        trace!("Engine::on_complete received {} bytes", length);

        if self.state == StreamState::Stopping {
            // Just free queued-up transfers that come in after shutdown
            drop(transfer);
            return Action::Stop;
        }

        // Recycle the slot so a request stays in flight
        self.pool.push_back(vec![0u8; TRANSFER_SIZE]);

        if length == 0 {
            self.empty_transfers += 1;
            if self.empty_transfers > self.max_empty_transfers {
                // The FX2 gave up.  End the acquisition, the consumer will
                // work out that the samplecount is short.
                warn!(
                    "{} consecutive empty transfers, ending acquisition",
                    self.empty_transfers
                );
                return Action::Stop;
            }
            return Action::Continue;
        }
        self.empty_transfers = 0;

        let data = &transfer[..length];
        if self.matcher.fired() {
            sink.send(Packet::Logic(Logic {
                unit_size: 1,
                data,
            }));
        } else {
            match self.matcher.scan(data) {
                Scan::Fired { offset } => {
                    self.flush_pretrigger(sink);
                    sink.send(Packet::Trigger);
                    // The samples that triggered, since the stream skips
                    // past them
                    sink.send(Packet::Logic(Logic {
                        unit_size: 1,
                        data: self.matcher.captured(),
                    }));
                    if offset < data.len() {
                        sink.send(Packet::Logic(Logic {
                            unit_size: 1,
                            data: &data[offset..],
                        }));
                    }
                }
                Scan::Searching => {
                    self.retain_pretrigger(data);
                    return Action::Continue;
                }
            }
        }

        self.num_samples += length as u64;
        if self.limit_samples > 0 && self.num_samples > self.limit_samples {
            debug!(
                "sample limit reached ({} of {})",
                self.num_samples, self.limit_samples
            );
            return Action::Stop;
        }

        Action::Continue
    }

    /// Begins shutdown: drains every pooled transfer and refuses new ones.
    pub fn shutdown(&mut self) {
        trace!("Engine::shutdown after {} samples", self.num_samples);
        self.state = StreamState::Stopping;
        self.pool.clear();
    }

    pub fn num_samples(&self) -> u64 {
        self.num_samples
    }

    fn retain_pretrigger(&mut self, data: &[u8]) {
        let Some(window) = self.pretrigger.as_mut() else {
            return;
        };
        for &sample in data {
            if window.len() == self.pretrigger_capacity {
                window.pop_front();
            }
            window.push_back(sample);
        }
    }

    fn flush_pretrigger(&mut self, sink: &mut dyn Sink) {
        let Some(window) = self.pretrigger.take() else {
            return;
        };
        if window.is_empty() {
            return;
        }
        let data = Vec::from(window);
        sink.send(Packet::Logic(Logic {
            unit_size: 1,
            data: &data,
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{NUM_SIMUL_TRANSFERS, NUM_TRIGGER_STAGES};

    /// Owned copy of a packet for trace assertions.
    #[derive(Debug, Clone, PartialEq)]
    enum Recorded {
        Logic(Vec<u8>),
        Trigger,
    }

    fn recording_sink(trace: &mut Vec<Recorded>) -> impl Sink + '_ {
        |packet: Packet<'_>| match packet {
            Packet::Logic(logic) => trace.push(Recorded::Logic(logic.data.to_vec())),
            Packet::Trigger => trace.push(Recorded::Trigger),
            Packet::Header(_) | Packet::End => {}
        }
    }

    fn single_probe_matcher(pattern: &str) -> TriggerMatcher {
        let mut mask = [0u8; NUM_TRIGGER_STAGES];
        let mut value = [0u8; NUM_TRIGGER_STAGES];
        for (stage, tc) in pattern.chars().enumerate() {
            mask[stage] = 1;
            if tc == '1' {
                value[stage] = 1;
            }
        }
        TriggerMatcher::new(mask, value)
    }

    #[test]
    fn test_pool_sizing_and_order() {
        let mut engine = Engine::new(TriggerMatcher::pass_through(), 0, NUM_SIMUL_TRANSFERS, 3, 0);
        let first = engine.next_transfer().unwrap();
        assert_eq!(first.len(), FIRST_TRANSFER_SIZE);
        let second = engine.next_transfer().unwrap();
        assert_eq!(second.len(), TRANSFER_SIZE);
        engine.requeue(first);
        engine.requeue(second);
    }

    #[test]
    fn test_untriggered_capture_with_limit() {
        // Full transfers against a 6144-sample limit: reaching the limit
        // exactly keeps going, the next transfer trips it.  Overshoot is
        // bounded by one transfer.
        let mut trace = Vec::new();
        let mut sink = recording_sink(&mut trace);
        let mut engine = Engine::new(TriggerMatcher::pass_through(), 6144, 4, 3, 0);

        let buf = engine.next_transfer().unwrap();
        let len = buf.len();
        assert_eq!(engine.on_complete(buf, len, &mut sink), Action::Continue);

        let buf = engine.next_transfer().unwrap();
        assert_eq!(engine.on_complete(buf, TRANSFER_SIZE, &mut sink), Action::Continue);

        let buf = engine.next_transfer().unwrap();
        assert_eq!(engine.on_complete(buf, TRANSFER_SIZE, &mut sink), Action::Stop);
        drop(sink);

        assert_eq!(trace.len(), 3);
        assert!(matches!(&trace[0], Recorded::Logic(data) if data.len() == FIRST_TRANSFER_SIZE));
        assert!(matches!(&trace[1], Recorded::Logic(data) if data.len() == TRANSFER_SIZE));
        assert_eq!(engine.num_samples(), 10240);
    }

    #[test]
    fn test_trigger_splits_transfer() {
        // Trigger "01" on probe 1 against {00 00 01 ff ...}: the trigger
        // packet, the two samples that matched, then the remainder from
        // offset 3.
        let mut trace = Vec::new();
        let mut sink = recording_sink(&mut trace);
        let mut engine = Engine::new(single_probe_matcher("01"), 0, 4, 3, 0);

        let mut buf = engine.next_transfer().unwrap();
        buf[..8].copy_from_slice(&[0x00, 0x00, 0x01, 0xff, 0xff, 0xff, 0xff, 0xff]);
        assert_eq!(engine.on_complete(buf, 8, &mut sink), Action::Continue);

        let mut buf = engine.next_transfer().unwrap();
        buf[..2].copy_from_slice(&[0xaa, 0xbb]);
        assert_eq!(engine.on_complete(buf, 2, &mut sink), Action::Continue);
        drop(sink);

        assert_eq!(
            trace,
            vec![
                Recorded::Trigger,
                Recorded::Logic(vec![0x00, 0x01]),
                Recorded::Logic(vec![0xff, 0xff, 0xff, 0xff, 0xff]),
                Recorded::Logic(vec![0xaa, 0xbb]),
            ]
        );
        assert_eq!(engine.num_samples(), 10);
    }

    #[test]
    fn test_pre_trigger_data_dropped_by_default() {
        let mut trace = Vec::new();
        let mut sink = recording_sink(&mut trace);
        let mut engine = Engine::new(single_probe_matcher("11"), 0, 4, 3, 0);

        let mut buf = engine.next_transfer().unwrap();
        buf[..3].copy_from_slice(&[0x00, 0x00, 0x00]);
        assert_eq!(engine.on_complete(buf, 3, &mut sink), Action::Continue);
        drop(sink);

        assert!(trace.is_empty());
        assert_eq!(engine.num_samples(), 0);
    }

    #[test]
    fn test_pre_trigger_window_flushed_on_fire() {
        let mut trace = Vec::new();
        let mut sink = recording_sink(&mut trace);
        let mut engine = Engine::new(single_probe_matcher("11"), 0, 4, 3, 4);

        let mut buf = engine.next_transfer().unwrap();
        buf[..6].copy_from_slice(&[0xa0, 0xa2, 0xa4, 0xa6, 0xa8, 0xaa]);
        assert_eq!(engine.on_complete(buf, 6, &mut sink), Action::Continue);

        let mut buf = engine.next_transfer().unwrap();
        buf[..3].copy_from_slice(&[0x01, 0x01, 0x42]);
        assert_eq!(engine.on_complete(buf, 3, &mut sink), Action::Continue);
        drop(sink);

        assert_eq!(
            trace,
            vec![
                // Only the last four samples fit the window
                Recorded::Logic(vec![0xa4, 0xa6, 0xa8, 0xaa]),
                Recorded::Trigger,
                Recorded::Logic(vec![0x01, 0x01]),
                Recorded::Logic(vec![0x42]),
            ]
        );
    }

    #[test]
    fn test_empty_transfer_watchdog() {
        let mut trace = Vec::new();
        let mut sink = recording_sink(&mut trace);
        let mut engine = Engine::new(TriggerMatcher::pass_through(), 0, 4, 3, 0);

        for _ in 0..3 {
            let buf = engine.next_transfer().unwrap();
            assert_eq!(engine.on_complete(buf, 0, &mut sink), Action::Continue);
        }
        let buf = engine.next_transfer().unwrap();
        assert_eq!(engine.on_complete(buf, 0, &mut sink), Action::Stop);
        drop(sink);

        assert!(trace.is_empty());
    }

    #[test]
    fn test_nonempty_transfer_resets_watchdog() {
        let mut trace = Vec::new();
        let mut sink = recording_sink(&mut trace);
        let mut engine = Engine::new(TriggerMatcher::pass_through(), 0, 4, 3, 0);

        for round in 0..4 {
            for _ in 0..3 {
                let buf = engine.next_transfer().unwrap();
                assert_eq!(
                    engine.on_complete(buf, 0, &mut sink),
                    Action::Continue,
                    "round {round}"
                );
            }
            let buf = engine.next_transfer().unwrap();
            assert_eq!(engine.on_complete(buf, 16, &mut sink), Action::Continue);
        }
    }

    #[test]
    fn test_shutdown_drains_pool() {
        let mut engine = Engine::new(TriggerMatcher::pass_through(), 0, 4, 3, 0);
        engine.shutdown();
        assert!(engine.next_transfer().is_none());

        // A completion that races shutdown is freed without output
        let mut trace = Vec::new();
        let mut sink = recording_sink(&mut trace);
        assert_eq!(engine.on_complete(vec![0u8; 64], 64, &mut sink), Action::Stop);
        drop(sink);
        assert!(trace.is_empty());
    }
}
