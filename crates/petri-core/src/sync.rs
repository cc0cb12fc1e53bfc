//! Producer/consumer synchronization between the simulation thread and
//! an observer.
//!
//! The simulation publishes a population snapshot at generation start,
//! at every step start, and after selection. Publishing copies the
//! snapshot into a shared single-slot buffer and notifies the observer;
//! it never blocks on the observer's rendering. After every publish the
//! simulation passes through a frame gate that implements pause,
//! single-step, and the two play modes:
//!
//! - [`PlayMode::Delayed`]: the observer paces the simulation by handing
//!   out one frame permit per publish.
//! - [`PlayMode::Skip`]: the gate is open whenever the run is not
//!   paused.
//!
//! While paused, each [`SimHandle::release_frames`] permit admits
//! exactly one further publish, in either mode. [`SimHandle::cancel`]
//! opens every gate permanently so no thread outlives a shutdown
//! request.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::organism::OrganismSnapshot;

/// How the simulation advances between publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayMode {
    /// One publish per observer-released frame permit.
    Delayed,
    /// Run freely; the observer samples whatever is latest.
    Skip,
}

/// Which point of the generation loop produced a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FramePhase {
    GenerationStart,
    Step,
    GenerationEnd,
}

/// One published population snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    /// Monotonically increasing across the whole run, starting at 1.
    pub seq: u64,
    pub phase: FramePhase,
    pub generation: u32,
    pub step: u32,
    pub organisms: Vec<OrganismSnapshot>,
}

#[derive(Debug)]
struct GateState {
    paused: bool,
    permits: u32,
    mode: PlayMode,
}

/// Shared control block for one simulation run.
#[derive(Debug)]
pub struct SimHandle {
    interrupted: AtomicBool,
    finished: AtomicBool,
    gate: Mutex<GateState>,
    gate_cv: Condvar,
    ready: Mutex<bool>,
    ready_cv: Condvar,
    frame: Mutex<Option<Frame>>,
    frame_cv: Condvar,
}

fn lock<'a, T>(mutex: &'a Mutex<T>) -> MutexGuard<'a, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl SimHandle {
    /// A fresh handle: skip mode, not paused, observer not yet ready.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            interrupted: AtomicBool::new(false),
            finished: AtomicBool::new(false),
            gate: Mutex::new(GateState {
                paused: false,
                permits: 0,
                mode: PlayMode::Skip,
            }),
            gate_cv: Condvar::new(),
            ready: Mutex::new(false),
            ready_cv: Condvar::new(),
            frame: Mutex::new(None),
            frame_cv: Condvar::new(),
        })
    }

    /// Request shutdown. Idempotent; wakes every blocked wait on both
    /// sides.
    pub fn cancel(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
        drop(lock(&self.gate));
        self.gate_cv.notify_all();
        drop(lock(&self.ready));
        self.ready_cv.notify_all();
        drop(lock(&self.frame));
        self.frame_cv.notify_all();
    }

    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    /// Whether the simulation loop has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    /// Unblock the simulation's startup wait. Called once by the
    /// observer when it is able to consume frames.
    pub fn observer_ready(&self) {
        *lock(&self.ready) = true;
        self.ready_cv.notify_all();
    }

    /// Halt the simulation at its next publish boundary.
    pub fn pause(&self) {
        lock(&self.gate).paused = true;
    }

    pub fn resume(&self) {
        lock(&self.gate).paused = false;
        self.gate_cv.notify_all();
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        lock(&self.gate).paused
    }

    pub fn set_play_mode(&self, mode: PlayMode) {
        lock(&self.gate).mode = mode;
        self.gate_cv.notify_all();
    }

    /// Grant `count` frame permits; each admits one publish.
    pub fn release_frames(&self, count: u32) {
        lock(&self.gate).permits += count;
        self.gate_cv.notify_all();
    }

    /// Most recently published frame, if any.
    #[must_use]
    pub fn latest_frame(&self) -> Option<Frame> {
        lock(&self.frame).clone()
    }

    /// Block until a frame newer than `after` is published. Returns
    /// `None` once the run is finished or cancelled and no newer frame
    /// remains.
    pub fn wait_for_frame(&self, after: u64) -> Option<Frame> {
        let mut slot = lock(&self.frame);
        loop {
            if let Some(frame) = slot.as_ref() {
                if frame.seq > after {
                    return Some(frame.clone());
                }
            }
            if self.is_finished() || self.is_interrupted() {
                return None;
            }
            slot = self
                .frame_cv
                .wait(slot)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }

    /// Simulation side: block until the observer signals readiness.
    pub(crate) fn wait_observer_ready(&self) {
        let mut ready = lock(&self.ready);
        while !*ready && !self.is_interrupted() {
            ready = self
                .ready_cv
                .wait(ready)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }

    /// Simulation side: copy a snapshot into the shared slot, wake the
    /// observer, then pass the frame gate.
    pub(crate) fn publish(
        &self,
        phase: FramePhase,
        generation: u32,
        step: u32,
        organisms: Vec<OrganismSnapshot>,
    ) {
        {
            let mut slot = lock(&self.frame);
            let seq = slot.as_ref().map_or(0, |f| f.seq) + 1;
            *slot = Some(Frame {
                seq,
                phase,
                generation,
                step,
                organisms,
            });
        }
        self.frame_cv.notify_all();
        self.gate_wait();
    }

    /// Simulation side: mark the run over and wake any frame waiters.
    pub(crate) fn mark_finished(&self) {
        self.finished.store(true, Ordering::SeqCst);
        drop(lock(&self.frame));
        self.frame_cv.notify_all();
    }

    fn gate_wait(&self) {
        let mut gate = lock(&self.gate);
        loop {
            if self.is_interrupted() {
                return;
            }
            if gate.permits > 0 {
                gate.permits -= 1;
                return;
            }
            if !gate.paused && gate.mode == PlayMode::Skip {
                return;
            }
            gate = self
                .gate_cv
                .wait(gate)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    fn spawn_publisher(handle: &Arc<SimHandle>, frames: u32) -> thread::JoinHandle<()> {
        let handle = Arc::clone(handle);
        thread::spawn(move || {
            handle.wait_observer_ready();
            for step in 0..frames {
                if handle.is_interrupted() {
                    break;
                }
                handle.publish(FramePhase::Step, 0, step, Vec::new());
            }
            handle.mark_finished();
        })
    }

    fn single_step_delivers_one_frame_per_release(mode: PlayMode) {
        let handle = SimHandle::new();
        handle.set_play_mode(mode);
        handle.pause();
        let publisher = spawn_publisher(&handle, 32);
        handle.observer_ready();

        // The first publish lands before the producer blocks at the gate.
        let first = handle.wait_for_frame(0).unwrap();
        assert_eq!(first.seq, 1);
        assert_eq!(first.phase, FramePhase::Step);

        let mut last = first.seq;
        for _ in 0..5 {
            handle.release_frames(1);
            let frame = handle.wait_for_frame(last).unwrap();
            assert_eq!(frame.seq, last + 1, "no skipped or duplicated frames");
            last = frame.seq;
        }

        // With no further permits, no further frames appear.
        thread::sleep(Duration::from_millis(50));
        assert_eq!(handle.latest_frame().unwrap().seq, last);

        handle.cancel();
        publisher.join().unwrap();
    }

    #[test]
    fn paused_single_step_in_delayed_mode() {
        single_step_delivers_one_frame_per_release(PlayMode::Delayed);
    }

    #[test]
    fn paused_single_step_in_skip_mode() {
        single_step_delivers_one_frame_per_release(PlayMode::Skip);
    }

    #[test]
    fn skip_mode_runs_freely_when_unpaused() {
        let handle = SimHandle::new();
        let publisher = spawn_publisher(&handle, 10);
        handle.observer_ready();
        let mut last = 0;
        while let Some(frame) = handle.wait_for_frame(last) {
            last = frame.seq;
        }
        assert_eq!(last, 10);
        assert!(handle.is_finished());
        publisher.join().unwrap();
    }

    #[test]
    fn delayed_mode_paces_publishes() {
        let handle = SimHandle::new();
        handle.set_play_mode(PlayMode::Delayed);
        let publisher = spawn_publisher(&handle, 4);
        handle.observer_ready();
        let mut last = 0;
        for _ in 0..4 {
            let frame = handle.wait_for_frame(last).unwrap();
            last = frame.seq;
            handle.release_frames(1);
        }
        assert!(handle.wait_for_frame(last).is_none());
        publisher.join().unwrap();
    }

    #[test]
    fn cancel_unblocks_everyone() {
        let handle = SimHandle::new();
        handle.pause();
        let publisher = spawn_publisher(&handle, 100);
        handle.observer_ready();
        assert!(handle.wait_for_frame(0).is_some());
        handle.cancel();
        publisher.join().unwrap();
        assert!(handle.wait_for_frame(u64::MAX).is_none());
    }

    #[test]
    fn ready_gate_blocks_until_observer_arrives() {
        let handle = SimHandle::new();
        let publisher = spawn_publisher(&handle, 1);
        thread::sleep(Duration::from_millis(20));
        assert!(handle.latest_frame().is_none());
        handle.observer_ready();
        assert!(handle.wait_for_frame(0).is_some());
        publisher.join().unwrap();
    }
}
