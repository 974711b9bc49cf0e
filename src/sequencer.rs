//! Click and drag sequencing
//!
//! Some compositors let a click-through overlay swallow the first click, so
//! every synthesized click hides the overlay, clicks, then restores it. The
//! sleeps in between run on one worker thread fed by a bounded FIFO queue,
//! keeping the input thread free and keeping press/release pairs in order.
//!
//! Whatever must not overtake a drag release (the copy combo, the hide
//! notification) is queued behind it instead of being sent directly.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

use crate::grid::Letter;
use crate::sink::{ActionSink, Button, Modifier, PresentationSink, SinkError};
use crate::state::Mode;

/// Queue depth
const CHANNEL_CAPACITY: usize = 16;

/// Slots only a drag release and the jobs queued behind it may use, so a
/// burst of clicks can never leave a held button without its release
const RESERVED_SLOTS: usize = 4;

/// Delays of the hide/act/restore protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Hide notification to button press
    pub click_hide: Duration,
    /// Press to release
    pub click_hold: Duration,
    /// Release to restore notification
    pub click_restore: Duration,
    /// Drag begin: before and after the press
    pub drag_settle: Duration,
}

impl Timing {
    /// No delays at all, for tests
    #[cfg(test)]
    pub fn immediate() -> Self {
        Self {
            click_hide: Duration::ZERO,
            click_hold: Duration::ZERO,
            click_restore: Duration::ZERO,
            drag_settle: Duration::ZERO,
        }
    }
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            click_hide: Duration::from_millis(30),
            click_hold: Duration::from_millis(50),
            click_restore: Duration::from_millis(30),
            drag_settle: Duration::from_millis(20),
        }
    }
}

/// Work items for the sequencer thread
#[derive(Debug)]
enum Job {
    /// `restore` is the mode captured when the click was dispatched
    Click { button: Button, restore: Mode },
    BeginDrag,
    EndDrag,
    Copy,
    Present {
        mode: Mode,
        first_letter: Option<Letter>,
    },
    Shutdown,
}

fn pause(delay: Duration) {
    if !delay.is_zero() {
        thread::sleep(delay);
    }
}

fn notify(presentation: &dyn PresentationSink, mode: Mode) {
    notify_with(presentation, mode, None);
}

fn notify_with(presentation: &dyn PresentationSink, mode: Mode, first_letter: Option<Letter>) {
    if let Err(e) = presentation.set_mode(mode, first_letter) {
        log::warn!("[OVERLAY] set_mode({:?}) failed: {}", mode, e);
    }
}

/// Hide, press, hold, release, restore.
///
/// The release is attempted even if the press failed. The restore uses the
/// captured mode, which may be stale by the time it runs.
pub fn run_click(
    actions: &dyn ActionSink,
    presentation: &dyn PresentationSink,
    timing: &Timing,
    button: Button,
    restore: Mode,
) -> Result<(), SinkError> {
    notify(presentation, Mode::Hidden);
    pause(timing.click_hide);
    let pressed = actions.button_press(button);
    pause(timing.click_hold);
    let released = actions.button_release(button);
    pause(timing.click_restore);
    if restore != Mode::Hidden {
        notify(presentation, restore);
    }
    pressed.and(released)
}

/// Hide, press and hold the left button, show fine-tune again
pub fn run_drag_begin(
    actions: &dyn ActionSink,
    presentation: &dyn PresentationSink,
    timing: &Timing,
) -> Result<(), SinkError> {
    notify(presentation, Mode::Hidden);
    pause(timing.drag_settle);
    let pressed = actions.button_press(Button::Left);
    pause(timing.drag_settle);
    notify(presentation, Mode::FineTune);
    pressed
}

pub fn run_drag_end(actions: &dyn ActionSink) -> Result<(), SinkError> {
    actions.button_release(Button::Left)
}

fn run_worker(
    jobs: Receiver<Job>,
    actions: Arc<dyn ActionSink>,
    presentation: Arc<dyn PresentationSink>,
    timing: Timing,
    queued_presents: Arc<AtomicUsize>,
) {
    log::debug!("[SEQ] Worker started");
    while let Ok(job) = jobs.recv() {
        match job {
            Job::Click { button, restore } => {
                log::debug!("[CLICK] {:?} (restore {:?})", button, restore);
                if let Err(e) =
                    run_click(actions.as_ref(), presentation.as_ref(), &timing, button, restore)
                {
                    log::error!("[CLICK] {:?} click failed: {}", button, e);
                }
            }
            Job::BeginDrag => {
                log::debug!("[DRAG] Begin");
                if let Err(e) = run_drag_begin(actions.as_ref(), presentation.as_ref(), &timing) {
                    log::error!("[DRAG] Press failed: {}", e);
                }
            }
            Job::EndDrag => {
                log::debug!("[DRAG] End");
                if let Err(e) = run_drag_end(actions.as_ref()) {
                    log::error!("[DRAG] Release failed: {}", e);
                }
            }
            Job::Copy => {
                if let Err(e) = actions.send_key_combo(Modifier::Control, 'c') {
                    log::error!("[COPY] Key combo failed: {}", e);
                }
            }
            Job::Present { mode, first_letter } => {
                notify_with(presentation.as_ref(), mode, first_letter);
                queued_presents.fetch_sub(1, Ordering::SeqCst);
            }
            Job::Shutdown => break,
        }
    }
    log::debug!("[SEQ] Worker stopped");
}

/// Handle to the sequencer thread
pub struct Sequencer {
    sender: Sender<Job>,
    worker: Option<JoinHandle<()>>,
    /// Present jobs queued but not yet delivered
    queued_presents: Arc<AtomicUsize>,
}

impl Sequencer {
    pub fn spawn(
        actions: Arc<dyn ActionSink>,
        presentation: Arc<dyn PresentationSink>,
        timing: Timing,
    ) -> io::Result<Self> {
        let (sender, receiver) = bounded(CHANNEL_CAPACITY);
        let queued_presents = Arc::new(AtomicUsize::new(0));
        let worker_presents = queued_presents.clone();
        let worker = thread::Builder::new()
            .name("gridclick-sequencer".into())
            .spawn(move || run_worker(receiver, actions, presentation, timing, worker_presents))?;
        Ok(Self {
            sender,
            worker: Some(worker),
            queued_presents,
        })
    }

    /// Queue a click; a burst beyond the queue depth is dropped
    pub fn click(&self, button: Button, restore: Mode) {
        self.submit(Job::Click { button, restore }, false);
    }

    /// Queue a drag press. Returns false if it was dropped, in which case no
    /// release may follow.
    pub fn begin_drag(&self) -> bool {
        self.submit(Job::BeginDrag, false)
    }

    /// Queue the drag release behind any pending jobs; returns immediately.
    /// Returns false only when the worker is gone.
    pub fn end_drag(&self) -> bool {
        self.submit(Job::EndDrag, true)
    }

    /// Queue the copy combo behind a drag release
    pub fn copy_after_release(&self) -> bool {
        self.submit(Job::Copy, true)
    }

    /// Queue a mode notification behind the pending jobs. Only one that
    /// follows a drag release may use the reserved slots.
    pub fn present(
        &self,
        mode: Mode,
        first_letter: Option<Letter>,
        after_release: bool,
    ) -> bool {
        self.queued_presents.fetch_add(1, Ordering::SeqCst);
        let queued = self.submit(Job::Present { mode, first_letter }, after_release);
        if !queued {
            self.queued_presents.fetch_sub(1, Ordering::SeqCst);
        }
        queued
    }

    /// A queued notification has not been delivered yet, so a direct one
    /// would arrive out of order
    pub fn has_queued_presents(&self) -> bool {
        self.queued_presents.load(Ordering::SeqCst) > 0
    }

    fn submit(&self, job: Job, reserved: bool) -> bool {
        let limit = if reserved {
            CHANNEL_CAPACITY
        } else {
            CHANNEL_CAPACITY - RESERVED_SLOTS
        };
        // Only the event loop thread submits, so the length can only shrink
        // between this check and the send
        if self.sender.len() >= limit {
            log::warn!("[SEQ] Queue full, dropping {:?}", job);
            return false;
        }
        match self.sender.try_send(job) {
            Ok(()) => true,
            Err(TrySendError::Full(job)) => {
                log::warn!("[SEQ] Queue full, dropping {:?}", job);
                false
            }
            Err(TrySendError::Disconnected(job)) => {
                log::error!("[SEQ] Worker gone, dropping {:?}", job);
                false
            }
        }
    }

    /// Let queued jobs finish, then stop the worker
    pub fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = self.sender.send(Job::Shutdown);
            if worker.join().is_err() {
                log::error!("[SEQ] Worker panicked");
            }
        }
    }
}

impl Drop for Sequencer {
    fn drop(&mut self) {
        self.stop();
    }
}
