//! Scoped runtime mode switch
//!
//! Each thread keeps an explicit stack of frames. A frame holds the running
//! mode, the active configuration and the slot cursor for the current run.
//! [`RuntimeModeContext::enter`] pushes a frame and returns a [`ModeGuard`];
//! releasing the guard (by [`ModeGuard::exit`] or by drop) pops it, hands the
//! configuration back to the caller and leaves the previous frame active.
//!
//! ```no_run
//! use automix::{MixedPrecisionConfiguration, RunningMode, RuntimeModeContext, TargetPrecision};
//!
//! let mut conf = MixedPrecisionConfiguration::new(TargetPrecision::Int8);
//! {
//!     let scope = RuntimeModeContext::enter(&mut conf, RunningMode::Calibration)?;
//!     // model.forward(...)?;
//!     scope.exit()?;
//! }
//! assert_eq!(RuntimeModeContext::current_mode(), RunningMode::Disabled);
//! # Ok::<(), automix::Error>(())
//! ```

use std::cell::{Cell, RefCell};
use std::marker::PhantomData;
use std::sync::Arc;

use super::{MixedPrecisionConfiguration, OpKind, QuantizationRecord, RunningMode};
use crate::quant::{StatisticsAccumulator, TargetPrecision};
use crate::{Error, Result};

thread_local! {
    static STACK: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
    static NEXT_ID: Cell<u64> = const { Cell::new(0) };
}

/// Configuration held by a frame
enum ActiveConfig {
    /// Moved in from the caller, mutable during calibration
    Owned(MixedPrecisionConfiguration),
    /// Frozen and possibly shared with other threads
    Shared(Arc<MixedPrecisionConfiguration>),
}

impl ActiveConfig {
    fn get(&self) -> &MixedPrecisionConfiguration {
        match self {
            ActiveConfig::Owned(c) => c,
            ActiveConfig::Shared(c) => c,
        }
    }
}

struct Frame {
    id: u64,
    mode: RunningMode,
    config: Option<ActiveConfig>,
    cursor: usize,
    completed_runs: usize,
}

/// What the interceptor should do for one invocation
pub(crate) enum SlotPlan {
    Passthrough,
    Calibrate {
        frame: usize,
        op_index: usize,
    },
    Infer {
        op_index: usize,
        record: QuantizationRecord,
        target: TargetPrecision,
    },
}

/// Entry points of the per-thread mode stack
pub struct RuntimeModeContext;

impl RuntimeModeContext {
    /// Activate `config` in `mode` until the guard is released
    ///
    /// The configuration is moved into the scope and written back on
    /// release. Entering [`RunningMode::Inference`] with zero slots is a
    /// configuration mismatch.
    pub fn enter(
        config: &mut MixedPrecisionConfiguration,
        mode: RunningMode,
    ) -> Result<ModeGuard<'_>> {
        if mode == RunningMode::Inference {
            config.check_inference_ready()?;
        }
        let placeholder = MixedPrecisionConfiguration::new(config.target());
        let owned = std::mem::replace(config, placeholder);
        Ok(ModeGuard::push(mode, Some(ActiveConfig::Owned(owned)), Some(config)))
    }

    /// Run inference against a frozen configuration shared across threads
    pub fn enter_frozen(config: Arc<MixedPrecisionConfiguration>) -> Result<ModeGuard<'static>> {
        config.check_inference_ready()?;
        Ok(ModeGuard::push(
            RunningMode::Inference,
            Some(ActiveConfig::Shared(config)),
            None,
        ))
    }

    /// Switch interception off inside an otherwise active scope
    pub fn disabled() -> ModeGuard<'static> {
        ModeGuard::push(RunningMode::Disabled, None, None)
    }

    /// Mode of the innermost scope on this thread
    pub fn current_mode() -> RunningMode {
        STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .map_or(RunningMode::Disabled, |f| f.mode)
        })
    }

    /// Number of active scopes on this thread
    pub fn depth() -> usize {
        STACK.with(|stack| stack.borrow().len())
    }

    /// Slots consumed so far by the current run
    pub fn current_op_index() -> usize {
        STACK.with(|stack| stack.borrow().last().map_or(0, |f| f.cursor))
    }

    /// Reserve the next slot for an operator of `kind`
    pub(crate) fn claim_slot(kind: OpKind) -> Result<SlotPlan> {
        STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            let depth = stack.len();
            let Some(frame) = stack.last_mut() else {
                return Ok(SlotPlan::Passthrough);
            };

            let op_index = frame.cursor;
            match (frame.mode, frame.config.as_mut()) {
                (RunningMode::Disabled, _) => Ok(SlotPlan::Passthrough),
                (RunningMode::Calibration, Some(ActiveConfig::Owned(config))) => {
                    frame.cursor += 1;
                    config.record_observation(op_index, kind, None, None)?;
                    Ok(SlotPlan::Calibrate {
                        frame: depth - 1,
                        op_index,
                    })
                }
                (RunningMode::Inference, Some(active)) => {
                    frame.cursor += 1;
                    let config = active.get();
                    let record = config.get(op_index).ok_or_else(|| Error::ConfigurationMismatch {
                        op_index: Some(op_index),
                        message: format!(
                            "run executed more operators than the {} configured slots",
                            config.len()
                        ),
                    })?;
                    if record.op_kind != kind {
                        return Err(Error::ConfigurationMismatch {
                            op_index: Some(op_index),
                            message: format!(
                                "slot records '{}' but the run executed '{kind}'",
                                record.op_kind
                            ),
                        });
                    }
                    Ok(SlotPlan::Infer {
                        op_index,
                        record: record.clone(),
                        target: config.target(),
                    })
                }
                (mode, _) => Err(Error::mismatch(format!(
                    "{mode} scope has no writable configuration"
                ))),
            }
        })
    }

    /// Merge calibration observations into a slot claimed earlier
    pub(crate) fn record_statistics(
        frame: usize,
        op_index: usize,
        kind: OpKind,
        input: Option<StatisticsAccumulator>,
        output: Option<StatisticsAccumulator>,
    ) -> Result<()> {
        STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            match stack.get_mut(frame).and_then(|f| f.config.as_mut()) {
                Some(ActiveConfig::Owned(config)) => {
                    config.record_observation(op_index, kind, input, output)
                }
                _ => Err(Error::ConfigurationMismatch {
                    op_index: Some(op_index),
                    message: "calibration scope was released while the operator ran".to_string(),
                }),
            }
        })
    }
}

/// Active scope; restores the previous mode and configuration when released
///
/// Not `Send`: the frame lives on the creating thread's stack.
#[derive(Debug)]
#[must_use = "the scope ends as soon as the guard is dropped"]
pub struct ModeGuard<'a> {
    depth: usize,
    id: u64,
    mode: RunningMode,
    home: Option<&'a mut MixedPrecisionConfiguration>,
    released: bool,
    _thread_bound: PhantomData<*const ()>,
}

impl<'a> ModeGuard<'a> {
    fn push(
        mode: RunningMode,
        config: Option<ActiveConfig>,
        home: Option<&'a mut MixedPrecisionConfiguration>,
    ) -> Self {
        let id = NEXT_ID.with(|next| {
            let id = next.get();
            next.set(id + 1);
            id
        });
        let depth = STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            stack.push(Frame {
                id,
                mode,
                config,
                cursor: 0,
                completed_runs: 0,
            });
            stack.len() - 1
        });
        tracing::debug!(%mode, depth, "entered mixed-precision scope");

        Self {
            depth,
            id,
            mode,
            home,
            released: false,
            _thread_bound: PhantomData,
        }
    }

    pub fn mode(&self) -> RunningMode {
        self.mode
    }

    /// Position of this scope on the thread's stack (0 = outermost)
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Close the current run and start the next one at slot 0
    ///
    /// In inference the finished run must have consumed every slot.
    pub fn next_run(&mut self) -> Result<()> {
        STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            let frame = stack
                .get_mut(self.depth)
                .filter(|f| f.id == self.id)
                .ok_or_else(|| Error::mismatch("scope was already released"))?;

            if let (RunningMode::Inference, Some(config)) = (frame.mode, &frame.config) {
                check_run_length(frame.cursor, config.get().len())?;
            }
            frame.cursor = 0;
            frame.completed_runs += 1;
            Ok(())
        })
    }

    /// Release the scope and report problems with the finished run
    ///
    /// The previous pair is restored before anything is checked. A
    /// calibration scope derives parameters for its configuration; an
    /// inference scope fails if the run did not consume every slot.
    pub fn exit(mut self) -> Result<()> {
        let Some(frame) = self.release() else {
            return Err(Error::mismatch(
                "scope was already released by an enclosing scope",
            ));
        };

        let result = match (frame.mode, &frame.config) {
            (RunningMode::Inference, Some(config)) if frame.cursor > 0 || frame.completed_runs == 0 => {
                check_run_length(frame.cursor, config.get().len())
            }
            _ => Ok(()),
        };

        let mut config = match frame.config {
            Some(ActiveConfig::Owned(config)) => Some(config),
            _ => None,
        };
        if let (RunningMode::Calibration, Some(config)) = (frame.mode, config.as_mut()) {
            if frame.cursor != 0 && frame.cursor != config.len() {
                tracing::warn!(
                    observed = frame.cursor,
                    slots = config.len(),
                    "calibration run touched fewer slots than the configuration holds"
                );
            }
            let problems = config.finalize();
            tracing::debug!(
                slots = config.len(),
                degenerate = problems.len(),
                "finalized calibration"
            );
        }
        self.restore(config);
        result
    }

    /// Pop this frame; frames left above it are discarded
    fn release(&mut self) -> Option<Frame> {
        if self.released {
            return None;
        }
        self.released = true;

        let frame = STACK.with(|stack| {
            let Ok(mut stack) = stack.try_borrow_mut() else {
                tracing::error!(depth = self.depth, "mode stack busy during release");
                return None;
            };
            if stack.get(self.depth).map(|f| f.id) != Some(self.id) {
                return None;
            }
            if stack.len() > self.depth + 1 {
                tracing::warn!(
                    depth = self.depth,
                    abandoned = stack.len() - self.depth - 1,
                    "scope released before the scopes nested inside it"
                );
            }
            let mut popped = stack.drain(self.depth..);
            popped.next()
        });
        tracing::debug!(mode = %self.mode, depth = self.depth, "left mixed-precision scope");
        frame
    }

    fn restore(&mut self, config: Option<MixedPrecisionConfiguration>) {
        if let (Some(home), Some(config)) = (self.home.take(), config) {
            *home = config;
        }
    }
}

impl Drop for ModeGuard<'_> {
    fn drop(&mut self) {
        if let Some(frame) = self.release() {
            let config = match frame.config {
                Some(ActiveConfig::Owned(config)) => Some(config),
                _ => None,
            };
            self.restore(config);
        }
    }
}

fn check_run_length(observed: usize, slots: usize) -> Result<()> {
    if observed == slots {
        Ok(())
    } else {
        Err(Error::mismatch(format!(
            "run executed {observed} intercepted operators but the configuration has {slots} slots"
        )))
    }
}
