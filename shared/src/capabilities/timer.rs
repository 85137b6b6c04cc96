//! One-shot timers executed by the shell.
//!
//! Polling is built from repeated one-shot timers: the core arms a timer,
//! the shell resolves it after the delay with the wall-clock time, and the
//! core decides whether to re-arm. Nothing is left running in the shell
//! once the core stops re-arming.

use crux_core::capability::{CapabilityContext, Operation};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimerOperation {
    After { millis: u64 },
}

impl Operation for TimerOperation {
    type Output = TimerOutput;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimerOutput {
    Fired { now_ms: u64 },
}

impl TimerOutput {
    #[must_use]
    pub const fn now_ms(self) -> u64 {
        match self {
            Self::Fired { now_ms } => now_ms,
        }
    }
}

#[derive(crux_core::macros::Capability)]
pub struct Timer<Ev> {
    context: CapabilityContext<TimerOperation, Ev>,
}

impl<Ev> Clone for Timer<Ev> {
    fn clone(&self) -> Self {
        Self {
            context: self.context.clone(),
        }
    }
}

impl<Ev> Timer<Ev> {
    pub fn new(context: CapabilityContext<TimerOperation, Ev>) -> Self {
        Self { context }
    }
}

impl<Ev> Timer<Ev>
where
    Ev: Send + 'static,
{
    pub fn after<F>(&self, millis: u64, make_event: F)
    where
        F: FnOnce(TimerOutput) -> Ev + Send + 'static,
    {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            let output = ctx
                .request_from_shell(TimerOperation::After { millis })
                .await;
            ctx.update_app(make_event(output));
        });
    }
}
