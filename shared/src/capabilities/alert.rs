use crux_core::capability::{CapabilityContext, Operation};
use serde::{Deserialize, Serialize};

/// Audible cues the shell plays. Browsers refuse autoplay before the first
/// user gesture, so the core only emits these once the user has interacted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertOperation {
    NewReports { report_ids: Vec<String> },
}

impl Operation for AlertOperation {
    type Output = ();
}

#[derive(crux_core::macros::Capability)]
pub struct Alert<Ev> {
    context: CapabilityContext<AlertOperation, Ev>,
}

impl<Ev> Clone for Alert<Ev> {
    fn clone(&self) -> Self {
        Self {
            context: self.context.clone(),
        }
    }
}

impl<Ev> Alert<Ev> {
    pub fn new(context: CapabilityContext<AlertOperation, Ev>) -> Self {
        Self { context }
    }
}

impl<Ev> Alert<Ev>
where
    Ev: Send + 'static,
{
    pub fn new_reports(&self, report_ids: Vec<String>) {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            ctx.notify_shell(AlertOperation::NewReports { report_ids })
                .await;
        });
    }
}
