use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};

use crate::timer::TimerId;

/// Platform timer requests. Periodic timers arrive as chained one-shots: the
/// core asks again after every firing it wants to continue.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TimerOperation {
    NotifyAfter { id: TimerId, delay_ms: u64 },
    Cancel { id: TimerId },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TimerOutput {
    Fired { id: TimerId },
    /// The shell dropped the timer before it fired.
    Cancelled { id: TimerId },
}

impl TimerOutput {
    #[must_use]
    pub const fn id(&self) -> TimerId {
        match self {
            Self::Fired { id } | Self::Cancelled { id } => *id,
        }
    }
}

impl Operation for TimerOperation {
    type Output = TimerOutput;
}

pub struct Timer<Ev> {
    context: CapabilityContext<TimerOperation, Ev>,
}

impl<Ev> Capability<Ev> for Timer<Ev> {
    type Operation = TimerOperation;
    type MappedSelf<MappedEv> = Timer<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static,
    {
        Timer::new(self.context.map_event(f))
    }
}

impl<Ev> Timer<Ev>
where
    Ev: 'static,
{
    pub fn new(context: CapabilityContext<TimerOperation, Ev>) -> Self {
        Self { context }
    }

    pub fn notify_after<F>(&self, id: TimerId, delay_ms: u64, callback: F)
    where
        F: FnOnce(TimerOutput) -> Ev + Send + 'static,
    {
        let context = self.context.clone();
        self.context.spawn(async move {
            let output = context
                .request_from_shell(TimerOperation::NotifyAfter { id, delay_ms })
                .await;
            context.update_app(callback(output));
        });
    }

    pub fn cancel(&self, id: TimerId) {
        let context = self.context.clone();
        self.context.spawn(async move {
            context.notify_shell(TimerOperation::Cancel { id }).await;
        });
    }
}
