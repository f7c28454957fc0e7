use core::sync::atomic::{AtomicBool, Ordering::*};
use log::*;
use std::{
    sync::Arc,
    time::Duration,
    };
use tokio::{
    sync::{mpsc, Mutex},
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
    };
use crate::{
    BusyMutex,
    Error,
    config::Millis,
    escalation::SystemEvent,
    module::{Deferred, System},
    };
use super::registry::{BoxedSlot, SlotRegistry};


/// fault events kept until the receiver reads them, newer events are dropped beyond
pub const EVENT_QUEUE: usize = 64;


/// [System] implementation forwarding events and jobs to channels
#[derive(Clone)]
pub struct HostSystem {
    events: mpsc::Sender<SystemEvent>,
    jobs: mpsc::UnboundedSender<Deferred>,
}
impl System for HostSystem {
    fn push_event(&mut self, event: SystemEvent) {
        match self.events.try_send(event) {
            Ok(()) => {},
            Err(mpsc::error::TrySendError::Full(event)) => warn!("fault event {:?} dropped, event queue full", event),
            Err(mpsc::error::TrySendError::Closed(event)) => debug!("fault event {:?} dropped, nobody listens", event),
        }
    }
    fn defer(&mut self, work: Deferred) {
        if self.jobs.send(work).is_err() {
            warn!("slot {}: deferred {:?} dropped, worker is gone", work.slot, work.job);
        }
    }
}

/**
    periodic driver of all slots of a board

    must be created inside a tokio runtime, since it spawns the low priority worker running deferred jobs.
    Every tick locks the registry, so other tasks can inspect or modify it between ticks.
*/
pub struct Runtime {
    registry: Arc<Mutex<SlotRegistry>>,
    system: HostSystem,
    events: BusyMutex<Option<mpsc::Receiver<SystemEvent>>>,
    worker: JoinHandle<()>,
    start: Instant,
    stopped: AtomicBool,
}

impl Runtime {
    /// `jobs` runs every deferred job, one at a time on a blocking thread
    pub fn new(registry: SlotRegistry, jobs: impl Fn(Deferred) + Send + Sync + 'static) -> Self {
        let (events, receiver) = mpsc::channel(EVENT_QUEUE);
        let (job_sender, job_receiver) = mpsc::unbounded_channel();
        Self {
            registry: Arc::new(Mutex::new(registry)),
            system: HostSystem {events, jobs: job_sender},
            events: BusyMutex::new(Some(receiver)),
            worker: tokio::spawn(work(job_receiver, Arc::new(jobs))),
            start: Instant::now(),
            stopped: AtomicBool::new(false),
        }
    }

    /// fault events raised by the slots, available once. At most [EVENT_QUEUE] events wait to be read
    pub fn events(&self) -> Option<mpsc::Receiver<SystemEvent>> {
        self.events.with(Option::take)
    }
    /// milliseconds since the runtime started, wrapping like a firmware tick counter
    pub fn now(&self) -> Millis {
        self.start.elapsed().as_millis() as Millis
    }

    pub async fn insert(&self, slot: BoxedSlot) -> Result<(), Error> {
        self.registry.lock().await.insert(slot)
    }
    pub async fn remove(&self, index: u8) -> Result<BoxedSlot, Error> {
        self.registry.lock().await.remove(index)
    }
    /// run a closure on the registry between two ticks
    pub async fn with_registry<R>(&self, action: impl FnOnce(&mut SlotRegistry) -> R) -> R {
        action(&mut *self.registry.lock().await)
    }

    /**
        handshake with every populated slot, returns the number of modules that answered

        handshakes are blocking, each can take up to its sync window, so they run on a blocking thread
    */
    pub async fn bring_up_all(&self) -> usize {
        let mut registry = self.registry.clone().lock_owned().await;
        let handshakes = tokio::task::spawn_blocking(move || {
            let count = registry.bring_up_all();
            info!("{} of {} modules answered the handshake", count, registry.len());
            count
        });
        match handshakes.await {
            Ok(count) => count,
            Err(error) => {
                warn!("handshakes aborted: {}", error);
                0
            },
        }
    }
    /// one tick of every slot
    pub async fn tick(&self) {
        let now = self.now();
        let mut system = self.system.clone();
        self.registry.lock().await.tick_all(now, &mut system);
    }
    /// tick all slots every `period` until [Self::stop] is called
    pub async fn run(&self, period: Duration) {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        while !self.stopped.load(Acquire) {
            interval.tick().await;
            self.tick().await;
        }
        debug!("slot runtime stopped");
    }
    pub fn stop(&self) {
        self.stopped.store(true, Release);
    }
}
impl Drop for Runtime {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

/// low priority worker: deferred jobs run in order, outside of the runtime's reactor threads
async fn work(mut jobs: mpsc::UnboundedReceiver<Deferred>, handler: Arc<dyn Fn(Deferred) + Send + Sync>) {
    while let Some(job) = jobs.recv().await {
        let handler = handler.clone();
        if let Err(error) = tokio::task::spawn_blocking(move || handler(job)).await {
            warn!("slot {}: deferred {:?} failed: {}", job.slot, job.job, error);
        }
    }
}
