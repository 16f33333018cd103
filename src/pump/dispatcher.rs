use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::error::DispatcherError;
use super::performer::{Performer, PerformerExit, PerformerStats};
use super::route::MessageDispatch;
use super::subscription::Subscription;
use crate::channel::{Channel, ChannelFactory, ChannelHandle};
use crate::error::ConfigurationError;
use crate::handler::panic_message;
use crate::processor::CommandProcessor;

const SUPERVISOR_TICK: Duration = Duration::from_millis(50);
const JOIN_POLL: Duration = Duration::from_millis(5);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatcherState {
    Awaiting,
    Running,
    Stopping,
    Stopped,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// How long `end` waits for performers before giving up on them.
    pub end_timeout_ms: u64,
    /// Restarts allowed per subscription before it is left stopped.
    pub death_budget: u32,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            end_timeout_ms: 5000,
            death_budget: 3,
        }
    }
}

impl DispatcherConfig {
    pub fn end_timeout(&self) -> Duration {
        Duration::from_millis(self.end_timeout_ms)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubscriptionStatus {
    pub name: String,
    /// Performer threads still running.
    pub performers: usize,
    pub deaths: u32,
    pub unhealthy: bool,
    /// Totals of the performers that have exited.
    pub stats: PerformerStats,
}

enum PerformerEvent {
    Exited {
        line: usize,
        exit: PerformerExit,
        stats: PerformerStats,
    },
    Died {
        line: usize,
        slot: usize,
        performer: Performer,
        reason: String,
    },
}

struct Slot {
    id: usize,
    channel: ChannelHandle,
    thread: Option<JoinHandle<()>>,
}

/// One subscription and its performers.
struct Line {
    subscription: Subscription,
    route: Arc<dyn MessageDispatch>,
    slots: Vec<Slot>,
    next_slot: usize,
    deaths: u32,
    unhealthy: bool,
    shut: bool,
    stats: PerformerStats,
}

struct Inner {
    state: DispatcherState,
    lines: Vec<Line>,
    events: Option<mpsc::Sender<PerformerEvent>>,
}

struct Shared {
    processor: Arc<CommandProcessor>,
    factory: Arc<dyn ChannelFactory>,
    config: DispatcherConfig,
    inner: Mutex<Inner>,
}

/// Supervises the performers of every subscription.
///
/// `receive` starts `no_of_performers` threads per subscription and a
/// supervisor thread. A performer that dies (a panic escaping its loop) is
/// restarted on the same channel until the subscription's death budget is
/// spent, after which the subscription is marked unhealthy and left stopped.
/// `end` stops every channel and waits, bounded by `end_timeout`, for the
/// performers to exit.
///
/// ## Example
///
/// ```ignore
/// let dispatcher = Dispatcher::builder()
///     .processor(Arc::clone(&processor))
///     .channel_factory(Arc::new(InMemoryChannelFactory::new(bus.clone())))
///     .subscription(Subscription::new("orders", "orders.q", "orders"), RequestRoute::event::<OrderPlaced>())
///     .build()?;
///
/// dispatcher.receive()?;
/// // ...
/// dispatcher.end()?;
/// assert_eq!(dispatcher.state(), DispatcherState::Stopped);
/// ```
pub struct Dispatcher {
    shared: Arc<Shared>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl Shared {
    fn lock(&self, action: &'static str) -> Result<MutexGuard<'_, Inner>, DispatcherError> {
        self.inner
            .lock()
            .map_err(|_| DispatcherError::LockPoisoned(action))
    }

    fn state(&self) -> DispatcherState {
        self.inner
            .lock()
            .map(|inner| inner.state)
            .unwrap_or(DispatcherState::Stopped)
    }

    fn channels(&self, subscription: &Subscription) -> Result<Vec<Channel>, DispatcherError> {
        (0..subscription.no_of_performers)
            .map(|_| {
                self.factory
                    .create_channel(subscription)
                    .map_err(DispatcherError::from)
            })
            .collect()
    }

    /// Start one performer per channel on the given line.
    fn start(
        &self,
        index: usize,
        line: &mut Line,
        channels: Vec<Channel>,
        events: &mpsc::Sender<PerformerEvent>,
    ) -> Result<(), DispatcherError> {
        for channel in channels {
            let slot = line.next_slot;
            line.next_slot += 1;
            let handle = channel.handle();
            let performer = Performer::new(
                channel,
                line.subscription.clone(),
                Arc::clone(&line.route),
                Arc::clone(&self.processor),
            )
            .with_id(format!("{}-{}", line.subscription.name, slot));
            let thread = spawn(performer, index, slot, events.clone())?;
            line.slots.push(Slot {
                id: slot,
                channel: handle,
                thread: Some(thread),
            });
        }
        Ok(())
    }

    fn on_event(&self, event: PerformerEvent) {
        let mut inner = match self.lock("supervise") {
            Ok(inner) => inner,
            Err(err) => {
                error!(error = %err, "supervisor cannot read dispatcher state");
                return;
            }
        };
        let running = inner.state == DispatcherState::Running;
        let events = inner.events.clone();

        match event {
            PerformerEvent::Exited { line, exit, stats } => {
                let Some(line) = inner.lines.get_mut(line) else { return };
                line.stats.merge(&stats);
                match exit {
                    PerformerExit::Quit => {
                        debug!(subscription = %line.subscription.name, "performer exited")
                    }
                    PerformerExit::UnacceptableLimitReached | PerformerExit::ConfigurationError(_) => {
                        warn!(subscription = %line.subscription.name, exit = ?exit, "performer stopped, subscription unhealthy");
                        line.unhealthy = true;
                    }
                }
            }
            PerformerEvent::Died {
                line: index,
                slot,
                performer,
                reason,
            } => {
                let budget = self.config.death_budget;
                let Some(line) = inner.lines.get_mut(index) else { return };
                let restart = running && !line.shut && line.deaths < budget;
                if !restart || events.is_none() {
                    error!(subscription = %line.subscription.name, performer = performer.id(), reason = %reason, "performer died");
                    line.stats.merge(&performer.stats());
                    if running && !line.shut {
                        line.unhealthy = true;
                    }
                    return;
                }

                line.deaths += 1;
                warn!(
                    subscription = %line.subscription.name,
                    performer = performer.id(),
                    reason = %reason,
                    deaths = line.deaths,
                    "performer died, restarting"
                );
                let Some(events) = events else { return };
                match spawn(performer, index, slot, events) {
                    Ok(thread) => {
                        if let Some(entry) = line.slots.iter_mut().find(|entry| entry.id == slot) {
                            entry.thread = Some(thread);
                        }
                    }
                    Err(err) => {
                        error!(subscription = %line.subscription.name, error = %err, "restart failed");
                        line.unhealthy = true;
                    }
                }
            }
        }
    }
}

fn spawn(
    mut performer: Performer,
    line: usize,
    slot: usize,
    events: mpsc::Sender<PerformerEvent>,
) -> Result<JoinHandle<()>, DispatcherError> {
    thread::Builder::new()
        .name(format!("courier-{}", performer.id()))
        .spawn(move || {
            let outcome = catch_unwind(AssertUnwindSafe(|| performer.run()));
            let event = match outcome {
                Ok(exit) => PerformerEvent::Exited {
                    line,
                    exit,
                    stats: performer.stats(),
                },
                Err(panic) => PerformerEvent::Died {
                    line,
                    slot,
                    reason: panic_message(panic.as_ref()),
                    performer,
                },
            };
            // The supervisor is gone once the dispatcher has stopped.
            let _ = events.send(event);
        })
        .map_err(|err| DispatcherError::Spawn(err.to_string()))
}

fn supervise(shared: Arc<Shared>, events: mpsc::Receiver<PerformerEvent>) {
    loop {
        match events.recv_timeout(SUPERVISOR_TICK) {
            Ok(event) => shared.on_event(event),
            Err(RecvTimeoutError::Timeout) => {
                if shared.state() == DispatcherState::Stopped {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    debug!("supervisor finished");
}

/// Stop every channel, then wait for the threads until `deadline`.
/// Returns how many did not finish in time.
fn drain(slots: Vec<Slot>, timeout: Duration) -> usize {
    for slot in &slots {
        if let Err(err) = slot.channel.stop() {
            error!(channel = slot.channel.name(), error = %err, "failed to stop channel");
        }
    }

    let deadline = Instant::now() + timeout;
    let mut threads: Vec<(String, JoinHandle<()>)> = slots
        .into_iter()
        .filter_map(|slot| slot.thread.map(|thread| (slot.channel.name().to_string(), thread)))
        .collect();
    while !threads.is_empty() && Instant::now() < deadline {
        let (finished, waiting): (Vec<_>, Vec<_>) =
            threads.into_iter().partition(|(_, thread)| thread.is_finished());
        for (channel, thread) in finished {
            if thread.join().is_err() {
                warn!(channel = %channel, "performer thread panicked");
            }
        }
        threads = waiting;
        if !threads.is_empty() {
            thread::sleep(JOIN_POLL);
        }
    }
    for (channel, _) in &threads {
        warn!(channel = %channel, "performer did not stop in time, abandoning it");
    }
    threads.len()
}

impl Dispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::default()
    }

    pub fn state(&self) -> DispatcherState {
        self.shared.state()
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.shared.config
    }

    /// Start every subscription. Channels for all subscriptions are created
    /// before any performer starts, so a missing queue fails the whole call.
    pub fn receive(&self) -> Result<(), DispatcherError> {
        let mut inner = self.shared.lock("receive")?;
        if inner.state != DispatcherState::Awaiting {
            return Err(DispatcherError::InvalidState {
                state: inner.state,
                expected: DispatcherState::Awaiting,
            });
        }

        let channels = inner
            .lines
            .iter()
            .map(|line| self.shared.channels(&line.subscription))
            .collect::<Result<Vec<_>, _>>()?;

        let (sender, receiver) = mpsc::channel();
        for (index, (line, channels)) in inner.lines.iter_mut().zip(channels).enumerate() {
            self.shared.start(index, line, channels, &sender)?;
        }
        inner.events = Some(sender);
        inner.state = DispatcherState::Running;
        let performers: usize = inner.lines.iter().map(|line| line.slots.len()).sum();
        drop(inner);

        let shared = Arc::clone(&self.shared);
        let supervisor = thread::Builder::new()
            .name("courier-supervisor".into())
            .spawn(move || supervise(shared, receiver))
            .map_err(|err| DispatcherError::Spawn(err.to_string()))?;
        if let Ok(mut slot) = self.supervisor.lock() {
            *slot = Some(supervisor);
        }
        info!(performers, "dispatcher running");
        Ok(())
    }

    /// Stop everything and wait for the performers. A no-op unless running.
    pub fn end(&self) -> Result<(), DispatcherError> {
        let slots = {
            let mut inner = self.shared.lock("end")?;
            if inner.state != DispatcherState::Running {
                debug!(state = ?inner.state, "end ignored");
                return Ok(());
            }
            inner.state = DispatcherState::Stopping;
            inner.events = None;
            inner
                .lines
                .iter_mut()
                .flat_map(|line| line.slots.drain(..))
                .collect::<Vec<_>>()
        };
        info!(performers = slots.len(), "dispatcher stopping");

        let stragglers = drain(slots, self.shared.config.end_timeout());
        self.shared.lock("end")?.state = DispatcherState::Stopped;

        let supervisor = self
            .supervisor
            .lock()
            .map_err(|_| DispatcherError::LockPoisoned("end"))?
            .take();
        if let Some(supervisor) = supervisor {
            if supervisor.join().is_err() {
                error!("supervisor thread panicked");
            }
        }
        info!(stragglers, "dispatcher stopped");
        Ok(())
    }

    /// Stop one subscription's performers while the rest keep running.
    pub fn shut(&self, name: &str) -> Result<(), DispatcherError> {
        let slots = {
            let mut inner = self.shared.lock("shut")?;
            let line = find(&mut inner.lines, name)?;
            line.shut = true;
            line.slots.drain(..).collect::<Vec<_>>()
        };
        info!(subscription = name, performers = slots.len(), "shutting subscription");
        drain(slots, self.shared.config.end_timeout());
        Ok(())
    }

    /// Restart a subscription that was shut or went unhealthy. Only valid
    /// while running; a subscription that still has performers is left alone.
    pub fn open(&self, name: &str) -> Result<(), DispatcherError> {
        let mut inner = self.shared.lock("open")?;
        if inner.state != DispatcherState::Running {
            return Err(DispatcherError::InvalidState {
                state: inner.state,
                expected: DispatcherState::Running,
            });
        }
        let events = inner.events.clone();
        let index = inner
            .lines
            .iter()
            .position(|line| line.subscription.name == name)
            .ok_or_else(|| DispatcherError::UnknownSubscription(name.to_string()))?;
        let line = &mut inner.lines[index];
        line.slots.retain(|slot| {
            slot.thread
                .as_ref()
                .is_some_and(|thread| !thread.is_finished())
        });
        if !line.slots.is_empty() {
            debug!(subscription = name, "subscription already open");
            return Ok(());
        }
        let Some(events) = events else {
            return Err(DispatcherError::InvalidState {
                state: DispatcherState::Stopping,
                expected: DispatcherState::Running,
            });
        };

        let channels = self.shared.channels(&line.subscription)?;
        line.shut = false;
        line.unhealthy = false;
        line.deaths = 0;
        self.shared.start(index, line, channels, &events)?;
        info!(subscription = name, "subscription opened");
        Ok(())
    }

    pub fn status(&self) -> Vec<SubscriptionStatus> {
        let Ok(inner) = self.shared.lock("status") else {
            return Vec::new();
        };
        inner
            .lines
            .iter()
            .map(|line| SubscriptionStatus {
                name: line.subscription.name.clone(),
                performers: line
                    .slots
                    .iter()
                    .filter(|slot| slot.thread.as_ref().is_some_and(|thread| !thread.is_finished()))
                    .count(),
                deaths: line.deaths,
                unhealthy: line.unhealthy,
                stats: line.stats,
            })
            .collect()
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        if let Err(err) = self.end() {
            error!(error = %err, "dispatcher did not stop cleanly");
        }
    }
}

fn find<'a>(lines: &'a mut [Line], name: &str) -> Result<&'a mut Line, DispatcherError> {
    lines
        .iter_mut()
        .find(|line| line.subscription.name == name)
        .ok_or_else(|| DispatcherError::UnknownSubscription(name.to_string()))
}

/// Wires a [`Dispatcher`].
#[derive(Default)]
pub struct DispatcherBuilder {
    processor: Option<Arc<CommandProcessor>>,
    factory: Option<Arc<dyn ChannelFactory>>,
    subscriptions: Vec<Subscription>,
    routes: HashMap<String, Arc<dyn MessageDispatch>>,
    config: DispatcherConfig,
}

impl DispatcherBuilder {
    pub fn processor(mut self, processor: Arc<CommandProcessor>) -> Self {
        self.processor = Some(processor);
        self
    }

    pub fn channel_factory(mut self, factory: Arc<dyn ChannelFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Add a subscription together with its route.
    pub fn subscription(mut self, subscription: Subscription, route: Arc<dyn MessageDispatch>) -> Self {
        self.routes.insert(subscription.name.clone(), route);
        self.subscriptions.push(subscription);
        self
    }

    /// Add subscriptions loaded from configuration. Each needs a
    /// [`route`](Self::route) by name.
    pub fn subscriptions(mut self, subscriptions: impl IntoIterator<Item = Subscription>) -> Self {
        self.subscriptions.extend(subscriptions);
        self
    }

    pub fn route(mut self, subscription: impl Into<String>, route: Arc<dyn MessageDispatch>) -> Self {
        self.routes.insert(subscription.into(), route);
        self
    }

    pub fn config(mut self, config: DispatcherConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(mut self) -> Result<Dispatcher, DispatcherError> {
        let processor = self
            .processor
            .ok_or_else(|| ConfigurationError::Invalid("dispatcher needs a command processor".into()))?;
        let factory = self
            .factory
            .ok_or_else(|| ConfigurationError::Invalid("dispatcher needs a channel factory".into()))?;

        let mut lines = Vec::with_capacity(self.subscriptions.len());
        for subscription in self.subscriptions {
            if lines.iter().any(|line: &Line| line.subscription.name == subscription.name) {
                return Err(ConfigurationError::Invalid(format!(
                    "subscription {} is declared twice",
                    subscription.name
                ))
                .into());
            }
            let route = self.routes.remove(&subscription.name).ok_or_else(|| {
                ConfigurationError::Invalid(format!("subscription {} has no route", subscription.name))
            })?;
            lines.push(Line {
                subscription,
                route,
                slots: Vec::new(),
                next_slot: 0,
                deaths: 0,
                unhealthy: false,
                shut: false,
                stats: PerformerStats::default(),
            });
        }

        Ok(Dispatcher {
            shared: Arc::new(Shared {
                processor,
                factory,
                config: self.config,
                inner: Mutex::new(Inner {
                    state: DispatcherState::Awaiting,
                    lines,
                    events: None,
                }),
            }),
            supervisor: Mutex::new(None),
        })
    }
}
