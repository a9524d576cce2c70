//! Event loop - the per-node scheduler
//!
//! Single writer: the loop is the only code that touches the node's clock
//! and event log. Listener tasks only push into the inbound queue.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;

use drift_clock::LamportClock;
use drift_core::{DriftResult, NodeId, WallTime};
use drift_transport::{InboundQueue, ListenerHandle, Outbound, Peer, StopSignal};
use drift_wire::Message;

use crate::{Action, ActionChooser, EventLog, LogEvent, TickSource};

/// Event loop lifecycle
/// Running -> Stopping (deadline reached or stop requested) -> Stopped (listener joined)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Stopping,
    Stopped,
}

/// What a single tick did
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    Received { from: Option<NodeId>, clock: u64 },
    Sent { to: Vec<NodeId>, clock: u64 },
    Internal { clock: u64 },
    /// The drawn send had no target peer
    Idle,
}

/// Summary of one node's run
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoopReport {
    pub id: NodeId,
    pub ticks: u64,
    pub final_clock: u64,
    /// SEND log events
    pub sends: u64,
    /// Individual messages handed to the sender
    pub messages_sent: u64,
    pub receives: u64,
    pub internals: u64,
    pub idles: u64,
}

/// Per-node scheduler
pub struct EventLoop<T: TickSource, W: Write> {
    id: NodeId,
    clock: LamportClock,
    peers: Vec<Peer>,
    tick_period: Duration,
    run_duration: Duration,
    queue: InboundQueue,
    outbound: Arc<dyn Outbound>,
    log: EventLog<W>,
    ticks: T,
    rng: StdRng,
    chooser: ActionChooser,
    state: LoopState,
    stop: StopSignal,
    report: LoopReport,
}

impl<T: TickSource, W: Write + Send> EventLoop<T, W> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: NodeId,
        tick_rate: u32,
        peers: Vec<Peer>,
        run_duration: Duration,
        queue: InboundQueue,
        outbound: Arc<dyn Outbound>,
        log: EventLog<W>,
        ticks: T,
        rng: StdRng,
        chooser: ActionChooser,
    ) -> Self {
        EventLoop {
            id,
            clock: LamportClock::new(),
            peers,
            tick_period: Duration::from_secs(1) / tick_rate.max(1),
            run_duration,
            queue,
            outbound,
            log,
            ticks,
            rng,
            chooser,
            state: LoopState::Running,
            stop: StopSignal::new(),
            report: LoopReport {
                id,
                ..LoopReport::default()
            },
        }
    }

    /// Start from a given clock value instead of zero
    pub fn with_clock(mut self, clock: LamportClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn clock(&self) -> u64 {
        self.clock.value()
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn peers(&self) -> &[Peer] {
        &self.peers
    }

    pub fn tick_period(&self) -> Duration {
        self.tick_period
    }

    pub fn queue(&self) -> &InboundQueue {
        &self.queue
    }

    pub fn log(&self) -> &EventLog<W> {
        &self.log
    }

    pub fn ticks(&self) -> &T {
        &self.ticks
    }

    /// Counters so far
    pub fn report(&self) -> LoopReport {
        LoopReport {
            final_clock: self.clock.value(),
            ..self.report.clone()
        }
    }

    /// Handle that requests early termination at the next tick boundary
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Run one tick without sleeping
    pub fn step(&mut self) -> DriftResult<TickOutcome> {
        let now = self.ticks.now();
        self.report.ticks += 1;

        if let Some((message, queue_len)) = self.queue.pop() {
            return self.receive(message, queue_len, now);
        }

        match self.chooser.choose(&mut self.rng) {
            Action::SendFirst => self.send_to_index(0, now),
            Action::SendSecond => self.send_to_index(1, now),
            Action::Broadcast => {
                let targets: Vec<Peer> = self.peers.clone();
                self.send_to(&targets, now)
            }
            Action::Internal => {
                let clock = self.clock.tick_internal_or_send();
                self.log.append(&LogEvent::internal(now, clock))?;
                self.report.internals += 1;
                tracing::trace!(node = %self.id, clock, "internal event");
                Ok(TickOutcome::Internal { clock })
            }
        }
    }

    fn receive(
        &mut self,
        message: Message,
        queue_len: usize,
        now: WallTime,
    ) -> DriftResult<TickOutcome> {
        let clock = self.clock.tick_receive(message.clock);
        self.log
            .append(&LogEvent::receive(message.sender, queue_len, now, clock))?;
        self.report.receives += 1;
        tracing::trace!(
            node = %self.id,
            from = ?message.sender,
            received = message.clock,
            clock,
            "receive event"
        );
        Ok(TickOutcome::Received {
            from: message.sender,
            clock,
        })
    }

    fn send_to_index(&mut self, index: usize, now: WallTime) -> DriftResult<TickOutcome> {
        match self.peers.get(index) {
            Some(peer) => {
                let peer = *peer;
                self.send_to(&[peer], now)
            }
            None => {
                self.report.idles += 1;
                Ok(TickOutcome::Idle)
            }
        }
    }

    /// One clock increment for the whole batch, then one message per target
    fn send_to(&mut self, targets: &[Peer], now: WallTime) -> DriftResult<TickOutcome> {
        if targets.is_empty() {
            self.report.idles += 1;
            return Ok(TickOutcome::Idle);
        }

        let clock = self.clock.tick_internal_or_send();
        let message = Message::new(self.id, clock);
        for peer in targets {
            self.outbound.send(peer, message);
        }

        let to: Vec<NodeId> = targets.iter().map(|p| p.id).collect();
        self.log.append(&LogEvent::send(to.clone(), now, clock))?;
        self.report.sends += 1;
        self.report.messages_sent += targets.len() as u64;
        tracing::trace!(node = %self.id, ?to, clock, "send event");
        Ok(TickOutcome::Sent { to, clock })
    }

    /// Tick until the run duration elapses or a stop is requested, then shut
    /// the listener down. Log write failures end the run early.
    pub async fn run(&mut self, listener: Option<ListenerHandle>) -> DriftResult<LoopReport> {
        let started = self.ticks.elapsed();
        let result = self.tick_until_deadline(started).await;

        self.state = LoopState::Stopping;
        tracing::debug!(node = %self.id, "event loop stopping");
        if let Some(listener) = listener {
            listener.shutdown().await?;
        }
        self.state = LoopState::Stopped;

        result?;
        Ok(self.report())
    }

    async fn tick_until_deadline(&mut self, started: Duration) -> DriftResult<()> {
        while self.state == LoopState::Running {
            if self.stop.is_raised()
                || self.ticks.elapsed().saturating_sub(started) >= self.run_duration
            {
                break;
            }

            self.step()?;

            let pause = self.ticks.advance(self.tick_period);
            if !pause.is_zero() {
                tokio::time::sleep(pause).await;
            }
        }
        Ok(())
    }
}

impl<T: TickSource, W: Write> std::fmt::Debug for EventLoop<T, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLoop")
            .field("id", &self.id)
            .field("clock", &self.clock)
            .field("peers", &self.peers)
            .field("state", &self.state)
            .finish()
    }
}
