//! The poll scheduler.
//!
//! Ticker and fetch tasks never touch state: they only send [`Tick`]s and
//! [`Completion`]s back over mpsc channels. The scheduler is the only owner
//! of [`SessionContext`] and applies every result from its own loop, so the
//! reconcile step and the events it produces are never interleaved.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::{timeout, Instant};
use tracing::{debug, error, info, warn};

use super::ticker::{PollHandle, Tick, TickKind};
use crate::buffer::{notification_preview, render_snapshot};
use crate::config::PollConfig;
use crate::error::RelayError;
use crate::model::{Channel, ChannelId, GuildId, Message};
use crate::protocol::{BackendAction, GuiEvent, UserAction};
use crate::reconcile::{reconcile, ReconcileOutcome};
use crate::relay::MessageRelay;
use crate::render::ContentRenderer;
use crate::session::{ActiveSession, SessionContext};
use crate::typing::TypingDebouncer;
use crate::validation::{sanitize_message, validate_message, validate_snowflake};

/// How long the loop waits for work before checking for front-end actions.
const ACTION_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Who asked for a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOrigin {
    Active { generation: u64 },
    Sweep,
}

/// Result of a relay call made off the loop.
#[derive(Debug)]
pub enum Completion {
    Fetch {
        channel_id: ChannelId,
        origin: FetchOrigin,
        result: Result<Vec<Message>, RelayError>,
    },
    Sent {
        channel_id: ChannelId,
        generation: u64,
        result: Result<Message, RelayError>,
    },
    Typing {
        channel_id: ChannelId,
        result: Result<(), RelayError>,
    },
    Closed {
        channel_id: ChannelId,
        result: Result<(), RelayError>,
    },
    DmOpened {
        result: Result<Channel, RelayError>,
    },
    GuildChannels {
        guild_id: GuildId,
        result: Result<Vec<Channel>, RelayError>,
    },
}

#[derive(Debug)]
pub enum Inbound {
    Tick(Tick),
    Completion(Completion),
}

/// Receiving ends of the scheduler's channels.
///
/// Kept apart from [`PollScheduler`] so the loop can await the inbox while
/// holding `&mut` to the scheduler.
pub struct SchedulerInbox {
    ticks: UnboundedReceiver<Tick>,
    completions: UnboundedReceiver<Completion>,
}

impl SchedulerInbox {
    /// Next unit of work. Completions win over ticks.
    pub async fn next(&mut self) -> Option<Inbound> {
        tokio::select! {
            biased;
            Some(done) = self.completions.recv() => Some(Inbound::Completion(done)),
            Some(tick) = self.ticks.recv() => Some(Inbound::Tick(tick)),
            else => None,
        }
    }

    pub fn try_next(&mut self) -> Option<Inbound> {
        if let Ok(done) = self.completions.try_recv() {
            return Some(Inbound::Completion(done));
        }
        self.ticks.try_recv().ok().map(Inbound::Tick)
    }
}

pub struct PollScheduler {
    relay: Arc<dyn MessageRelay>,
    config: PollConfig,
    ctx: SessionContext,
    renderer: ContentRenderer,
    typing: TypingDebouncer,
    /// Channels with a fetch outstanding.
    in_flight: HashSet<ChannelId>,
    /// Channels left to visit in the current sweep.
    sweep_queue: VecDeque<ChannelId>,
    sweep_in_flight: Option<ChannelId>,
    sweep_handle: Option<PollHandle>,
    tick_tx: UnboundedSender<Tick>,
    completion_tx: UnboundedSender<Completion>,
    event_tx: Sender<GuiEvent>,
}

impl PollScheduler {
    pub fn new(
        relay: Arc<dyn MessageRelay>,
        config: PollConfig,
        event_tx: Sender<GuiEvent>,
    ) -> (Self, SchedulerInbox) {
        let (tick_tx, ticks) = mpsc::unbounded_channel();
        let (completion_tx, completions) = mpsc::unbounded_channel();
        let typing = TypingDebouncer::new(config.typing_window);
        let scheduler = Self {
            relay,
            config,
            ctx: SessionContext::new(),
            renderer: ContentRenderer::default(),
            typing,
            in_flight: HashSet::new(),
            sweep_queue: VecDeque::new(),
            sweep_in_flight: None,
            sweep_handle: None,
            tick_tx,
            completion_tx,
            event_tx,
        };
        (scheduler, SchedulerInbox { ticks, completions })
    }

    /// Bootstrap, then process actions, ticks and completions until
    /// shutdown or until the front end goes away.
    pub async fn run(mut self, mut inbox: SchedulerInbox, action_rx: Receiver<BackendAction>) {
        if let Err(e) = self.bootstrap().await {
            error!(error = %e, "bootstrap failed");
            self.emit(GuiEvent::Fatal(format!("Could not reach the relay: {}", e)));
            return;
        }

        loop {
            // Check for actions from the front end (non-blocking)
            loop {
                match action_rx.try_recv() {
                    Ok(action) => {
                        if !self.handle_action(action) {
                            info!("backend shutting down");
                            return;
                        }
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        info!("front end disconnected, stopping backend");
                        return;
                    }
                }
            }

            // Wait for work with a short timeout so actions stay responsive
            match timeout(ACTION_POLL_INTERVAL, inbox.next()).await {
                Ok(Some(item)) => self.dispatch(item),
                Ok(None) => return,
                Err(_) => {}
            }
        }
    }

    /// Load the user, DMs and guilds, then start the background sweep.
    ///
    /// Only a failure to identify the user is fatal; list failures are
    /// reported and leave the list empty.
    pub async fn bootstrap(&mut self) -> Result<(), RelayError> {
        let me = self.relay.current_user().await?;
        info!(user = %me.username, "signed in through relay");
        self.renderer = ContentRenderer::new(Some(me.id.clone()));
        let username = me.shown_name().to_string();
        self.ctx.me = Some(me);

        match self.relay.list_dm_channels().await {
            Ok(dms) => self.ctx.set_dms(dms),
            Err(e) => {
                warn!(error = %e, "failed to load DM channels");
                self.emit(GuiEvent::Error(format!("Failed to load DMs: {}", e)));
            }
        }
        let dms = self.ctx.dm_channels().into_iter().cloned().collect();
        self.emit(GuiEvent::DmsLoaded(dms));

        match self.relay.list_guilds().await {
            Ok(guilds) => self.ctx.guilds = guilds,
            Err(e) => {
                warn!(error = %e, "failed to load guilds");
                self.emit(GuiEvent::Error(format!("Failed to load servers: {}", e)));
            }
        }
        self.emit(GuiEvent::GuildsLoaded(self.ctx.guilds.clone()));
        self.emit(GuiEvent::Ready { username });

        self.sweep_handle = Some(PollHandle::spawn(
            TickKind::Sweep,
            0,
            self.config.sweep_interval,
            self.tick_tx.clone(),
        ));
        Ok(())
    }

    pub fn dispatch(&mut self, item: Inbound) {
        match item {
            Inbound::Tick(tick) => self.handle_tick(tick),
            Inbound::Completion(done) => self.handle_completion(done),
        }
    }

    /// Apply one front-end action. Returns false on shutdown.
    pub fn handle_action(&mut self, action: BackendAction) -> bool {
        match action {
            BackendAction::SelectChannel(channel_id) => self.select_channel(channel_id),
            BackendAction::SelectGuild(guild_id) => self.load_guild(guild_id),
            BackendAction::CloseChannel(channel_id) => self.close_channel(channel_id),
            BackendAction::SendMessage { text } => self.send_message(text),
            BackendAction::InputChanged { text } => self.input_changed(&text),
            BackendAction::OpenDm { recipient_id } => self.open_dm(recipient_id),
            BackendAction::Shutdown => {
                self.ctx.active = None;
                self.sweep_handle = None;
                return false;
            }
        }
        true
    }

    fn emit(&self, event: GuiEvent) {
        let _ = self.event_tx.send(event);
    }

    fn fail(&self, action: UserAction, message: impl Into<String>) {
        let message = message.into();
        warn!(%action, %message, "user action failed");
        self.emit(GuiEvent::ActionFailed { action, message });
    }

    // --- ticks -------------------------------------------------------------

    fn handle_tick(&mut self, tick: Tick) {
        match tick.kind {
            TickKind::Sweep => self.start_sweep(),
            TickKind::Active | TickKind::Refetch => {
                let current = self
                    .ctx
                    .active
                    .as_ref()
                    .is_some_and(|s| s.generation == tick.generation);
                if !current {
                    debug!(generation = tick.generation, "dropping tick of ended session");
                    return;
                }
                self.fetch_active();
            }
        }
    }

    fn fetch_active(&mut self) {
        let Some(session) = self.ctx.active.as_mut() else {
            return;
        };
        let channel_id = session.channel_id.clone();
        if self.in_flight.contains(&channel_id) {
            debug!(channel = %channel_id, "fetch already in flight, deferring");
            session.fetch_pending = true;
            return;
        }
        session.fetch_pending = false;
        let origin = FetchOrigin::Active {
            generation: session.generation,
        };
        self.spawn_fetch(channel_id, origin, self.config.message_limit);
    }

    fn spawn_fetch(&mut self, channel_id: ChannelId, origin: FetchOrigin, limit: u32) {
        debug!(channel = %channel_id, ?origin, limit, "fetching messages");
        self.in_flight.insert(channel_id.clone());
        let relay = Arc::clone(&self.relay);
        let tx = self.completion_tx.clone();
        tokio::spawn(async move {
            let result = relay.fetch_messages(&channel_id, limit, None).await;
            let _ = tx.send(Completion::Fetch {
                channel_id,
                origin,
                result,
            });
        });
    }

    fn start_sweep(&mut self) {
        if self.sweep_in_flight.is_some() || !self.sweep_queue.is_empty() {
            debug!("previous sweep still running, skipping tick");
            return;
        }
        self.sweep_queue = self
            .ctx
            .sweep_targets(self.config.sweep_guild_channels)
            .into();
        debug!(channels = self.sweep_queue.len(), "starting background sweep");
        self.advance_sweep();
    }

    /// Issue the next sweep fetch, or finish the sweep when none are left.
    fn advance_sweep(&mut self) {
        while let Some(channel_id) = self.sweep_queue.pop_front() {
            if self.ctx.is_active(&channel_id)
                || !self.ctx.channels.contains_key(&channel_id)
                || self.in_flight.contains(&channel_id)
            {
                continue;
            }
            self.sweep_in_flight = Some(channel_id.clone());
            self.spawn_fetch(channel_id, FetchOrigin::Sweep, 1);
            return;
        }
        self.sweep_in_flight = None;
        self.emit_dm_order_if_dirty();
    }

    fn emit_dm_order_if_dirty(&mut self) {
        if let Some(order) = self.ctx.resort_dms_if_dirty() {
            debug!(dms = order.len(), "DM order changed");
            self.emit(GuiEvent::DmOrderChanged(order));
        }
    }

    // --- completions -------------------------------------------------------

    fn handle_completion(&mut self, done: Completion) {
        match done {
            Completion::Fetch {
                channel_id,
                origin,
                result,
            } => {
                self.in_flight.remove(&channel_id);
                match origin {
                    FetchOrigin::Active { generation } => {
                        self.on_active_fetch(&channel_id, generation, result)
                    }
                    FetchOrigin::Sweep => self.on_sweep_fetch(&channel_id, result),
                }
                let pending = self
                    .ctx
                    .active
                    .as_ref()
                    .is_some_and(|s| s.channel_id == channel_id && s.fetch_pending);
                if pending {
                    self.fetch_active();
                }
            }
            Completion::Sent {
                channel_id,
                generation,
                result,
            } => match result {
                Ok(msg) => {
                    info!(channel = %channel_id, message = %msg.id, "message sent");
                    self.emit(GuiEvent::MessageSent {
                        channel_id: channel_id.clone(),
                    });
                    if let Some(session) = self.ctx.active.as_mut() {
                        if session.generation == generation && session.channel_id == channel_id {
                            session.refetch = Some(PollHandle::once(
                                TickKind::Refetch,
                                generation,
                                self.config.send_refetch_delay,
                                self.tick_tx.clone(),
                            ));
                        }
                    }
                }
                Err(e) => self.fail(UserAction::Send, e.to_string()),
            },
            Completion::Typing { channel_id, result } => {
                if let Err(e) = result {
                    debug!(channel = %channel_id, "typing signal failed");
                    self.fail(UserAction::Typing, e.to_string());
                }
            }
            Completion::Closed { channel_id, result } => match result {
                Ok(()) => self.finish_close(channel_id),
                Err(e) => self.fail(UserAction::Close, e.to_string()),
            },
            Completion::DmOpened { result } => match result {
                Ok(channel) => {
                    let channel_id = channel.id.clone();
                    if self.ctx.add_dm(channel.clone()) {
                        self.emit(GuiEvent::DmOpened(channel));
                    }
                    self.select_channel(channel_id);
                }
                Err(e) => self.fail(UserAction::OpenDm, e.to_string()),
            },
            Completion::GuildChannels { guild_id, result } => match result {
                Ok(channels) => {
                    info!(guild = %guild_id, channels = channels.len(), "guild channels loaded");
                    self.ctx.set_guild_channels(&guild_id, channels.clone());
                    self.emit(GuiEvent::GuildChannelsLoaded { guild_id, channels });
                }
                Err(e) => self.fail(UserAction::LoadGuild, e.to_string()),
            },
        }
    }

    fn on_active_fetch(
        &mut self,
        channel_id: &ChannelId,
        generation: u64,
        result: Result<Vec<Message>, RelayError>,
    ) {
        if !self.ctx.is_current(channel_id, generation) {
            debug!(channel = %channel_id, generation, "dropping stale response");
            return;
        }
        let snapshot = match result {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(channel = %channel_id, error = %e, transient = e.is_transient(), "poll failed");
                return;
            }
        };
        let Some(channel) = self.ctx.channels.get(channel_id).cloned() else {
            return;
        };

        let self_id = self.ctx.self_id().to_string();
        let state = self.ctx.notifications.entry(channel_id);
        let outcome = reconcile(&channel, &snapshot, state, true, &self_id);

        let first_render = self.ctx.active.as_ref().is_some_and(|s| !s.rendered);
        if outcome == ReconcileOutcome::NoChange && !first_render {
            return;
        }

        let messages = render_snapshot(&snapshot, &self.renderer);
        debug!(channel = %channel_id, count = messages.len(), "rendering channel");
        self.emit(GuiEvent::MessagesRendered {
            channel_id: channel_id.clone(),
            messages,
        });
        if let Some(session) = self.ctx.active.as_mut() {
            session.rendered = true;
        }

        let ReconcileOutcome::Changed(delta) = outcome else {
            return;
        };
        if delta.timestamp_changed && channel.is_dm() {
            self.ctx.sorter.mark_dirty();
        }
        if delta.resort_dms {
            self.emit_dm_order_if_dirty();
        }
        // Messages that were already there when the channel opened are
        // history, not news.
        if first_render {
            return;
        }
        if let Some(msg) = delta.notify {
            self.emit(GuiEvent::Notification {
                channel_id: channel_id.clone(),
                channel_name: channel.name.clone(),
                author: msg.author.shown_name().to_string(),
                preview: notification_preview(&msg.content),
            });
        }
    }

    fn on_sweep_fetch(&mut self, channel_id: &ChannelId, result: Result<Vec<Message>, RelayError>) {
        if self.sweep_in_flight.as_ref() == Some(channel_id) {
            self.sweep_in_flight = None;
        }
        self.apply_sweep_result(channel_id, result);
        if self.sweep_in_flight.is_none() {
            self.advance_sweep();
        }
    }

    fn apply_sweep_result(&mut self, channel_id: &ChannelId, result: Result<Vec<Message>, RelayError>) {
        if self.ctx.is_active(channel_id) {
            debug!(channel = %channel_id, "channel became active, dropping sweep result");
            return;
        }
        let Some(channel) = self.ctx.channels.get(channel_id).cloned() else {
            debug!(channel = %channel_id, "channel closed, dropping sweep result");
            return;
        };
        let snapshot = match result {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(channel = %channel_id, error = %e, transient = e.is_transient(), "sweep fetch failed");
                return;
            }
        };

        let self_id = self.ctx.self_id().to_string();
        let state = self.ctx.notifications.entry(channel_id);
        let ReconcileOutcome::Changed(delta) = reconcile(&channel, &snapshot, state, false, &self_id)
        else {
            return;
        };
        let unread = state.unread_count;

        if delta.timestamp_changed && channel.is_dm() {
            self.ctx.sorter.mark_dirty();
        }
        if delta.badge_update {
            debug!(channel = %channel_id, unread, "new unread messages");
            self.emit(GuiEvent::UnreadChanged {
                channel_id: channel_id.clone(),
                count: unread,
            });
        }
        if delta.resort_dms {
            self.emit_dm_order_if_dirty();
        }
    }

    // --- actions -----------------------------------------------------------

    fn select_channel(&mut self, channel_id: ChannelId) {
        let Some(channel) = self.ctx.channels.get(&channel_id) else {
            self.fail(UserAction::Select, format!("Unknown channel {}", channel_id));
            return;
        };
        if self.ctx.is_active(&channel_id) {
            return;
        }
        let name = channel.name.clone();

        if let Some(previous) = self.ctx.active.take() {
            previous.handle.cancel();
            self.ctx
                .notifications
                .entry(&previous.channel_id)
                .on_deactivated();
        }

        // Unread is cleared before anything is fetched
        self.ctx.notifications.clear_unread(&channel_id);
        self.emit(GuiEvent::UnreadChanged {
            channel_id: channel_id.clone(),
            count: 0,
        });

        let generation = self.ctx.next_generation();
        let handle = PollHandle::spawn(
            TickKind::Active,
            generation,
            self.config.active_interval,
            self.tick_tx.clone(),
        );
        self.ctx.active = Some(ActiveSession {
            channel_id: channel_id.clone(),
            generation,
            handle,
            refetch: None,
            rendered: false,
            fetch_pending: false,
        });
        self.sweep_queue.retain(|id| id != &channel_id);

        info!(channel = %channel_id, generation, "channel activated");
        self.emit(GuiEvent::ActiveChannelChanged { channel_id, name });
    }

    fn load_guild(&mut self, guild_id: GuildId) {
        if !self.ctx.guilds.iter().any(|g| g.id == guild_id) {
            self.fail(UserAction::LoadGuild, format!("Unknown server {}", guild_id));
            return;
        }
        let relay = Arc::clone(&self.relay);
        let tx = self.completion_tx.clone();
        tokio::spawn(async move {
            let result = relay.list_channels(&guild_id).await;
            let _ = tx.send(Completion::GuildChannels { guild_id, result });
        });
    }

    fn close_channel(&mut self, channel_id: ChannelId) {
        let Some(channel) = self.ctx.channels.get(&channel_id) else {
            self.fail(UserAction::Close, format!("Unknown channel {}", channel_id));
            return;
        };
        if !channel.is_dm() {
            self.finish_close(channel_id);
            return;
        }
        let relay = Arc::clone(&self.relay);
        let tx = self.completion_tx.clone();
        tokio::spawn(async move {
            let result = relay.close_channel(&channel_id).await;
            let _ = tx.send(Completion::Closed { channel_id, result });
        });
    }

    fn finish_close(&mut self, channel_id: ChannelId) {
        if self.ctx.is_active(&channel_id) {
            self.ctx.active = None;
            self.emit(GuiEvent::ActiveChannelCleared);
        }
        self.ctx.remove_channel(&channel_id);
        self.typing.forget(&channel_id);
        self.sweep_queue.retain(|id| id != &channel_id);
        info!(channel = %channel_id, "channel closed");
        self.emit(GuiEvent::ChannelClosed(channel_id));
    }

    fn send_message(&mut self, text: String) {
        let Some(session) = self.ctx.active.as_ref() else {
            self.fail(UserAction::Send, "No active channel");
            return;
        };
        let text = sanitize_message(&text);
        if let Err(e) = validate_message(&text) {
            self.fail(UserAction::Send, e);
            return;
        }
        let channel_id = session.channel_id.clone();
        let generation = session.generation;
        let relay = Arc::clone(&self.relay);
        let tx = self.completion_tx.clone();
        tokio::spawn(async move {
            let result = relay.send_message(&channel_id, &text).await;
            let _ = tx.send(Completion::Sent {
                channel_id,
                generation,
                result,
            });
        });
    }

    fn input_changed(&mut self, text: &str) {
        let Some(session) = self.ctx.active.as_ref() else {
            return;
        };
        let channel_id = session.channel_id.clone();
        if !self.typing.notify_typing(&channel_id, text, Instant::now()) {
            return;
        }
        let relay = Arc::clone(&self.relay);
        let tx = self.completion_tx.clone();
        tokio::spawn(async move {
            let result = relay.send_typing(&channel_id).await;
            let _ = tx.send(Completion::Typing { channel_id, result });
        });
    }

    fn open_dm(&mut self, recipient_id: String) {
        let recipient_id = recipient_id.trim().to_string();
        if let Err(e) = validate_snowflake(&recipient_id) {
            self.fail(UserAction::OpenDm, e);
            return;
        }
        let relay = Arc::clone(&self.relay);
        let tx = self.completion_tx.clone();
        tokio::spawn(async move {
            let result = relay.open_dm(&recipient_id).await;
            let _ = tx.send(Completion::DmOpened { result });
        });
    }
}
