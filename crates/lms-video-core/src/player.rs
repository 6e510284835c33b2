//! Player context - one per video embed
//!
//! Owns the shared state, the typed event bus, the virtual clock and the
//! attached widgets. Widgets never see each other; they reach the player
//! through [`Context`] while handling an event or a timer.

use crate::analytics::{AnalyticsSink, Logger, TracingSink};
use crate::backend::MediaBackend;
use crate::error::{Error, Result};
use crate::events::{EventBus, EventKind, PlayerEvent, SeekKind};
use crate::grading::{GraderCollection, GraderKind, GraderSeeds};
use crate::scheduler::{Scheduler, Timer, TimerHandle, TimerTag};
use crate::storage::{KeyValueStorage, MemoryStorage};
use crate::time;
use crate::types::{ClipBounds, PlayerConfig};
use crate::widgets::{EventsPlugin, PlaybackControls, PlayerWidget, ProgressSlider, QualityControl, WidgetKind};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Playback state shared by all widgets
#[derive(Debug, Clone)]
pub struct PlayerState {
    config: PlayerConfig,
    current_time: f64,
    duration: f64,
    speed: f64,
    playing: bool,
    captions_hidden: bool,
    end_time_reached: bool,
    destroyed: bool,
}

impl PlayerState {
    fn new(config: PlayerConfig, duration: f64) -> Self {
        Self {
            speed: config.speed,
            captions_hidden: !config.captions_visible,
            current_time: 0.0,
            duration: sanitize_duration(duration),
            playing: false,
            end_time_reached: false,
            destroyed: false,
            config,
        }
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    /// Media position in seconds
    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    /// Media duration in seconds, 0 while unknown
    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn captions_hidden(&self) -> bool {
        self.captions_hidden
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn is_youtube(&self) -> bool {
        self.config.source.is_youtube()
    }

    /// Clip bounds against the current duration
    pub fn clip(&self) -> ClipBounds {
        ClipBounds::resolve(&self.config, self.duration)
    }

    /// Length of the configured clip
    pub fn clip_duration(&self) -> f64 {
        self.clip().duration_within(self.duration)
    }

    /// Elapsed time within the clip
    pub fn elapsed(&self, time: f64) -> f64 {
        self.clip().elapsed(time)
    }
}

fn sanitize_duration(duration: f64) -> f64 {
    if duration.is_finite() && duration > 0.0 {
        duration.floor()
    } else {
        0.0
    }
}

/// Notification for an asynchronous collaborator (grade reporter)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outbound {
    /// A grader resolved
    Graded { grader: GraderKind },
    /// A grader timeline changed and should be persisted server-side
    SaveProgress { grader: GraderKind, timeline: Vec<u8> },
}

/// Everything but the widgets
pub(crate) struct Shared {
    state: PlayerState,
    bus: EventBus,
    scheduler: Scheduler,
    backend: Box<dyn MediaBackend>,
    logger: Logger,
    storage: Box<dyn KeyValueStorage>,
    outbound: Vec<Outbound>,
}

/// A widget's view of the player while it handles an event or timer
pub struct Context<'a> {
    shared: &'a mut Shared,
    owner: WidgetKind,
}

impl<'a> Context<'a> {
    fn new(shared: &'a mut Shared, owner: WidgetKind) -> Self {
        Self { shared, owner }
    }

    pub fn owner(&self) -> WidgetKind {
        self.owner
    }

    pub fn state(&self) -> &PlayerState {
        &self.shared.state
    }

    /// Current virtual time
    pub fn now(&self) -> Duration {
        self.shared.scheduler.now()
    }

    /// Queue an event; it is dispatched after the current one
    pub fn trigger(&mut self, event: PlayerEvent) {
        self.shared.bus.push(event);
    }

    /// Schedule a timer owned by this widget
    pub fn schedule(&mut self, delay: Duration, tag: TimerTag) -> TimerHandle {
        self.shared.scheduler.schedule(self.owner, delay, tag)
    }

    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        self.shared.scheduler.cancel(handle)
    }

    pub fn is_pending(&self, handle: TimerHandle) -> bool {
        self.shared.scheduler.is_pending(handle)
    }

    pub fn backend(&mut self) -> &mut dyn MediaBackend {
        self.shared.backend.as_mut()
    }

    /// Send an analytics record
    pub fn log(&mut self, event_name: &str, payload: Map<String, Value>) {
        self.shared.logger.log(event_name, payload);
    }

    pub fn storage(&self) -> &dyn KeyValueStorage {
        self.shared.storage.as_ref()
    }

    pub fn storage_mut(&mut self) -> &mut dyn KeyValueStorage {
        self.shared.storage.as_mut()
    }

    /// Queue a notification for the grade reporter
    pub fn notify(&mut self, outbound: Outbound) {
        self.shared.outbound.push(outbound);
    }

    /// Replace this widget's subscriptions
    pub fn set_subscriptions(&mut self, kinds: &[EventKind]) {
        self.shared.bus.resubscribe(self.owner, kinds);
    }

    pub fn unsubscribe(&mut self, kind: EventKind) {
        self.shared.bus.unsubscribe(self.owner, kind);
    }
}

/// Builder for [`Player`]
pub struct PlayerBuilder {
    config: PlayerConfig,
    backend: Option<Box<dyn MediaBackend>>,
    sink: Option<Box<dyn AnalyticsSink>>,
    storage: Option<Box<dyn KeyValueStorage>>,
}

impl PlayerBuilder {
    pub fn backend(mut self, backend: impl MediaBackend + 'static) -> Self {
        self.backend = Some(Box::new(backend));
        self
    }

    /// Analytics sink, [`TracingSink`] by default
    pub fn sink(mut self, sink: impl AnalyticsSink + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    /// Local storage, an empty [`MemoryStorage`] by default
    pub fn storage(mut self, storage: impl KeyValueStorage + 'static) -> Self {
        self.storage = Some(Box::new(storage));
        self
    }

    pub fn build(self) -> Result<Player> {
        self.config.validate()?;
        let backend = self
            .backend
            .ok_or_else(|| Error::config("a media backend is required"))?;

        let state = PlayerState::new(self.config, backend.duration());
        info!(id = %state.config.id, code = state.config.source.code(), duration = state.duration, "Player created");

        Ok(Player {
            shared: Shared {
                state,
                bus: EventBus::new(),
                scheduler: Scheduler::new(),
                backend,
                logger: Logger::new(self.sink.unwrap_or_else(|| Box::new(TracingSink))),
                storage: self.storage.unwrap_or_else(|| Box::new(MemoryStorage::new())),
                outbound: Vec::new(),
            },
            widgets: Vec::new(),
        })
    }
}

/// One video player instance
pub struct Player {
    shared: Shared,
    widgets: Vec<Box<dyn PlayerWidget>>,
}

impl Player {
    pub fn builder(config: PlayerConfig) -> PlayerBuilder {
        PlayerBuilder {
            config,
            backend: None,
            sink: None,
            storage: None,
        }
    }

    pub fn state(&self) -> &PlayerState {
        &self.shared.state
    }

    /// Current virtual time
    pub fn now(&self) -> Duration {
        self.shared.scheduler.now()
    }

    /// Attach a widget, registering its subscriptions and running its `init`
    pub fn attach(&mut self, mut widget: Box<dyn PlayerWidget>) -> Result<()> {
        if self.shared.state.destroyed {
            return Err(Error::Destroyed);
        }
        let kind = widget.kind();
        if self.has_widget(kind) {
            return Err(Error::WidgetAlreadyAttached { kind });
        }

        self.shared.bus.subscribe(kind, &widget.subscriptions());
        widget.init(&mut Context::new(&mut self.shared, kind));
        self.widgets.push(widget);
        debug!(%kind, "Widget attached");

        self.flush();
        Ok(())
    }

    /// Attach the standard widget set for this configuration
    pub fn install_default_widgets(&mut self, seeds: &GraderSeeds) -> Result<()> {
        self.attach(Box::new(ProgressSlider::new()))?;
        self.attach(Box::new(PlaybackControls::new(self.state().config())))?;

        match QualityControl::new(self.state()) {
            Some(quality) => self.attach(Box::new(quality))?,
            None => debug!("Quality control not applicable"),
        }

        self.attach(Box::new(EventsPlugin::new()))?;

        if let Some(graders) = GraderCollection::new(self.state(), seeds) {
            self.attach(Box::new(graders))?;
        }
        Ok(())
    }

    pub fn has_widget(&self, kind: WidgetKind) -> bool {
        self.widgets.iter().any(|w| w.kind() == kind)
    }

    /// Attached widget of type `W`
    pub fn widget<W: PlayerWidget>(&self) -> Option<&W> {
        self.widgets.iter().find_map(|w| w.as_any().downcast_ref::<W>())
    }

    /// Destroy and remove a widget with all its listeners and timers
    pub fn detach(&mut self, kind: WidgetKind) -> bool {
        let Some(index) = self.widgets.iter().position(|w| w.kind() == kind) else {
            return false;
        };

        let mut widget = self.widgets.remove(index);
        widget.destroy(&mut Context::new(&mut self.shared, kind));
        self.shared.bus.unsubscribe_all(kind);
        let cancelled = self.shared.scheduler.cancel_owned_by(kind);

        debug!(%kind, cancelled, "Widget detached");
        true
    }

    /// Dispatch an event and everything it triggers
    pub fn emit(&mut self, event: PlayerEvent) {
        if self.shared.state.destroyed {
            debug!(event = ?event.kind(), "Ignoring event on destroyed player");
            return;
        }
        self.shared.bus.push(event);
        self.flush();
    }

    /// Move the virtual clock forward, firing due timers in order
    pub fn advance(&mut self, dt: Duration) {
        if self.shared.state.destroyed {
            return;
        }

        let target = self.shared.scheduler.now() + dt;
        while let Some((_, timer)) = self.shared.scheduler.pop_due(target) {
            self.fire(timer);
            self.flush();
        }
        self.shared.scheduler.advance_to(target);
    }

    /// Periodic time sync with the backend
    #[instrument(skip(self), level = "debug")]
    pub fn sync_time(&mut self) {
        if self.shared.state.destroyed {
            return;
        }
        self.refresh_duration();

        let time = self.shared.backend.current_time();
        if !time.is_finite() {
            warn!(time, "Backend reported a non-finite time");
            return;
        }

        let Shared { state, bus, backend, .. } = &mut self.shared;
        state.current_time = time;
        bus.push(PlayerEvent::TimeUpdate { time, duration: state.duration });
        if state.playing {
            bus.push(PlayerEvent::Progress { time });
        }

        let clip = state.clip();
        if let Some(end) = clip.end {
            if clip.is_partial(state.duration) && time >= end && !state.end_time_reached {
                info!(end, "Clip end reached");
                state.end_time_reached = true;
                backend.pause();
                bus.push(PlayerEvent::EndTimeReached);
            }
        }

        self.flush();
    }

    /// Change the playback speed
    #[instrument(skip(self))]
    pub fn set_speed(&mut self, new_speed: f64) {
        if self.shared.state.destroyed {
            return;
        }
        if !new_speed.is_finite() || new_speed <= 0.0 {
            warn!(new_speed, "Ignoring invalid speed");
            return;
        }

        let old_speed = self.shared.state.speed;
        if old_speed == new_speed {
            return;
        }

        if self.shared.backend.reports_scaled_time() {
            let state = &mut self.shared.state;
            state.current_time = time::convert(state.current_time, old_speed, new_speed);
        }
        self.emit(PlayerEvent::SpeedChange { new_speed, old_speed });
    }

    /// Tear the player down; later events are ignored
    #[instrument(skip(self))]
    pub fn destroy(&mut self) {
        self.emit(PlayerEvent::Destroy);
    }

    pub fn listener_count(&self) -> usize {
        self.shared.bus.listener_count()
    }

    pub fn listener_count_for(&self, kind: WidgetKind) -> usize {
        self.shared.bus.listener_count_for(kind)
    }

    pub fn pending_timers(&self) -> usize {
        self.shared.scheduler.pending()
    }

    pub fn pending_timers_for(&self, kind: WidgetKind) -> usize {
        self.shared.scheduler.pending_for(kind)
    }

    /// Drain notifications queued for asynchronous collaborators
    pub fn take_outbound(&mut self) -> Vec<Outbound> {
        std::mem::take(&mut self.shared.outbound)
    }

    /// Dispatch queued events, then zero-delay timers, until quiescent
    fn flush(&mut self) {
        loop {
            while let Some(event) = self.shared.bus.pop() {
                self.dispatch(event);
            }
            if self.shared.state.destroyed {
                return;
            }

            let now = self.shared.scheduler.now();
            match self.shared.scheduler.pop_due(now) {
                Some((_, timer)) => self.fire(timer),
                None => return,
            }
        }
    }

    fn dispatch(&mut self, event: PlayerEvent) {
        if self.shared.state.destroyed {
            return;
        }
        let kind = event.kind();
        debug!(event = ?kind, "Dispatch");

        self.handle_builtin(&event);

        let Self { shared, widgets } = self;
        for owner in shared.bus.listeners_for(kind) {
            // An earlier listener may have unsubscribed it
            if !shared.bus.is_subscribed(owner, kind) {
                continue;
            }
            if let Some(widget) = widgets.iter_mut().find(|w| w.kind() == owner) {
                widget.handle(&event, &mut Context::new(shared, owner));
            }
        }

        if kind == EventKind::Destroy {
            self.teardown();
        }
    }

    fn fire(&mut self, timer: Timer) {
        let Self { shared, widgets } = self;
        match widgets.iter_mut().find(|w| w.kind() == timer.owner) {
            Some(widget) => {
                debug!(owner = %timer.owner, tag = ?timer.tag, "Timer fired");
                widget.on_timer(timer.tag, &mut Context::new(shared, timer.owner));
            }
            None => debug!(owner = %timer.owner, "Timer owner is gone"),
        }
    }

    fn handle_builtin(&mut self, event: &PlayerEvent) {
        match event {
            PlayerEvent::SeekRequest { time, kind } => self.seek(*time, *kind),
            PlayerEvent::Play => self.shared.state.playing = true,
            PlayerEvent::Pause | PlayerEvent::Stop => self.shared.state.playing = false,
            PlayerEvent::Ended => {
                let state = &mut self.shared.state;
                state.playing = false;
                let duration = state.duration;
                self.shared.bus.push(PlayerEvent::TimeUpdate { time: duration, duration });
            }
            PlayerEvent::SpeedChange { new_speed, .. } => self.shared.state.speed = *new_speed,
            PlayerEvent::CaptionsShown => self.shared.state.captions_hidden = false,
            PlayerEvent::CaptionsHidden => self.shared.state.captions_hidden = true,
            PlayerEvent::Ready => self.refresh_duration(),
            _ => {}
        }
    }

    fn seek(&mut self, time: f64, kind: SeekKind) {
        let Shared { state, bus, backend, .. } = &mut self.shared;
        let duration = state.duration;

        if !time.is_finite() || time < 0.0 || (duration > 0.0 && time > duration) {
            debug!(time, duration, "Ignoring seek outside the media");
            return;
        }

        let old_time = state.current_time;
        backend.seek_to(time);
        state.current_time = time;

        bus.push(PlayerEvent::Seek { time, old_time, kind });
        bus.push(PlayerEvent::TimeUpdate { time, duration });
    }

    fn refresh_duration(&mut self) {
        let duration = sanitize_duration(self.shared.backend.duration());
        if duration > 0.0 && duration != self.shared.state.duration {
            debug!(duration, "Duration updated");
            self.shared.state.duration = duration;
        }
    }

    fn teardown(&mut self) {
        let kinds: Vec<WidgetKind> = self.widgets.iter().map(|w| w.kind()).collect();
        for kind in kinds {
            self.detach(kind);
        }

        self.shared.scheduler.cancel_all();
        self.shared.bus.clear_queue();
        self.shared.state.destroyed = true;
        self.shared.state.playing = false;

        info!(id = %self.shared.state.config.id, "Player destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendCommand, ScriptedBackend};

    struct Recorder {
        seen: Vec<EventKind>,
    }

    impl PlayerWidget for Recorder {
        fn kind(&self) -> WidgetKind {
            WidgetKind::EventsPlugin
        }

        fn subscriptions(&self) -> Vec<EventKind> {
            vec![EventKind::Seek, EventKind::TimeUpdate, EventKind::Play]
        }

        fn handle(&mut self, event: &PlayerEvent, ctx: &mut Context<'_>) {
            self.seen.push(event.kind());
            if let PlayerEvent::Play = event {
                ctx.trigger(PlayerEvent::SeekRequest { time: 5.0, kind: SeekKind::Other });
            }
        }

        fn as_any(&self) -> &dyn std::any::Any {
            self
        }
    }

    fn player(duration: f64) -> (Player, ScriptedBackend) {
        let backend = ScriptedBackend::new(duration);
        let player = Player::builder(PlayerConfig::default())
            .backend(backend.clone())
            .build()
            .unwrap();
        (player, backend)
    }

    #[test]
    fn test_builder_requires_backend() {
        let result = Player::builder(PlayerConfig::default()).build();
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_triggered_events_are_queued_in_order() {
        let (mut player, backend) = player(60.0);
        player.attach(Box::new(Recorder { seen: Vec::new() })).unwrap();

        player.emit(PlayerEvent::Play);

        let recorder = player.widget::<Recorder>().unwrap();
        assert_eq!(recorder.seen, vec![EventKind::Play, EventKind::Seek, EventKind::TimeUpdate]);
        assert_eq!(backend.commands(), vec![BackendCommand::Seek { time: 5.0 }]);
        assert_eq!(player.state().current_time(), 5.0);
        assert!(player.state().is_playing());
    }

    #[test]
    fn test_duplicate_widget_rejected() {
        let (mut player, _) = player(60.0);
        player.attach(Box::new(Recorder { seen: Vec::new() })).unwrap();
        let err = player.attach(Box::new(Recorder { seen: Vec::new() })).unwrap_err();
        assert!(matches!(err, Error::WidgetAlreadyAttached { kind: WidgetKind::EventsPlugin }));
    }

    #[test]
    fn test_seek_outside_media_ignored() {
        let (mut player, backend) = player(60.0);
        player.emit(PlayerEvent::SeekRequest { time: 61.0, kind: SeekKind::Other });
        player.emit(PlayerEvent::SeekRequest { time: f64::NAN, kind: SeekKind::Other });
        player.emit(PlayerEvent::SeekRequest { time: -1.0, kind: SeekKind::Other });
        assert!(backend.commands().is_empty());
    }

    #[test]
    fn test_destroy_ignores_later_events() {
        let (mut player, _) = player(60.0);
        player.attach(Box::new(Recorder { seen: Vec::new() })).unwrap();
        player.destroy();

        assert!(player.state().is_destroyed());
        assert_eq!(player.listener_count(), 0);
        assert!(player.widget::<Recorder>().is_none());

        player.emit(PlayerEvent::Play);
        assert!(!player.state().is_playing());
        assert!(matches!(
            player.attach(Box::new(Recorder { seen: Vec::new() })),
            Err(Error::Destroyed)
        ));
    }

    #[test]
    fn test_speed_change_rescales_scaled_time() {
        let (mut player, backend) = player(60.0);
        backend.set_scaled_time(true);
        backend.set_time(30.0);
        player.sync_time();

        player.set_speed(2.0);
        assert_eq!(player.state().speed(), 2.0);
        assert_eq!(player.state().current_time(), 15.0);

        player.set_speed(-1.0);
        assert_eq!(player.state().speed(), 2.0);
    }

    #[test]
    fn test_partial_clip_end_reached_once() {
        let backend = ScriptedBackend::new(60.0);
        let config = PlayerConfig {
            end_time: Some(20.0),
            ..Default::default()
        };
        let mut player = Player::builder(config).backend(backend.clone()).build().unwrap();

        backend.set_time(20.5);
        player.sync_time();
        player.sync_time();

        let pauses = backend
            .commands()
            .into_iter()
            .filter(|c| *c == BackendCommand::Pause)
            .count();
        assert_eq!(pauses, 1);
    }
}
