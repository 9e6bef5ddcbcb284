use std::sync::Arc;

use chrono::Local;
use navigator_data::DataManager;
use navigator_lib::{
    announcement::Announcement,
    itinerary::StopId,
    navigator::{Effect, Event, Navigator},
    notify::{NotificationPermission, Notifier},
    preferences::{AlertPreferences, PreferenceError, Preferences},
    proximity::ProximityAlert,
    route::{Route, RouteRequest},
    speech::{Narrator, SpeechEngine, SpeechSignal},
};
use tokio::sync::mpsc;

use crate::{
    error::ServiceError,
    services::{PositionSource, PositionUpdate, PositionWatch, RouteService, SmsGateway},
    state::{DisplayMessage, DisplayState},
};

/// User controls, from the console or the display endpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Start,
    Stop,
    Skip,
    Select(StopId),
    SetVoice(bool),
    SetAlerts(bool),
    SetRadius(f64),
    SetPhoneNumber(String),
    Shutdown,
}

/// Everything the loop reacts to. Results from background tasks carry the epoch they were
/// started in.
#[derive(Debug)]
pub enum LoopEvent {
    Command(Command),
    Position {
        epoch: u64,
        update: PositionUpdate,
    },
    RouteFetched {
        epoch: u64,
        target: StopId,
        result: Result<Route, String>,
    },
    AdvanceDue {
        epoch: u64,
        from: StopId,
    },
    SmsFinished {
        alert: ProximityAlert,
        delivered: bool,
    },
    Speech(SpeechSignal),
}

#[derive(Clone)]
pub struct RuntimeHandle {
    events: mpsc::UnboundedSender<LoopEvent>,
}

impl RuntimeHandle {
    pub(crate) fn channel() -> (Self, mpsc::UnboundedReceiver<LoopEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        (Self { events }, rx)
    }

    /// False once the runtime has shut down.
    pub fn send(&self, command: Command) -> bool {
        self.events.send(LoopEvent::Command(command)).is_ok()
    }

    /// Completion and voice-list updates from the speech platform.
    pub fn speech(&self, signal: SpeechSignal) -> bool {
        self.events.send(LoopEvent::Speech(signal)).is_ok()
    }

    fn post(&self, event: LoopEvent) {
        if self.events.send(event).is_err() {
            tracing::trace!("Runtime gone, dropping event");
        }
    }
}

#[derive(Clone)]
pub struct Services {
    pub positions: Arc<dyn PositionSource>,
    pub routes: Arc<dyn RouteService>,
    pub sms: Arc<dyn SmsGateway>,
}

/// Owns the navigator, the narrator and the notifier, and drains a single event queue in order.
/// Network calls and timers run as separate tasks that post their results back.
pub struct Runtime<E: SpeechEngine, N: Notifier> {
    navigator: Navigator,
    narrator: Narrator<E>,
    notifier: N,
    services: Services,
    data: Option<DataManager>,
    state: Arc<DisplayState>,
    handle: RuntimeHandle,
    events: mpsc::UnboundedReceiver<LoopEvent>,
    watch: Option<PositionWatch>,
}

impl<E: SpeechEngine, N: Notifier> Runtime<E, N> {
    pub fn new(
        navigator: Navigator,
        narrator: Narrator<E>,
        notifier: N,
        services: Services,
        data: Option<DataManager>,
    ) -> Self {
        let (handle, events) = RuntimeHandle::channel();
        let state = Arc::new(DisplayState::new(handle.clone()));

        Self {
            navigator,
            narrator,
            notifier,
            services,
            data,
            state,
            handle,
            events,
            watch: None,
        }
    }

    pub fn handle(&self) -> RuntimeHandle {
        self.handle.clone()
    }

    pub fn state(&self) -> Arc<DisplayState> {
        self.state.clone()
    }

    /// Forwards signals from the speech engine into the loop until either side goes away.
    pub fn listen_speech(&self, mut signals: mpsc::UnboundedReceiver<SpeechSignal>) {
        let handle = self.handle.clone();
        tokio::spawn(async move {
            while let Some(signal) = signals.recv().await {
                if !handle.speech(signal) {
                    break;
                }
            }
        });
    }

    pub async fn run(mut self) -> anyhow::Result<()> {
        tracing::info!(
            "Navigating trip {} ({}) with {} stops",
            self.navigator.itinerary().trip_id,
            self.navigator.itinerary().district,
            self.navigator.itinerary().stop_count()
        );
        self.publish();

        while let Some(event) = self.events.recv().await {
            if matches!(event, LoopEvent::Command(Command::Shutdown)) {
                break;
            }
            self.handle_event(event).await;
            self.publish();
        }

        self.stop_watch();
        self.narrator.stop();
        tracing::info!("Navigation runtime stopped");
        Ok(())
    }

    async fn handle_event(&mut self, event: LoopEvent) {
        match event {
            LoopEvent::Command(command) => self.handle_command(command).await,
            LoopEvent::Position { epoch, update } => {
                if epoch != self.navigator.epoch() || self.watch.is_none() {
                    tracing::trace!("Dropping position from a cancelled watch");
                    return;
                }
                let event = match update {
                    PositionUpdate::Fix(position) => Event::PositionUpdated(position),
                    PositionUpdate::NoFix => Event::PositionUnavailable,
                    PositionUpdate::PermissionDenied => Event::PermissionDenied,
                };
                self.apply(event);
            }
            LoopEvent::RouteFetched { epoch, target, result } => {
                self.apply(Event::RouteFetched { epoch, target, result });
            }
            LoopEvent::AdvanceDue { epoch, from } => {
                self.apply(Event::AdvanceDue { epoch, from });
            }
            LoopEvent::SmsFinished { alert, delivered } => {
                self.record_alert(&alert, delivered).await;
            }
            LoopEvent::Speech(signal) => self.narrator.signal(signal),
        }
    }

    async fn handle_command(&mut self, command: Command) {
        tracing::debug!("Command: {command:?}");
        match command {
            Command::Start => self.start().await,
            Command::Stop => self.apply(Event::Stop),
            Command::Skip => self.apply(Event::SkipStop),
            Command::Select(id) => self.apply(Event::SelectStop(id)),
            Command::SetVoice(enabled) => {
                self.narrator.set_enabled(enabled);
                if enabled {
                    self.narrator.speak(Announcement::VoiceOn.to_string());
                }
                self.save_preferences().await;
            }
            Command::SetAlerts(enabled) => {
                self.update_alerts(|alerts| alerts.set_enabled(enabled)).await
            }
            Command::SetRadius(meters) => {
                self.update_alerts(|alerts| alerts.set_radius(meters)).await
            }
            Command::SetPhoneNumber(number) => {
                self.update_alerts(|alerts| alerts.set_phone_number(&number)).await
            }
            Command::Shutdown => {}
        }
    }

    async fn start(&mut self) {
        if self.navigator.is_active() {
            tracing::debug!("Already navigating");
            return;
        }

        let position = match self.navigator.session().position {
            Some(position) => position,
            None => match self.services.positions.current_position().await {
                Ok(position) => position,
                Err(ServiceError::PermissionDenied) => {
                    self.apply(Event::PermissionDenied);
                    return;
                }
                Err(err) => {
                    tracing::warn!("No position to start from: {err}");
                    self.alert(format!("Unable to get your location: {err}"));
                    return;
                }
            },
        };

        self.apply(Event::Start {
            position,
            local_time: Local::now().time(),
        });
    }

    async fn update_alerts<F>(&mut self, change: F)
    where
        F: FnOnce(&mut AlertPreferences) -> Result<(), PreferenceError>,
    {
        let mut alerts = self.navigator.preferences().clone();
        let was_armed = alerts.is_armed();
        if let Err(err) = change(&mut alerts) {
            self.alert(err.to_string());
            return;
        }

        let armed = alerts.is_armed();
        self.apply(Event::PreferencesChanged(alerts));
        if armed && !was_armed {
            self.narrator.speak(Announcement::AlertsOn.to_string());
        }
        self.save_preferences().await;
    }

    async fn save_preferences(&self) {
        let Some(data) = &self.data else {
            return;
        };

        let preferences = Preferences {
            alerts: self.navigator.preferences().clone(),
            voice_enabled: self.narrator.is_enabled(),
        };
        if let Err(err) = data.save_preferences(&preferences).await {
            tracing::error!("Failed to save preferences: {err}");
        }
    }

    async fn record_alert(&self, alert: &ProximityAlert, delivered: bool) {
        let Some(data) = &self.data else {
            return;
        };

        let trip_id = &self.navigator.itinerary().trip_id;
        if let Err(err) = data.record_alert(trip_id, alert, delivered).await {
            tracing::error!("Failed to record alert for {}: {err}", alert.place_name);
        }
    }

    fn apply(&mut self, event: Event) {
        for effect in self.navigator.handle(event) {
            self.execute(effect);
        }
    }

    fn execute(&mut self, effect: Effect) {
        match effect {
            Effect::StartWatch { epoch } => self.start_watch(epoch),
            Effect::StopWatch => self.stop_watch(),
            Effect::Speak(announcement) => self.narrator.speak(announcement.to_string()),
            Effect::CancelSpeech => self.narrator.stop(),
            Effect::Alert(message) => self.alert(message),
            Effect::RequestNotificationPermission => {
                if self.notifier.permission() == NotificationPermission::Default {
                    self.notifier.request_permission();
                }
            }
            Effect::Notify(notification) => {
                self.notifier.notify_if_permitted(notification);
            }
            Effect::SendSms(alert) => self.send_sms(alert),
            Effect::FetchRoute { epoch, target, request } => {
                self.fetch_route(epoch, target, request);
            }
            Effect::ScheduleAdvance { epoch, from, delay } => {
                let handle = self.handle.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    handle.post(LoopEvent::AdvanceDue { epoch, from });
                });
            }
            Effect::Fatal(err) => {
                tracing::error!("Navigation stopped: {err}");
                self.state.publish(&DisplayMessage::Error { message: err.to_string() });
            }
        }
    }

    fn start_watch(&mut self, epoch: u64) {
        self.stop_watch();

        let (tx, mut rx) = mpsc::channel(32);
        let mut watch = self.services.positions.watch(tx);
        let handle = self.handle.clone();
        watch.attach(tokio::spawn(async move {
            while let Some(update) = rx.recv().await {
                handle.post(LoopEvent::Position { epoch, update });
            }
        }));

        self.watch = Some(watch);
        tracing::info!("Position watch started");
    }

    fn stop_watch(&mut self) {
        if let Some(mut watch) = self.watch.take() {
            watch.cancel();
            tracing::info!("Position watch stopped");
        }
    }

    fn send_sms(&self, alert: ProximityAlert) {
        let sms = self.services.sms.clone();
        let handle = self.handle.clone();

        tokio::spawn(async move {
            let delivered = match sms.send_proximity_alert(&alert).await {
                Ok(()) => {
                    tracing::info!("SMS sent for {} ({}m)", alert.place_name, alert.distance_m);
                    true
                }
                Err(err) => {
                    tracing::warn!("Failed to send SMS for {}: {err}", alert.place_name);
                    false
                }
            };
            handle.post(LoopEvent::SmsFinished { alert, delivered });
        });
    }

    fn fetch_route(&self, epoch: u64, target: StopId, request: RouteRequest) {
        let routes = self.services.routes.clone();
        let handle = self.handle.clone();

        tokio::spawn(async move {
            let result = routes.route(request).await.map_err(|err| {
                tracing::warn!("Route fetch failed: {err}");
                err.to_string()
            });
            handle.post(LoopEvent::RouteFetched { epoch, target, result });
        });
    }

    fn alert(&self, message: String) {
        tracing::info!(target: "alert", "{message}");
        self.state.publish(&DisplayMessage::Alert { message });
    }

    fn publish(&self) {
        self.state.set_snapshot(self.navigator.snapshot());
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicBool, AtomicUsize, Ordering},
            Mutex,
        },
        time::Duration,
    };

    use async_trait::async_trait;
    use navigator_lib::{
        coordinate::{offset, Coordinate, Position},
        itinerary::{Day, Itinerary, Stop},
        session::{NavigationSnapshot, NavigationState},
        speech::{SpeechError, Utterance, Voice},
    };
    use tokio::{sync::broadcast, task::JoinHandle};

    use super::*;
    use crate::services::LogNotifier;

    fn origin() -> Coordinate {
        Coordinate::new(13.0827, 80.2707)
    }

    fn at(coordinate: Coordinate) -> Position {
        Position::new(coordinate, None, chrono::Utc::now())
    }

    /// A at 1000 m north, B at 5000 m east of the first fix.
    fn two_stops() -> Itinerary {
        Itinerary::new("trip-1", "Chennai", vec![Day {
            label: "Day 1".into(),
            stops: vec![
                Stop::new("A", offset(&origin(), 0., 1_000.)),
                Stop::new("B", offset(&origin(), 90., 5_000.)),
            ],
        }])
    }

    fn armed() -> AlertPreferences {
        let mut prefs = AlertPreferences::default();
        prefs.set_phone_number("+919876543210").unwrap();
        prefs
    }

    struct FakePositions {
        feed: broadcast::Sender<PositionUpdate>,
        denied: bool,
    }

    #[async_trait]
    impl PositionSource for FakePositions {
        async fn current_position(&self) -> Result<Position, ServiceError> {
            if self.denied {
                Err(ServiceError::PermissionDenied)
            } else {
                Ok(at(origin()))
            }
        }

        fn watch(&self, updates: mpsc::Sender<PositionUpdate>) -> PositionWatch {
            let mut feed = self.feed.subscribe();
            PositionWatch::new(tokio::spawn(async move {
                while let Ok(update) = feed.recv().await {
                    if updates.send(update).await.is_err() {
                        break;
                    }
                }
            }))
        }
    }

    #[derive(Default)]
    struct FakeRoutes {
        fail: AtomicBool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RouteService for FakeRoutes {
        async fn route(&self, request: RouteRequest) -> Result<Route, ServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(ServiceError::Http("connection refused".into()));
            }
            let distance = request.from.distance_to(&request.to);
            Ok(Route::new(vec![request.from, request.to], distance, 600.))
        }
    }

    #[derive(Default)]
    struct FakeSms {
        sent: Mutex<Vec<ProximityAlert>>,
    }

    impl FakeSms {
        fn sent_to(&self, place: &str) -> usize {
            self.sent.lock().unwrap().iter().filter(|alert| alert.place_name == place).count()
        }
    }

    #[async_trait]
    impl SmsGateway for FakeSms {
        async fn send_proximity_alert(&self, alert: &ProximityAlert) -> Result<(), ServiceError> {
            self.sent.lock().unwrap().push(alert.clone());
            Err(ServiceError::Unavailable("Twilio service not configured".into()))
        }
    }

    struct RecordingSpeech {
        voices: Arc<Mutex<Vec<Voice>>>,
        spoken: Arc<Mutex<Vec<String>>>,
        cancels: Arc<AtomicUsize>,
    }

    impl SpeechEngine for RecordingSpeech {
        fn voices(&self) -> Vec<Voice> {
            self.voices.lock().unwrap().clone()
        }

        fn speak(&mut self, utterance: Utterance) -> Result<(), SpeechError> {
            self.spoken.lock().unwrap().push(utterance.text);
            Ok(())
        }

        fn cancel(&mut self) {
            self.cancels.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn samantha() -> Vec<Voice> {
        vec![Voice::new("Samantha", "en-US")]
    }

    struct Harness {
        handle: RuntimeHandle,
        state: Arc<DisplayState>,
        feed: broadcast::Sender<PositionUpdate>,
        routes: Arc<FakeRoutes>,
        sms: Arc<FakeSms>,
        voices: Arc<Mutex<Vec<Voice>>>,
        spoken: Arc<Mutex<Vec<String>>>,
        cancels: Arc<AtomicUsize>,
        signals: mpsc::UnboundedSender<SpeechSignal>,
        task: JoinHandle<anyhow::Result<()>>,
    }

    fn harness(prefs: AlertPreferences, denied: bool, data: Option<DataManager>) -> Harness {
        harness_with_voices(prefs, denied, data, samantha())
    }

    fn harness_with_voices(
        prefs: AlertPreferences,
        denied: bool,
        data: Option<DataManager>,
        voices: Vec<Voice>,
    ) -> Harness {
        let (feed, _) = broadcast::channel(16);
        let positions = Arc::new(FakePositions { feed: feed.clone(), denied });
        let routes = Arc::new(FakeRoutes::default());
        let sms = Arc::new(FakeSms::default());
        let voices = Arc::new(Mutex::new(voices));
        let spoken = Arc::new(Mutex::new(Vec::new()));
        let cancels = Arc::new(AtomicUsize::new(0));

        let services = Services {
            positions,
            routes: routes.clone(),
            sms: sms.clone(),
        };
        let engine = RecordingSpeech {
            voices: voices.clone(),
            spoken: spoken.clone(),
            cancels: cancels.clone(),
        };
        let narrator = Narrator::new(engine, "en", true);
        let runtime = Runtime::new(
            Navigator::new(two_stops(), prefs, "Priya"),
            narrator,
            LogNotifier::new(true),
            services,
            data,
        );
        let (signals, rx) = mpsc::unbounded_channel();
        runtime.listen_speech(rx);

        Harness {
            handle: runtime.handle(),
            state: runtime.state(),
            feed,
            routes,
            sms,
            voices,
            spoken,
            cancels,
            signals,
            task: tokio::spawn(runtime.run()),
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    impl Harness {
        async fn send(&self, command: Command) {
            assert!(self.handle.send(command));
            settle().await;
        }

        async fn update(&self, update: PositionUpdate) {
            // Nobody listens once the watch is cancelled.
            let _ = self.feed.send(update);
            settle().await;
        }

        async fn fix(&self, coordinate: Coordinate) {
            self.update(PositionUpdate::Fix(at(coordinate))).await;
        }

        fn snapshot(&self) -> NavigationSnapshot {
            self.state.snapshot().unwrap()
        }

        /// Reported the way an engine does, through the runtime's speech listener.
        async fn speech(&self, signal: SpeechSignal) {
            self.signals.send(signal).unwrap();
            settle().await;
        }

        fn cancels(&self) -> usize {
            self.cancels.load(Ordering::SeqCst)
        }

        fn last_spoken(&self) -> String {
            self.spoken.lock().unwrap().last().cloned().unwrap_or_default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn two_stop_trip_advances_after_delay() {
        let h = harness(armed(), false, None);
        h.send(Command::Start).await;

        assert_eq!(h.snapshot().state, NavigationState::Active);
        assert!(h.spoken.lock().unwrap()[0].starts_with("Hello Priya."));

        h.fix(origin()).await;
        assert_eq!(h.sms.sent_to("A"), 0);

        for meters in [700., 800., 900., 920., 920.] {
            h.fix(offset(&origin(), 0., meters)).await;
        }
        assert_eq!(h.sms.sent_to("A"), 1);
        assert_eq!(h.last_spoken(), "You have reached A. Enjoy your visit!");
        assert_eq!(h.snapshot().cursor, 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        settle().await;
        assert_eq!(h.snapshot().cursor, 1);
        assert_eq!(h.last_spoken(), "Next stop is B");

        h.fix(offset(&origin(), 0., 920.)).await;
        assert_eq!(h.sms.sent_to("A"), 1);
        assert!(h.routes.calls.load(Ordering::SeqCst) > 0);
        assert!(h.snapshot().route.is_some());
        assert_eq!(h.snapshot().notified, vec![0]);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_the_watch_and_resets() {
        let h = harness(armed(), false, None);
        h.send(Command::Start).await;
        h.fix(offset(&origin(), 0., 700.)).await;
        assert_eq!(h.sms.sent_to("A"), 1);
        assert!(h.snapshot().route.is_some());

        h.send(Command::Stop).await;
        let snapshot = h.snapshot();
        assert_eq!(snapshot.state, NavigationState::Idle);
        assert_eq!(snapshot.cursor, 0);
        assert!(snapshot.route.is_none());
        assert!(snapshot.notified.is_empty());
        assert_eq!(h.last_spoken(), "Navigation stopped. Goodbye Priya. Have a nice day!");
        assert_eq!(h.feed.receiver_count(), 0);

        h.fix(offset(&origin(), 0., 1_000.)).await;
        assert_eq!(h.snapshot(), snapshot);
        assert_eq!(h.sms.sent_to("A"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_route_keeps_the_last_one() {
        let h = harness(AlertPreferences::default(), false, None);
        h.send(Command::Start).await;
        h.fix(offset(&origin(), 0., 100.)).await;
        let route = h.snapshot().route.expect("first route");

        h.routes.fail.store(true, Ordering::SeqCst);
        h.fix(offset(&origin(), 0., 300.)).await;
        assert_eq!(h.snapshot().route, Some(route));
    }

    #[tokio::test(start_paused = true)]
    async fn permission_denied_ends_the_session() {
        let h = harness(AlertPreferences::default(), false, None);
        let mut messages = h.state.tx.subscribe();
        h.send(Command::Start).await;

        h.update(PositionUpdate::PermissionDenied).await;
        assert_eq!(h.snapshot().state, NavigationState::Idle);
        assert_eq!(h.feed.receiver_count(), 0);

        let mut saw_error = false;
        while let Ok(message) = messages.try_recv() {
            saw_error |= message.contains(r#""type":"error""#);
        }
        assert!(saw_error);
    }

    #[tokio::test(start_paused = true)]
    async fn denied_start_stays_idle() {
        let h = harness(AlertPreferences::default(), true, None);
        h.send(Command::Start).await;
        assert_eq!(h.snapshot().state, NavigationState::Idle);
        assert!(h.spoken.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn manual_select_and_skip() {
        let h = harness(AlertPreferences::default(), false, None);
        h.send(Command::Start).await;

        h.send(Command::Skip).await;
        assert_eq!(h.snapshot().cursor, 1);
        assert_eq!(h.last_spoken(), "Next stop is B");

        h.send(Command::Select(StopId(0))).await;
        assert_eq!(h.snapshot().cursor, 0);
        assert_eq!(h.last_spoken(), "Going to A");

        h.send(Command::Shutdown).await;
        assert!(h.task.await.unwrap().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn finished_speech_is_not_cancelled() {
        let h = harness(AlertPreferences::default(), false, None);
        h.send(Command::Start).await;
        assert_eq!(h.cancels(), 0);

        // The welcome is still playing.
        h.send(Command::Skip).await;
        assert_eq!(h.cancels(), 1);

        h.speech(SpeechSignal::Finished).await;
        h.send(Command::Select(StopId(0))).await;
        assert_eq!(h.last_spoken(), "Going to A");
        assert_eq!(h.cancels(), 1);

        h.speech(SpeechSignal::Failed).await;
        h.send(Command::Stop).await;
        assert_eq!(h.last_spoken(), "Navigation stopped. Goodbye Priya. Have a nice day!");
        assert_eq!(h.cancels(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn welcome_waits_for_voices() {
        let h = harness_with_voices(AlertPreferences::default(), false, None, Vec::new());
        h.send(Command::Start).await;
        assert_eq!(h.snapshot().state, NavigationState::Active);
        assert!(h.spoken.lock().unwrap().is_empty());

        h.speech(SpeechSignal::VoicesChanged).await;
        assert!(h.spoken.lock().unwrap().is_empty());

        *h.voices.lock().unwrap() = samantha();
        h.speech(SpeechSignal::VoicesChanged).await;
        h.speech(SpeechSignal::VoicesChanged).await;

        let spoken = h.spoken.lock().unwrap().clone();
        assert_eq!(spoken.len(), 1);
        assert!(spoken[0].starts_with("Hello Priya."));
    }

    /// Real clock: the database runs on its own thread.
    async fn wait_for_storage() {
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    #[tokio::test]
    async fn preference_commands_are_saved() {
        let data = DataManager::in_memory().await.unwrap();
        let h = harness(AlertPreferences::default(), false, Some(data.clone()));
        let mut messages = h.state.tx.subscribe();

        h.send(Command::SetPhoneNumber("+919876543210".into())).await;
        wait_for_storage().await;
        assert!(data.load_preferences().await.unwrap().alerts.is_armed());
        assert_eq!(h.last_spoken(), "S M S alerts are now on");

        h.send(Command::SetRadius(-5.)).await;
        wait_for_storage().await;
        assert_eq!(data.load_preferences().await.unwrap().alerts.proximity_radius_m, 500.);

        h.send(Command::SetVoice(false)).await;
        wait_for_storage().await;
        assert!(!data.load_preferences().await.unwrap().voice_enabled);

        let mut saw_alert = false;
        while let Ok(message) = messages.try_recv() {
            saw_alert |= message.contains(r#""type":"alert""#);
        }
        assert!(saw_alert);
    }

    #[tokio::test]
    async fn sms_attempts_are_logged() {
        let data = DataManager::in_memory().await.unwrap();
        let h = harness(armed(), false, Some(data.clone()));

        h.send(Command::Start).await;
        h.fix(offset(&origin(), 0., 700.)).await;
        wait_for_storage().await;

        let alerts = data.get_alerts("trip-1").await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].place_name, "A");
        assert!(!alerts[0].delivered);
    }
}
