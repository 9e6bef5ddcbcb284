use std::{fmt, time::Duration};

use chrono::NaiveTime;

use crate::{
    announcement::Announcement,
    coordinate::Position,
    itinerary::{Itinerary, StopId},
    notify::Notification,
    preferences::AlertPreferences,
    proximity::{check_proximity, ProximityAlert},
    route::{Route, RouteRequest},
    session::{NavigationSession, NavigationSnapshot, NavigationState},
};

/// Direct distance below which the current stop counts as reached.
pub const ARRIVAL_THRESHOLD_M: f64 = 100.;

/// Time between the arrival announcement and moving on.
pub const ADVANCE_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// User start. Carries the fix obtained just before starting.
    Start {
        position: Position,
        local_time: NaiveTime,
    },
    PositionUpdated(Position),
    /// The watch has no fix yet. Not an error.
    PositionUnavailable,
    PermissionDenied,
    AdvanceDue {
        epoch: u64,
        from: StopId,
    },
    RouteFetched {
        epoch: u64,
        target: StopId,
        result: Result<Route, String>,
    },
    SelectStop(StopId),
    SkipStop,
    Stop,
    PreferencesChanged(AlertPreferences),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    StartWatch {
        epoch: u64,
    },
    StopWatch,
    Speak(Announcement),
    CancelSpeech,
    /// Visible, blocking message to the user.
    Alert(String),
    RequestNotificationPermission,
    Notify(Notification),
    SendSms(ProximityAlert),
    FetchRoute {
        epoch: u64,
        target: StopId,
        request: RouteRequest,
    },
    ScheduleAdvance {
        epoch: u64,
        from: StopId,
        delay: Duration,
    },
    Fatal(NavigationError),
}

/// Failures that end the session.
#[derive(Debug, Clone, PartialEq)]
pub enum NavigationError {
    EmptyItinerary,
    PermissionDenied,
    ItineraryUnavailable(String),
}

impl fmt::Display for NavigationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NavigationError::EmptyItinerary => write!(f, "This trip has no stops to navigate to"),
            NavigationError::PermissionDenied => {
                write!(f, "Location permission denied. Navigation needs your position to work")
            }
            NavigationError::ItineraryUnavailable(reason) => {
                write!(f, "Could not load the trip: {reason}")
            }
        }
    }
}

impl std::error::Error for NavigationError {}

/// The navigation state machine. Every input is an [`Event`]; every output is a list of
/// [`Effect`]s for the caller to carry out. Nothing in here performs I/O.
pub struct Navigator {
    itinerary: Itinerary,
    preferences: AlertPreferences,
    traveller: String,
    state: NavigationState,
    session: NavigationSession,
}

impl Navigator {
    pub fn new(
        itinerary: Itinerary,
        preferences: AlertPreferences,
        traveller: impl Into<String>,
    ) -> Self {
        Self {
            itinerary,
            preferences,
            traveller: traveller.into(),
            state: NavigationState::Idle,
            session: NavigationSession::default(),
        }
    }

    pub fn state(&self) -> NavigationState {
        self.state
    }

    pub fn session(&self) -> &NavigationSession {
        &self.session
    }

    pub fn itinerary(&self) -> &Itinerary {
        &self.itinerary
    }

    pub fn preferences(&self) -> &AlertPreferences {
        &self.preferences
    }

    pub fn epoch(&self) -> u64 {
        self.session.epoch
    }

    pub fn is_active(&self) -> bool {
        self.state == NavigationState::Active
    }

    pub fn snapshot(&self) -> NavigationSnapshot {
        NavigationSnapshot::new(self.state, &self.session, &self.itinerary)
    }

    pub fn handle(&mut self, event: Event) -> Vec<Effect> {
        match event {
            Event::Start { position, local_time } => self.start(position, local_time),
            Event::PositionUpdated(position) => self.position_updated(position),
            Event::PositionUnavailable => Vec::new(),
            Event::PermissionDenied => self.permission_denied(),
            Event::AdvanceDue { epoch, from } => self.advance_due(epoch, from),
            Event::RouteFetched { epoch, target, result } => {
                self.route_fetched(epoch, target, result);
                Vec::new()
            }
            Event::SelectStop(id) => self.select_stop(id, false),
            Event::SkipStop => self.skip_stop(),
            Event::Stop => self.stop(),
            Event::PreferencesChanged(preferences) => {
                self.preferences = preferences;
                Vec::new()
            }
        }
    }

    fn start(&mut self, position: Position, local_time: NaiveTime) -> Vec<Effect> {
        match self.state {
            NavigationState::Active => return Vec::new(),
            NavigationState::Completed => self.session.reset(),
            NavigationState::Idle => {}
        }

        let Some(first_stop) = self.itinerary.first_stop() else {
            return vec![Effect::Fatal(NavigationError::EmptyItinerary)];
        };
        let first_stop = first_stop.name.clone();

        self.state = NavigationState::Active;
        self.session.cursor = StopId(0);
        self.session.position = Some(position);

        let mut effects = vec![
            Effect::StartWatch { epoch: self.session.epoch },
            Effect::RequestNotificationPermission,
            Effect::Speak(Announcement::Welcome {
                traveller: self.traveller.clone(),
                local_time,
                destination: self.itinerary.district.clone(),
                first_stop,
            }),
        ];
        effects.extend(self.fetch_route());
        effects
    }

    fn position_updated(&mut self, position: Position) -> Vec<Effect> {
        if !self.is_active() {
            return Vec::new();
        }

        self.session.position = Some(position);
        let mut effects = Vec::new();

        for alert in check_proximity(
            &position.coordinate,
            &self.itinerary,
            &self.preferences,
            &mut self.session.notified,
        ) {
            effects.push(Effect::Notify(alert.notification()));
            effects.push(Effect::Speak(Announcement::Proximity {
                place: alert.place_name.clone(),
                distance_m: alert.distance_m,
            }));
            effects.push(Effect::SendSms(alert));
        }

        effects.extend(self.detect_arrival(&position));
        effects.extend(self.fetch_route());
        effects
    }

    fn detect_arrival(&mut self, position: &Position) -> Vec<Effect> {
        let cursor = self.session.cursor;
        if self.session.pending_advance == Some(cursor) {
            return Vec::new();
        }
        let Some(stop) = self.itinerary.stop(cursor) else {
            return Vec::new();
        };

        if position.coordinate.distance_to(&stop.coordinate) >= ARRIVAL_THRESHOLD_M {
            return Vec::new();
        }

        self.session.pending_advance = Some(cursor);
        vec![
            Effect::Speak(Announcement::Arrival { place: stop.name.clone() }),
            Effect::Alert(format!("You've arrived at {}!", stop.name)),
            Effect::ScheduleAdvance {
                epoch: self.session.epoch,
                from: cursor,
                delay: ADVANCE_DELAY,
            },
        ]
    }

    fn advance_due(&mut self, epoch: u64, from: StopId) -> Vec<Effect> {
        if !self.is_active()
            || epoch != self.session.epoch
            || self.session.cursor != from
            || self.session.pending_advance != Some(from)
        {
            return Vec::new();
        }
        self.session.pending_advance = None;

        if self.itinerary.is_last(from) {
            self.state = NavigationState::Completed;
            return vec![
                Effect::Speak(Announcement::Completed),
                Effect::Alert("Trip completed!".to_string()),
                Effect::StopWatch,
            ];
        }

        self.session.cursor = from.next();
        let mut effects = Vec::new();
        if let Some(stop) = self.itinerary.stop(self.session.cursor) {
            effects.push(Effect::Speak(Announcement::NextStop { place: stop.name.clone() }));
        }
        effects.extend(self.fetch_route());
        effects
    }

    fn route_fetched(&mut self, epoch: u64, target: StopId, result: Result<Route, String>) {
        if !self.is_active() || epoch != self.session.epoch || target != self.session.cursor {
            return;
        }

        // A failed fetch keeps whatever route is already shown.
        if let Ok(route) = result {
            self.session.route = Some(route);
        }
    }

    fn select_stop(&mut self, id: StopId, as_next: bool) -> Vec<Effect> {
        if !self.is_active() {
            return Vec::new();
        }
        let Some(stop) = self.itinerary.stop(id) else {
            return Vec::new();
        };
        let place = stop.name.clone();

        self.session.cursor = id;
        self.session.pending_advance = None;

        let announcement = if as_next {
            Announcement::NextStop { place }
        } else {
            Announcement::GoingTo { place }
        };

        let mut effects = vec![Effect::Speak(announcement)];
        effects.extend(self.fetch_route());
        effects
    }

    fn skip_stop(&mut self) -> Vec<Effect> {
        if self.itinerary.is_last(self.session.cursor) {
            return Vec::new();
        }
        self.select_stop(self.session.cursor.next(), true)
    }

    fn stop(&mut self) -> Vec<Effect> {
        if self.state == NavigationState::Idle {
            return Vec::new();
        }

        self.session.reset();
        self.state = NavigationState::Idle;

        vec![
            Effect::CancelSpeech,
            Effect::Speak(Announcement::Goodbye { traveller: self.traveller.clone() }),
            Effect::StopWatch,
        ]
    }

    fn permission_denied(&mut self) -> Vec<Effect> {
        let mut effects = vec![Effect::Fatal(NavigationError::PermissionDenied)];
        if self.state != NavigationState::Idle {
            self.session.reset();
            self.state = NavigationState::Idle;
            effects.push(Effect::CancelSpeech);
            effects.push(Effect::StopWatch);
        }
        effects
    }

    fn fetch_route(&self) -> Option<Effect> {
        let position = self.session.position?;
        let stop = self.itinerary.stop(self.session.cursor)?;

        Some(Effect::FetchRoute {
            epoch: self.session.epoch,
            target: self.session.cursor,
            request: RouteRequest {
                from: position.coordinate,
                to: stop.coordinate,
            },
        })
    }
}
