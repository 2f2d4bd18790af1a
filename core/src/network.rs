//! Network sync bookkeeping: link state, request de-duplication and the
//! periodic sync triggers.

use crate::{
    events::Event,
    messages::{InboxMessage, Reply, Request, Telemetry},
    ports::Messenger,
    types::ClockSnapshot,
};

/// Transient link state, rebuilt on each reconnect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetworkState {
    pub connected: bool,
    pub server_bound: bool,
    pending: u8,
}

impl NetworkState {
    pub fn is_pending(&self, event: Event) -> bool {
        pending_bit(event).is_some_and(|bit| self.pending & bit != 0)
    }
}

fn pending_bit(event: Event) -> Option<u8> {
    let bit = match event {
        Event::GetEpoch => 0,
        Event::GetForecast => 1,
        Event::UpdateSchedule => 2,
        Event::GetTemporaryOverride => 3,
        Event::ConnectToWifi => 4,
        Event::ConnectToServer => 5,
        _ => return None,
    };
    Some(1 << bit)
}

#[derive(Debug, Clone, Default)]
pub struct NetworkSync {
    state: NetworkState,
    last_epoch_sync: Option<(u16, u8)>,
}

impl NetworkSync {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> NetworkState {
        self.state
    }

    /// Mark a request event as queued. Returns `false` when the same request
    /// is already waiting, so the caller must not push it again. Events that
    /// are not requests are always allowed.
    pub fn claim(&mut self, event: Event) -> bool {
        let Some(bit) = pending_bit(event) else {
            return true;
        };
        if self.state.pending & bit != 0 {
            return false;
        }
        self.state.pending |= bit;
        true
    }

    /// Clear the marker once the request event is being serviced.
    pub fn settle(&mut self, event: Event) {
        if let Some(bit) = pending_bit(event) {
            self.state.pending &= !bit;
        }
    }

    /// Revert a claim whose push was rejected by a full queue.
    pub fn release(&mut self, event: Event) {
        self.settle(event);
    }

    pub fn route_inbox(&self, message: InboxMessage) -> Event {
        match message {
            InboxMessage::TemporaryOverride => Event::GetTemporaryOverride,
            InboxMessage::ScheduleUpdated => Event::UpdateSchedule,
            InboxMessage::ServerAnnounce if self.state.server_bound => Event::UpdateSchedule,
            InboxMessage::ServerAnnounce => Event::ConnectToServer,
        }
    }

    /// An epoch sync is due when the clock is unset or the local hour has
    /// changed since the last successful one.
    pub fn needs_epoch(&self, now: Option<&ClockSnapshot>) -> bool {
        match now {
            Some(now) => self.last_epoch_sync != Some((now.day_of_year, now.hour)),
            None => true,
        }
    }

    pub fn epoch_synced(&mut self, now: Option<&ClockSnapshot>) {
        if let Some(now) = now {
            self.last_epoch_sync = Some((now.day_of_year, now.hour));
        }
    }

    /// Passive link check; never blocks.
    pub fn check_connection(&mut self, messenger: &dyn Messenger) -> Option<Event> {
        self.state.connected = messenger.is_connected();
        if !self.state.connected {
            self.state.server_bound = false;
            return Some(Event::ConnectToWifi);
        }
        None
    }

    pub fn connect_wifi(&mut self, messenger: &mut dyn Messenger) -> Option<Event> {
        self.state.connected = messenger.connect();
        if !self.state.connected {
            return None;
        }
        (!self.state.server_bound).then_some(Event::ConnectToServer)
    }

    pub fn connect_server(&mut self, messenger: &mut dyn Messenger) -> Option<Event> {
        if !self.state.connected {
            return None;
        }
        self.state.server_bound = messenger.discover_server();
        self.state.server_bound.then_some(Event::UpdateSchedule)
    }

    pub fn disconnect(&mut self, messenger: &mut dyn Messenger) {
        messenger.disconnect();
        self.state = NetworkState::default();
    }

    pub fn check_inbox(&mut self, messenger: &mut dyn Messenger) -> Option<Event> {
        if !self.state.connected {
            return None;
        }
        messenger
            .check_inbox()
            .map(|message| self.route_inbox(message))
    }

    /// Best-effort post. Skipped while the link is down.
    pub fn post(&self, messenger: &mut dyn Messenger, telemetry: &Telemetry) -> bool {
        if !self.state.connected {
            return false;
        }
        messenger.post(telemetry);
        true
    }

    pub fn fetch(&self, messenger: &mut dyn Messenger, request: Request) -> Option<Reply> {
        if !self.state.connected {
            return None;
        }
        messenger.request(request)
    }
}
