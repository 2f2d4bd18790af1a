//! Single-threaded drain loop and the per-event handlers.
//!
//! ```text
//!   queue.pop() ──▶ dispatch(event) ──▶ handler ──▶ follow-ups ──▶ queue tail
//! ```
//!
//! Follow-ups are appended to the tail, so a cascade expands breadth-first
//! and never overtakes events that were already waiting.

use core::fmt::{self, Write};

use tracing::{debug, error, info, warn};

use crate::{
    config::{Settings, ThermostatConfig},
    events::{Event, EventQueue},
    history::{HistoryBuffer, HISTORY_CAPACITY},
    menu::{MenuNavigator, StatusSnapshot},
    messages::{Reply, Request, Telemetry},
    network::NetworkSync,
    ports::Board,
    thermostat::ThermostatController,
    types::{ClockSnapshot, SelfTestState},
    weather::WeatherCache,
};

/// Most follow-ups any single handler produces.
const MAX_CASCADE: usize = 8;

type DeviceLine = heapless::String<64>;

/// State shared by every handler, owned by the dispatcher.
#[derive(Debug, Clone)]
pub struct Context {
    pub settings: Settings,
    /// Calendar fields seen on the last RTC update. `None` before the first.
    pub clock: Option<ClockSnapshot>,
    pub history: HistoryBuffer<HISTORY_CAPACITY>,
    pub thermostat: ThermostatController,
    pub menu: MenuNavigator,
    pub network: NetworkSync,
    pub weather: WeatherCache,
}

impl Context {
    pub fn new(mut config: ThermostatConfig) -> Self {
        config.sanitize();
        Self {
            settings: Settings::from_config(&config),
            clock: None,
            history: HistoryBuffer::new(),
            thermostat: ThermostatController::new(config),
            menu: MenuNavigator::new(),
            network: NetworkSync::new(),
            weather: WeatherCache::new(),
        }
    }

    pub fn config(&self) -> &ThermostatConfig {
        &self.thermostat.config
    }

    pub fn status(&self, now_ms: u64) -> StatusSnapshot {
        StatusSnapshot {
            reading: self.thermostat.reading(),
            smoothed_f: self.thermostat.smoothed_temp_f(),
            equipment: Some(self.thermostat.equipment()),
            self_test: Some(self.thermostat.self_test_state()),
            override_active: self.thermostat.temporary_override().is_some(),
            clock: self.clock,
            weather: self.weather.current(),
            weather_high_low: self.weather.high_low(),
            runtime_min: self.thermostat.runtime_minutes(now_ms),
            connected: self.network.state().connected,
        }
    }
}

struct Cascade(heapless::Vec<Event, MAX_CASCADE>);

impl Cascade {
    fn new() -> Self {
        Self(heapless::Vec::new())
    }

    fn add(&mut self, event: Event) {
        if self.0.push(event).is_err() {
            error!("cascade overflow, dropped {event:?}");
        }
    }
}

pub struct Dispatcher<'q, B: Board> {
    queue: &'q EventQueue,
    board: B,
    ctx: Context,
}

impl<'q, B: Board> Dispatcher<'q, B> {
    pub fn new(queue: &'q EventQueue, board: B, config: ThermostatConfig) -> Self {
        Self {
            queue,
            board,
            ctx: Context::new(config),
        }
    }

    pub fn queue(&self) -> &'q EventQueue {
        self.queue
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.ctx
    }

    pub fn board(&self) -> &B {
        &self.board
    }

    pub fn board_mut(&mut self) -> &mut B {
        &mut self.board
    }

    /// Seed history from one live read and queue the boot cascade, led by a
    /// reconnect when the link is down.
    pub fn startup(&mut self) {
        match self.ctx.thermostat.sample_air(self.board.sensor()) {
            Ok(reading) => self.ctx.history = HistoryBuffer::seeded(reading.temperature_f),
            Err(err) => warn!("startup sensor read failed: {err}"),
        }

        info!(
            target_f = self.ctx.settings.target_temp_f,
            sample_period_secs = self.ctx.settings.sample_period_secs,
            "thermostat starting"
        );
        self.board.logger().info("Thermostat started");
        self.board
            .platform()
            .set_sample_period(self.ctx.settings.sample_period_secs);

        // Fetches are gated on the link; check it before the boot requests.
        if let Some(reconnect) = self.ctx.network.check_connection(self.board.messenger()) {
            self.push(reconnect);
        }
        for event in [
            Event::GetEpoch,
            Event::RtcUpdate,
            Event::SampleAir,
            Event::OledOn,
        ] {
            self.push(event);
        }
    }

    /// Queue an event, dropping duplicate network requests.
    pub fn push(&mut self, event: Event) {
        if !self.ctx.network.claim(event) {
            debug!("{event:?} already pending");
            return;
        }
        if let Err(err) = self.queue.push(event) {
            error!(overflows = self.queue.overflows(), "{err}");
            self.ctx.network.release(event);
        }
    }

    /// Service queued codes until the queue is empty. Returns how many
    /// codes were taken off the queue.
    pub fn drain(&mut self) -> usize {
        let mut serviced = 0;
        while let Some(code) = self.queue.pop() {
            serviced += 1;
            match Event::from_code(code) {
                Some(event) => {
                    debug!("servicing {event:?}");
                    self.dispatch(event);
                }
                None => warn!("ignoring unknown event code {code}"),
            }
        }
        serviced
    }

    /// One pass of the main loop: drain, flush the device log, then park
    /// until a producer raises an interrupt.
    pub fn step(&mut self) {
        self.drain();
        self.board.logger().flush();
        self.board.platform().wait_for_interrupt(self.queue);
    }

    pub fn run(mut self) -> ! {
        self.startup();
        loop {
            self.step();
        }
    }

    pub fn dispatch(&mut self, event: Event) {
        self.ctx.network.settle(event);

        let mut next = Cascade::new();
        match event {
            Event::SampleAir => self.on_sample_air(&mut next),
            Event::RtcUpdate => self.on_rtc_update(&mut next),
            Event::UpdateSamplePeriod => self
                .board
                .platform()
                .set_sample_period(self.ctx.settings.sample_period_secs),
            Event::SetFilter => self.on_set_filter(&mut next),

            Event::MotionDetected => self.on_motion_detected(&mut next),
            Event::NoMotion => self.on_no_motion(&mut next),
            Event::StartScreenTimeout => self
                .board
                .platform()
                .start_idle_timer(self.ctx.settings.screen_timeout_secs),

            Event::GetEpoch => self.on_get_epoch(),
            Event::CheckInbox => {
                if let Some(routed) = self.ctx.network.check_inbox(self.board.messenger()) {
                    debug!("inbox -> {routed:?}");
                    next.add(routed);
                }
            }
            Event::UpdateSchedule => self.on_update_schedule(&mut next),
            Event::GetForecast => self.on_get_forecast(&mut next),
            Event::GetTemporaryOverride => self.on_get_temporary_override(&mut next),
            Event::StartTemporaryOverride => self.on_start_temporary_override(&mut next),
            Event::ClearTemporaryOverride => self.on_clear_temporary_override(&mut next),
            Event::ConnectToWifi => self.on_connect_wifi(&mut next),
            Event::ConnectToServer => self.on_connect_server(&mut next),
            Event::DisconnectWifi => {
                self.ctx.network.disconnect(self.board.messenger());
                info!("wifi disconnected");
            }

            Event::SendServerTemperature
            | Event::SendServerStats
            | Event::SendServerMotion
            | Event::SendServerRuntime
            | Event::SendServerEquipmentState => self.on_send_telemetry(event),

            Event::OledOn => self.on_oled_on(),
            Event::OledOff => {
                self.ctx.menu.screen_off();
                self.board.display().power(false);
            }
            Event::OledUpdate => self.redraw(),
            Event::OledNextMenu
            | Event::OledPrevMenu
            | Event::OledEditMenu
            | Event::OledRotaryCw
            | Event::OledRotaryCcw => self.on_menu_input(event, &mut next),

            Event::SelfTest => self.on_self_test(),
            Event::SelfTestDone => self.on_self_test_done(),
        }

        for follow_up in next.0 {
            self.push(follow_up);
        }
    }

    fn on_sample_air(&mut self, next: &mut Cascade) {
        let now_ms = self.board.clock().uptime_ms();

        match self.ctx.thermostat.sample_air(self.board.sensor()) {
            Ok(reading) => {
                self.ctx.history.insert(reading.temperature_f);
                next.add(Event::OledUpdate);
                next.add(Event::CheckInbox);
                next.add(Event::SendServerTemperature);

                let changed = self.ctx.thermostat.run_cycle(
                    &self.ctx.history,
                    &self.ctx.settings,
                    self.board.equipment(),
                    now_ms,
                );
                if let Some(state) = changed {
                    info!(
                        smoothed_f = self.ctx.thermostat.smoothed_temp_f(),
                        "equipment -> {}",
                        state.as_str()
                    );
                    next.add(Event::SendServerEquipmentState);
                    next.add(Event::SendServerRuntime);
                }
            }
            Err(err) => {
                warn!("sensor read failed, skipping control cycle: {err}");
                self.board.logger().error(&device_line(format_args!("Sensor: {err}")));
                next.add(Event::OledUpdate);
                next.add(Event::CheckInbox);
            }
        }

        // A running self-test checks one channel per sample.
        let verdict = self.ctx.thermostat.step_self_test(self.board.equipment());
        if verdict.is_some() {
            next.add(Event::SelfTestDone);
        }
    }

    fn on_rtc_update(&mut self, next: &mut Cascade) {
        let now = self.board.clock().now();
        let previous = core::mem::replace(&mut self.ctx.clock, now);

        if let Some(now) = now {
            if previous.is_some_and(|prev| prev.month != now.month) {
                info!(month = now.month, "new month, starting self test");
                next.add(Event::SelfTest);
            }
            if self.ctx.weather.is_new_day(now.weekday) {
                next.add(Event::GetForecast);
            }
            self.ctx.weather.set_current_hour(now.hour);
        }

        if self.ctx.network.needs_epoch(now.as_ref()) {
            next.add(Event::GetEpoch);
        }
        if let Some(reconnect) = self.ctx.network.check_connection(self.board.messenger()) {
            next.add(reconnect);
        }

        let epoch = self.board.clock().epoch();
        let expired = self.ctx.thermostat.expire_override_if_needed(
            epoch,
            &mut self.ctx.settings,
            now.as_ref(),
        );
        if expired {
            info!("temporary override expired");
            self.board.logger().info("Temporary override ended");
        }
        let applied = self
            .ctx
            .thermostat
            .apply_schedule(&mut self.ctx.settings, now.as_ref());

        if expired || applied {
            next.add(Event::SendServerStats);
        }
        next.add(Event::OledUpdate);
    }

    fn on_set_filter(&mut self, next: &mut Cascade) {
        info!("filter set to {}", self.ctx.settings.filter.as_str());
        if self.ctx.thermostat.reading().is_some() {
            let now_ms = self.board.clock().uptime_ms();
            let changed = self.ctx.thermostat.run_cycle(
                &self.ctx.history,
                &self.ctx.settings,
                self.board.equipment(),
                now_ms,
            );
            if changed.is_some() {
                next.add(Event::SendServerEquipmentState);
                next.add(Event::SendServerRuntime);
            }
        }
        next.add(Event::OledUpdate);
    }

    fn on_motion_detected(&mut self, next: &mut Cascade) {
        let now_ms = self.board.clock().uptime_ms();
        self.ctx.thermostat.record_motion(now_ms);
        next.add(Event::OledOn);
        next.add(Event::SendServerMotion);
    }

    fn on_no_motion(&mut self, next: &mut Cascade) {
        if self.board.platform().motion_sensed() {
            debug!("still occupied, restarting idle timer");
            next.add(Event::StartScreenTimeout);
            return;
        }

        let timeout_ms = u64::from(self.ctx.settings.screen_timeout_secs) * 1_000;
        let now_ms = self.board.clock().uptime_ms();
        let idle_ms = self.ctx.thermostat.idle_for_ms(now_ms);

        if idle_ms >= timeout_ms {
            self.board.platform().stop_idle_timer();
            next.add(Event::OledOff);
        } else {
            let remaining_secs = (timeout_ms - idle_ms).div_ceil(1_000) as u32;
            self.board.platform().start_idle_timer(remaining_secs);
        }
    }

    fn on_get_epoch(&mut self) {
        match self.ctx.network.fetch(self.board.messenger(), Request::Epoch) {
            Some(Reply::Epoch(seconds)) => {
                let clock = self.board.clock();
                clock.set_epoch(seconds);
                let now = clock.now();
                self.ctx.network.epoch_synced(now.as_ref());
                info!(epoch = seconds, "clock synced");
            }
            Some(other) => warn!("unexpected reply to epoch request: {other:?}"),
            None => debug!("epoch request unanswered"),
        }
    }

    fn on_update_schedule(&mut self, next: &mut Cascade) {
        match self.ctx.network.fetch(self.board.messenger(), Request::Schedule) {
            Some(Reply::Schedule(schedule)) => {
                let entries = schedule.entries.len();
                let now = self.board.clock().now();
                let changed = self.ctx.thermostat.update_schedule(
                    schedule,
                    &mut self.ctx.settings,
                    now.as_ref(),
                );
                info!(entries, changed, "schedule updated");
                if changed {
                    next.add(Event::SendServerStats);
                    next.add(Event::OledUpdate);
                }
            }
            Some(other) => warn!("unexpected reply to schedule request: {other:?}"),
            None => debug!("schedule request unanswered"),
        }
    }

    fn on_get_forecast(&mut self, next: &mut Cascade) {
        match self.ctx.network.fetch(self.board.messenger(), Request::Forecast) {
            Some(Reply::Forecast(forecast)) => {
                let Some(now) = self.board.clock().now() else {
                    debug!("dropping forecast, clock unset");
                    return;
                };
                info!(hours = forecast.hourly.len(), "forecast updated");
                self.ctx.weather.store(forecast, now.weekday, now.hour);
                next.add(Event::OledUpdate);
            }
            Some(other) => warn!("unexpected reply to forecast request: {other:?}"),
            None => debug!("forecast request unanswered"),
        }
    }

    fn on_get_temporary_override(&mut self, next: &mut Cascade) {
        match self
            .ctx
            .network
            .fetch(self.board.messenger(), Request::TemporaryOverride)
        {
            Some(Reply::TemporaryOverride(target_f)) if target_f > 0.0 => {
                let clock = self.board.clock();
                let (epoch, now) = (clock.epoch(), clock.now());
                self.ctx.thermostat.start_temporary_override(
                    target_f,
                    &mut self.ctx.settings,
                    epoch,
                    now.as_ref(),
                );
                next.add(Event::StartTemporaryOverride);
                next.add(Event::SendServerStats);
            }
            Some(Reply::TemporaryOverride(target_f)) => {
                debug!("no temporary override requested ({target_f})");
            }
            Some(other) => warn!("unexpected reply to override request: {other:?}"),
            None => debug!("override request unanswered"),
        }
    }

    fn on_start_temporary_override(&mut self, next: &mut Cascade) {
        let Some(hold) = self.ctx.thermostat.temporary_override() else {
            debug!("no temporary override to start");
            return;
        };
        if self
            .ctx
            .thermostat
            .reassert_temporary_override(&mut self.ctx.settings)
        {
            debug!("restored override target");
        }

        info!(?hold, "temporary override started");
        self.board.logger().info(&device_line(format_args!(
            "Override to {:.1}F",
            hold.target_temp_f
        )));
        next.add(Event::OledUpdate);
    }

    fn on_clear_temporary_override(&mut self, next: &mut Cascade) {
        let now = self.board.clock().now();
        if self
            .ctx
            .thermostat
            .clear_temporary_override(&mut self.ctx.settings, now.as_ref())
        {
            info!("temporary override cleared");
            self.board.logger().info("Temporary override cleared");
            next.add(Event::SendServerStats);
            next.add(Event::OledUpdate);
        }
    }

    fn on_connect_wifi(&mut self, next: &mut Cascade) {
        let follow_up = self.ctx.network.connect_wifi(self.board.messenger());
        if !self.ctx.network.state().connected {
            warn!("wifi connect failed");
            return;
        }
        info!("wifi connected");
        if let Some(event) = follow_up {
            next.add(event);
        }
    }

    fn on_connect_server(&mut self, next: &mut Cascade) {
        match self.ctx.network.connect_server(self.board.messenger()) {
            Some(event) => {
                info!("server bound");
                self.board.logger().info("Connected to server");
                next.add(event);
            }
            None => warn!("server discovery failed"),
        }
    }

    fn on_send_telemetry(&mut self, event: Event) {
        let now_ms = self.board.clock().uptime_ms();
        let settings = &self.ctx.settings;
        let thermostat = &self.ctx.thermostat;

        let telemetry = match event {
            Event::SendServerTemperature => match thermostat.reading() {
                Some(reading) => Telemetry::Temperature {
                    temperature: reading.temperature_f,
                    humidity: reading.humidity,
                },
                None => return,
            },
            Event::SendServerStats => Telemetry::Stats {
                target: settings.target_temp_f,
                lower: settings.lower_threshold_f,
                upper: settings.upper_threshold_f,
            },
            Event::SendServerMotion => Telemetry::Motion { motion: 1 },
            Event::SendServerRuntime => Telemetry::Runtime {
                runtime_min: thermostat.runtime_minutes(now_ms),
            },
            Event::SendServerEquipmentState => Telemetry::Equipment {
                state: thermostat.equipment().as_str(),
            },
            _ => return,
        };

        if !self.ctx.network.post(self.board.messenger(), &telemetry) {
            debug!("offline, skipped {}", telemetry.endpoint());
        }
    }

    fn on_oled_on(&mut self) {
        if !self.ctx.menu.is_screen_on() {
            self.ctx.menu.screen_on();
            self.board.display().power(true);
        }
        self.board
            .platform()
            .start_idle_timer(self.ctx.settings.screen_timeout_secs);
        self.redraw();
    }

    fn redraw(&mut self) {
        if !self.ctx.menu.is_screen_on() {
            return;
        }
        let now_ms = self.board.clock().uptime_ms();
        let frame = self
            .ctx
            .menu
            .render(&self.ctx.settings, &self.ctx.status(now_ms));
        self.board.display().draw(&frame);
    }

    fn on_menu_input(&mut self, event: Event, next: &mut Cascade) {
        if !self.ctx.menu.is_screen_on() {
            next.add(Event::OledOn);
            return;
        }

        let config = &self.ctx.thermostat.config;
        let menu = &mut self.ctx.menu;
        let follow_up = match event {
            Event::OledNextMenu => {
                menu.next_menu();
                None
            }
            Event::OledPrevMenu => {
                menu.previous_menu();
                None
            }
            Event::OledEditMenu => menu.edit(
                &mut self.ctx.settings,
                config,
                self.ctx.thermostat.temporary_override().is_some(),
            ),
            Event::OledRotaryCw => {
                menu.rotary_dial(1, &self.ctx.settings, config);
                None
            }
            Event::OledRotaryCcw => {
                menu.rotary_dial(-1, &self.ctx.settings, config);
                None
            }
            _ => None,
        };

        if let Some(event) = follow_up {
            next.add(event);
        }
        next.add(Event::StartScreenTimeout);
        next.add(Event::OledUpdate);
    }

    fn on_self_test(&mut self) {
        if !self.ctx.thermostat.start_self_test(self.board.equipment()) {
            debug!("self test already running");
            return;
        }
        info!("self test started");
        self.board.logger().info("Self test started");
    }

    fn on_self_test_done(&mut self) {
        let Some(report) = self.ctx.thermostat.take_self_test_report() else {
            return;
        };
        match report.state {
            SelfTestState::Passed => {
                info!("self test passed");
                self.board.logger().info("Self test passed!");
            }
            SelfTestState::Failed => {
                let channel = report.failed_channel.map_or("unknown", |c| c.as_str());
                error!(channel, "self test failed");
                self.board.logger().error("Self test failed!");
            }
            SelfTestState::Idle | SelfTestState::Running => {}
        }
    }
}

fn device_line(args: fmt::Arguments<'_>) -> DeviceLine {
    let mut line = DeviceLine::new();
    let _ = line.write_fmt(args);
    line
}
