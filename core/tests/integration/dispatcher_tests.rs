use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use thermostat_core::{
    ClockSnapshot, DayOfWeek, Dispatcher, EquipmentState, Event, EventQueue, Forecast,
    HourlyForecast, InboxMessage, Request, Schedule, ScheduleEntry, SensorError, Telemetry,
    ThermostatConfig, View, WeatherCondition, EVENT_QUEUE_CAP,
};

use crate::mock_board::MockBoard;

fn dispatcher(queue: &EventQueue) -> Dispatcher<'_, MockBoard> {
    Dispatcher::new(queue, MockBoard::new(), ThermostatConfig::default())
}

/// Pop everything without servicing it.
fn queued(queue: &EventQueue) -> Vec<Event> {
    std::iter::from_fn(|| queue.pop())
        .filter_map(Event::from_code)
        .collect()
}

fn online(d: &mut Dispatcher<'_, MockBoard>) {
    d.board_mut().messenger.link = true;
    d.board_mut().messenger.server = true;
    d.dispatch(Event::ConnectToWifi);
    d.drain();
    d.board_mut().messenger.posted.clear();
}

fn snapshot(year: i32, month: u32, day: u32, hour: u32) -> ClockSnapshot {
    let at = NaiveDate::from_ymd_opt(year, month, day)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap();
    ClockSnapshot::from_datetime(&at)
}

/// 2026-01-05 is a Monday.
fn monday(hour: u32) -> ClockSnapshot {
    snapshot(2026, 1, 5, hour)
}

/// Monday 06:00 warms to 71F, 08:00 sets back to 65F.
fn morning_schedule() -> Schedule {
    let entry = |start_minutes: u16, target: f32| ScheduleEntry {
        day: DayOfWeek::Mon,
        start_minutes,
        target_temp_f: target,
        lower_threshold_f: target - 2.0,
        upper_threshold_f: target + 2.0,
    };
    Schedule {
        enabled: true,
        entries: heapless::Vec::from_slice(&[entry(6 * 60, 71.0), entry(8 * 60, 65.0)])
            .unwrap(),
    }
}

/// Online at Monday 07:00 with the morning schedule applied.
fn scheduled_at_seven(d: &mut Dispatcher<'_, MockBoard>, epoch: u64) {
    online(d);
    d.board_mut().clock.now = Some(monday(7));
    d.board_mut().clock.epoch = Some(epoch);
    d.board_mut().messenger.schedule = Some(morning_schedule());
    d.dispatch(Event::UpdateSchedule);
    d.drain();
    d.board_mut().messenger.posted.clear();
}

fn band(d: &Dispatcher<'_, MockBoard>) -> (f32, f32, f32) {
    let settings = &d.context().settings;
    (
        settings.lower_threshold_f,
        settings.target_temp_f,
        settings.upper_threshold_f,
    )
}

fn last_stats(d: &Dispatcher<'_, MockBoard>) -> Option<Telemetry> {
    d.board()
        .messenger
        .posted
        .iter()
        .rev()
        .find(|telemetry| matches!(telemetry, Telemetry::Stats { .. }))
        .cloned()
}

// ── Startup and the drain loop ────────────────────────────────

#[test]
fn startup_seeds_history_and_queues_boot_cascade() {
    let queue = EventQueue::new();
    let mut d = dispatcher(&queue);
    d.board_mut().sensor.next = Ok((71.0, 40.0));

    d.startup();

    assert_eq!(
        queued(&queue),
        vec![
            Event::ConnectToWifi,
            Event::GetEpoch,
            Event::RtcUpdate,
            Event::SampleAir,
            Event::OledOn
        ]
    );
    assert_eq!(d.context().history.len(), 1);
    assert_eq!(d.context().history.latest(), Some(71.0));
    assert_eq!(d.board().logger.infos[0], "Thermostat started");
    assert_eq!(d.board().platform.sample_period, Some(30));
}

#[test]
fn boot_epoch_request_is_served_when_link_is_up() {
    let queue = EventQueue::new();
    let mut d = dispatcher(&queue);
    d.board_mut().messenger.link = true;
    d.board_mut().messenger.epoch = Some(1_767_614_400);

    d.startup();
    assert_eq!(queue.pop().and_then(Event::from_code), Some(Event::GetEpoch));
    d.dispatch(Event::GetEpoch);

    assert_eq!(d.board().clock.epoch, Some(1_767_614_400));
    assert_eq!(d.board().messenger.requests, vec![Request::Epoch]);
}

#[test]
fn queue_is_empty_before_waiting() {
    let queue = EventQueue::new();
    let mut d = dispatcher(&queue);

    d.startup();
    d.step();

    assert_eq!(d.board().platform.waits, vec![true]);
    assert_eq!(d.board().logger.flushes, 1);
    assert!(queue.is_empty());
}

#[test]
fn unknown_codes_are_skipped() {
    let queue = EventQueue::new();
    let mut d = dispatcher(&queue);

    queue.push_code(9).unwrap();
    queue.push(Event::OledOn).unwrap();
    queue.push_code(255).unwrap();

    assert_eq!(d.drain(), 3);
    assert!(d.board().display.powered);
}

#[test]
fn events_are_serviced_in_push_order() {
    let queue = EventQueue::new();
    let mut d = dispatcher(&queue);
    online(&mut d);

    d.push(Event::SendServerStats);
    d.push(Event::SendServerMotion);
    d.push(Event::SendServerEquipmentState);
    d.drain();

    assert_eq!(
        d.board().messenger.posted,
        vec![
            Telemetry::Stats {
                target: 70.0,
                lower: 68.0,
                upper: 72.0
            },
            Telemetry::Motion { motion: 1 },
            Telemetry::Equipment { state: "IDLE" },
        ]
    );
}

#[test]
fn duplicate_network_requests_are_dropped() {
    let queue = EventQueue::new();
    let mut d = dispatcher(&queue);

    d.push(Event::GetForecast);
    d.push(Event::GetForecast);
    assert_eq!(queue.len(), 1);

    d.drain();
    d.push(Event::GetForecast);
    assert_eq!(queue.len(), 1);
}

#[test]
fn overflow_is_counted_and_request_can_be_retried() {
    let queue = EventQueue::new();
    let mut d = dispatcher(&queue);
    for _ in 0..EVENT_QUEUE_CAP {
        queue.push(Event::OledUpdate).unwrap();
    }

    d.push(Event::GetEpoch);
    assert_eq!(queue.overflows(), 1);

    queue.pop();
    d.push(Event::GetEpoch);
    assert_eq!(queue.len(), EVENT_QUEUE_CAP);
}

// ── Sampling and control ──────────────────────────────────────

#[test]
fn sample_cascades_control_display_and_telemetry() {
    let queue = EventQueue::new();
    let mut d = dispatcher(&queue);
    d.board_mut().sensor.next = Ok((65.0, 40.0));

    d.dispatch(Event::SampleAir);

    assert_eq!(
        queued(&queue),
        vec![
            Event::OledUpdate,
            Event::CheckInbox,
            Event::SendServerTemperature,
            Event::SendServerEquipmentState,
            Event::SendServerRuntime,
        ]
    );
    assert_eq!(d.context().thermostat.equipment(), EquipmentState::Heating);
    assert_eq!(
        d.board().equipment.applied,
        vec![EquipmentState::Heating.outputs()]
    );
}

#[test]
fn failed_read_skips_history_and_control() {
    let queue = EventQueue::new();
    let mut d = dispatcher(&queue);
    d.board_mut().sensor.next = Err(SensorError::NoResponse);

    d.dispatch(Event::SampleAir);

    assert_eq!(queued(&queue), vec![Event::OledUpdate, Event::CheckInbox]);
    assert!(d.context().history.is_empty());
    assert!(d.board().equipment.applied.is_empty());
    assert_eq!(
        d.board().logger.errors,
        vec!["Sensor: sensor did not respond".to_owned()]
    );
}

// ── Screen idle timeout ───────────────────────────────────────

#[test]
fn idle_screen_turns_off_after_timeout() {
    let queue = EventQueue::new();
    let mut d = dispatcher(&queue);
    d.dispatch(Event::OledOn);
    d.board_mut().clock.uptime_ms = 1_000;
    d.dispatch(Event::MotionDetected);
    d.drain();

    d.board_mut().clock.uptime_ms = 31_000;
    d.dispatch(Event::NoMotion);

    assert_eq!(queued(&queue), vec![Event::OledOff]);
    assert_eq!(d.board().platform.idle_timer_stops, 1);

    queue.push(Event::OledOff).unwrap();
    d.drain();
    assert!(!d.board().display.powered);
    assert!(!d.context().menu.is_screen_on());
}

#[test]
fn occupied_room_restarts_timeout() {
    let queue = EventQueue::new();
    let mut d = dispatcher(&queue);
    d.dispatch(Event::OledOn);
    d.board_mut().platform.idle_timer = None;
    d.board_mut().platform.motion = true;
    d.board_mut().clock.uptime_ms = 120_000;

    d.dispatch(Event::NoMotion);
    assert_eq!(queued(&queue), vec![Event::StartScreenTimeout]);

    d.dispatch(Event::StartScreenTimeout);
    assert_eq!(d.board().platform.idle_timer, Some(30));
    assert!(d.board().display.powered);
}

#[test]
fn early_timer_is_rearmed_for_remaining_time() {
    let queue = EventQueue::new();
    let mut d = dispatcher(&queue);
    d.board_mut().clock.uptime_ms = 20_000;
    d.dispatch(Event::MotionDetected);
    queued(&queue);

    d.board_mut().clock.uptime_ms = 30_000;
    d.dispatch(Event::NoMotion);

    assert!(queue.is_empty());
    assert_eq!(d.board().platform.idle_timer, Some(20));
}

// ── Menu input ────────────────────────────────────────────────

#[test]
fn input_while_screen_off_only_wakes_it() {
    let queue = EventQueue::new();
    let mut d = dispatcher(&queue);

    d.dispatch(Event::OledRotaryCw);

    assert_eq!(queued(&queue), vec![Event::OledOn]);
    assert_eq!(d.context().menu.view(), View::Status);
}

#[test]
fn sample_period_edit_reprograms_timer() {
    let queue = EventQueue::new();
    let mut d = dispatcher(&queue);
    d.dispatch(Event::OledOn);

    for _ in 0..6 {
        queue.push(Event::OledNextMenu).unwrap();
    }
    queue.push(Event::OledEditMenu).unwrap();
    queue.push(Event::OledRotaryCcw).unwrap();
    queue.push(Event::OledEditMenu).unwrap();
    d.drain();

    assert_eq!(d.context().settings.sample_period_secs, 25);
    assert_eq!(d.board().platform.sample_period, Some(25));
    let frame = d.board().display.last_frame().unwrap();
    assert_eq!(frame.view, View::SamplePeriod);
    assert!(!frame.editing);
}

// ── Network sync ──────────────────────────────────────────────

#[test]
fn rtc_update_requests_sync_and_reconnect() {
    let queue = EventQueue::new();
    let mut d = dispatcher(&queue);
    d.board_mut().clock.now = Some(snapshot(2026, 3, 2, 9));

    d.dispatch(Event::RtcUpdate);

    assert_eq!(
        queued(&queue),
        vec![
            Event::GetForecast,
            Event::GetEpoch,
            Event::ConnectToWifi,
            Event::OledUpdate
        ]
    );
}

#[test]
fn inbox_override_request_is_fetched() {
    let queue = EventQueue::new();
    let mut d = dispatcher(&queue);
    online(&mut d);
    d.board_mut()
        .messenger
        .inbox
        .push_back(thermostat_core::InboxMessage::TemporaryOverride);

    d.dispatch(Event::CheckInbox);

    assert_eq!(queued(&queue), vec![Event::GetTemporaryOverride]);
}

#[test]
fn positive_override_moves_target_and_reports() {
    let queue = EventQueue::new();
    let mut d = dispatcher(&queue);
    online(&mut d);
    d.board_mut().messenger.override_f = Some(74.0);

    d.dispatch(Event::GetTemporaryOverride);
    assert_eq!(
        queued(&queue),
        vec![Event::StartTemporaryOverride, Event::SendServerStats]
    );

    let settings = &d.context().settings;
    assert_eq!(
        (
            settings.lower_threshold_f,
            settings.target_temp_f,
            settings.upper_threshold_f
        ),
        (72.0, 74.0, 76.0)
    );

    queue.push(Event::StartTemporaryOverride).unwrap();
    queue.push(Event::SendServerStats).unwrap();
    d.drain();

    assert!(d.context().thermostat.temporary_override().is_some());
    assert_eq!(
        d.board().messenger.posted,
        vec![Telemetry::Stats {
            target: 74.0,
            lower: 72.0,
            upper: 76.0
        }]
    );
}

#[test]
fn override_survives_schedule_change_queued_behind_it() {
    let queue = EventQueue::new();
    let mut d = dispatcher(&queue);
    scheduled_at_seven(&mut d, 10_000);
    assert_eq!(band(&d), (69.0, 71.0, 73.0));

    d.board_mut().messenger.override_f = Some(75.0);
    d.push(Event::GetTemporaryOverride);
    d.board_mut().clock.now = Some(monday(8));
    d.board_mut().clock.epoch = Some(13_600);
    d.push(Event::RtcUpdate);
    d.drain();

    assert_eq!(band(&d), (73.0, 75.0, 77.0));
    let hold = d.context().thermostat.temporary_override().unwrap();
    assert_eq!(hold.target_temp_f, 75.0);
    assert_eq!(hold.expires_epoch, Some(13_600 + 240 * 60));
    assert_eq!(
        last_stats(&d),
        Some(Telemetry::Stats {
            target: 75.0,
            lower: 73.0,
            upper: 77.0
        })
    );
    assert_eq!(d.board().logger.count("Override to 75.0F"), 1);
}

#[test]
fn non_positive_override_is_ignored() {
    let queue = EventQueue::new();
    let mut d = dispatcher(&queue);
    online(&mut d);

    for value in [0.0, -3.0] {
        d.board_mut().messenger.override_f = Some(value);
        d.dispatch(Event::GetTemporaryOverride);

        assert!(queue.is_empty());
        assert_eq!(d.context().settings.target_temp_f, 70.0);
        assert!(d.context().thermostat.temporary_override().is_none());
    }
}

// ── Self-test ─────────────────────────────────────────────────

#[test]
fn self_test_verdict_is_logged_once() {
    let queue = EventQueue::new();
    let mut d = dispatcher(&queue);

    d.dispatch(Event::SelfTest);
    for _ in 0..3 {
        d.dispatch(Event::SampleAir);
    }
    let done = queued(&queue)
        .into_iter()
        .filter(|event| *event == Event::SelfTestDone)
        .count();
    assert_eq!(done, 1);

    queue.push(Event::SelfTestDone).unwrap();
    queue.push(Event::SelfTestDone).unwrap();
    d.drain();

    assert_eq!(d.board().logger.count("Self test passed!"), 1);
    assert_eq!(d.board().logger.count("Self test failed!"), 0);
}

#[test]
fn failing_channel_reports_failure_only() {
    let queue = EventQueue::new();
    let mut d = dispatcher(&queue);
    d.board_mut().equipment.broken = Some(thermostat_core::Channel::Heat);

    d.dispatch(Event::SelfTest);
    d.dispatch(Event::SampleAir);
    d.drain();

    assert_eq!(d.board().logger.count("Self test failed!"), 1);
    assert_eq!(d.board().logger.count("Self test passed!"), 0);
}

#[test]
fn running_self_test_advances_with_each_sample() {
    let queue = EventQueue::new();
    let mut d = dispatcher(&queue);
    d.dispatch(Event::SelfTest);

    for _ in 0..3 {
        d.dispatch(Event::SampleAir);
        d.drain();
    }

    assert_eq!(d.board().equipment.probes.len(), 3);
    assert_eq!(d.board().logger.count("Self test passed!"), 1);
}

#[test]
fn trigger_during_running_self_test_does_not_advance_it() {
    let queue = EventQueue::new();
    let mut d = dispatcher(&queue);
    d.dispatch(Event::SelfTest);
    d.dispatch(Event::SampleAir);
    d.drain();
    assert_eq!(d.board().equipment.probes.len(), 1);

    d.dispatch(Event::SelfTest);
    d.drain();
    assert_eq!(d.board().equipment.probes.len(), 1);

    for _ in 0..2 {
        d.dispatch(Event::SampleAir);
        d.drain();
    }
    assert_eq!(d.board().equipment.probes.len(), 3);
    assert_eq!(d.board().logger.count("Self test started"), 1);
    assert_eq!(d.board().logger.count("Self test passed!"), 1);
}

#[test]
fn month_rollover_starts_self_test_but_first_sync_does_not() {
    let queue = EventQueue::new();
    let mut d = dispatcher(&queue);

    d.board_mut().clock.now = Some(snapshot(2026, 1, 31, 23));
    d.dispatch(Event::RtcUpdate);
    assert!(!queued(&queue).contains(&Event::SelfTest));

    d.board_mut().clock.now = Some(snapshot(2026, 2, 1, 0));
    d.dispatch(Event::RtcUpdate);
    assert!(queued(&queue).contains(&Event::SelfTest));
}

#[test]
fn schedule_pull_applies_current_entry_once() {
    let queue = EventQueue::new();
    let mut d = dispatcher(&queue);
    online(&mut d);
    d.board_mut().clock.now = Some(monday(7));
    d.board_mut().messenger.schedule = Some(morning_schedule());

    d.dispatch(Event::UpdateSchedule);
    assert_eq!(queued(&queue), vec![Event::SendServerStats, Event::OledUpdate]);
    assert_eq!(band(&d), (69.0, 71.0, 73.0));

    d.dispatch(Event::UpdateSchedule);
    assert!(queue.is_empty());
    assert_eq!(
        d.board().messenger.requests,
        vec![Request::Schedule, Request::Schedule, Request::Schedule]
    );
}

#[test]
fn forecast_is_stored_once_per_day() {
    let queue = EventQueue::new();
    let mut d = dispatcher(&queue);
    online(&mut d);
    d.board_mut().clock.now = Some(monday(13));
    let hour = |hour: u8, temperature_f: f32| HourlyForecast {
        hour,
        temperature_f,
        condition: WeatherCondition::Cloudy,
    };
    d.board_mut().messenger.forecast = Some(Forecast {
        hourly: heapless::Vec::from_slice(&[hour(6, 40.0), hour(12, 55.0), hour(18, 48.0)])
            .unwrap(),
    });

    d.dispatch(Event::GetForecast);

    assert_eq!(queued(&queue), vec![Event::OledUpdate]);
    assert_eq!(d.context().weather.current(), Some(hour(12, 55.0)));
    assert_eq!(d.context().weather.high_low(), Some((55.0, 40.0)));

    d.board_mut().clock.now = Some(monday(19));
    d.dispatch(Event::RtcUpdate);
    assert!(!queued(&queue).contains(&Event::GetForecast));
    assert_eq!(d.context().weather.current(), Some(hour(18, 48.0)));
}

#[test]
fn press_on_status_clears_override_and_restores_schedule() {
    let queue = EventQueue::new();
    let mut d = dispatcher(&queue);
    scheduled_at_seven(&mut d, 10_000);
    d.board_mut().messenger.override_f = Some(75.0);
    d.dispatch(Event::GetTemporaryOverride);
    d.dispatch(Event::OledOn);
    d.drain();
    assert_eq!(d.context().settings.target_temp_f, 75.0);

    d.dispatch(Event::OledEditMenu);
    assert_eq!(
        queued(&queue),
        vec![
            Event::ClearTemporaryOverride,
            Event::StartScreenTimeout,
            Event::OledUpdate
        ]
    );
    d.dispatch(Event::ClearTemporaryOverride);
    d.drain();

    assert!(d.context().thermostat.temporary_override().is_none());
    assert!(!d.context().menu.is_editing());
    assert_eq!(band(&d), (69.0, 71.0, 73.0));
    assert_eq!(d.board().logger.count("Temporary override cleared"), 1);
    assert_eq!(
        last_stats(&d),
        Some(Telemetry::Stats {
            target: 71.0,
            lower: 69.0,
            upper: 73.0
        })
    );
}

#[test]
fn rtc_update_expires_override_at_next_transition() {
    let queue = EventQueue::new();
    let mut d = dispatcher(&queue);
    scheduled_at_seven(&mut d, 1_000);
    d.board_mut().messenger.override_f = Some(75.0);
    d.dispatch(Event::GetTemporaryOverride);
    d.drain();
    assert_eq!(
        d.context().thermostat.temporary_override().unwrap().expires_epoch,
        Some(1_000 + 3_600)
    );

    d.board_mut().clock.now = Some(monday(8));
    d.board_mut().clock.epoch = Some(4_600);
    d.dispatch(Event::RtcUpdate);
    d.drain();

    assert!(d.context().thermostat.temporary_override().is_none());
    assert_eq!(band(&d), (63.0, 65.0, 67.0));
    assert_eq!(d.board().logger.count("Temporary override ended"), 1);
    assert_eq!(
        last_stats(&d),
        Some(Telemetry::Stats {
            target: 65.0,
            lower: 63.0,
            upper: 67.0
        })
    );
}

#[test]
fn server_announce_binds_then_pulls_schedule() {
    let queue = EventQueue::new();
    let mut d = dispatcher(&queue);
    d.board_mut().messenger.link = true;
    d.dispatch(Event::ConnectToWifi);
    d.drain();
    assert!(!d.context().network.state().server_bound);

    d.board_mut()
        .messenger
        .inbox
        .push_back(InboxMessage::ServerAnnounce);
    d.dispatch(Event::CheckInbox);
    assert_eq!(queued(&queue), vec![Event::ConnectToServer]);

    d.board_mut().messenger.server = true;
    d.dispatch(Event::ConnectToServer);
    assert_eq!(queued(&queue), vec![Event::UpdateSchedule]);
    assert!(d.context().network.state().server_bound);
    d.dispatch(Event::UpdateSchedule);

    d.board_mut()
        .messenger
        .inbox
        .push_back(InboxMessage::ServerAnnounce);
    d.dispatch(Event::CheckInbox);
    assert_eq!(queued(&queue), vec![Event::UpdateSchedule]);
}
