use std::time::Duration;

use hashbrown::HashMap;
use pgit_viewport_core::{
    GeometryObserver, ManualClock, NoVisibility, Rect, RevealConfig, RevealController,
    RevealEvent, RevealState, Scheduler, TargetId, TimerId, VisibilityEvent,
};

const VIEWPORT: Rect = Rect {
    x: 0.0,
    y: 0.0,
    width: 1200.0,
    height: 800.0,
};

fn ids(n: u32) -> Vec<TargetId> {
    (0..n).map(TargetId).collect()
}

/// Lay `n` cards out in a column starting at `top`, 100px apart.
fn column(n: u32, top: f32) -> HashMap<TargetId, Rect> {
    (0..n)
        .map(|i| {
            (
                TargetId(i),
                Rect::new(0.0, top + i as f32 * 100.0, 300.0, 80.0),
            )
        })
        .collect()
}

/// Advance in 10ms steps until `until`, feeding every fired timer to the controller.
fn pump(clock: &mut ManualClock, ctl: &mut RevealController, until: Duration) {
    for timer in clock.advance_by(Duration::ZERO) {
        ctl.on_timer(timer, &*clock);
    }
    while clock.now() < until {
        for timer in clock.advance_by(Duration::from_millis(10)) {
            ctl.on_timer(timer, &*clock);
        }
    }
}

fn reveal_times(events: &[RevealEvent]) -> Vec<(u32, u64)> {
    events
        .iter()
        .filter_map(|e| match e {
            RevealEvent::Revealed { index, at, .. } => Some((*index, at.as_millis() as u64)),
            _ => None,
        })
        .collect()
}

#[test]
fn six_cards_cascade_at_ninety_ms() {
    let mut clock = ManualClock::new();
    let mut observer = GeometryObserver::new();
    let mut ctl = RevealController::new(RevealConfig::feature_grid()).unwrap();
    ctl.mount(&ids(6), &mut observer).unwrap();

    let events = observer.update(VIEWPORT, &column(6, 0.0));
    assert_eq!(events.len(), 6);
    assert_eq!(ctl.on_visibility_batch(&events, &mut clock), 6);
    assert!(ctl
        .targets()
        .iter()
        .all(|t| t.state == RevealState::PendingReveal));

    pump(&mut clock, &mut ctl, Duration::from_millis(450));

    let times = reveal_times(&ctl.take_events());
    assert_eq!(
        times,
        vec![(0, 0), (1, 90), (2, 180), (3, 270), (4, 360), (5, 450)]
    );
    assert_eq!(ctl.revealed_targets(), ids(6));
    assert!(ctl.schedule().is_empty());
}

#[test]
fn stagger_delay_is_monotonic_in_index() {
    let mut clock = ManualClock::new();
    let mut observer = GeometryObserver::new();
    let mut ctl = RevealController::new(RevealConfig::steps_timeline()).unwrap();
    ctl.mount(&ids(5), &mut observer).unwrap();

    // Deliver the batch in reverse order: scheduling must still follow index.
    let mut events = observer.update(VIEWPORT, &column(5, 0.0));
    events.reverse();
    ctl.on_visibility_batch(&events, &mut clock);

    let pending = ctl.schedule().entries();
    assert_eq!(pending.len(), 5);
    for pair in pending.windows(2) {
        assert!(pair[0].index < pair[1].index);
        assert!(pair[0].due <= pair[1].due);
    }
    assert_eq!(pending[4].due, Duration::from_millis(480));
}

#[test]
fn revealed_is_terminal() {
    let mut clock = ManualClock::new();
    let mut observer = GeometryObserver::new();
    let mut ctl = RevealController::new(RevealConfig::feature_grid()).unwrap();
    ctl.mount(&ids(2), &mut observer).unwrap();

    let events = observer.update(VIEWPORT, &column(2, 0.0));
    ctl.on_visibility_batch(&events, &mut clock);
    pump(&mut clock, &mut ctl, Duration::from_millis(100));
    assert_eq!(ctl.revealed_targets(), ids(2));
    ctl.take_events();

    // Scroll everything out and back in.
    let out = observer.update(VIEWPORT, &column(2, 5000.0));
    assert!(out.iter().all(|e| !e.intersecting));
    ctl.on_visibility_batch(&out, &mut clock);
    let back = observer.update(VIEWPORT, &column(2, 0.0));
    assert_eq!(ctl.on_visibility_batch(&back, &mut clock), 0);

    assert_eq!(clock.pending_count(), 0);
    assert!(ctl.take_events().is_empty());
    assert!(ctl.targets().iter().all(|t| t.revealed()));
}

#[test]
fn teardown_before_delay_suppresses_reveal() {
    let mut clock = ManualClock::new();
    let mut observer = GeometryObserver::new();
    let mut ctl = RevealController::new(RevealConfig::feature_grid()).unwrap();
    ctl.mount(&ids(3), &mut observer).unwrap();

    let target = TargetId(2);
    let enter = VisibilityEvent {
        subscription: ctl.subscription().unwrap().id(),
        target,
        intersecting: true,
        ratio: 1.0,
    };
    assert!(ctl.on_visibility(&enter, &mut clock));
    let pending = ctl.schedule().entries();
    let delay = pending[0].due;
    assert_eq!(delay, Duration::from_millis(180));

    clock.advance_to(delay / 2);
    ctl.teardown(&mut observer, &mut clock);
    ctl.teardown(&mut observer, &mut clock);
    assert_eq!(observer.active_subscriptions(), 0);

    let fired = clock.advance_to(delay * 2);
    assert!(fired.is_empty());
    assert_eq!(ctl.state(target), Some(RevealState::PendingReveal));
    assert!(ctl.take_events().is_empty());
}

/// Scheduler whose cancellations never land, like a host tearing down while
/// a timer callback is already queued.
struct LeakyClock(ManualClock);

impl Scheduler for LeakyClock {
    fn now(&self) -> Duration {
        self.0.now()
    }

    fn after(&mut self, delay: Duration) -> Option<TimerId> {
        self.0.after(delay)
    }

    fn cancel(&mut self, _: TimerId) {}
}

#[test]
fn late_timer_after_teardown_is_ignored() {
    let mut clock = LeakyClock(ManualClock::new());
    let mut observer = GeometryObserver::new();
    let mut ctl = RevealController::new(RevealConfig::feature_grid()).unwrap();
    ctl.mount(&ids(2), &mut observer).unwrap();
    let events = observer.update(VIEWPORT, &column(2, 0.0));
    ctl.on_visibility_batch(&events, &mut clock);

    ctl.teardown(&mut observer, &mut clock);

    let fired = clock.0.advance_by(Duration::from_secs(1));
    assert_eq!(fired.len(), 2);
    for timer in fired {
        assert_eq!(ctl.on_timer(timer, &clock), None);
    }
    assert!(ctl.revealed_targets().is_empty());
    assert!(ctl.take_events().is_empty());
}

#[test]
fn equal_delays_fire_in_the_same_tick() {
    let mut clock = ManualClock::new();
    let mut observer = GeometryObserver::new();
    let cfg = RevealConfig {
        stagger_ms: 0,
        ..RevealConfig::feature_grid()
    };
    let mut ctl = RevealController::new(cfg).unwrap();
    ctl.mount(&ids(4), &mut observer).unwrap();
    let events = observer.update(VIEWPORT, &column(4, 0.0));
    ctl.on_visibility_batch(&events, &mut clock);

    let fired = clock.advance_by(Duration::ZERO);
    assert_eq!(fired.len(), 4);
    for timer in fired {
        ctl.on_timer(timer, &clock);
    }
    assert_eq!(ctl.revealed_targets(), ids(4));
}

#[test]
fn only_visible_targets_are_scheduled() {
    let mut clock = ManualClock::new();
    let mut observer = GeometryObserver::new();
    let mut ctl = RevealController::new(RevealConfig::feature_grid()).unwrap();
    ctl.mount(&ids(10), &mut observer).unwrap();

    // Cards 0..=7 reach 20% coverage above the 720px effective bottom edge.
    let events = observer.update(VIEWPORT, &column(10, 0.0));
    assert_eq!(ctl.on_visibility_batch(&events, &mut clock), 8);
    assert_eq!(ctl.state(TargetId(8)), Some(RevealState::Hidden));

    // Scrolling down by 300px brings the rest in.
    let events = observer.update(VIEWPORT, &column(10, -300.0));
    assert_eq!(ctl.on_visibility_batch(&events, &mut clock), 2);
    assert_eq!(ctl.schedule().len(), 10);
}

#[test]
fn events_from_another_controller_are_ignored() {
    let mut clock = ManualClock::new();
    let mut observer = GeometryObserver::new();
    let mut grid = RevealController::new(RevealConfig::feature_grid()).unwrap();
    let mut steps = RevealController::new(RevealConfig::steps_timeline()).unwrap();
    grid.mount(&ids(2), &mut observer).unwrap();
    steps.mount(&ids(2), &mut observer).unwrap();

    let events = observer.update(VIEWPORT, &column(2, 0.0));
    assert_eq!(events.len(), 4);
    assert_eq!(grid.on_visibility_batch(&events, &mut clock), 2);
    assert_eq!(steps.on_visibility_batch(&events, &mut clock), 2);
    assert_eq!(clock.pending_count(), 4);

    let grid_sub = grid.subscription().unwrap().id();
    let only_grid: Vec<_> = events
        .iter()
        .copied()
        .filter(|e| e.subscription == grid_sub)
        .collect();
    steps.teardown(&mut observer, &mut clock);
    assert_eq!(clock.pending_count(), 2);
    assert_eq!(steps.on_visibility_batch(&only_grid, &mut clock), 0);
}

#[test]
fn missing_capability_reveals_everything() {
    let mut ctl = RevealController::new(RevealConfig::steps_timeline()).unwrap();
    ctl.mount(&ids(3), &mut NoVisibility).unwrap();
    assert_eq!(ctl.revealed_targets(), ids(3));
    assert!(ctl.subscription().is_none());
    assert!(matches!(
        ctl.take_events().as_slice(),
        [RevealEvent::FailedOpen { targets }] if targets.len() == 3
    ));
}

/// Scheduler that can never arm a timer.
struct NoTimers(Duration);

impl Scheduler for NoTimers {
    fn now(&self) -> Duration {
        self.0
    }

    fn after(&mut self, _: Duration) -> Option<TimerId> {
        None
    }

    fn cancel(&mut self, _: TimerId) {}
}

#[test]
fn unarmed_timers_reveal_immediately() {
    let mut clock = NoTimers(Duration::from_millis(40));
    let mut observer = GeometryObserver::new();
    let mut ctl = RevealController::new(RevealConfig::feature_grid()).unwrap();
    ctl.mount(&ids(3), &mut observer).unwrap();

    let events = observer.update(VIEWPORT, &column(3, 0.0));
    assert_eq!(ctl.on_visibility_batch(&events, &mut clock), 3);

    assert!(ctl.schedule().is_empty());
    assert_eq!(ctl.revealed_targets(), ids(3));
    assert_eq!(
        reveal_times(&ctl.take_events()),
        vec![(0, 40), (1, 40), (2, 40)]
    );
}
