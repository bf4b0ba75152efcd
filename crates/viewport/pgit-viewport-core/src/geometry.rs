//! Rectangle-based visibility host.
//!
//! Computes intersections from layout rectangles the host supplies on every
//! scroll/resize, the same way a browser intersection observer does: each
//! target is reported once after observation starts, then again whenever it
//! crosses the configured coverage threshold.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::config::ObserverConfig;
use crate::ids::{IdAllocator, SubscriptionId, TargetId};
use crate::visibility::{VisibilityEvent, VisibilityHost};

/// Axis-aligned rectangle in viewport pixels (y grows downwards).
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    #[inline]
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    #[inline]
    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    #[inline]
    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        if right > x && bottom > y {
            Some(Rect::new(x, y, right - x, bottom - y))
        } else {
            None
        }
    }

    /// Grow (or shrink, when negative) the bottom edge.
    #[inline]
    fn with_bottom_margin(&self, margin: f32) -> Rect {
        Rect {
            height: (self.height + margin).max(0.0),
            ..*self
        }
    }

    /// Fraction of `self` covered by `root`, in `0..=1`.
    pub fn coverage_in(&self, root: &Rect) -> f32 {
        let area = self.area();
        if area <= 0.0 {
            // Degenerate boxes count as fully covered when their origin is inside.
            let inside = self.x >= root.x
                && self.x <= root.right()
                && self.y >= root.y
                && self.y <= root.bottom();
            return if inside { 1.0 } else { 0.0 };
        }
        self.intersect(root)
            .map(|i| (i.area() / area).clamp(0.0, 1.0))
            .unwrap_or(0.0)
    }
}

#[inline]
fn passes_threshold(ratio: f32, threshold: f32) -> bool {
    if threshold <= 0.0 {
        ratio > 0.0
    } else {
        ratio >= threshold
    }
}

#[derive(Debug)]
struct Observation {
    targets: Vec<TargetId>,
    config: ObserverConfig,
    /// Last reported state; absent until the first report.
    last: HashMap<TargetId, bool>,
}

/// Pure Rust [`VisibilityHost`] fed with layout rectangles.
#[derive(Debug, Default)]
pub struct GeometryObserver {
    ids: IdAllocator,
    observations: Vec<(SubscriptionId, Observation)>,
}

impl GeometryObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live subscriptions.
    #[inline]
    pub fn active_subscriptions(&self) -> usize {
        self.observations.len()
    }

    /// Targets currently watched by `subscription`.
    pub fn targets(&self, subscription: SubscriptionId) -> Option<&[TargetId]> {
        self.observations
            .iter()
            .find(|(id, _)| *id == subscription)
            .map(|(_, o)| o.targets.as_slice())
    }

    /// Recompute intersections against `viewport` and return the changes.
    ///
    /// Targets absent from `rects` are treated as not laid out and skipped.
    pub fn update(
        &mut self,
        viewport: Rect,
        rects: &HashMap<TargetId, Rect>,
    ) -> Vec<VisibilityEvent> {
        let mut events = Vec::new();
        for (sub, obs) in &mut self.observations {
            let margin = obs.config.root_margin_bottom.resolve(viewport.height);
            let root = viewport.with_bottom_margin(margin);
            for target in &obs.targets {
                let Some(rect) = rects.get(target) else {
                    continue;
                };
                let ratio = rect.coverage_in(&root);
                let visible = passes_threshold(ratio, obs.config.threshold_fraction);
                if obs.last.insert(*target, visible) == Some(visible) {
                    continue;
                }
                events.push(VisibilityEvent {
                    subscription: *sub,
                    target: *target,
                    intersecting: visible,
                    ratio,
                });
            }
        }
        events
    }
}

impl VisibilityHost for GeometryObserver {
    fn observe(
        &mut self,
        targets: &[TargetId],
        config: &ObserverConfig,
    ) -> Option<SubscriptionId> {
        let id = self.ids.alloc_subscription();
        self.observations.push((
            id,
            Observation {
                targets: targets.to_vec(),
                config: config.clone(),
                last: HashMap::new(),
            },
        ));
        Some(id)
    }

    fn cancel(&mut self, subscription: SubscriptionId) {
        self.observations.retain(|(id, _)| *id != subscription);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Length;

    fn viewport() -> Rect {
        Rect::new(0.0, 0.0, 1000.0, 800.0)
    }

    fn cfg(threshold: f32, margin: Length) -> ObserverConfig {
        ObserverConfig {
            threshold_fraction: threshold,
            root_margin_bottom: margin,
        }
    }

    #[test]
    fn coverage_fraction() {
        let root = viewport();
        assert_eq!(Rect::new(0.0, 700.0, 100.0, 200.0).coverage_in(&root), 0.5);
        assert_eq!(Rect::new(0.0, 900.0, 100.0, 200.0).coverage_in(&root), 0.0);
        assert_eq!(Rect::new(10.0, 10.0, 0.0, 0.0).coverage_in(&root), 1.0);
    }

    #[test]
    fn first_update_reports_every_laid_out_target() {
        let mut obs = GeometryObserver::new();
        let sub = obs
            .observe(&[TargetId(0), TargetId(1), TargetId(2)], &cfg(0.5, Length::ZERO))
            .unwrap();
        let mut rects = HashMap::new();
        rects.insert(TargetId(0), Rect::new(0.0, 0.0, 100.0, 100.0));
        rects.insert(TargetId(1), Rect::new(0.0, 2000.0, 100.0, 100.0));

        let events = obs.update(viewport(), &rects);
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.subscription == sub));
        assert!(events[0].intersecting);
        assert!(!events[1].intersecting);

        // No geometry change, no events.
        assert!(obs.update(viewport(), &rects).is_empty());
    }

    #[test]
    fn reports_enter_and_exit_crossings() {
        let mut obs = GeometryObserver::new();
        obs.observe(&[TargetId(7)], &cfg(0.5, Length::ZERO)).unwrap();
        let mut rects = HashMap::new();

        rects.insert(TargetId(7), Rect::new(0.0, 760.0, 100.0, 100.0));
        assert!(!obs.update(viewport(), &rects)[0].intersecting);

        rects.insert(TargetId(7), Rect::new(0.0, 700.0, 100.0, 100.0));
        let entered = obs.update(viewport(), &rects);
        assert!(entered[0].intersecting);
        assert_eq!(entered[0].ratio, 1.0);

        // Still above threshold: silent.
        rects.insert(TargetId(7), Rect::new(0.0, 740.0, 100.0, 100.0));
        assert!(obs.update(viewport(), &rects).is_empty());

        rects.insert(TargetId(7), Rect::new(0.0, -80.0, 100.0, 100.0));
        assert!(!obs.update(viewport(), &rects)[0].intersecting);
    }

    #[test]
    fn negative_bottom_margin_shrinks_viewport() {
        let mut plain = GeometryObserver::new();
        let mut inset = GeometryObserver::new();
        plain.observe(&[TargetId(0)], &cfg(0.2, Length::ZERO)).unwrap();
        inset
            .observe(&[TargetId(0)], &cfg(0.2, Length::Percent(-10.0)))
            .unwrap();

        // Top 50px of a 100px card sits in the bottom 80px band of the viewport.
        let mut rects = HashMap::new();
        rects.insert(TargetId(0), Rect::new(0.0, 750.0, 100.0, 100.0));
        assert!(plain.update(viewport(), &rects)[0].intersecting);
        assert!(!inset.update(viewport(), &rects)[0].intersecting);
    }

    #[test]
    fn zero_threshold_means_any_overlap() {
        let mut obs = GeometryObserver::new();
        obs.observe(&[TargetId(0)], &cfg(0.0, Length::ZERO)).unwrap();
        let mut rects = HashMap::new();
        rects.insert(TargetId(0), Rect::new(0.0, 799.0, 100.0, 100.0));
        assert!(obs.update(viewport(), &rects)[0].intersecting);
    }

    #[test]
    fn cancelled_subscription_goes_quiet() {
        let mut obs = GeometryObserver::new();
        let sub = obs.observe(&[TargetId(0)], &cfg(0.5, Length::ZERO)).unwrap();
        obs.cancel(sub);
        obs.cancel(sub);
        assert_eq!(obs.active_subscriptions(), 0);
        let mut rects = HashMap::new();
        rects.insert(TargetId(0), Rect::new(0.0, 0.0, 10.0, 10.0));
        assert!(obs.update(viewport(), &rects).is_empty());
        assert!(obs.targets(sub).is_none());
    }
}
