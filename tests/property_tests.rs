use std::collections::HashMap;

use pathfinding_governor::config::{FAR_DIST_SQ, PRIORITY_CHASE, PRIORITY_COMBAT, PRIORITY_WANDER};
use pathfinding_governor::*;
use proptest::prelude::*;

// ─── Generators ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Offer {
    actor: u32,
    class: u8,
    in_combat: bool,
    far: bool,
    x: i32,
}

impl Offer {
    fn context(&self) -> RequestContext {
        let priority = match self.class {
            0 => PRIORITY_WANDER,
            1 => PRIORITY_CHASE,
            _ => PRIORITY_COMBAT,
        };
        let distance_sq = if self.far { FAR_DIST_SQ * 2.0 } else { 900.0 };
        RequestContext::new(self.actor, priority, distance_sq)
            .with_target(self.x as f64, 0.0)
            .in_combat(self.in_combat)
    }

    fn is_combat(&self) -> bool {
        self.class >= 2 || self.in_combat
    }
}

fn offer() -> impl Strategy<Value = Offer> {
    (0u32..10, 0u8..3, prop::bool::weighted(0.1), prop::bool::weighted(0.6), 0i32..40)
        .prop_map(|(actor, class, in_combat, far, x)| Offer { actor, class, in_combat, far, x })
}

#[derive(Debug, Clone)]
struct TickPlan {
    offers: Vec<Offer>,
    timeouts: u8,
    clear_streak: bool,
}

fn tick_plan() -> impl Strategy<Value = TickPlan> {
    (prop::collection::vec(offer(), 0..24), 0u8..4, any::<bool>())
        .prop_map(|(offers, timeouts, clear_streak)| TickPlan { offers, timeouts, clear_streak })
}

fn config(budget: u32, max_queue: usize) -> GuardConfig {
    GuardConfig {
        min_guarded_ticks: 5,
        ..GuardConfig::with_limits(budget, max_queue)
    }
}

// ─── Properties ─────────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn budget_never_overspent(
        budget in 0u32..12,
        max_queue in 1usize..16,
        plan in prop::collection::vec(tick_plan(), 1..40),
    ) {
        let mut sim = GuardSimulation::with_config(config(budget, max_queue));
        for tick in &plan {
            for _ in 0..tick.timeouts {
                sim.inject_navmesh_query(500);
            }
            for o in &tick.offers {
                sim.offer(&o.context());
            }
            let r = sim.tick_core();
            prop_assert!(r.admitted <= r.budget.saturating_sub(r.drained), "{:?}", r);
            prop_assert!(r.drained <= r.budget.max(1), "{:?}", r);
            prop_assert!(r.remaining_budget <= r.budget);
        }
    }

    #[test]
    fn combat_is_never_refused(
        budget in 0u32..6,
        max_queue in 1usize..6,
        plan in prop::collection::vec(tick_plan(), 1..30),
    ) {
        let mut sim = GuardSimulation::with_config(config(budget, max_queue));
        for tick in &plan {
            for o in &tick.offers {
                let admission = sim.offer(&o.context());
                if o.is_combat() {
                    prop_assert!(admission.is_admitted(), "{:?} -> {:?}", o, admission);
                }
            }
            sim.tick_core();
        }
    }

    #[test]
    fn no_actor_dropped_more_than_threshold_in_a_row(
        max_queue in 1usize..4,
        plan in prop::collection::vec(tick_plan(), 1..30),
    ) {
        let cfg = config(0, max_queue);
        let threshold = cfg.max_consecutive_drops;
        let mut sim = GuardSimulation::with_config(cfg);
        let mut streaks: HashMap<u32, u32> = HashMap::new();

        for tick in &plan {
            for o in &tick.offers {
                match sim.offer(&o.context()) {
                    Admission::Dropped => {
                        let s = streaks.entry(o.actor).or_insert(0);
                        *s += 1;
                        prop_assert!(*s <= threshold, "actor {} dropped {} times", o.actor, s);
                    }
                    Admission::Deferred | Admission::Forced => {
                        streaks.remove(&o.actor);
                    }
                    _ => {}
                }
            }
            let r = sim.tick_core();
            prop_assert!(r.longest_drop_streak <= threshold);
        }
    }

    #[test]
    fn guarded_dwell_is_respected_and_reentry_is_silent(
        budget in 0u32..10,
        max_queue in 1usize..20,
        plan in prop::collection::vec(tick_plan(), 1..60),
    ) {
        let cfg = config(budget, max_queue);
        let min_dwell = cfg.min_guarded_ticks;
        let mut sim = GuardSimulation::with_config(cfg);
        let mut last: Option<Transition> = None;

        for tick in &plan {
            for _ in 0..tick.timeouts {
                sim.inject_navmesh_query(500);
            }
            if tick.clear_streak {
                sim.inject_navmesh_query(1);
            }
            for o in &tick.offers {
                sim.offer(&o.context());
            }
            let r = sim.tick_core();
            if let Some(t) = r.transition {
                prop_assert_ne!(t.from, t.to);
                if let Some(prev) = last {
                    prop_assert_eq!(prev.to, t.from, "transitions must alternate");
                    if t.to == OverloadState::Normal {
                        prop_assert!(t.tick - prev.tick >= min_dwell);
                    }
                }
                last = Some(t);
            }
            // tick_core has already opened the next tick.
            let guarded = sim.guard().state() == OverloadState::Guarded;
            prop_assert_eq!(sim.status().conservative_mode, guarded);
            prop_assert_eq!(sim.status().stricter_matching, guarded);
        }
    }

    #[test]
    fn every_deferred_request_is_accounted_for(
        budget in 0u32..8,
        max_queue in 1usize..10,
        plan in prop::collection::vec(tick_plan(), 1..40),
    ) {
        let mut sim = GuardSimulation::with_config(config(budget, max_queue));
        for tick in &plan {
            for o in &tick.offers {
                sim.offer(&o.context());
            }
            sim.tick_core();

            let s = sim.status();
            prop_assert_eq!(
                s.deferred_requests,
                s.queue_dropped + s.queue_forced + s.queue_processed + s.queue_len as u64
            );
        }
    }
}
