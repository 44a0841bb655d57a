// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Pathfinding Admission Governor - Same-Tick Duplicate Filter

use std::collections::HashSet;

use crate::panic_protocol::MatchingControl;

/// `(actor, quantized x, quantized y)`.
type RequestKey = (u32, i64, i64);

/// Drops repeated searches for the same actor and target within one tick.
///
/// Normal matching quantizes targets to whole tiles. Stricter matching keeps
/// a tenth of a tile, so fewer requests collide and fewer are reused.
#[derive(Debug, Default)]
pub struct DuplicateRequestFilter {
    seen: HashSet<RequestKey>,
    current_tick: Option<u64>,
    stricter_matching: bool,
    duplicates_filtered: u64,
}

impl DuplicateRequestFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_tick_start(&mut self, tick: u64) {
        if self.current_tick != Some(tick) {
            self.seen.clear();
            self.current_tick = Some(tick);
        }
    }

    /// Records the key on first sight; later sightings this tick are duplicates.
    pub fn is_duplicate(&mut self, actor_id: u32, target_x: f64, target_y: f64) -> bool {
        let key = self.key(actor_id, target_x, target_y);
        if self.seen.insert(key) {
            false
        } else {
            self.duplicates_filtered += 1;
            true
        }
    }

    fn key(&self, actor_id: u32, x: f64, y: f64) -> RequestKey {
        if self.stricter_matching {
            (actor_id, (x * 10.0).trunc() as i64, (y * 10.0).trunc() as i64)
        } else {
            (actor_id, x.round() as i64, y.round() as i64)
        }
    }

    pub fn on_tick_end(&mut self) {
        self.seen.clear();
    }

    pub fn is_stricter(&self) -> bool {
        self.stricter_matching
    }

    pub fn duplicates_filtered(&self) -> u64 {
        self.duplicates_filtered
    }

    pub fn tracked_keys(&self) -> usize {
        self.seen.len()
    }

    pub fn reset_telemetry(&mut self) {
        self.duplicates_filtered = 0;
    }
}

impl MatchingControl for DuplicateRequestFilter {
    fn set_stricter_matching(&mut self, stricter: bool) {
        self.stricter_matching = stricter;
    }
}
