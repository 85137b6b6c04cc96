//! Interval polling, response ordering, and new-report detection.
//!
//! Polling is driven by one-shot timers: the core arms a timer per channel,
//! fetches when it fires, and re-arms afterwards. Every `start`/`stop` bumps
//! the channel's generation so firings from a previous arm are ignored.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::ReportId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PollChannel {
    /// Session-wide active report watch that drives the new-report cue.
    Notifier,
    Dashboard,
    LiveMap,
    Chat,
}

impl PollChannel {
    pub const ALL: [Self; 4] = [Self::Notifier, Self::Dashboard, Self::LiveMap, Self::Chat];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Notifier => "notifier",
            Self::Dashboard => "dashboard",
            Self::LiveMap => "live_map",
            Self::Chat => "chat",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PollScheduler {
    generations: HashMap<PollChannel, u64>,
    active: HashSet<PollChannel>,
}

impl PollScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn bump(&mut self, channel: PollChannel) -> u64 {
        let generation = self.generations.entry(channel).or_insert(0);
        *generation += 1;
        *generation
    }

    /// Starts (or restarts) a channel. Returns the generation to tag the
    /// first timer with.
    pub fn start(&mut self, channel: PollChannel) -> u64 {
        self.active.insert(channel);
        self.bump(channel)
    }

    pub fn stop(&mut self, channel: PollChannel) {
        if self.active.remove(&channel) {
            self.bump(channel);
        }
    }

    pub fn stop_all(&mut self) {
        for channel in PollChannel::ALL {
            self.stop(channel);
        }
    }

    #[must_use]
    pub fn is_active(&self, channel: PollChannel) -> bool {
        self.active.contains(&channel)
    }

    #[must_use]
    pub fn generation(&self, channel: PollChannel) -> u64 {
        self.generations.get(&channel).copied().unwrap_or(0)
    }

    /// Whether a timer tagged with `generation` still belongs to the live
    /// arm of `channel`.
    #[must_use]
    pub fn accepts(&self, channel: PollChannel, generation: u64) -> bool {
        self.is_active(channel) && self.generation(channel) == generation
    }
}

/// Independent data feeds whose responses are ordered separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Feed {
    NotifierReports,
    DashboardReports,
    ReportDetail,
    LiveMap,
    Messages,
    Media,
    Checkpoints,
    ResolvedCases,
    AnalyticsOverview,
    LocationHotspots,
    CategoryHotspots,
}

/// Hands out monotonic request numbers per feed and accepts only the
/// response to the most recently dispatched request.
#[derive(Debug, Clone, Default)]
pub struct Sequencer {
    next: u64,
    latest: HashMap<Feed, u64>,
}

impl Sequencer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&mut self, feed: Feed) -> u64 {
        self.next += 1;
        self.latest.insert(feed, self.next);
        self.next
    }

    #[must_use]
    pub fn is_latest(&self, feed: Feed, seq: u64) -> bool {
        self.latest.get(&feed) == Some(&seq)
    }

    /// Drops whatever is in flight for `feed`.
    pub fn invalidate(&mut self, feed: Feed) {
        self.latest.remove(&feed);
    }

    pub fn reset(&mut self) {
        self.latest.clear();
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewReportDetector {
    previous: Option<HashSet<ReportId>>,
    user_has_interacted: bool,
}

impl NewReportDetector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the current active set and returns the ids absent from the
    /// previous one, in input order. The first observation after a reset
    /// only establishes the baseline.
    pub fn observe<I>(&mut self, ids: I) -> Vec<ReportId>
    where
        I: IntoIterator<Item = ReportId>,
    {
        let mut current = HashSet::new();
        let mut ordered = Vec::new();
        for id in ids {
            if current.insert(id.clone()) {
                ordered.push(id);
            }
        }

        let fresh = match &self.previous {
            Some(previous) => ordered
                .into_iter()
                .filter(|id| !previous.contains(id))
                .collect(),
            None => Vec::new(),
        };
        self.previous = Some(current);
        fresh
    }

    #[must_use]
    pub fn has_baseline(&self) -> bool {
        self.previous.is_some()
    }

    /// Called on (re)authentication.
    pub fn reset(&mut self) {
        self.previous = None;
    }

    pub fn mark_interaction(&mut self) {
        self.user_has_interacted = true;
    }

    #[must_use]
    pub fn can_play_cue(&self) -> bool {
        self.user_has_interacted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ids(raw: &[&str]) -> Vec<ReportId> {
        raw.iter().map(|s| ReportId::new(*s)).collect()
    }

    mod scheduler_tests {
        use super::*;

        #[test]
        fn test_restart_invalidates_old_timer() {
            let mut scheduler = PollScheduler::new();
            let first = scheduler.start(PollChannel::Chat);
            assert!(scheduler.accepts(PollChannel::Chat, first));

            let second = scheduler.start(PollChannel::Chat);
            assert!(!scheduler.accepts(PollChannel::Chat, first));
            assert!(scheduler.accepts(PollChannel::Chat, second));
        }

        #[test]
        fn test_stop_rejects_pending_firing() {
            let mut scheduler = PollScheduler::new();
            let generation = scheduler.start(PollChannel::LiveMap);
            scheduler.stop(PollChannel::LiveMap);
            assert!(!scheduler.accepts(PollChannel::LiveMap, generation));
            assert!(!scheduler.is_active(PollChannel::LiveMap));
        }

        #[test]
        fn test_channels_are_independent() {
            let mut scheduler = PollScheduler::new();
            let map = scheduler.start(PollChannel::LiveMap);
            let notifier = scheduler.start(PollChannel::Notifier);
            scheduler.stop(PollChannel::Notifier);
            assert!(scheduler.accepts(PollChannel::LiveMap, map));
            assert!(!scheduler.accepts(PollChannel::Notifier, notifier));

            scheduler.stop_all();
            assert!(!scheduler.accepts(PollChannel::LiveMap, map));
        }
    }

    mod sequencer_tests {
        use super::*;

        #[test]
        fn test_stale_response_rejected() {
            let mut seq = Sequencer::new();
            let older = seq.issue(Feed::DashboardReports);
            let newer = seq.issue(Feed::DashboardReports);
            assert!(!seq.is_latest(Feed::DashboardReports, older));
            assert!(seq.is_latest(Feed::DashboardReports, newer));
        }

        #[test]
        fn test_feeds_do_not_interfere() {
            let mut seq = Sequencer::new();
            let reports = seq.issue(Feed::DashboardReports);
            let _map = seq.issue(Feed::LiveMap);
            assert!(seq.is_latest(Feed::DashboardReports, reports));
        }

        #[test]
        fn test_invalidate_drops_in_flight() {
            let mut seq = Sequencer::new();
            let pending = seq.issue(Feed::Messages);
            seq.invalidate(Feed::Messages);
            assert!(!seq.is_latest(Feed::Messages, pending));
        }
    }

    mod detector_tests {
        use super::*;

        #[test]
        fn test_first_poll_is_baseline() {
            let mut detector = NewReportDetector::new();
            assert!(detector.observe(ids(&["1", "2", "3"])).is_empty());
            assert!(detector.has_baseline());
        }

        #[test]
        fn test_one_new_report() {
            let mut detector = NewReportDetector::new();
            detector.observe(ids(&["1", "2", "3"]));
            assert_eq!(detector.observe(ids(&["1", "2", "3", "4"])), ids(&["4"]));
        }

        #[test]
        fn test_unchanged_set_is_silent() {
            let mut detector = NewReportDetector::new();
            detector.observe(ids(&["1", "2", "3"]));
            assert!(detector.observe(ids(&["1", "2", "3"])).is_empty());
        }

        #[test]
        fn test_reset_rebaselines() {
            let mut detector = NewReportDetector::new();
            detector.observe(ids(&["1"]));
            detector.reset();
            assert!(detector.observe(ids(&["1", "2", "9"])).is_empty());
            assert_eq!(detector.observe(ids(&["1", "2", "9", "10"])), ids(&["10"]));
        }

        #[test]
        fn test_duplicates_reported_once() {
            let mut detector = NewReportDetector::new();
            detector.observe(ids(&[]));
            assert_eq!(detector.observe(ids(&["5", "5"])), ids(&["5"]));
        }

        #[test]
        fn test_interaction_gate() {
            let mut detector = NewReportDetector::new();
            assert!(!detector.can_play_cue());
            detector.mark_interaction();
            assert!(detector.can_play_cue());
            detector.reset();
            assert!(detector.can_play_cue());
        }
    }

    proptest! {
        #[test]
        fn prop_new_ids_are_exactly_the_difference(
            before in proptest::collection::hash_set(0u16..50, 0..20),
            after in proptest::collection::hash_set(0u16..50, 0..20),
        ) {
            let mut detector = NewReportDetector::new();
            detector.observe(before.iter().map(|n| ReportId::new(n.to_string())));
            let fresh: HashSet<ReportId> = detector
                .observe(after.iter().map(|n| ReportId::new(n.to_string())))
                .into_iter()
                .collect();
            let expected: HashSet<ReportId> = after
                .difference(&before)
                .map(|n| ReportId::new(n.to_string()))
                .collect();
            prop_assert_eq!(fresh, expected);
        }
    }
}
