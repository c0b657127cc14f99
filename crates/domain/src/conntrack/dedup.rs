use std::collections::VecDeque;
use std::time::{Duration, Instant};

use super::compare::compare;
use super::entity::ConnectionRecord;
use super::flags::ComparisonFlags;

/// Tuning for [`EventDeduplicator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DedupSettings {
    pub enabled: bool,
    /// How long a seen record suppresses its duplicates.
    pub window: Duration,
    /// Upper bound on remembered records. Oldest are evicted first.
    pub max_entries: usize,
    /// Flags used to decide whether two records are the same event.
    pub flags: ComparisonFlags,
}

impl Default for DedupSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            window: Duration::from_secs(5),
            max_entries: 4096,
            flags: ComparisonFlags::ALL | ComparisonFlags::STRICT,
        }
    }
}

/// Drops connection events that repeat a record seen within the window.
///
/// Previously seen records act as the pattern side of the comparison and
/// the incoming record as the candidate.
#[derive(Debug)]
pub struct EventDeduplicator {
    settings: DedupSettings,
    recent: VecDeque<(ConnectionRecord, Instant)>,
}

impl EventDeduplicator {
    pub fn new(settings: DedupSettings) -> Self {
        Self {
            settings,
            recent: VecDeque::new(),
        }
    }

    pub fn settings(&self) -> &DedupSettings {
        &self.settings
    }

    /// Record an event observed now. Returns `true` when the event is new
    /// and should be forwarded, `false` when it duplicates a recent one.
    pub fn observe(&mut self, record: &ConnectionRecord) -> bool {
        self.observe_at(record, Instant::now())
    }

    /// Same as [`observe`](Self::observe) with an explicit clock reading.
    pub fn observe_at(&mut self, record: &ConnectionRecord, now: Instant) -> bool {
        if !self.settings.enabled {
            return true;
        }

        self.expire(now);
        if self.is_duplicate(record) {
            return false;
        }

        self.recent.push_back((record.clone(), now));
        self.enforce_cap();
        true
    }

    /// Whether `record` matches any remembered record, without remembering it.
    pub fn is_duplicate(&self, record: &ConnectionRecord) -> bool {
        self.recent
            .iter()
            .any(|(seen, _)| compare(seen, record, self.settings.flags))
    }

    /// Swap settings without dropping remembered records, unless dedup was
    /// turned off. A smaller cap evicts the oldest entries immediately.
    pub fn reload(&mut self, settings: DedupSettings) {
        self.settings = settings;
        if settings.enabled {
            self.enforce_cap();
        } else {
            self.recent.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.recent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recent.is_empty()
    }

    pub fn clear(&mut self) {
        self.recent.clear();
    }

    fn expire(&mut self, now: Instant) {
        while let Some(&(_, ts)) = self.recent.front() {
            if now.saturating_duration_since(ts) > self.settings.window {
                self.recent.pop_front();
            } else {
                break;
            }
        }
    }

    fn enforce_cap(&mut self) {
        while self.recent.len() > self.settings.max_entries {
            self.recent.pop_front();
        }
    }
}

impl Default for EventDeduplicator {
    fn default() -> Self {
        Self::new(DedupSettings::default())
    }
}
