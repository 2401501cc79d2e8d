use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;
use ts_core::{Event, EventKind, Timestamp};

/// Visual category of an event marker. Earnings get their own look, every
/// other event shares one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerCategory {
    Earnings,
    Other,
}

impl From<EventKind> for MarkerCategory {
    fn from(kind: EventKind) -> Self {
        match kind {
            EventKind::Earnings => MarkerCategory::Earnings,
            EventKind::Dividend | EventKind::Other => MarkerCategory::Other,
        }
    }
}

/// Unstyled vertical marker on the time axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationSpec {
    pub value: Timestamp,
    pub category: MarkerCategory,
}

/// Events dated at or after `threshold`. Undated or unparseable events are dropped.
pub fn events_since(events: &[Event], threshold: Timestamp) -> Vec<Event> {
    events
        .iter()
        .filter(|e| e.timestamp().is_some_and(|ts| ts >= threshold))
        .cloned()
        .collect()
}

/// Build `evt<index>` markers for events inside `[x_min, x_max]`.
///
/// Ids index the input order, so the same input always yields the same ids.
/// Repeats of an already-placed `(time, kind)` pair are skipped.
pub fn build_annotations(
    events: &[Event],
    visible: (Timestamp, Timestamp),
) -> BTreeMap<String, AnnotationSpec> {
    let (x_min, x_max) = visible;
    let mut seen = HashSet::new();
    let mut out = BTreeMap::new();
    for (i, event) in events.iter().enumerate() {
        let Some(ts) = event.timestamp() else {
            debug!(index = i, date = ?event.date, "dropping event with unparseable date");
            continue;
        };
        if ts < x_min || ts > x_max {
            continue;
        }
        if !seen.insert((ts, event.kind)) {
            continue;
        }
        out.insert(
            format!("evt{i}"),
            AnnotationSpec {
                value: ts,
                category: event.kind.into(),
            },
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ts_core::DAY_MS;

    fn at(ts: i64, kind: EventKind) -> Event {
        Event::new(ts.to_string(), kind)
    }

    #[test]
    fn bounds_are_inclusive() {
        let events = vec![
            at(100, EventKind::Earnings),
            at(200, EventKind::Dividend),
            at(99, EventKind::Earnings),
            at(201, EventKind::Dividend),
        ];
        let out = build_annotations(&events, (100, 200));
        assert_eq!(out.len(), 2);
        assert_eq!(out["evt0"].value, 100);
        assert_eq!(out["evt0"].category, MarkerCategory::Earnings);
        assert_eq!(out["evt1"].category, MarkerCategory::Other);
        assert!(!out.contains_key("evt2"));
        assert!(!out.contains_key("evt3"));
    }

    #[test]
    fn malformed_dates_are_skipped_but_keep_ids_stable() {
        let events = vec![
            Event::new("garbage", EventKind::Earnings),
            Event {
                date: None,
                kind: EventKind::Other,
            },
            Event::new("1970-01-02", EventKind::Dividend),
        ];
        let out = build_annotations(&events, (0, 10 * DAY_MS));
        assert_eq!(out.keys().collect::<Vec<_>>(), vec!["evt2"]);
        assert_eq!(out["evt2"].value, DAY_MS);
    }

    #[test]
    fn duplicate_events_collapse_to_first() {
        let events = vec![
            at(50, EventKind::Earnings),
            at(50, EventKind::Earnings),
            at(50, EventKind::Dividend),
        ];
        let out = build_annotations(&events, (0, 100));
        assert_eq!(out.len(), 2);
        assert!(out.contains_key("evt0"));
        assert!(out.contains_key("evt2"));
    }

    #[test]
    fn rebuild_is_deterministic() {
        let events: Vec<Event> = (0..12).map(|i| at(i * 10, EventKind::Other)).collect();
        assert_eq!(
            build_annotations(&events, (0, 1_000)),
            build_annotations(&events, (0, 1_000))
        );
    }

    #[test]
    fn events_since_drops_old_and_undated() {
        let events = vec![
            at(10, EventKind::Earnings),
            at(30, EventKind::Dividend),
            Event::new("soon", EventKind::Other),
        ];
        let kept = events_since(&events, 20);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].kind, EventKind::Dividend);
        assert_eq!(events_since(&events, Timestamp::MIN).len(), 2);
    }
}
