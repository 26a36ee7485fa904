//! Trigger — the event class that makes a rule a candidate to run.

use chrono::{Datelike, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::pattern::matches_glob;

/// Describes what makes a rule a candidate for execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Trigger {
    /// Fires whenever the page is evaluated.
    PageLoad,
    /// Fires when the current URL matches a glob pattern.
    UrlChange { pattern: String },
    /// Fires when an element matching `selector` is present.
    ElementAppears { selector: String },
    /// Fires while the clock is inside a weekly schedule.
    TimeBased { schedule: Schedule },
    /// Fires on a user interaction, optionally filtered by selector.
    UserAction {
        event: String,
        #[serde(default)]
        selector: Option<String>,
    },
}

impl Trigger {
    /// Whether this trigger needs its own watcher (poller or listener)
    /// in addition to the shared page-level triggers.
    #[must_use]
    pub fn has_dedicated_watcher(&self) -> bool {
        matches!(self, Self::TimeBased { .. } | Self::UserAction { .. })
    }

    /// Whether this trigger is pushed by an event rather than evaluated
    /// during a trigger check.
    #[must_use]
    pub fn is_push_triggered(&self) -> bool {
        matches!(self, Self::UserAction { .. })
    }

    /// Evaluate a `url_change` trigger against `url`.
    ///
    /// Other variants return `false`.
    #[must_use]
    pub fn matches_url(&self, url: &str) -> bool {
        match self {
            Self::UrlChange { pattern } => matches_glob(pattern, url),
            _ => false,
        }
    }
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PageLoad => f.write_str("page_load"),
            Self::UrlChange { pattern } => write!(f, "url_change({pattern})"),
            Self::ElementAppears { selector } => write!(f, "element_appears({selector})"),
            Self::TimeBased { .. } => f.write_str("time_based"),
            Self::UserAction {
                event,
                selector: Some(selector),
            } => write!(f, "user_action({event}, {selector})"),
            Self::UserAction { event, .. } => write!(f, "user_action({event})"),
        }
    }
}

/// A weekly window for `time_based` triggers.
///
/// Days use `0 = Sunday … 6 = Saturday`. Times are `HH:MM` in 24-hour format
/// and both bounds are inclusive. A missing bound leaves that side open; a
/// start later than the end wraps around midnight.
///
/// Unrecognised fields are rejected: a schedule that silently lost its
/// bounds would be active at all times.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Schedule {
    #[serde(default, alias = "daysOfWeek")]
    pub days_of_week: Option<Vec<u8>>,
    #[serde(default, alias = "startTime")]
    pub start_time: Option<String>,
    #[serde(default, alias = "endTime")]
    pub end_time: Option<String>,
}

impl Schedule {
    /// Check whether the local wall-clock time `at` falls inside the schedule.
    ///
    /// Unparseable times fail closed.
    #[must_use]
    pub fn is_active_at(&self, at: NaiveDateTime) -> bool {
        if let Some(days) = &self.days_of_week {
            let today = at.weekday().num_days_from_sunday();
            if !days.iter().any(|day| u32::from(*day) == today) {
                return false;
            }
        }

        let Some(now) = NaiveTime::from_hms_opt(at.hour(), at.minute(), 0) else {
            return false;
        };
        let start = match self.start_time.as_deref().map(parse_hhmm) {
            Some(Some(time)) => Some(time),
            Some(None) => return false,
            None => None,
        };
        let end = match self.end_time.as_deref().map(parse_hhmm) {
            Some(Some(time)) => Some(time),
            Some(None) => return false,
            None => None,
        };

        match (start, end) {
            (Some(start), Some(end)) if start <= end => now >= start && now <= end,
            (Some(start), Some(end)) => now >= start || now <= end,
            (Some(start), None) => now >= start,
            (None, Some(end)) => now <= end,
            (None, None) => true,
        }
    }
}

fn parse_hhmm(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(year, month, day)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn office_hours() -> Schedule {
        Schedule {
            days_of_week: Some(vec![1, 2, 3, 4, 5]),
            start_time: Some("09:00".to_string()),
            end_time: Some("17:00".to_string()),
        }
    }

    // 2024-05-01 is a Wednesday, 2024-05-04 a Saturday.

    #[test]
    fn should_fire_on_weekday_inside_window() {
        assert!(office_hours().is_active_at(at(2024, 5, 1, 12, 0)));
    }

    #[test]
    fn should_not_fire_on_saturday() {
        assert!(!office_hours().is_active_at(at(2024, 5, 4, 12, 0)));
    }

    #[test]
    fn should_not_fire_after_end_time() {
        assert!(!office_hours().is_active_at(at(2024, 5, 1, 20, 0)));
    }

    #[test]
    fn should_include_both_bounds() {
        assert!(office_hours().is_active_at(at(2024, 5, 1, 9, 0)));
        assert!(office_hours().is_active_at(at(2024, 5, 1, 17, 0)));
        assert!(!office_hours().is_active_at(at(2024, 5, 1, 17, 1)));
    }

    #[test]
    fn should_wrap_overnight_window() {
        let schedule = Schedule {
            days_of_week: None,
            start_time: Some("22:00".to_string()),
            end_time: Some("06:00".to_string()),
        };
        assert!(schedule.is_active_at(at(2024, 5, 1, 23, 30)));
        assert!(schedule.is_active_at(at(2024, 5, 1, 5, 59)));
        assert!(!schedule.is_active_at(at(2024, 5, 1, 12, 0)));
    }

    #[test]
    fn should_fail_closed_on_malformed_time() {
        let schedule = Schedule {
            days_of_week: None,
            start_time: Some("nine".to_string()),
            end_time: None,
        };
        assert!(!schedule.is_active_at(at(2024, 5, 1, 12, 0)));
    }

    #[test]
    fn should_honour_camel_case_schedule_when_deserialized() {
        let schedule: Schedule = serde_json::from_value(serde_json::json!({
            "daysOfWeek": [1, 2, 3, 4, 5],
            "startTime": "09:00",
            "endTime": "17:00"
        }))
        .unwrap();
        assert_eq!(schedule, office_hours());
        assert!(!schedule.is_active_at(at(2024, 5, 4, 12, 0)));
        assert!(schedule.is_active_at(at(2024, 5, 1, 12, 0)));
    }

    #[test]
    fn should_reject_schedule_with_unknown_field() {
        let result = serde_json::from_value::<Schedule>(serde_json::json!({
            "days": [1],
            "from": "09:00"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn should_always_fire_with_empty_schedule() {
        assert!(Schedule::default().is_active_at(at(2024, 5, 4, 3, 0)));
    }

    #[test]
    fn should_match_url_change_with_glob() {
        let trigger = Trigger::UrlChange {
            pattern: "*.example.com/*".to_string(),
        };
        assert!(trigger.matches_url("https://foo.example.com/bar"));
        assert!(!trigger.matches_url("https://example.org"));
        assert!(!Trigger::PageLoad.matches_url("https://foo.example.com/bar"));
    }

    #[test]
    fn should_flag_dedicated_watchers() {
        assert!(
            Trigger::TimeBased {
                schedule: Schedule::default()
            }
            .has_dedicated_watcher()
        );
        assert!(
            Trigger::UserAction {
                event: "click".to_string(),
                selector: None
            }
            .is_push_triggered()
        );
        assert!(!Trigger::PageLoad.has_dedicated_watcher());
    }

    #[test]
    fn should_display_trigger_variants() {
        assert_eq!(Trigger::PageLoad.to_string(), "page_load");
        let t = Trigger::UserAction {
            event: "submit".to_string(),
            selector: Some("form".to_string()),
        };
        assert_eq!(t.to_string(), "user_action(submit, form)");
    }

    #[test]
    fn should_deserialize_time_based_from_tagged_json() {
        let json = serde_json::json!({
            "type": "time_based",
            "schedule": {"days_of_week": [0, 6], "start_time": "10:00"}
        });
        let trigger: Trigger = serde_json::from_value(json).unwrap();
        match trigger {
            Trigger::TimeBased { schedule } => {
                assert_eq!(schedule.days_of_week, Some(vec![0, 6]));
                assert!(schedule.end_time.is_none());
            }
            other => panic!("expected time_based, got {other}"),
        }
    }
}
