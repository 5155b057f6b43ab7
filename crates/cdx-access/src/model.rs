use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};

use cdx_format::Capture;

/// A named, reusable set of access points (e.g. "public", "staff") that a
/// rule can grant. Every rule names exactly one policy by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPolicy {
    pub id: u64,
    pub name: String,
    pub access_points: Vec<String>,
}

impl AccessPolicy {
    pub fn grants(&self, access_point: &str) -> bool {
        self.access_points.iter().any(|p| p == access_point)
    }
}

/// An inclusive-from/exclusive-to window over a timestamp. Either bound may
/// be absent, in which case it doesn't constrain that side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DateWindow {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl DateWindow {
    pub fn contains(&self, when: DateTime<Utc>) -> bool {
        let after_from = match self.from {
            Some(from) => from <= when,
            None => true,
        };
        let before_to = match self.to {
            Some(to) => when < to,
            None => true,
        };
        after_from && before_to
    }
}

/// A relative window: access is permitted only within `years` of the
/// capture date (a "dark archive becomes public after N years" rule).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelativeWindow {
    pub years: u32,
}

impl RelativeWindow {
    pub fn contains(&self, captured: DateTime<Utc>, accessed: DateTime<Utc>) -> bool {
        match captured.checked_add_months(Months::new(self.years * 12)) {
            Some(cutoff) => accessed < cutoff,
            None => true,
        }
    }
}

/// One access-control rule: a set of SURT prefixes, an optional set of date
/// constraints, and a reference to the policy it grants when it matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRule {
    pub id: u64,
    pub policy_id: u64,
    /// SURT prefixes this rule governs. An empty string is the match-all
    /// default rule.
    pub surts: Vec<String>,
    pub captured: Option<DateWindow>,
    pub accessed: Option<DateWindow>,
    pub period: Option<RelativeWindow>,
    #[serde(default)]
    pub enabled: bool,
}

impl AccessRule {
    /// Whether this rule's non-prefix predicates are satisfied for the
    /// given capture, evaluated at `access_time`. Prefix matching is the
    /// caller's job (the trie already filtered on it).
    pub fn applies_to(&self, capture: &Capture, access_time: DateTime<Utc>) -> bool {
        if !self.enabled {
            return false;
        }
        let captured_at = match parse_capture_timestamp(capture.timestamp) {
            Some(dt) => dt,
            None => return false,
        };
        if let Some(window) = &self.captured {
            if !window.contains(captured_at) {
                return false;
            }
        }
        if let Some(window) = &self.accessed {
            if !window.contains(access_time) {
                return false;
            }
        }
        if let Some(period) = &self.period {
            if !period.contains(captured_at, access_time) {
                return false;
            }
        }
        true
    }
}

pub fn parse_capture_timestamp(timestamp: u64) -> Option<DateTime<Utc>> {
    let text = format!("{timestamp:014}");
    let naive = chrono::NaiveDateTime::parse_from_str(&text, "%Y%m%d%H%M%S").ok()?;
    Some(naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_capture(timestamp: u64) -> Capture {
        Capture {
            urlkey: "org,example)/".to_owned(),
            timestamp,
            original: "http://example.org/".to_owned(),
            mimetype: "text/html".to_owned(),
            status: 200,
            digest: "sha1:AAA".to_owned(),
            redirecturl: "-".to_owned(),
            length: 1234,
            compressed_offset: 5678,
            file: "file.warc.gz".to_owned(),
        }
    }

    #[test]
    fn date_window_is_inclusive_from_exclusive_to() {
        let window = DateWindow {
            from: Some(Utc.with_ymd_and_hms(2019, 1, 1, 0, 0, 0).unwrap()),
            to: Some(Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap()),
        };
        assert!(window.contains(Utc.with_ymd_and_hms(2019, 1, 1, 0, 0, 0).unwrap()));
        assert!(window.contains(Utc.with_ymd_and_hms(2020, 6, 1, 0, 0, 0).unwrap()));
        assert!(!window.contains(Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap()));
        assert!(!window.contains(Utc.with_ymd_and_hms(2018, 12, 31, 0, 0, 0).unwrap()));
    }

    #[test]
    fn relative_window_expires_after_n_years() {
        let period = RelativeWindow { years: 2 };
        let captured = Utc.with_ymd_and_hms(2019, 1, 1, 0, 0, 0).unwrap();
        assert!(period.contains(captured, Utc.with_ymd_and_hms(2020, 6, 1, 0, 0, 0).unwrap()));
        assert!(!period.contains(captured, Utc.with_ymd_and_hms(2021, 6, 1, 0, 0, 0).unwrap()));
    }

    #[test]
    fn disabled_rule_never_applies() {
        let rule = AccessRule {
            id: 1,
            policy_id: 1,
            surts: vec![String::new()],
            captured: None,
            accessed: None,
            period: None,
            enabled: false,
        };
        assert!(!rule.applies_to(&sample_capture(20200101000000), Utc::now()));
    }

    #[test]
    fn rule_with_no_predicates_always_applies_once_enabled() {
        let rule = AccessRule {
            id: 1,
            policy_id: 1,
            surts: vec![String::new()],
            captured: None,
            accessed: None,
            period: None,
            enabled: true,
        };
        assert!(rule.applies_to(&sample_capture(20200101000000), Utc::now()));
    }
}
