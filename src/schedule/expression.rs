//! # Schedule expressions: interval text and cron.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

use crate::schedule::ScheduleSource;

/// Parsed recurring schedule.
#[derive(Clone)]
pub enum Schedule {
    /// Fixed period, aligned to multiples of the period since the Unix epoch.
    Every {
        period: Duration,
        expression: String,
    },
    /// Cron expression.
    Cron {
        schedule: Box<cron::Schedule>,
        expression: String,
    },
}

impl fmt::Debug for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Schedule").field(&self.expression()).finish()
    }
}

impl Schedule {
    /// Parses interval text (`every <N> <unit>`) or a 5/6/7-field cron expression.
    ///
    /// The error string is a parser diagnostic; callers wrap it into
    /// [`RuntimeError::ScheduleParse`](crate::RuntimeError::ScheduleParse).
    pub fn parse(expression: &str) -> Result<Self, String> {
        let trimmed = expression.trim();
        if trimmed.is_empty() {
            return Err("empty expression".to_string());
        }

        let lower = trimmed.to_ascii_lowercase();
        if let Some(rest) = lower.strip_prefix("every ") {
            let period = parse_interval(rest)?;
            return Ok(Schedule::Every {
                period,
                expression: trimmed.to_string(),
            });
        }

        let fields = trimmed.split_whitespace().count();
        let normalized = match fields {
            5 => format!("0 {trimmed}"),
            6 | 7 => trimmed.to_string(),
            n => return Err(format!("expected 5, 6 or 7 cron fields, got {n}")),
        };
        let schedule = cron::Schedule::from_str(&normalized).map_err(|e| e.to_string())?;
        Ok(Schedule::Cron {
            schedule: Box::new(schedule),
            expression: trimmed.to_string(),
        })
    }

    /// The expression as configured.
    pub fn expression(&self) -> &str {
        match self {
            Schedule::Every { expression, .. } | Schedule::Cron { expression, .. } => expression,
        }
    }
}

impl ScheduleSource for Schedule {
    fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Schedule::Every { period, .. } => {
                let period_ms = i64::try_from(period.as_millis()).ok()?;
                let now_ms = after.timestamp_millis();
                let next_ms = (now_ms.div_euclid(period_ms) + 1).checked_mul(period_ms)?;
                Utc.timestamp_millis_opt(next_ms).single()
            }
            Schedule::Cron { schedule, .. } => schedule.after(&after).next(),
        }
    }

    fn describe(&self) -> String {
        self.expression().to_string()
    }
}

/// Parses `<N> <unit>` or `<unit>` (N = 1).
fn parse_interval(text: &str) -> Result<Duration, String> {
    let mut parts = text.split_whitespace();
    let first = parts.next().ok_or("missing interval")?;
    let (count, unit) = match first.parse::<u64>() {
        Ok(n) => (n, parts.next().ok_or("missing interval unit")?),
        Err(_) => (1, first),
    };
    if let Some(extra) = parts.next() {
        return Err(format!("unexpected token '{extra}'"));
    }
    if count == 0 {
        return Err("interval must be greater than zero".to_string());
    }

    let unit_secs = match unit.trim_end_matches('s') {
        "sec" | "second" => 1,
        "min" | "minute" => 60,
        "hour" => 3600,
        "day" => 86_400,
        other => return Err(format!("unknown interval unit '{other}'")),
    };
    count
        .checked_mul(unit_secs)
        .map(Duration::from_secs)
        .ok_or_else(|| "interval too large".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, h, m, s).unwrap()
    }

    #[test]
    fn interval_text_aligns_to_period() {
        let s = Schedule::parse("every 10 seconds").unwrap();
        assert_eq!(s.next_after(at(12, 0, 0)), Some(at(12, 0, 10)));
        assert_eq!(s.next_after(at(12, 0, 15)), Some(at(12, 0, 20)));
        assert_eq!(s.next_after(at(12, 0, 25)), Some(at(12, 0, 30)));
    }

    #[test]
    fn interval_units() {
        let cases = [
            ("every second", 1),
            ("every 5 minutes", 300),
            ("Every 2 Hours", 7200),
            ("every 1 day", 86_400),
        ];
        for (text, secs) in cases {
            match Schedule::parse(text).unwrap() {
                Schedule::Every { period, .. } => assert_eq!(period, Duration::from_secs(secs)),
                other => panic!("{text} parsed as {other:?}"),
            }
        }
    }

    #[test]
    fn five_field_cron_implies_zero_seconds() {
        let s = Schedule::parse("*/15 * * * *").unwrap();
        let next = s.next_after(at(12, 7, 30)).unwrap();
        assert_eq!((next.minute(), next.second()), (15, 0));
    }

    #[test]
    fn six_field_cron() {
        let s = Schedule::parse("30 * * * * *").unwrap();
        assert_eq!(s.next_after(at(12, 0, 0)), Some(at(12, 0, 30)));
        assert_eq!(s.describe(), "30 * * * * *");
    }

    #[test]
    fn rejects_malformed() {
        assert!(Schedule::parse("").is_err());
        assert!(Schedule::parse("every 0 seconds").is_err());
        assert!(Schedule::parse("every 3 fortnights").is_err());
        assert!(Schedule::parse("every ten seconds").is_err());
        assert!(Schedule::parse("* *").is_err());
        assert!(Schedule::parse("99 * * * *").is_err());
    }
}
