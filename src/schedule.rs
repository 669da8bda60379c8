// src/schedule.rs
//! Recurring trigger expressions, evaluated in a named timezone.
//!
//! Accepted forms:
//! - 5-field cron (`m h dom mon dow`), seconds implied as `0`, `0`/`7` = Sunday
//! - 6/7-field cron with a leading seconds field (and optional year)
//! - descriptors: `@yearly`, `@monthly`, `@weekly`, `@daily`, `@hourly`
//! - `@every <duration>` in humantime syntax, e.g. `@every 15m`
//!
//! A `CRON_TZ=Europe/Vienna ` or `TZ=...` prefix overrides the default zone.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

#[derive(Debug, Clone)]
pub enum Schedule {
    Cron { expr: Box<cron::Schedule>, tz: Tz },
    Every(Duration),
}

impl Schedule {
    pub fn parse(raw: &str, default_tz: Tz) -> Result<Self, String> {
        let raw = raw.trim();
        let (tz, expr) = split_tz_prefix(raw, default_tz)?;

        if let Some(every) = expr.strip_prefix("@every") {
            let dur = humantime::parse_duration(every.trim())
                .map_err(|e| format!("invalid @every duration `{}`: {e}", every.trim()))?;
            if dur.is_zero() {
                return Err("@every duration must be greater than zero".to_string());
            }
            return Ok(Schedule::Every(dur));
        }

        let normalized = normalize_fields(expr)?;
        let parsed = cron::Schedule::from_str(&normalized)
            .map_err(|e| format!("invalid cron expression `{expr}`: {e}"))?;
        Ok(Schedule::Cron {
            expr: Box::new(parsed),
            tz,
        })
    }

    /// Next fire time strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Schedule::Cron { expr, tz } => expr
                .after(&after.with_timezone(tz))
                .next()
                .map(|t| t.with_timezone(&Utc)),
            Schedule::Every(dur) => {
                let step = chrono::Duration::from_std(*dur).ok()?;
                after.checked_add_signed(step)
            }
        }
    }
}

/// Parse an IANA zone name such as `Europe/Berlin`.
pub fn parse_tz(name: &str) -> Result<Tz, String> {
    name.trim()
        .parse::<Tz>()
        .map_err(|e| format!("unknown timezone `{name}`: {e}"))
}

fn split_tz_prefix(raw: &str, default_tz: Tz) -> Result<(Tz, &str), String> {
    for prefix in ["CRON_TZ=", "TZ="] {
        if let Some(rest) = raw.strip_prefix(prefix) {
            let (zone, expr) = rest
                .split_once(char::is_whitespace)
                .ok_or_else(|| format!("missing expression after {prefix}"))?;
            return Ok((parse_tz(zone)?, expr.trim()));
        }
    }
    Ok((default_tz, raw))
}

fn normalize_fields(expr: &str) -> Result<String, String> {
    if expr.starts_with('@') {
        return Ok(expr.to_string());
    }
    let fields: Vec<&str> = expr.split_whitespace().collect();
    match fields.len() {
        5 => {
            let dow = shift_day_of_week(fields[4])?;
            Ok(format!(
                "0 {} {} {} {} {}",
                fields[0], fields[1], fields[2], fields[3], dow
            ))
        }
        6 | 7 => Ok(fields.join(" ")),
        n => Err(format!("cron expression `{expr}` has {n} fields")),
    }
}

/// Classic cron counts weekdays 0-6 from Sunday (7 is Sunday too); the
/// evaluator counts 1-7. Numeric parts are expanded to explicit day lists
/// before shifting so ranges ending on Sunday and stepped ranges keep their
/// meaning. Day names pass through untouched.
fn shift_day_of_week(field: &str) -> Result<String, String> {
    let mut out: Vec<String> = Vec::new();
    for part in field.split(',') {
        let (base, step) = match part.split_once('/') {
            Some((b, s)) => match s.parse::<u8>() {
                Ok(n) if n > 0 => (b, Some(n)),
                _ => return Err(format!("invalid day-of-week step in `{part}`")),
            },
            None => (part, None),
        };

        let (first, last) = match (base, step) {
            ("*", None) => {
                out.push("*".to_string());
                continue;
            }
            ("*", Some(_)) => (0, 6),
            _ => match base.split_once('-') {
                Some((a, b)) => match (a.parse::<u8>(), b.parse::<u8>()) {
                    (Ok(a), Ok(b)) => (a, b),
                    _ => {
                        out.push(part.to_string());
                        continue;
                    }
                },
                None => match base.parse::<u8>() {
                    Ok(n) if step.is_some() => (n, n.max(6)),
                    Ok(n) => (n, n),
                    Err(_) => {
                        out.push(part.to_string());
                        continue;
                    }
                },
            },
        };
        if first > 7 || last > 7 {
            return Err(format!("day-of-week `{part}` is out of range 0-7"));
        }
        if first > last {
            return Err(format!("day-of-week range `{part}` is reversed"));
        }

        let mut days: Vec<u8> = (first..=last)
            .step_by(usize::from(step.unwrap_or(1)))
            .map(|d| (d % 7) + 1)
            .collect();
        days.sort_unstable();
        days.dedup();
        out.extend(days.iter().map(u8::to_string));
    }
    Ok(out.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone, Timelike, Weekday};

    #[test]
    fn five_field_expression_fires_on_minute_boundary() {
        let s = Schedule::parse("*/15 * * * *", Tz::UTC).unwrap();
        let t0 = Utc.with_ymd_and_hms(2025, 3, 1, 10, 7, 12).unwrap();
        let next = s.next_after(t0).unwrap();
        assert_eq!((next.hour(), next.minute(), next.second()), (10, 15, 0));
    }

    #[test]
    fn hourly_descriptor() {
        let s = Schedule::parse("@hourly", Tz::UTC).unwrap();
        let t0 = Utc.with_ymd_and_hms(2025, 3, 1, 10, 7, 0).unwrap();
        assert_eq!(
            s.next_after(t0).unwrap(),
            Utc.with_ymd_and_hms(2025, 3, 1, 11, 0, 0).unwrap()
        );
    }

    #[test]
    fn cron_tz_prefix_overrides_default_zone() {
        // 09:00 in Vienna is 08:00 UTC in winter.
        let s = Schedule::parse("CRON_TZ=Europe/Vienna 0 9 * * *", Tz::UTC).unwrap();
        let t0 = Utc.with_ymd_and_hms(2025, 1, 10, 0, 0, 0).unwrap();
        let next = s.next_after(t0).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2025, 1, 10, 8, 0, 0).unwrap());
    }

    #[test]
    fn default_zone_applies_without_prefix() {
        let s = Schedule::parse("0 9 * * *", Tz::America__New_York).unwrap();
        let t0 = Utc.with_ymd_and_hms(2025, 1, 10, 0, 0, 0).unwrap();
        let next = s.next_after(t0).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2025, 1, 10, 14, 0, 0).unwrap());
    }

    #[test]
    fn weekday_numbers_follow_classic_cron() {
        let s = Schedule::parse("0 8 * * 1-5", Tz::UTC).unwrap();
        // 2025-03-01 is a Saturday.
        let t0 = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let next = s.next_after(t0).unwrap();
        assert_eq!(next.weekday(), Weekday::Mon);

        let sunday = Schedule::parse("0 8 * * 0", Tz::UTC).unwrap();
        assert_eq!(sunday.next_after(t0).unwrap().weekday(), Weekday::Sun);

        // Friday through Sunday wraps past the end of the week.
        let weekend = Schedule::parse("0 8 * * 5-7", Tz::UTC).unwrap();
        assert_eq!(weekend.next_after(t0).unwrap().weekday(), Weekday::Sun);
        assert_eq!(shift_day_of_week("5-7").unwrap(), "1,6,7");
        assert_eq!(shift_day_of_week("1-5,0").unwrap(), "2,3,4,5,6,1");
        assert_eq!(shift_day_of_week("MON-FRI").unwrap(), "MON-FRI");
    }

    #[test]
    fn stepped_weekday_range_wrapping_to_sunday() {
        // Wednesday, Friday and Sunday.
        assert_eq!(shift_day_of_week("3-7/2").unwrap(), "1,4,6");
        let s = Schedule::parse("0 8 * * 3-7/2", Tz::UTC).unwrap();
        // 2025-03-02 is a Sunday; the next fire is Wednesday, not Tuesday.
        let t0 = Utc.with_ymd_and_hms(2025, 3, 2, 12, 0, 0).unwrap();
        let next = s.next_after(t0).unwrap();
        assert_eq!(next.weekday(), Weekday::Wed);
        assert_eq!(next.day(), 5);
        assert_eq!(s.next_after(next).unwrap().weekday(), Weekday::Fri);

        assert_eq!(shift_day_of_week("*/2").unwrap(), "1,3,5,7");
    }

    #[test]
    fn out_of_range_weekdays_are_rejected() {
        assert!(Schedule::parse("0 8 * * 255-255", Tz::UTC).is_err());
        assert!(Schedule::parse("0 8 * * 8", Tz::UTC).is_err());
        assert!(Schedule::parse("0 8 * * 5-2", Tz::UTC).is_err());
        assert!(Schedule::parse("0 8 * * 1/0", Tz::UTC).is_err());
    }

    #[test]
    fn every_interval() {
        let s = Schedule::parse("@every 90s", Tz::UTC).unwrap();
        let t0 = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(
            s.next_after(t0).unwrap(),
            Utc.with_ymd_and_hms(2025, 3, 1, 12, 1, 30).unwrap()
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!(Schedule::parse("every now and then", Tz::UTC).is_err());
        assert!(Schedule::parse("@every 0s", Tz::UTC).is_err());
        assert!(Schedule::parse("TZ=Mars/Olympus 0 * * * *", Tz::UTC).is_err());
    }
}
