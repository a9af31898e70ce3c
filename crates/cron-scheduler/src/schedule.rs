//! Cron expression parsing.
//!
//! Expressions use the extended six or seven field grammar:
//! `sec min hour day-of-month month day-of-week [year]`.
//! Exactly one of day-of-month / day-of-week must be `?`; the other field
//! carries the constraint. Ranges, lists, steps and month/day names are
//! handled by the `cron` crate.
//!
//! The calendar forms the `cron` crate lacks are evaluated here, each as the
//! whole day field:
//!
//! | field        | form   | meaning                                      |
//! |--------------|--------|----------------------------------------------|
//! | day-of-month | `L`    | last day of the month                        |
//! | day-of-month | `L-n`  | n days before the last day                   |
//! | day-of-month | `nW`   | weekday nearest to day n, within the month   |
//! | day-of-month | `LW`   | last weekday of the month                    |
//! | day-of-week  | `L`    | Saturday                                     |
//! | day-of-week  | `dL`   | last day d of the month                      |
//! | day-of-week  | `d#k`  | k-th day d of the month                      |
//!
//! Days of week are `1`-`7` (`1` is Sunday) or `SUN`-`SAT`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use cron::Schedule;

use crate::SchedulerError;

const DAY_OF_MONTH: usize = 3;
const DAY_OF_WEEK: usize = 5;

/// Upper bound on candidate rejections before a day rule gives up.
const MAX_DAY_RULE_ROUNDS: usize = 1_000;
/// Longest stretch of days searched for the next date a day rule accepts.
const MAX_DAY_RULE_GAP_DAYS: u32 = 400;

/// Calendar day constraint applied on top of the `cron` crate's candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DayRule {
    LastDayOfMonth { offset: u32 },
    LastWeekdayOfMonth,
    NearestWeekday(u32),
    LastOfWeekday(Weekday),
    NthOfWeekday(Weekday, u32),
}

impl DayRule {
    fn matches(self, date: NaiveDate) -> bool {
        let Some(last) = last_day_of_month(date) else {
            return false;
        };
        let day = date.day();
        match self {
            DayRule::LastDayOfMonth { offset } => last.checked_sub(offset) == Some(day),
            DayRule::LastWeekdayOfMonth => Some(day) == nearest_weekday(date, last, last),
            DayRule::NearestWeekday(target) => Some(day) == nearest_weekday(date, target, last),
            DayRule::LastOfWeekday(weekday) => date.weekday() == weekday && day + 7 > last,
            DayRule::NthOfWeekday(weekday, nth) => {
                date.weekday() == weekday && (day - 1) / 7 + 1 == nth
            }
        }
    }

    /// First date strictly after `date` this rule accepts
    fn next_date_after(self, date: NaiveDate) -> Option<NaiveDate> {
        let mut candidate = date;
        for _ in 0..MAX_DAY_RULE_GAP_DAYS {
            candidate = candidate.succ_opt()?;
            if self.matches(candidate) {
                return Some(candidate);
            }
        }
        None
    }
}

fn last_day_of_month(date: NaiveDate) -> Option<u32> {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)?
        .pred_opt()
        .map(|d| d.day())
}

/// Weekday closest to day `target` of `date`'s month without leaving it.
/// `None` when the month has no such day.
fn nearest_weekday(date: NaiveDate, target: u32, last: u32) -> Option<u32> {
    if target > last {
        return None;
    }
    let target_date = date.with_day(target)?;
    Some(match target_date.weekday() {
        Weekday::Sat if target == 1 => 3,
        Weekday::Sat => target - 1,
        Weekday::Sun if target == last => target - 2,
        Weekday::Sun => target + 1,
        _ => target,
    })
}

fn parse_weekday(s: &str) -> Option<Weekday> {
    match s {
        "1" | "SUN" => Some(Weekday::Sun),
        "2" | "MON" => Some(Weekday::Mon),
        "3" | "TUE" => Some(Weekday::Tue),
        "4" | "WED" => Some(Weekday::Wed),
        "5" | "THU" => Some(Weekday::Thu),
        "6" | "FRI" => Some(Weekday::Fri),
        "7" | "SAT" => Some(Weekday::Sat),
        _ => None,
    }
}

fn parse_bounded(s: &str, min: u32, max: u32) -> Option<u32> {
    s.parse::<u32>().ok().filter(|n| (min..=max).contains(n))
}

fn parse_day_of_month_rule(field: &str) -> Result<Option<DayRule>, String> {
    if field == "L" {
        return Ok(Some(DayRule::LastDayOfMonth { offset: 0 }));
    }
    if field == "LW" {
        return Ok(Some(DayRule::LastWeekdayOfMonth));
    }
    if let Some(offset) = field.strip_prefix("L-") {
        return parse_bounded(offset, 0, 30)
            .map(|offset| Some(DayRule::LastDayOfMonth { offset }))
            .ok_or_else(|| format!("invalid last-day offset '{}'", field));
    }
    if let Some(day) = field.strip_suffix('W') {
        return parse_bounded(day, 1, 31)
            .map(|day| Some(DayRule::NearestWeekday(day)))
            .ok_or_else(|| format!("invalid nearest-weekday day '{}'", field));
    }
    if field.contains('L') || field.contains('W') {
        return Err(format!("'L' and 'W' must form the whole day-of-month field, got '{}'", field));
    }
    Ok(None)
}

fn parse_day_of_week_rule(field: &str) -> Result<Option<DayRule>, String> {
    if let Some((day, nth)) = field.split_once('#') {
        let weekday = parse_weekday(day).ok_or_else(|| format!("invalid day of week '{}'", field))?;
        let nth = parse_bounded(nth, 1, 5).ok_or_else(|| format!("invalid '#' occurrence '{}'", field))?;
        return Ok(Some(DayRule::NthOfWeekday(weekday, nth)));
    }
    if field != "L" {
        if let Some(day) = field.strip_suffix('L') {
            let weekday = parse_weekday(day).ok_or_else(|| format!("invalid day of week '{}'", field))?;
            return Ok(Some(DayRule::LastOfWeekday(weekday)));
        }
    }
    Ok(None)
}

/// Midnight of `date` in `tz`, or the first valid instant after it when
/// midnight falls in a DST gap.
fn start_of_day(date: NaiveDate, tz: Tz) -> Option<DateTime<Tz>> {
    (0..3).find_map(|hour| {
        let local = date.and_hms_opt(hour, 0, 0)?;
        tz.from_local_datetime(&local).earliest()
    })
}

/// A parsed, evaluable cron expression.
#[derive(Clone)]
pub struct CronSchedule {
    expression: String,
    schedule: Schedule,
    day_rule: Option<DayRule>,
}

impl CronSchedule {
    /// The expression as submitted, whitespace-normalized
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// First fire time strictly after `after`, evaluated in `tz`
    pub fn next_after(&self, after: DateTime<Utc>, tz: Tz) -> Option<DateTime<Utc>> {
        let mut cursor = after.with_timezone(&tz);
        let Some(rule) = self.day_rule else {
            return self.schedule.after(&cursor).next().map(|dt| dt.with_timezone(&Utc));
        };

        for _ in 0..MAX_DAY_RULE_ROUNDS {
            let candidate = self.schedule.after(&cursor).next()?;
            if rule.matches(candidate.date_naive()) {
                return Some(candidate.with_timezone(&Utc));
            }
            let next_day = rule.next_date_after(candidate.date_naive())?;
            let start = start_of_day(next_day, tz)?;
            // `after` is exclusive
            cursor = start - Duration::seconds(1);
        }
        None
    }

    /// Next fire time from now
    pub fn upcoming(&self, tz: Tz) -> Option<DateTime<Utc>> {
        self.next_after(Utc::now(), tz)
    }
}

impl fmt::Debug for CronSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CronSchedule").field(&self.expression).finish()
    }
}

impl FromStr for CronSchedule {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_cron_expression(s)
    }
}

/// Parse a cron expression.
///
/// # Errors
///
/// Returns `SchedulerError::InvalidCron` if the field count is wrong, the
/// day-of-month / day-of-week pairing is not exactly one `?`, or any field
/// fails to parse.
pub fn parse_cron_expression(expr: &str) -> Result<CronSchedule, SchedulerError> {
    let fields: Vec<&str> = expr.split_whitespace().collect();
    if fields.len() != 6 && fields.len() != 7 {
        return Err(SchedulerError::InvalidCron(format!(
            "'{}': expected 6 or 7 fields, found {}",
            expr,
            fields.len()
        )));
    }

    let dom_any = fields[DAY_OF_MONTH] == "?";
    let dow_any = fields[DAY_OF_WEEK] == "?";
    if dom_any == dow_any {
        return Err(SchedulerError::InvalidCron(format!(
            "'{}': exactly one of day-of-month and day-of-week must be '?'",
            expr
        )));
    }
    if fields.iter().enumerate().any(|(i, f)| f.contains('?') && i != DAY_OF_MONTH && i != DAY_OF_WEEK) {
        return Err(SchedulerError::InvalidCron(format!(
            "'{}': '?' is only allowed in day-of-month or day-of-week",
            expr
        )));
    }

    let invalid = |reason: String| SchedulerError::InvalidCron(format!("'{}': {}", expr, reason));

    let day_of_month = fields[DAY_OF_MONTH].to_ascii_uppercase();
    let day_of_week = fields[DAY_OF_WEEK].to_ascii_uppercase();
    let dom_rule = parse_day_of_month_rule(&day_of_month).map_err(invalid)?;
    let dow_rule = parse_day_of_week_rule(&day_of_week).map_err(invalid)?;

    let mut translated: Vec<&str> = fields
        .iter()
        .map(|f| if *f == "?" { "*" } else { *f })
        .collect();
    if dom_rule.is_some() {
        translated[DAY_OF_MONTH] = "*";
    }
    if dow_rule.is_some() {
        translated[DAY_OF_WEEK] = "*";
    } else if day_of_week == "L" {
        translated[DAY_OF_WEEK] = "SAT";
    }

    let schedule = Schedule::from_str(&translated.join(" "))
        .map_err(|e| invalid(e.to_string()))?;

    Ok(CronSchedule {
        expression: fields.join(" "),
        schedule,
        day_rule: dom_rule.or(dow_rule),
    })
}

/// Validate a cron expression without keeping the parsed schedule.
///
/// # Example
///
/// ```
/// use cron_scheduler::validate_cron_expression;
///
/// assert!(validate_cron_expression("0 0 5 * * ?").is_ok());
/// assert!(validate_cron_expression("0 11 11 11 11 ? 2100").is_ok());
///
/// assert!(validate_cron_expression("daddy").is_err());
/// assert!(validate_cron_expression("0 0 5 * * *").is_err());
/// ```
pub fn validate_cron_expression(expr: &str) -> Result<(), SchedulerError> {
    parse_cron_expression(expr).map(|_| ())
}
