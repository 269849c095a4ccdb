//! Genealogical dates as written in GW sources.
//!
//! A date token is a small language of its own: an optional qualifier
//! (`~ ? < >`), an optional death-circumstance tag (`k m e s`), a numeric core
//! split on `/`, an optional calendar suffix (`J F H`) and optional or-lists
//! (`|`) or ranges (`..`). The literal `0` stands for "date unknown" and
//! `0(text)` carries free text that could not be expressed numerically.
//!
//! [`Date::parse`] is the strict entry point and reports unrecognized tokens.
//! [`Date::parse_with_fallback`] is total and is what every record parser uses.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{GwError, Result};

lazy_static! {
    static ref TEXT_DATE: Regex = Regex::new(r"^0\((.+)\)$").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DatePrefix {
    About,
    Maybe,
    Before,
    After,
    Or,
    Between,
}

impl DatePrefix {
    fn from_marker(c: char) -> Option<Self> {
        match c {
            '~' => Some(DatePrefix::About),
            '?' => Some(DatePrefix::Maybe),
            '<' => Some(DatePrefix::Before),
            '>' => Some(DatePrefix::After),
            _ => None,
        }
    }
    /// The leading marker, for the qualifiers that have one.
    pub fn marker(&self) -> Option<char> {
        match self {
            DatePrefix::About => Some('~'),
            DatePrefix::Maybe => Some('?'),
            DatePrefix::Before => Some('<'),
            DatePrefix::After => Some('>'),
            DatePrefix::Or | DatePrefix::Between => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Calendar {
    #[default]
    Gregorian,
    Julian,
    FrenchRepublican,
    Hebrew,
}

impl Calendar {
    fn from_suffix(c: char) -> Option<Self> {
        match c {
            'J' => Some(Calendar::Julian),
            'F' => Some(Calendar::FrenchRepublican),
            'H' => Some(Calendar::Hebrew),
            _ => None,
        }
    }
    pub fn suffix(&self) -> Option<char> {
        match self {
            Calendar::Gregorian => None,
            Calendar::Julian => Some('J'),
            Calendar::FrenchRepublican => Some('F'),
            Calendar::Hebrew => Some('H'),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DeathType {
    #[default]
    Normal,
    Killed,
    Murdered,
    Executed,
    Disappeared,
}

impl DeathType {
    fn from_tag(c: char) -> Option<Self> {
        match c {
            'k' => Some(DeathType::Killed),
            'm' => Some(DeathType::Murdered),
            'e' => Some(DeathType::Executed),
            's' => Some(DeathType::Disappeared),
            _ => None,
        }
    }
    pub fn tag(&self) -> Option<char> {
        match self {
            DeathType::Normal => None,
            DeathType::Killed => Some('k'),
            DeathType::Murdered => Some('m'),
            DeathType::Executed => Some('e'),
            DeathType::Disappeared => Some('s'),
        }
    }
}

/// An immutable genealogical date.
///
/// Fields are private; a `Date` is built through [`Date::new`], [`Date::year_only`],
/// [`Date::unknown`], [`Date::textual`] or the parser, and then refined with the
/// consuming `with_*` methods before it is handed out.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Date {
    day: Option<u8>,
    month: Option<u8>,
    year: Option<u32>,
    prefix: Option<DatePrefix>,
    calendar: Calendar,
    death_type: DeathType,
    alternatives: Vec<Date>,
    text: Option<String>,
    unknown: bool,
}

impl Date {
    /// Builds a numeric date, checking the ranges of the fields that are present.
    pub fn new(day: Option<u8>, month: Option<u8>, year: Option<u32>) -> Result<Self> {
        if let Some(d) = day {
            if !(1..=31).contains(&d) {
                return Err(GwError::InvalidDate(format!("day {d} out of range")));
            }
        }
        if let Some(m) = month {
            if !(1..=12).contains(&m) {
                return Err(GwError::InvalidDate(format!("month {m} out of range")));
            }
        }
        if year == Some(0) {
            return Err(GwError::InvalidDate(String::from("year must be at least 1")));
        }
        Ok(Self {
            day,
            month,
            year,
            ..Self::default()
        })
    }
    pub fn ymd(year: u32, month: u8, day: u8) -> Result<Self> {
        Self::new(Some(day), Some(month), Some(year))
    }
    pub fn year_only(year: u32) -> Result<Self> {
        Self::new(None, None, Some(year))
    }
    pub fn unknown() -> Self {
        Self {
            unknown: true,
            ..Self::default()
        }
    }
    pub fn textual(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }
    pub fn with_prefix(mut self, prefix: DatePrefix) -> Self {
        self.prefix = Some(prefix);
        self
    }
    pub fn with_calendar(mut self, calendar: Calendar) -> Self {
        self.calendar = calendar;
        self
    }
    pub fn with_death_type(mut self, death_type: DeathType) -> Self {
        self.death_type = death_type;
        self
    }
    pub fn with_alternative(mut self, alternative: Date) -> Self {
        self.alternatives.push(alternative);
        self
    }

    pub fn day(&self) -> Option<u8> {
        self.day
    }
    pub fn month(&self) -> Option<u8> {
        self.month
    }
    pub fn year(&self) -> Option<u32> {
        self.year
    }
    pub fn prefix(&self) -> Option<DatePrefix> {
        self.prefix
    }
    pub fn calendar(&self) -> Calendar {
        self.calendar
    }
    pub fn death_type(&self) -> DeathType {
        self.death_type
    }
    pub fn alternatives(&self) -> &[Date] {
        &self.alternatives
    }
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }
    pub fn is_unknown(&self) -> bool {
        self.unknown
    }
    pub fn is_textual(&self) -> bool {
        self.text.is_some()
    }
    pub fn is_complete(&self) -> bool {
        !self.unknown && self.day.is_some() && self.month.is_some() && self.year.is_some()
    }
    /// Month/year or year-only dates.
    pub fn is_partial(&self) -> bool {
        !self.unknown
            && self.text.is_none()
            && self.year.is_some()
            && (self.day.is_none() || self.month.is_none())
    }

    pub fn to_iso_format(&self) -> Option<String> {
        match (self.is_complete(), self.year, self.month, self.day) {
            (true, Some(y), Some(m), Some(d)) => Some(format!("{y:04}-{m:02}-{d:02}")),
            _ => None,
        }
    }
    /// Proleptic Gregorian conversion; other calendars are not converted.
    pub fn to_naive_date(&self) -> Option<NaiveDate> {
        if self.calendar != Calendar::Gregorian {
            return None;
        }
        match (self.is_complete(), self.year, self.month, self.day) {
            (true, Some(y), Some(m), Some(d)) => {
                NaiveDate::from_ymd_opt(i32::try_from(y).ok()?, u32::from(m), u32::from(d))
            }
            _ => None,
        }
    }

    /// Orders two dates by year, then month, then day, stopping at the first
    /// field one of them lacks. Dates without a year are incomparable.
    pub fn compare(&self, other: &Date) -> Option<Ordering> {
        if self.unknown || other.unknown {
            return None;
        }
        let years = self.year?.cmp(&other.year?);
        if years != Ordering::Equal {
            return Some(years);
        }
        let (Some(m1), Some(m2)) = (self.month, other.month) else {
            return Some(Ordering::Equal);
        };
        if m1 != m2 {
            return Some(m1.cmp(&m2));
        }
        match (self.day, other.day) {
            (Some(d1), Some(d2)) => Some(d1.cmp(&d2)),
            _ => Some(Ordering::Equal),
        }
    }
    pub fn is_before(&self, other: &Date) -> bool {
        self.compare(other) == Some(Ordering::Less)
    }
    pub fn is_after(&self, other: &Date) -> bool {
        self.compare(other) == Some(Ordering::Greater)
    }

    /// Strict parse. Unrecognized tokens yield [`GwError::DateFormat`] and
    /// out-of-range fields yield [`GwError::InvalidDate`].
    pub fn parse(input: &str) -> Result<Date> {
        let token = input.trim();
        if token.is_empty() || token == "0" {
            return Ok(Date::unknown());
        }
        if let Some(caps) = TEXT_DATE.captures(token) {
            return Ok(Date::textual(&caps[1]));
        }

        let mut rest = token;
        let mut prefix = None;
        if let Some(p) = rest.chars().next().and_then(DatePrefix::from_marker) {
            prefix = Some(p);
            rest = &rest[1..];
        }
        let mut death_type = DeathType::Normal;
        if let Some(d) = rest.chars().next().and_then(DeathType::from_tag) {
            death_type = d;
            rest = &rest[1..];
        }
        let mut calendar = Calendar::Gregorian;
        if let Some(c) = rest.chars().last().and_then(Calendar::from_suffix) {
            calendar = c;
            rest = &rest[..rest.len() - 1];
        }

        let mut alternatives = Vec::new();
        if rest.contains('|') {
            prefix = Some(DatePrefix::Or);
            let mut segments = rest.split('|');
            rest = segments.next().unwrap_or_default();
            for segment in segments {
                alternatives.push(Date::parse(segment)?);
            }
        } else if rest.contains("..") {
            prefix = Some(DatePrefix::Between);
            // only the second segment is the range end; later ones are ignored
            let mut segments = rest.split("..");
            rest = segments.next().unwrap_or_default();
            let end = segments
                .next()
                .unwrap_or_default()
                .trim()
                .parse::<u32>()
                .map_err(|_| GwError::DateFormat(token.to_string()))?;
            alternatives.push(Date::year_only(end)?);
        }

        let core = match Self::parse_core(rest, token)? {
            Some(core) => core,
            None => return Ok(Date::unknown()),
        };
        Ok(Date {
            prefix,
            calendar,
            death_type,
            alternatives,
            ..core
        })
    }

    /// Never fails: anything [`Date::parse`] rejects becomes the unknown date.
    pub fn parse_with_fallback(input: &str) -> Date {
        Date::parse(input).unwrap_or_else(|_| Date::unknown())
    }

    // Ok(None) means every field of a slash-separated core was empty.
    fn parse_core(core: &str, token: &str) -> Result<Option<Date>> {
        if core.contains('/') {
            let fields: Vec<Option<u32>> = core.split('/').map(safe_number).collect();
            let narrow = |v: Option<u32>| -> Result<Option<u8>> {
                v.map(|n| u8::try_from(n).map_err(|_| GwError::InvalidDate(token.to_string())))
                    .transpose()
            };
            return match fields.as_slice() {
                [None, None, None] | [None, None] => Ok(None),
                [day, month, year] => Date::new(narrow(*day)?, narrow(*month)?, *year).map(Some),
                [month, year] => Date::new(None, narrow(*month)?, *year).map(Some),
                _ => Err(GwError::DateFormat(token.to_string())),
            };
        }
        if !core.is_empty() && core.chars().all(|c| c.is_ascii_digit()) {
            let year = core
                .parse::<u32>()
                .map_err(|_| GwError::InvalidDate(token.to_string()))?;
            return Date::year_only(year).map(Some);
        }
        let digits: String = core.chars().filter(|c| *c != '-' && *c != '.').collect();
        if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(value) = core.parse::<f64>() {
                if value >= 1.0 && value <= f64::from(u32::MAX) {
                    return Date::year_only(value.trunc() as u32).map(Some);
                }
                return Err(GwError::InvalidDate(token.to_string()));
            }
        }
        Err(GwError::DateFormat(token.to_string()))
    }
}

fn safe_number(field: &str) -> Option<u32> {
    let field = field.trim();
    if field.is_empty() {
        return None;
    }
    field.parse::<u32>().ok()
}

impl FromStr for Date {
    type Err = GwError;
    fn from_str(s: &str) -> Result<Self> {
        Date::parse(s)
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(text) = &self.text {
            return write!(f, "0({text})");
        }
        if self.unknown {
            return write!(f, "0");
        }
        if let Some(marker) = self.prefix.and_then(|p| p.marker()) {
            write!(f, "{marker}")?;
        }
        if let Some(tag) = self.death_type.tag() {
            write!(f, "{tag}")?;
        }
        let mut fields = Vec::with_capacity(3);
        if let Some(d) = self.day {
            fields.push(format!("{d:02}"));
        }
        if let Some(m) = self.month {
            fields.push(format!("{m:02}"));
        }
        if let Some(y) = self.year {
            fields.push(format!("{y:04}"));
        }
        write!(f, "{}", fields.join("/"))?;
        match self.prefix {
            Some(DatePrefix::Or) => {
                for alternative in &self.alternatives {
                    write!(f, "|{alternative}")?;
                }
            }
            Some(DatePrefix::Between) => {
                if let Some(end) = self.alternatives.first().and_then(|a| a.year) {
                    write!(f, "..{end}")?;
                }
            }
            _ => {}
        }
        if let Some(suffix) = self.calendar.suffix() {
            write!(f, "{suffix}")?;
        }
        Ok(())
    }
}
