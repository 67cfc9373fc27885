//! `XMLGregorianCalendar`-style partial date/time values.
//!
//! A calendar keeps only the fields that were present in its lexical form,
//! which decides its schema type (`xs:date`, `xs:gYearMonth`, ...). Printing
//! for a target schema type requires the fields that type needs.

use crate::datatype::lexical::trim;
use crate::errors::ParseError;
use crate::name::{QName, XS_NS};
use chrono::{DateTime, Datelike, FixedOffset, Timelike};
use rust_decimal::Decimal;
use std::fmt::{self, Write};
use std::str::FromStr;

/// The eight schema types a calendar can be printed as
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CalendarType {
    /// `xs:dateTime`
    DateTime,
    /// `xs:date`
    Date,
    /// `xs:time`
    Time,
    /// `xs:gDay`
    GDay,
    /// `xs:gMonth`
    GMonth,
    /// `xs:gYear`
    GYear,
    /// `xs:gYearMonth`
    GYearMonth,
    /// `xs:gMonthDay`
    GMonthDay,
}

const YEAR: u8 = 1 << 0;
const MONTH: u8 = 1 << 1;
const DAY: u8 = 1 << 2;
const HOUR: u8 = 1 << 3;
const MINUTE: u8 = 1 << 4;
const SECOND: u8 = 1 << 5;

impl CalendarType {
    /// Recognizes a type by its schema type name
    pub fn from_schema_type(name: &QName) -> Option<Self> {
        if name.namespace() != XS_NS {
            return None;
        }
        Some(match name.local_name() {
            "dateTime" => CalendarType::DateTime,
            "date" => CalendarType::Date,
            "time" => CalendarType::Time,
            "gDay" => CalendarType::GDay,
            "gMonth" => CalendarType::GMonth,
            "gYear" => CalendarType::GYear,
            "gYearMonth" => CalendarType::GYearMonth,
            "gMonthDay" => CalendarType::GMonthDay,
            _ => return None,
        })
    }

    /// Local name in the schema namespace
    pub fn local_name(self) -> &'static str {
        match self {
            CalendarType::DateTime => "dateTime",
            CalendarType::Date => "date",
            CalendarType::Time => "time",
            CalendarType::GDay => "gDay",
            CalendarType::GMonth => "gMonth",
            CalendarType::GYear => "gYear",
            CalendarType::GYearMonth => "gYearMonth",
            CalendarType::GMonthDay => "gMonthDay",
        }
    }

    /// Schema type name
    pub fn schema_type(self) -> QName {
        QName::xs(self.local_name())
    }

    /// Print format: `%Y` year, `%M` month, `%D` day, `%h` hour, `%m` minute,
    /// `%s` seconds with fraction, `%z` timezone
    fn format(self) -> &'static str {
        match self {
            CalendarType::DateTime => "%Y-%M-%DT%h:%m:%s%z",
            CalendarType::Date => "%Y-%M-%D%z",
            CalendarType::Time => "%h:%m:%s%z",
            CalendarType::GMonth => "--%M%z",
            CalendarType::GDay => "---%D%z",
            CalendarType::GYear => "%Y%z",
            CalendarType::GYearMonth => "%Y-%M%z",
            CalendarType::GMonthDay => "--%M-%D%z",
        }
    }

    /// Fields that must be set to print this type. The timezone is always optional.
    fn required(self) -> u8 {
        match self {
            CalendarType::DateTime => YEAR | MONTH | DAY | HOUR | MINUTE | SECOND,
            CalendarType::Date => YEAR | MONTH | DAY,
            CalendarType::Time => HOUR | MINUTE | SECOND,
            CalendarType::GDay => DAY,
            CalendarType::GMonth => MONTH,
            CalendarType::GYear => YEAR,
            CalendarType::GYearMonth => YEAR | MONTH,
            CalendarType::GMonthDay => MONTH | DAY,
        }
    }
}

/// Partial Gregorian date and time
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-types", derive(serde::Deserialize, serde::Serialize))]
pub struct XmlCalendar {
    /// Year, may be negative
    pub year: Option<i32>,
    /// Month, 1 to 12
    pub month: Option<u8>,
    /// Day of month, 1 to 31
    pub day: Option<u8>,
    /// Hour, 0 to 24
    pub hour: Option<u8>,
    /// Minute
    pub minute: Option<u8>,
    /// Whole seconds
    pub second: Option<u8>,
    /// Fractional seconds, in `[0, 1)`
    pub fraction: Option<Decimal>,
    /// Offset from UTC in minutes
    pub timezone: Option<i16>,
}

impl XmlCalendar {
    /// A calendar holding every field of a timestamp
    pub fn from_datetime(dt: &DateTime<FixedOffset>) -> Self {
        let nanos = dt.nanosecond() % 1_000_000_000;
        XmlCalendar {
            year: Some(dt.year()),
            month: Some(dt.month() as u8),
            day: Some(dt.day() as u8),
            hour: Some(dt.hour() as u8),
            minute: Some(dt.minute() as u8),
            second: Some(dt.second() as u8),
            fraction: if nanos == 0 {
                None
            } else {
                Some(Decimal::new(nanos as i64, 9).normalize())
            },
            timezone: Some((dt.offset().local_minus_utc() / 60) as i16),
        }
    }

    fn fields(&self) -> u8 {
        let mut set = 0;
        if self.year.is_some() {
            set |= YEAR;
        }
        if self.month.is_some() {
            set |= MONTH;
        }
        if self.day.is_some() {
            set |= DAY;
        }
        if self.hour.is_some() {
            set |= HOUR;
        }
        if self.minute.is_some() {
            set |= MINUTE;
        }
        if self.second.is_some() {
            set |= SECOND;
        }
        set
    }

    /// The schema type implied by the fields that are set, `None` for
    /// combinations that match no schema type
    pub fn calendar_type(&self) -> Option<CalendarType> {
        let set = self.fields();
        [
            CalendarType::DateTime,
            CalendarType::Date,
            CalendarType::Time,
            CalendarType::GYearMonth,
            CalendarType::GMonthDay,
            CalendarType::GYear,
            CalendarType::GMonth,
            CalendarType::GDay,
        ]
        .into_iter()
        .find(|t| t.required() == set)
    }

    /// Whether every field needed to print `ty` is set
    pub fn can_print_as(&self, ty: CalendarType) -> bool {
        self.fields() & ty.required() == ty.required()
    }

    /// Prints the calendar as `ty`, or `None` when a required field is missing
    pub fn format_as(&self, ty: CalendarType) -> Option<String> {
        if !self.can_print_as(ty) {
            return None;
        }
        let mut out = String::with_capacity(32);
        let mut chars = ty.format().chars();
        while let Some(c) = chars.next() {
            if c != '%' {
                out.push(c);
                continue;
            }
            // fields are guaranteed by `can_print_as`, except the timezone
            match chars.next() {
                Some('Y') => {
                    let y = self.year.unwrap_or_default();
                    if y < 0 {
                        let _ = write!(out, "-{:04}", -(y as i64));
                    } else {
                        let _ = write!(out, "{:04}", y);
                    }
                }
                Some('M') => push2(&mut out, self.month),
                Some('D') => push2(&mut out, self.day),
                Some('h') => push2(&mut out, self.hour),
                Some('m') => push2(&mut out, self.minute),
                Some('s') => {
                    push2(&mut out, self.second);
                    if let Some(fraction) = self.fraction {
                        let text = fraction.to_string();
                        // "0.25" prints as ".25"
                        out.push_str(text.trim_start_matches('0'));
                    }
                }
                Some('z') => match self.timezone {
                    Some(0) => out.push('Z'),
                    Some(tz) => {
                        let sign = if tz < 0 { '-' } else { '+' };
                        let tz = tz.unsigned_abs();
                        let _ = write!(out, "{}{:02}:{:02}", sign, tz / 60, tz % 60);
                    }
                    None => {}
                },
                _ => {}
            }
        }
        Some(out)
    }
}

fn push2(out: &mut String, field: Option<u8>) {
    let _ = write!(out, "{:02}", field.unwrap_or_default());
}

fn number<T: FromStr>(text: &str, original: &str) -> Result<T, ParseError> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseError::invalid("calendar", original));
    }
    text.parse()
        .map_err(|_| ParseError::invalid("calendar", original))
}

/// Splits a trailing `Z` or `+hh:mm`/`-hh:mm` timezone
fn split_timezone<'a>(text: &'a str, original: &str) -> Result<(&'a str, Option<i16>), ParseError> {
    if let Some(rest) = text.strip_suffix('Z') {
        return Ok((rest, Some(0)));
    }
    let b = text.as_bytes();
    if b.len() >= 6 && matches!(b[b.len() - 6], b'+' | b'-') && b[b.len() - 3] == b':' {
        let (rest, tz) = text.split_at(text.len() - 6);
        let hours: i16 = number(&tz[1..3], original)?;
        let minutes: i16 = number(&tz[4..6], original)?;
        if hours > 14 || minutes > 59 {
            return Err(ParseError::invalid("timezone", original));
        }
        let offset = hours * 60 + minutes;
        return Ok((rest, Some(if tz.starts_with('-') { -offset } else { offset })));
    }
    Ok((text, None))
}

impl XmlCalendar {
    fn parse_date(&mut self, text: &str, original: &str) -> Result<(), ParseError> {
        // year may be negative and longer than four digits
        let (negative, body) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        let mut parts = body.splitn(3, '-');
        let year = parts.next().unwrap_or_default();
        if year.len() < 4 {
            return Err(ParseError::invalid("calendar", original));
        }
        let year: i32 = number(year, original)?;
        self.year = Some(if negative { -year } else { year });
        if let Some(month) = parts.next() {
            self.month = Some(number(month, original)?);
        }
        if let Some(day) = parts.next() {
            self.day = Some(number(day, original)?);
        }
        Ok(())
    }

    fn parse_time(&mut self, text: &str, original: &str) -> Result<(), ParseError> {
        let mut parts = text.splitn(3, ':');
        let (Some(h), Some(m), Some(s)) = (parts.next(), parts.next(), parts.next()) else {
            return Err(ParseError::invalid("xs:time", original));
        };
        self.hour = Some(number(h, original)?);
        self.minute = Some(number(m, original)?);
        let (whole, fraction) = match s.find('.') {
            Some(i) => (&s[..i], Some(&s[i..])),
            None => (s, None),
        };
        self.second = Some(number(whole, original)?);
        if let Some(fraction) = fraction {
            if fraction.len() < 2 {
                return Err(ParseError::invalid("xs:time", original));
            }
            number::<u64>(&fraction[1..], original)?;
            let value = Decimal::from_str(&format!("0{}", fraction))
                .map_err(|_| ParseError::invalid("xs:time", original))?;
            self.fraction = Some(value);
        }
        Ok(())
    }

    fn check_ranges(&self, original: &str) -> Result<(), ParseError> {
        let bad = |v: Option<u8>, min: u8, max: u8| v.map_or(false, |v| v < min || v > max);
        if bad(self.month, 1, 12)
            || bad(self.day, 1, 31)
            || bad(self.hour, 0, 24)
            || bad(self.minute, 0, 59)
            || bad(self.second, 0, 60)
        {
            return Err(ParseError::invalid("calendar", original));
        }
        Ok(())
    }
}

impl FromStr for XmlCalendar {
    type Err = ParseError;

    /// Detects the schema type from the lexical form
    fn from_str(original: &str) -> Result<Self, ParseError> {
        let (text, timezone) = split_timezone(trim(original), original)?;
        let mut cal = XmlCalendar {
            timezone,
            ..Default::default()
        };
        if let Some(day) = text.strip_prefix("---") {
            cal.day = Some(number(day, original)?);
        } else if let Some(month_day) = text.strip_prefix("--") {
            match month_day.split_once('-') {
                Some((m, d)) => {
                    cal.month = Some(number(m, original)?);
                    cal.day = Some(number(d, original)?);
                }
                None => cal.month = Some(number(month_day, original)?),
            }
        } else if let Some((date, time)) = text.split_once('T') {
            cal.parse_date(date, original)?;
            if cal.day.is_none() {
                return Err(ParseError::invalid("xs:dateTime", original));
            }
            cal.parse_time(time, original)?;
        } else if text.as_bytes().get(2) == Some(&b':') {
            cal.parse_time(text, original)?;
        } else {
            cal.parse_date(text, original)?;
        }
        cal.check_ranges(original)?;
        Ok(cal)
    }
}

impl fmt::Display for XmlCalendar {
    /// Prints in the calendar's own schema type; prints nothing for field
    /// combinations without one
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.calendar_type().and_then(|t| self.format_as(t)) {
            Some(text) => f.write_str(&text),
            None => Ok(()),
        }
    }
}
