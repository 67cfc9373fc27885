use crate::datatype::lexical::trim;
use crate::errors::ParseError;
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;

/// `xs:duration` value.
///
/// Fields that were absent from the lexical form stay `None`, so printing a
/// parsed value gives back the fields it was written with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-types", derive(serde::Deserialize, serde::Serialize))]
pub struct XmlDuration {
    /// Whether the duration is negative
    pub negative: bool,
    /// Years
    pub years: Option<u64>,
    /// Months
    pub months: Option<u64>,
    /// Days
    pub days: Option<u64>,
    /// Hours
    pub hours: Option<u64>,
    /// Minutes
    pub minutes: Option<u64>,
    /// Seconds, possibly fractional
    pub seconds: Option<Decimal>,
}

impl XmlDuration {
    /// A duration made of days and seconds
    pub fn from_days_seconds(days: u64, seconds: u64) -> Self {
        XmlDuration {
            days: Some(days),
            seconds: Some(Decimal::from(seconds)),
            ..Default::default()
        }
    }

    fn has_time(&self) -> bool {
        self.hours.is_some() || self.minutes.is_some() || self.seconds.is_some()
    }
}

impl FromStr for XmlDuration {
    type Err = ParseError;

    fn from_str(text: &str) -> Result<Self, ParseError> {
        let invalid = || ParseError::invalid("xs:duration", text);
        let mut s = trim(text);
        let mut d = XmlDuration::default();
        if let Some(rest) = s.strip_prefix('-') {
            d.negative = true;
            s = rest;
        }
        s = s.strip_prefix('P').ok_or_else(invalid)?;
        let (date, time) = match s.find('T') {
            Some(i) => (&s[..i], Some(&s[i + 1..])),
            None => (s, None),
        };

        // designators must appear in this order, each at most once
        let mut rest = date;
        for (designator, slot) in [('Y', &mut d.years), ('M', &mut d.months), ('D', &mut d.days)] {
            if let Some(i) = rest.find(designator) {
                let digits = &rest[..i];
                if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(invalid());
                }
                *slot = Some(digits.parse().map_err(|_| invalid())?);
                rest = &rest[i + 1..];
            }
        }
        if !rest.is_empty() {
            return Err(invalid());
        }

        if let Some(time) = time {
            let mut rest = time;
            for (designator, slot) in [('H', &mut d.hours), ('M', &mut d.minutes)] {
                if let Some(i) = rest.find(designator) {
                    let digits = &rest[..i];
                    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                        return Err(invalid());
                    }
                    *slot = Some(digits.parse().map_err(|_| invalid())?);
                    rest = &rest[i + 1..];
                }
            }
            if let Some(i) = rest.find('S') {
                let number = &rest[..i];
                if number.is_empty()
                    || number.starts_with('.')
                    || !number.bytes().all(|b| b.is_ascii_digit() || b == b'.')
                {
                    return Err(invalid());
                }
                d.seconds = Some(Decimal::from_str(number).map_err(|_| invalid())?);
                rest = &rest[i + 1..];
            }
            if !rest.is_empty() || !d.has_time() {
                return Err(invalid());
            }
        }
        if d.years.is_none() && d.months.is_none() && d.days.is_none() && !d.has_time() {
            return Err(invalid());
        }
        Ok(d)
    }
}

impl fmt::Display for XmlDuration {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.negative {
            f.write_str("-")?;
        }
        f.write_str("P")?;
        let mut empty = true;
        for (value, designator) in [(self.years, 'Y'), (self.months, 'M'), (self.days, 'D')] {
            if let Some(v) = value {
                write!(f, "{}{}", v, designator)?;
                empty = false;
            }
        }
        if self.has_time() {
            f.write_str("T")?;
            if let Some(h) = self.hours {
                write!(f, "{}H", h)?;
            }
            if let Some(m) = self.minutes {
                write!(f, "{}M", m)?;
            }
            if let Some(s) = self.seconds {
                write!(f, "{}S", s)?;
            }
        } else if empty {
            f.write_str("T0S")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn full_form() {
        let d: XmlDuration = "-P1Y2M3DT4H5M6.5S".parse().unwrap();
        assert!(d.negative);
        assert_eq!(d.years, Some(1));
        assert_eq!(d.minutes, Some(5));
        assert_eq!(d.seconds, Some(Decimal::new(65, 1)));
        assert_eq!(d.to_string(), "-P1Y2M3DT4H5M6.5S");
    }

    #[test]
    fn keeps_the_written_fields() {
        let d: XmlDuration = "PT0S".parse().unwrap();
        assert_eq!(d.to_string(), "PT0S");
        let d: XmlDuration = "P0D".parse().unwrap();
        assert_eq!(d.to_string(), "P0D");
    }

    #[test]
    fn rejects_malformed() {
        for bad in ["P", "PT", "P1S", "1Y", "P1M2Y", "PT1.S5", "P-1D", "PT.5S"] {
            assert!(bad.parse::<XmlDuration>().is_err(), "{}", bad);
        }
    }
}
