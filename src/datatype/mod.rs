//! Lexical forms of the XML Schema built-in datatypes that need more than
//! `FromStr`/`Display` from the standard library.

pub mod base64;
pub mod calendar;
pub mod duration;
pub mod lexical;

pub use self::base64::Base64Data;
pub use self::calendar::{CalendarType, XmlCalendar};
pub use self::duration::XmlDuration;
