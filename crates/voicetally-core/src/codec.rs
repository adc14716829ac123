//! On-disk representation of accumulated time.
//!
//! The time data file is a single JSON object mapping decimal member ids to
//! timestamps. Each timestamp encodes a duration as its offset from the
//! zero epoch `0001-01-01 00:00:00`, so a member with `00:05:00` of voice
//! time is stored as `"0001-01-01 00:05:00"`.

use std::collections::BTreeMap;
use std::fmt;
use std::io::{Read, Write};
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serializer as _};
use serde_json::ser::PrettyFormatter;
use serde_json::Value;

use crate::error::{Result, TallyError};
use crate::member::MemberId;

/// Accumulated time per member, ordered by member id.
pub type TimeTable = BTreeMap<MemberId, Duration>;

const WRITE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";
const READ_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// The timestamp that stands for zero accumulated time.
pub fn zero_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .expect("0001-01-01 00:00:00 is a valid datetime")
}

/// Render a duration as an epoch-offset timestamp.
pub fn encode_duration(member: MemberId, duration: Duration) -> Result<String> {
    let delta = TimeDelta::from_std(duration).map_err(|_| TallyError::OutOfRange { member })?;
    let stamp = zero_epoch()
        .checked_add_signed(delta)
        .ok_or(TallyError::OutOfRange { member })?;
    Ok(stamp.format(WRITE_FORMAT).to_string())
}

/// Parse an epoch-offset timestamp back into a duration.
pub fn decode_duration(key: &str, value: &str) -> Result<Duration> {
    let malformed = |reason: String| TallyError::MalformedTimestamp {
        key: key.to_string(),
        value: value.to_string(),
        reason,
    };

    let mut last_err = None;
    for format in READ_FORMATS {
        match NaiveDateTime::parse_from_str(value.trim(), format) {
            Ok(stamp) => {
                return stamp
                    .signed_duration_since(zero_epoch())
                    .to_std()
                    .map_err(|_| malformed("timestamp precedes the zero epoch".to_string()));
            }
            Err(e) => last_err = Some(e),
        }
    }

    Err(malformed(
        last_err.map(|e| e.to_string()).unwrap_or_default(),
    ))
}

/// Serialize a table as pretty-printed JSON (four-space indent).
pub fn write_table<W: Write>(writer: W, table: &TimeTable) -> Result<()> {
    let entries = table
        .iter()
        .map(|(member, duration)| Ok((member.to_string(), encode_duration(*member, *duration)?)))
        .collect::<Result<Vec<(String, String)>>>()?;

    let mut ser = serde_json::Serializer::with_formatter(writer, PrettyFormatter::with_indent(b"    "));
    (&mut ser).collect_map(entries)?;
    Ok(())
}

/// Encode a table to a JSON string.
pub fn encode(table: &TimeTable) -> Result<String> {
    let mut buf = Vec::new();
    write_table(&mut buf, table)?;
    // serde_json only ever emits UTF-8
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Parse a table from a reader, failing on the first malformed entry.
pub fn read_table<R: Read>(reader: R) -> Result<TimeTable> {
    let raw: RawEntries = serde_json::from_reader(reader)?;
    from_raw(raw)
}

/// Decode a table from a JSON string.
pub fn decode(json: &str) -> Result<TimeTable> {
    let raw: RawEntries = serde_json::from_str(json)?;
    from_raw(raw)
}

/// Object entries in file order. Repeated keys are kept so they can be
/// reported instead of silently overwritten.
struct RawEntries(Vec<(String, Value)>);

impl<'de> Deserialize<'de> for RawEntries {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = RawEntries;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object of member ids to timestamps")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<RawEntries, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some(entry) = map.next_entry::<String, Value>()? {
                    entries.push(entry);
                }
                Ok(RawEntries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}

fn from_raw(RawEntries(raw): RawEntries) -> Result<TimeTable> {
    let mut table = TimeTable::new();

    for (key, value) in raw {
        let member = match key.parse::<MemberId>() {
            Ok(member) if member.to_string() == key => member,
            _ => return Err(TallyError::MalformedKey { key }),
        };

        let Value::String(stamp) = value else {
            return Err(TallyError::MalformedTimestamp {
                key,
                value: value.to_string(),
                reason: "expected a timestamp string".to_string(),
            });
        };

        let duration = decode_duration(&key, &stamp)?;
        if table.insert(member, duration).is_some() {
            return Err(TallyError::DuplicateMember { member });
        }
    }

    Ok(table)
}
