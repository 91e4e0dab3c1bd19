//! Lenient decoding of inbound timestamps.
//!
//! Clients send either RFC 3339 strings, naive `YYYY-MM-DDTHH:MM:SS` strings
//! (read as UTC), or Unix timestamps in milliseconds. Outbound timestamps are
//! always RFC 3339.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use time::{
    format_description::{well_known::Rfc3339 as Rfc3339Format, FormatItem},
    macros::format_description,
    OffsetDateTime, PrimitiveDateTime,
};

const NAIVE: &[FormatItem<'_>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");

#[derive(Deserialize)]
#[serde(untagged)]
enum Raw {
    Millis(i64),
    Text(String),
}

pub fn serialize<S>(
    at: &OffsetDateTime,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    time::serde::rfc3339::serialize(at, serializer)
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<OffsetDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    match Raw::deserialize(deserializer)? {
        Raw::Millis(ms) => from_millis(ms),
        Raw::Text(s) => parse(&s),
    }
    .map_err(de::Error::custom)
}

pub mod option {
    use serde::{Deserialize as _, Deserializer, Serializer};
    use time::OffsetDateTime;

    use super::Raw;

    pub fn serialize<S>(
        at: &Option<OffsetDateTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        time::serde::rfc3339::option::serialize(at, serializer)
    }

    pub fn deserialize<'de, D>(
        deserializer: D,
    ) -> Result<Option<OffsetDateTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<Raw>::deserialize(deserializer)?
            .map(|raw| match raw {
                Raw::Millis(ms) => super::from_millis(ms),
                Raw::Text(s) => super::parse(&s),
            })
            .transpose()
            .map_err(serde::de::Error::custom)
    }
}

/// Timestamps always written and read as RFC 3339.
#[derive(Deserialize, Serialize)]
#[serde(transparent)]
struct Rfc3339(#[serde(with = "time::serde::rfc3339")] OffsetDateTime);

pub mod list {
    use serde::{Deserialize as _, Deserializer, Serializer};
    use time::OffsetDateTime;

    use super::Rfc3339;

    pub fn serialize<S>(
        at: &[OffsetDateTime],
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(at.iter().copied().map(Rfc3339))
    }

    pub fn deserialize<'de, D>(
        deserializer: D,
    ) -> Result<Vec<OffsetDateTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Vec::<Rfc3339>::deserialize(deserializer)?
            .into_iter()
            .map(|Rfc3339(at)| at)
            .collect())
    }
}

fn from_millis(ms: i64) -> Result<OffsetDateTime, String> {
    // Sub-second precision is dropped, rounding to the nearest second.
    let secs = ms.div_euclid(1000) + i64::from(ms.rem_euclid(1000) >= 500);
    OffsetDateTime::from_unix_timestamp(secs).map_err(|e| e.to_string())
}

fn parse(s: &str) -> Result<OffsetDateTime, String> {
    OffsetDateTime::parse(s, &Rfc3339Format)
        .or_else(|_| {
            PrimitiveDateTime::parse(s, NAIVE)
                .map(PrimitiveDateTime::assume_utc)
        })
        .map_err(|_| format!("invalid time format: {s}"))
}
