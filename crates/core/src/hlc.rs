use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::CoreError;

/// Returns the current wall-clock time as milliseconds since Unix epoch.
pub fn physical_now() -> Result<u64, CoreError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .map_err(|_| CoreError::InvalidData("system clock before epoch".into()))
}

/// A 12-byte Hybrid Logical Clock timestamp: 8 bytes wall_ms (big-endian u64)
/// followed by 4 bytes counter (big-endian u32).
///
/// Every lead mutation is stamped with one of these. `updated_at` doubles as
/// the optimistic-concurrency token, and equality covers both halves, so two
/// writes inside the same millisecond still carry distinct tokens.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub struct Hlc {
    wall_ms: u64,
    counter: u32,
}

impl Hlc {
    pub fn new(wall_ms: u64, counter: u32) -> Self {
        Self { wall_ms, counter }
    }

    pub fn wall_ms(&self) -> u64 {
        self.wall_ms
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }

    pub fn to_bytes(&self) -> [u8; 12] {
        let mut buf = [0u8; 12];
        buf[..8].copy_from_slice(&self.wall_ms.to_be_bytes());
        buf[8..].copy_from_slice(&self.counter.to_be_bytes());
        buf
    }

    pub fn from_bytes(bytes: &[u8; 12]) -> Self {
        let mut wall = [0u8; 8];
        let mut counter = [0u8; 4];
        wall.copy_from_slice(&bytes[..8]);
        counter.copy_from_slice(&bytes[8..]);
        Self {
            wall_ms: u64::from_be_bytes(wall),
            counter: u32::from_be_bytes(counter),
        }
    }

    /// Wall-clock part as a UTC datetime. Counter is dropped.
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp_millis(self.wall_ms as i64)
    }

    /// ISO-8601 rendering with millisecond precision, e.g. `2024-05-01T10:00:00.000Z`.
    pub fn to_rfc3339(&self) -> String {
        match self.to_datetime() {
            Some(dt) => dt.to_rfc3339_opts(SecondsFormat::Millis, true),
            None => String::new(),
        }
    }

    /// Opaque token form handed to clients: `<wall_ms>.<counter>`.
    pub fn to_token(&self) -> String {
        format!("{}.{}", self.wall_ms, self.counter)
    }
}

impl fmt::Display for Hlc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_token())
    }
}

impl FromStr for Hlc {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (wall, counter) = s.split_once('.').unwrap_or((s, "0"));
        let wall_ms = wall
            .parse::<u64>()
            .map_err(|_| CoreError::InvalidToken(s.to_string()))?;
        let counter = counter
            .parse::<u32>()
            .map_err(|_| CoreError::InvalidToken(s.to_string()))?;
        Ok(Self::new(wall_ms, counter))
    }
}

impl Ord for Hlc {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_bytes().cmp(&other.to_bytes())
    }
}

impl PartialOrd for Hlc {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Serialize for Hlc {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_token())
    }
}

impl<'de> Deserialize<'de> for Hlc {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let token = String::deserialize(deserializer)?;
        token.parse().map_err(serde::de::Error::custom)
    }
}

/// A clock that generates monotonically increasing HLC timestamps.
pub struct HlcClock {
    wall_ms: u64,
    counter: u32,
}

impl HlcClock {
    pub fn new() -> Self {
        Self {
            wall_ms: 0,
            counter: 0,
        }
    }

    /// Generate the next monotonically increasing timestamp.
    pub fn tick(&mut self) -> Result<Hlc, CoreError> {
        let now = physical_now()?;

        let hlc = if now > self.wall_ms {
            Hlc::new(now, 0)
        } else {
            Hlc::new(self.wall_ms, self.counter + 1)
        };

        self.wall_ms = hlc.wall_ms;
        self.counter = hlc.counter;
        Ok(hlc)
    }

    /// Fast-forward past a timestamp read back from storage so that stamps
    /// issued after a restart still sort after everything already persisted.
    pub fn observe(&mut self, seen: Hlc) {
        if seen > Hlc::new(self.wall_ms, self.counter) {
            self.wall_ms = seen.wall_ms;
            self.counter = seen.counter;
        }
    }
}

impl Default for HlcClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_monotonicity() {
        let mut clock = HlcClock::new();
        let mut prev = clock.tick().unwrap();
        for _ in 0..100 {
            let next = clock.tick().unwrap();
            assert!(next > prev, "expected {next:?} > {prev:?}");
            prev = next;
        }
    }

    #[test]
    fn same_wall_time_increments_counter() {
        let mut clock = HlcClock::new();
        // Set the clock's wall_ms far into the future so physical_now() < wall_ms
        let future_ms = physical_now().unwrap() + 100_000;
        clock.wall_ms = future_ms;
        clock.counter = 0;

        let t1 = clock.tick().unwrap();
        assert_eq!(t1.wall_ms(), future_ms);
        assert_eq!(t1.counter(), 1);

        let t2 = clock.tick().unwrap();
        assert_eq!(t2.wall_ms(), future_ms);
        assert_eq!(t2.counter(), 2);
    }

    #[test]
    fn observe_moves_clock_forward_only() {
        let mut clock = HlcClock::new();
        let future = Hlc::new(physical_now().unwrap() + 100_000, 7);
        clock.observe(future);
        let next = clock.tick().unwrap();
        assert!(next > future);

        clock.observe(Hlc::new(1, 0));
        assert!(clock.tick().unwrap() > next);
    }

    #[test]
    fn ordering_matches_bytes() {
        let pairs = vec![
            (Hlc::new(100, 0), Hlc::new(200, 0)),
            (Hlc::new(100, 0), Hlc::new(100, 1)),
            (Hlc::new(100, 999), Hlc::new(101, 0)),
        ];

        for (a, b) in &pairs {
            assert_eq!(a.cmp(b), a.to_bytes().cmp(&b.to_bytes()));
            assert!(a < b, "expected {a:?} < {b:?}");
        }
    }

    #[test]
    fn token_roundtrip_and_bare_millis() {
        let hlc = Hlc::new(1_714_557_600_000, 3);
        assert_eq!(hlc.to_token(), "1714557600000.3");
        assert_eq!("1714557600000.3".parse::<Hlc>().unwrap(), hlc);
        assert_eq!(
            "1714557600000".parse::<Hlc>().unwrap(),
            Hlc::new(1_714_557_600_000, 0)
        );
        assert!("yesterday".parse::<Hlc>().is_err());
    }

    #[test]
    fn rfc3339_has_millisecond_precision() {
        let hlc = Hlc::new(1_714_557_600_123, 9);
        assert_eq!(hlc.to_rfc3339(), "2024-05-01T10:00:00.123Z");
    }
}
