//! Year-scoped sequential record numbers.
//!
//! Every numbered entity family shares the same scheme: a kind-specific
//! prefix, the 4-digit issue year, a dash, and a zero-padded sequence that
//! restarts at 1 each year. The next number in a series is derived from the
//! latest stored number; a missing or malformed predecessor silently restarts
//! the series at 1.

use std::fmt;
use std::str::FromStr;

use crate::NumberError;

/// Width of the zero-padded sequence. Padding is cosmetic only; sequences
/// beyond 999999 render unpadded and remain valid.
const SEQUENCE_PAD: usize = 6;

/// The entity families that carry a sequential record number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NumberKind {
    /// Patient medical record number (`MR`).
    MedicalRecord,
    /// Appointment number (`APT`).
    Appointment,
    /// Procedure number (`PROC`).
    Procedure,
    /// Lab test number (`LAB`).
    LabTest,
    /// Billing transaction number (`TXN`).
    Transaction,
    /// Invoice number (`INV`), issued alongside the transaction number.
    Invoice,
    /// Prescription number (`RX`).
    Prescription,
}

impl NumberKind {
    /// All kinds, in a stable order.
    pub const ALL: [NumberKind; 7] = [
        NumberKind::MedicalRecord,
        NumberKind::Appointment,
        NumberKind::Procedure,
        NumberKind::LabTest,
        NumberKind::Transaction,
        NumberKind::Invoice,
        NumberKind::Prescription,
    ];

    /// The string prefix for this kind.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            NumberKind::MedicalRecord => "MR",
            NumberKind::Appointment => "APT",
            NumberKind::Procedure => "PROC",
            NumberKind::LabTest => "LAB",
            NumberKind::Transaction => "TXN",
            NumberKind::Invoice => "INV",
            NumberKind::Prescription => "RX",
        }
    }

    /// Resolves a kind from its prefix.
    #[must_use]
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.prefix() == prefix)
    }

    /// The series filter for a given year, e.g. `"MR2024"`.
    ///
    /// The storage lookup selects the lexically greatest number starting with
    /// this string; that is also what scopes each year to its own sequence.
    #[must_use]
    pub fn series_prefix(self, year: u16) -> String {
        format!("{}{year}", self.prefix())
    }
}

impl fmt::Display for NumberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// A sequential, year-scoped record number.
///
/// Ordering follows (kind, year, sequence), which matches lexical ordering of
/// the rendered form within a single series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordNumber {
    kind: NumberKind,
    year: u16,
    sequence: u32,
}

impl RecordNumber {
    /// The first number of a (kind, year) series.
    #[must_use]
    pub const fn first(kind: NumberKind, year: u16) -> Self {
        Self {
            kind,
            year,
            sequence: 1,
        }
    }

    /// The next number in the same series. The sequence saturates at
    /// `u32::MAX` rather than wrapping.
    #[must_use]
    pub const fn next(&self) -> Self {
        Self {
            kind: self.kind,
            year: self.year,
            sequence: self.sequence.saturating_add(1),
        }
    }

    /// Derives the number to issue after the latest stored number in a
    /// series.
    ///
    /// `latest` is whatever the storage lookup returned for the current
    /// year's series prefix, if anything. The numeric suffix after the last
    /// `-` is parsed; on success the next sequence is parsed + 1 (saturating
    /// at `u32::MAX`), otherwise
    /// (no prior number, or a malformed suffix) the series restarts at 1.
    /// Malformed input is deliberately not an error.
    #[must_use]
    pub fn following(kind: NumberKind, year: u16, latest: Option<&str>) -> Self {
        let sequence = latest
            .and_then(|s| s.rsplit_once('-'))
            .and_then(|(_, suffix)| suffix.parse::<u32>().ok())
            .map_or(1, |last| last.saturating_add(1));

        Self {
            kind,
            year,
            sequence,
        }
    }

    /// Builds a number from its parts without parsing.
    #[must_use]
    pub const fn from_parts(kind: NumberKind, year: u16, sequence: u32) -> Self {
        Self {
            kind,
            year,
            sequence,
        }
    }

    /// The entity family this number belongs to.
    #[must_use]
    pub const fn kind(&self) -> NumberKind {
        self.kind
    }

    /// The 4-digit issue year.
    #[must_use]
    pub const fn year(&self) -> u16 {
        self.year
    }

    /// The position within the (kind, year) series, starting at 1.
    #[must_use]
    pub const fn sequence(&self) -> u32 {
        self.sequence
    }

    /// Strictly parses a rendered number, requiring the given kind.
    pub fn parse_as(kind: NumberKind, s: &str) -> Result<Self, NumberError> {
        let parsed = s.parse::<Self>()?;
        if parsed.kind != kind {
            return Err(NumberError::InvalidPrefix {
                expected: kind.prefix(),
                actual: parsed.kind.prefix().to_string(),
            });
        }
        Ok(parsed)
    }
}

impl fmt::Display for RecordNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}-{:0pad$}",
            self.kind.prefix(),
            self.year,
            self.sequence,
            pad = SEQUENCE_PAD
        )
    }
}

impl FromStr for RecordNumber {
    type Err = NumberError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(NumberError::Empty);
        }

        let Some((head, suffix)) = s.rsplit_once('-') else {
            return Err(NumberError::MissingSeparator);
        };

        // The prefix is the leading run of letters; the rest of the head must
        // be the 4-digit year.
        let split = head.find(|c: char| !c.is_ascii_alphabetic());
        let (prefix, year_str) = match split {
            Some(idx) if idx > 0 => head.split_at(idx),
            _ => {
                return Err(NumberError::UnknownPrefix {
                    actual: s.to_string(),
                })
            }
        };

        let kind = NumberKind::from_prefix(prefix).ok_or_else(|| NumberError::UnknownPrefix {
            actual: s.to_string(),
        })?;

        if year_str.len() != 4 || !year_str.chars().all(|c| c.is_ascii_digit()) {
            return Err(NumberError::InvalidYear {
                actual: year_str.to_string(),
            });
        }
        let year: u16 = year_str.parse().map_err(|_| NumberError::InvalidYear {
            actual: year_str.to_string(),
        })?;

        let sequence: u32 = suffix
            .parse()
            .ok()
            .filter(|&n| n > 0)
            .ok_or_else(|| NumberError::InvalidSequence {
                actual: suffix.to_string(),
            })?;

        Ok(Self {
            kind,
            year,
            sequence,
        })
    }
}

impl serde::Serialize for RecordNumber {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for RecordNumber {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_number_is_sequence_one() {
        for kind in NumberKind::ALL {
            let n = RecordNumber::first(kind, 2024);
            assert_eq!(n.sequence(), 1);
            assert_eq!(n.to_string(), format!("{}2024-000001", kind.prefix()));
        }
    }

    #[test]
    fn sequential_generation_has_no_gaps() {
        let mut latest: Option<String> = None;
        for expected in 1..=50u32 {
            let n =
                RecordNumber::following(NumberKind::MedicalRecord, 2024, latest.as_deref());
            assert_eq!(n.sequence(), expected);
            latest = Some(n.to_string());
        }
    }

    #[test]
    fn following_increments_latest() {
        let n = RecordNumber::following(NumberKind::MedicalRecord, 2024, Some("MR2024-000002"));
        assert_eq!(n.to_string(), "MR2024-000003");
    }

    #[test]
    fn year_rollover_restarts_at_one() {
        // The lookup filters by the new year's series prefix, so the prior
        // year's maximum is never seen at all.
        let n = RecordNumber::following(NumberKind::Appointment, 2024, None);
        assert_eq!(n.to_string(), "APT2024-000001");
    }

    #[test]
    fn malformed_latest_restarts_at_one() {
        for bad in ["MR2024-xyz", "MR2024-", "garbage", ""] {
            let n = RecordNumber::following(NumberKind::MedicalRecord, 2024, Some(bad));
            assert_eq!(n.sequence(), 1, "latest={bad:?}");
        }
    }

    #[test]
    fn no_separator_in_latest_restarts_at_one() {
        let n = RecordNumber::following(NumberKind::LabTest, 2025, Some("LAB2025000004"));
        assert_eq!(n.sequence(), 1);
    }

    #[test]
    fn sequence_beyond_padding_still_renders() {
        let n = RecordNumber::from_parts(NumberKind::Transaction, 2024, 1_234_567);
        assert_eq!(n.to_string(), "TXN2024-1234567");
        let next = RecordNumber::following(NumberKind::Transaction, 2024, Some("TXN2024-1234567"));
        assert_eq!(next.sequence(), 1_234_568);
    }

    #[test]
    fn sequence_saturates_at_max() {
        let latest = format!("TXN2024-{}", u32::MAX);
        let n = RecordNumber::following(NumberKind::Transaction, 2024, Some(&latest));
        assert_eq!(n.sequence(), u32::MAX);
        assert_eq!(
            RecordNumber::from_parts(NumberKind::Transaction, 2024, u32::MAX)
                .next()
                .sequence(),
            u32::MAX
        );
    }

    #[test]
    fn strict_parse_roundtrip() {
        let n: RecordNumber = "PROC2024-000042".parse().unwrap();
        assert_eq!(n.kind(), NumberKind::Procedure);
        assert_eq!(n.year(), 2024);
        assert_eq!(n.sequence(), 42);
        assert_eq!(n.to_string(), "PROC2024-000042");
    }

    #[test]
    fn strict_parse_rejects_unknown_prefix() {
        let err = "ZZ2024-000001".parse::<RecordNumber>().unwrap_err();
        assert!(err.is_prefix_error());
    }

    #[test]
    fn strict_parse_rejects_bad_year() {
        assert!(matches!(
            "MR24-000001".parse::<RecordNumber>(),
            Err(NumberError::InvalidYear { .. })
        ));
    }

    #[test]
    fn strict_parse_rejects_zero_sequence() {
        assert!(matches!(
            "MR2024-000000".parse::<RecordNumber>(),
            Err(NumberError::InvalidSequence { .. })
        ));
    }

    #[test]
    fn strict_parse_rejects_empty_and_missing_separator() {
        assert!(matches!("".parse::<RecordNumber>(), Err(NumberError::Empty)));
        assert!(matches!(
            "MR2024000001".parse::<RecordNumber>(),
            Err(NumberError::MissingSeparator)
        ));
    }

    #[test]
    fn parse_as_enforces_kind() {
        let err = RecordNumber::parse_as(NumberKind::Invoice, "TXN2024-000001").unwrap_err();
        assert!(matches!(err, NumberError::InvalidPrefix { expected: "INV", .. }));
    }

    #[test]
    fn json_roundtrip() {
        let n = RecordNumber::first(NumberKind::Invoice, 2024);
        let json = serde_json::to_string(&n).unwrap();
        assert_eq!(json, "\"INV2024-000001\"");
        let parsed: RecordNumber = serde_json::from_str(&json).unwrap();
        assert_eq!(n, parsed);
    }

    #[test]
    fn all_prefixes_unique() {
        let unique: std::collections::HashSet<_> =
            NumberKind::ALL.iter().map(|k| k.prefix()).collect();
        assert_eq!(unique.len(), NumberKind::ALL.len());
    }

    #[test]
    fn ordering_within_series_matches_issuance() {
        let a = RecordNumber::first(NumberKind::MedicalRecord, 2024);
        let b = a.next();
        assert!(a < b);
        // Lexical ordering of the rendered forms agrees, which is what the
        // storage lookup relies on.
        assert!(a.to_string() < b.to_string());
    }

    proptest::proptest! {
        #[test]
        fn prop_rendered_roundtrips(kind_idx in 0usize..7, year in 1000u16..=9999, seq in 1u32..5_000_000) {
            let kind = NumberKind::ALL[kind_idx];
            let n = RecordNumber::from_parts(kind, year, seq);
            let parsed: RecordNumber = n.to_string().parse().unwrap();
            proptest::prop_assert_eq!(n, parsed);
        }

        #[test]
        fn prop_following_is_successor(kind_idx in 0usize..7, year in 1000u16..=9999, seq in 1u32..5_000_000) {
            let kind = NumberKind::ALL[kind_idx];
            let n = RecordNumber::from_parts(kind, year, seq);
            let next = RecordNumber::following(kind, year, Some(&n.to_string()));
            proptest::prop_assert_eq!(next.sequence(), seq + 1);
        }
    }
}
