//! Pairing of behaviour and physiology records that belong to the same
//! experimental session.

use crate::error::RecordError;
use chrono::NaiveDate;
use indexmap::{IndexMap, IndexSet};
use std::fmt;
use tracing::{debug, warn};

/// Identifies an experimental session: one subject on one day.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SessionKey {
    pub subject: String,
    pub date: NaiveDate,
}

impl SessionKey {
    pub fn new(subject: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            subject: subject.into(),
            date,
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.subject, self.date)
    }
}

/// Extracts the session key from a record name.
pub trait KeyExtractor: Sync {
    fn extract(&self, name: &str) -> Option<SessionKey>;
}

impl<F> KeyExtractor for F
where
    F: Fn(&str) -> Option<SessionKey> + Sync,
{
    fn extract(&self, name: &str) -> Option<SessionKey> {
        self(name)
    }
}

/// The default naming rule, `<subject>-<YYYY-MM-DD><anything>`.
///
/// The subject is everything before the first `-`. The date is the ten
/// characters after it. For example, `m001-2019-01-01-153000.txt` belongs to
/// subject `m001` on 2019-01-01.
///
/// Subjects of any length are accepted, so this differs from a fixed-width
/// rule that takes the first four characters as the subject: a name like
/// `m001_x-2019-01-01.txt` yields subject `m001_x` here. Supply a
/// [KeyExtractor] closure to keep a fixed-width convention.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubjectDateKey;

impl KeyExtractor for SubjectDateKey {
    fn extract(&self, name: &str) -> Option<SessionKey> {
        let (subject, rest) = name.split_once('-')?;
        if subject.is_empty() {
            return None;
        }
        let date = NaiveDate::parse_from_str(rest.get(..10)?, "%Y-%m-%d").ok()?;
        Some(SessionKey::new(subject, date))
    }
}

/// What to do when several physiology records share a behaviour record's
/// key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum AmbiguityPolicy {
    /// Take the candidate that comes first in the physiology record list.
    #[default]
    FirstListed,
    /// Refuse to pair and report the candidates.
    Reject,
}

/// A behaviour record and the physiology record believed to come from the
/// same session, if one was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPair {
    pub behavior: String,
    pub physiology: Option<String>,
    pub key: Option<SessionKey>,
}

impl SessionPair {
    /// True when no physiology record was found for this session.
    pub fn is_missing(&self) -> bool {
        self.physiology.is_none()
    }
}

/// Result of pairing two record lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordPairing {
    /// One entry per behaviour record, in input order.
    pub pairs: Vec<SessionPair>,
    /// Physiology records that no behaviour record claimed, in input order.
    pub orphaned: Vec<String>,
}

impl RecordPairing {
    /// Behaviour records without a physiology counterpart.
    pub fn missing(&self) -> impl Iterator<Item = &str> {
        self.pairs
            .iter()
            .filter(|pair| pair.is_missing())
            .map(|pair| pair.behavior.as_str())
    }
}

/// Finds corresponding records across the two streams.
#[derive(Debug, Clone)]
pub struct RecordMatcher<E = SubjectDateKey> {
    extractor: E,
    policy: AmbiguityPolicy,
}

impl Default for RecordMatcher {
    fn default() -> Self {
        Self::new(SubjectDateKey)
    }
}

impl<E> RecordMatcher<E>
where
    E: KeyExtractor,
{
    pub fn new(extractor: E) -> Self {
        Self {
            extractor,
            policy: AmbiguityPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: AmbiguityPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> AmbiguityPolicy {
        self.policy
    }

    /// Pairs every behaviour record with the physiology record that has an
    /// identical session key.
    ///
    /// A behaviour record whose name yields no key, or whose key matches
    /// no physiology record, is paired with `None`. Under
    /// [AmbiguityPolicy::FirstListed] the result depends on the order of
    /// `physiology` when several records share a key.
    pub fn pair<B, P>(&self, behavior: B, physiology: P) -> Result<RecordPairing, RecordError>
    where
        B: IntoIterator,
        B::Item: Into<String>,
        P: IntoIterator,
        P::Item: Into<String>,
    {
        let physiology: Vec<String> = physiology.into_iter().map(Into::into).collect();

        let mut by_key: IndexMap<SessionKey, Vec<&str>> = IndexMap::new();
        for name in &physiology {
            match self.extractor.extract(name) {
                Some(key) => by_key.entry(key).or_default().push(name),
                None => debug!(record = %name, "no session key in physiology record name"),
            }
        }

        let mut claimed: IndexSet<&str> = IndexSet::new();
        let mut pairs = Vec::new();

        for behavior in behavior.into_iter().map(Into::into) {
            let key = self.extractor.extract(&behavior);
            if key.is_none() {
                debug!(record = %behavior, "no session key in behaviour record name");
            }

            let candidates = key
                .as_ref()
                .and_then(|key| by_key.get(key))
                .map(Vec::as_slice)
                .unwrap_or_default();

            let physiology = match (candidates, self.policy) {
                ([], _) => None,
                ([only], _) => Some(*only),
                ([first, ignored @ ..], AmbiguityPolicy::FirstListed) => {
                    warn!(
                        record = %behavior,
                        chosen = %first,
                        ignored = ?ignored,
                        "several physiology records share a session key, using the first listed"
                    );
                    Some(*first)
                }
                (all, AmbiguityPolicy::Reject) => {
                    return Err(RecordError::Ambiguous {
                        behavior,
                        candidates: all.iter().map(|name| name.to_string()).collect(),
                    });
                }
            };

            if let Some(name) = physiology {
                claimed.insert(name);
            }

            pairs.push(SessionPair {
                behavior,
                physiology: physiology.map(str::to_string),
                key,
            });
        }

        let orphaned = physiology
            .iter()
            .filter(|name| !claimed.contains(name.as_str()))
            .cloned()
            .collect();

        Ok(RecordPairing { pairs, orphaned })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_default_key_extraction() {
        let key = SubjectDateKey.extract("m001-2019-01-01-153000.txt").unwrap();
        assert_eq!(key, SessionKey::new("m001", date(2019, 1, 1)));

        let key = SubjectDateKey.extract("mouse12-2020-11-30.ppd").unwrap();
        assert_eq!(key, SessionKey::new("mouse12", date(2020, 11, 30)));

        let key = SubjectDateKey.extract("m001_x-2019-01-01.txt").unwrap();
        assert_eq!(key.subject, "m001_x");
    }

    #[test]
    fn test_fixed_width_subject_extractor() {
        let fixed_width = |name: &str| -> Option<SessionKey> {
            let subject = name.get(..4)?;
            let date = NaiveDate::parse_from_str(name.get(5..15)?, "%Y-%m-%d").ok()?;
            Some(SessionKey::new(subject, date))
        };

        let pairing = RecordMatcher::new(fixed_width)
            .pair(["m001_2019-01-01.txt"], ["m001-2019-01-01.ppd"])
            .unwrap();
        assert_eq!(
            pairing.pairs[0].physiology.as_deref(),
            Some("m001-2019-01-01.ppd")
        );
    }

    #[test]
    fn test_default_key_extraction_rejects_other_names() {
        assert_eq!(SubjectDateKey.extract("notes.txt"), None);
        assert_eq!(SubjectDateKey.extract("-2019-01-01.txt"), None);
        assert_eq!(SubjectDateKey.extract("m001-2019-13-01.txt"), None);
        assert_eq!(SubjectDateKey.extract("m001-2019-01"), None);
    }

    #[test]
    fn test_pair_reports_missing_counterpart() {
        let pairing = RecordMatcher::default()
            .pair(
                ["m001-2019-01-01.txt", "m002-2019-01-01.txt"],
                ["m001-2019-01-01.ppd"],
            )
            .unwrap();

        assert_eq!(pairing.pairs.len(), 2);
        assert_eq!(
            pairing.pairs[0].physiology.as_deref(),
            Some("m001-2019-01-01.ppd")
        );
        assert!(pairing.pairs[1].is_missing());
        assert_eq!(pairing.missing().collect::<Vec<_>>(), ["m002-2019-01-01.txt"]);
        assert!(pairing.orphaned.is_empty());
    }

    #[test]
    fn test_pair_requires_same_date() {
        let pairing = RecordMatcher::default()
            .pair(["m001-2019-01-01.txt"], ["m001-2019-01-02.ppd"])
            .unwrap();

        assert!(pairing.pairs[0].is_missing());
        assert_eq!(pairing.orphaned, ["m001-2019-01-02.ppd"]);
    }

    #[test]
    fn test_pair_first_listed_wins() {
        let pairing = RecordMatcher::default()
            .pair(
                ["m001-2019-01-01.txt"],
                ["m001-2019-01-01-b.ppd", "m001-2019-01-01-a.ppd"],
            )
            .unwrap();

        assert_eq!(
            pairing.pairs[0].physiology.as_deref(),
            Some("m001-2019-01-01-b.ppd")
        );
        assert_eq!(pairing.orphaned, ["m001-2019-01-01-a.ppd"]);
    }

    #[test]
    fn test_pair_reject_policy() {
        let err = RecordMatcher::default()
            .with_policy(AmbiguityPolicy::Reject)
            .pair(
                ["m001-2019-01-01.txt"],
                ["m001-2019-01-01-b.ppd", "m001-2019-01-01-a.ppd"],
            )
            .unwrap_err();

        assert_eq!(
            err,
            RecordError::Ambiguous {
                behavior: "m001-2019-01-01.txt".to_string(),
                candidates: vec![
                    "m001-2019-01-01-b.ppd".to_string(),
                    "m001-2019-01-01-a.ppd".to_string(),
                ],
            }
        );
    }

    #[test]
    fn test_pair_with_custom_extractor() {
        // Names like "2019-01-01_m001.txt".
        let extractor = |name: &str| -> Option<SessionKey> {
            let (date, rest) = name.split_once('_')?;
            let subject = rest.split('.').next()?;
            let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
            Some(SessionKey::new(subject, date))
        };

        let pairing = RecordMatcher::new(extractor)
            .pair(["2019-01-01_m001.txt"], ["2019-01-01_m001.ppd"])
            .unwrap();

        assert_eq!(
            pairing.pairs[0].key,
            Some(SessionKey::new("m001", date(2019, 1, 1)))
        );
        assert_eq!(
            pairing.pairs[0].physiology.as_deref(),
            Some("2019-01-01_m001.ppd")
        );
    }

    #[test]
    fn test_pair_unparsable_behaviour_name() {
        let pairing = RecordMatcher::default()
            .pair(["summary.csv"], ["m001-2019-01-01.ppd"])
            .unwrap();

        assert_eq!(pairing.pairs[0].key, None);
        assert!(pairing.pairs[0].is_missing());
        assert_eq!(pairing.orphaned, ["m001-2019-01-01.ppd"]);
    }

    #[test]
    fn test_two_sessions_can_share_one_physiology_record() {
        let pairing = RecordMatcher::default()
            .pair(
                ["m001-2019-01-01-a.txt", "m001-2019-01-01-b.txt"],
                ["m001-2019-01-01.ppd"],
            )
            .unwrap();

        assert!(pairing.pairs.iter().all(|pair| !pair.is_missing()));
        assert!(pairing.orphaned.is_empty());
    }
}
