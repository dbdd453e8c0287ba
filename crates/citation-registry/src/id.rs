use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CitationIdError;

/// Citation identifier, displayed and serialized as `[n]` with `n >= 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CitationId(u64);

impl CitationId {
    pub(crate) fn new(number: u64) -> Self {
        debug_assert!(number >= 1);
        Self(number)
    }

    /// The numeric part of `[n]`.
    pub fn number(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for CitationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0)
    }
}

impl FromStr for CitationId {
    type Err = CitationIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let number: u64 = s
            .trim()
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
            .and_then(|digits| digits.parse().ok())
            .ok_or_else(|| CitationIdError::Malformed(s.to_string()))?;
        if number == 0 {
            return Err(CitationIdError::Zero);
        }
        Ok(Self(number))
    }
}

impl Serialize for CitationId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CitationId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_parse() {
        let id = CitationId::new(12);
        assert_eq!(id.to_string(), "[12]");
        assert_eq!("[12]".parse::<CitationId>(), Ok(id));
        assert_eq!(" [3] ".parse::<CitationId>().map(|c| c.number()), Ok(3));
    }

    #[test]
    fn rejects_malformed_ids() {
        assert_eq!(
            "12".parse::<CitationId>(),
            Err(CitationIdError::Malformed("12".to_string()))
        );
        assert!("[x]".parse::<CitationId>().is_err());
        assert!("[-1]".parse::<CitationId>().is_err());
        assert_eq!("[0]".parse::<CitationId>(), Err(CitationIdError::Zero));
    }

    #[test]
    fn orders_numerically() {
        assert!(CitationId::new(2) < CitationId::new(10));
    }
}
