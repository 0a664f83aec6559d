//! Topic and filter level grammar (MQTT-4.7).
//!
//! A topic is the concrete `/`-separated address a PUBLISH carries; a
//! filter is the pattern a SUBSCRIBE carries, which may additionally use
//! `+` (single-level wildcard) and a trailing `#` (multi-level wildcard).

use std::fmt;

use crate::error::DecodeError;

/// One `/`-separated segment of a topic. May be empty (`"/a"` has an empty
/// leading level) but never contains `/` or a NUL byte.
pub type Level = String;

/// One segment of a subscription filter.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum FilterLevel {
    /// A literal level, matched verbatim against a topic level.
    Literal(Level),
    /// `+`: matches any single topic level, including an empty one.
    Plus,
    /// `#`: matches the remainder of the topic, one or more levels,
    /// including zero additional levels. Only valid as the last level.
    Hash,
}

/// A concrete, publishable topic: one or more levels.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Topic {
    levels: Vec<Level>,
}

impl Topic {
    #[must_use]
    pub fn levels(&self) -> &[Level] {
        &self.levels
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.levels.join("/"))
    }
}

/// A subscription filter: one or more filter levels, with `#` permitted
/// only as the final level.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Filter {
    levels: Vec<FilterLevel>,
}

impl Filter {
    #[must_use]
    pub fn levels(&self) -> &[FilterLevel] {
        &self.levels
    }
}

impl fmt::Display for FilterLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(level) => write!(f, "{level}"),
            Self::Plus => write!(f, "+"),
            Self::Hash => write!(f, "#"),
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.levels.iter().map(ToString::to_string).collect();
        write!(f, "{}", rendered.join("/"))
    }
}

fn is_valid_level_byte(s: &str) -> bool {
    !s.contains('/') && !s.contains('\0')
}

/// Parse a concrete topic out of its wire string.
///
/// # Errors
/// Returns `DecodeError::InvalidTopic` if `s` is empty or any level
/// contains `+`, `#` or a NUL byte.
pub fn parse_topic(s: &str) -> Result<Topic, DecodeError> {
    if s.is_empty() {
        return Err(DecodeError::InvalidTopic);
    }
    let mut levels = Vec::new();
    for part in s.split('/') {
        if !is_valid_level_byte(part) || part.contains('+') || part.contains('#') {
            return Err(DecodeError::InvalidTopic);
        }
        levels.push(part.to_string());
    }
    Ok(Topic { levels })
}

/// Parse a subscription filter out of its wire string.
///
/// # Errors
/// Returns `DecodeError::InvalidFilter` if `s` is empty, any level
/// contains a NUL byte, a level mixes `+`/`#` with other characters, or
/// `#` appears anywhere but as the final level.
pub fn parse_filter(s: &str) -> Result<Filter, DecodeError> {
    if s.is_empty() {
        return Err(DecodeError::InvalidFilter);
    }
    let parts: Vec<&str> = s.split('/').collect();
    let last = parts.len() - 1;
    let mut levels = Vec::with_capacity(parts.len());
    for (i, part) in parts.into_iter().enumerate() {
        if part.contains('\0') {
            return Err(DecodeError::InvalidFilter);
        }
        let level = match part {
            "+" => FilterLevel::Plus,
            "#" => {
                if i != last {
                    return Err(DecodeError::InvalidFilter);
                }
                FilterLevel::Hash
            }
            _ if part.contains('+') || part.contains('#') => {
                return Err(DecodeError::InvalidFilter);
            }
            _ => FilterLevel::Literal(part.to_string()),
        };
        levels.push(level);
    }
    Ok(Filter { levels })
}
