//! Lenient resolution of string-valued settings.

use std::str::FromStr;

/// Outcome of resolving an optional, string-valued setting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Setting<T> {
    /// The value was supplied and parsed successfully.
    Configured(T),
    /// No value was supplied; the documented default applies.
    Default(T),
    /// A value was supplied but could not be parsed; the default applies.
    Invalid {
        /// Text that failed to parse.
        raw: String,
        /// Default used in its place.
        fallback: T,
    },
}

impl<T> Setting<T>
where
    T: FromStr + Clone,
{
    /// Parses `raw` when present, falling back to `default` otherwise.
    ///
    /// Blank strings are treated as absent.
    pub fn resolve(raw: Option<&str>, default: T) -> Self {
        match raw.map(str::trim).filter(|value| !value.is_empty()) {
            None => Self::Default(default),
            Some(value) => match value.parse::<T>() {
                Ok(parsed) => Self::Configured(parsed),
                Err(_) => Self::Invalid {
                    raw: value.to_owned(),
                    fallback: default,
                },
            },
        }
    }
}

impl<T: Clone> Setting<T> {
    /// Returns the effective value regardless of how it was obtained.
    #[must_use]
    pub fn value(&self) -> T {
        match self {
            Self::Configured(value) | Self::Default(value) => value.clone(),
            Self::Invalid { fallback, .. } => fallback.clone(),
        }
    }

    /// Returns the rejected text when the setting failed to parse.
    #[must_use]
    pub fn rejected(&self) -> Option<&str> {
        match self {
            Self::Invalid { raw, .. } => Some(raw.as_str()),
            Self::Configured(_) | Self::Default(_) => None,
        }
    }
}
