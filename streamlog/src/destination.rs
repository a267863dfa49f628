//! Destination (stream) naming.
//!
//! A destination name is derived from the message type and a deployment
//! prefix/suffix:
//!
//! ```text
//! <prefix>--<module-path>.<type-name>[--<suffix>]
//! ```
//!
//! Module separators (`::`) in the module path become `-` and the whole name
//! is lower-cased, so `my_app::events::ClickImpression` published with the
//! prefix `production` goes to `production--my_app-events.clickimpression`.

use std::fmt::Display;

use thiserror::Error;

use crate::message::Message;

/// The longest destination name the stream service accepts.
pub const MAX_DESTINATION_NAME_LEN: usize = 128;

const SEPARATOR: &str = "--";

/// Errors deriving or validating a destination name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    #[error("destination name prefix must not be empty")]
    EmptyPrefix,

    #[error("destination name {name:?} is {len} characters long, the maximum is {max}")]
    TooLong { name: String, len: usize, max: usize },

    #[error("type {type_path} cannot name a destination: {reason}")]
    InvalidShape {
        type_path: String,
        reason: &'static str,
    },

    #[error("destination name {name:?} must match [a-zA-Z0-9_.-]+")]
    InvalidCharacters { name: String },
}

/// A validated destination name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DestinationName(String);

impl DestinationName {
    /// Validate `name` against the stream service's naming grammar.
    pub fn new(name: impl Into<String>) -> Result<Self, NameError> {
        let name = name.into();

        if name.is_empty() || !name.chars().all(is_name_char) {
            return Err(NameError::InvalidCharacters { name });
        }

        let len = name.chars().count();
        if len > MAX_DESTINATION_NAME_LEN {
            return Err(NameError::TooLong {
                name,
                len,
                max: MAX_DESTINATION_NAME_LEN,
            });
        }

        Ok(Self(name))
    }

    /// Derive the destination name for messages of type `T`.
    ///
    /// An empty `prefix` is only accepted when `require_prefix` is false
    /// (test transports), in which case the name starts with the qualified
    /// type name. An empty `suffix` is omitted.
    pub fn for_message<T: Message>(
        prefix: &str,
        suffix: &str,
        require_prefix: bool,
    ) -> Result<Self, NameError> {
        if prefix.is_empty() && require_prefix {
            return Err(NameError::EmptyPrefix);
        }

        let qualified = qualified_type_name(T::type_path())?;

        let mut name = String::with_capacity(prefix.len() + qualified.len() + suffix.len() + 4);
        if !prefix.is_empty() {
            name.push_str(prefix);
            name.push_str(SEPARATOR);
        }
        name.push_str(&qualified);
        if !suffix.is_empty() {
            name.push_str(SEPARATOR);
            name.push_str(suffix);
        }

        Self::new(name.to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for DestinationName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl AsRef<str> for DestinationName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Returns true if `c` is allowed in a destination name.
pub fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_')
}

/// Turn a Rust type path (`a::b::Type`) into `a-b.Type`.
///
/// Only named types that live in a module qualify; generic instantiations,
/// references, tuples, arrays and primitives are rejected.
pub fn qualified_type_name(type_path: &str) -> Result<String, NameError> {
    let invalid = |reason| NameError::InvalidShape {
        type_path: type_path.to_string(),
        reason,
    };

    let segments = type_path.split("::").collect::<Vec<_>>();
    if segments
        .iter()
        .any(|s| s.is_empty() || !s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'))
    {
        return Err(invalid("not a named struct or enum type"));
    }

    let Some((type_name, module_path)) = segments.split_last() else {
        return Err(invalid("empty type path"));
    };
    if module_path.is_empty() {
        return Err(invalid("type has no module path"));
    }

    Ok(format!("{}.{}", module_path.join("-"), type_name))
}
