//! Common types used across the platform

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Date range for queries
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DateRange {
    pub start: chrono::NaiveDate,
    pub end: chrono::NaiveDate,
}

impl DateRange {
    pub fn contains(&self, date: chrono::NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    pub fn is_valid(&self) -> bool {
        self.start <= self.end
    }
}

/// Returned when a stored or submitted value does not name a known variant
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown {kind} value: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// Declares a closed set of values stored as text.
///
/// Each variant carries its wire/database spelling and its Arabic label. The
/// generated enum serializes as the wire spelling and can be decoded from a
/// `String` column through `TryFrom<String>`.
#[macro_export]
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident : $kind:literal {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal / $label_ar:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ::serde::Serialize, ::serde::Deserialize)]
        $vis enum $name {
            $( $(#[$vmeta])* #[serde(rename = $text)] $variant, )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $( $name::$variant => $text, )+
                }
            }

            pub fn label_ar(&self) -> &'static str {
                match self {
                    $( $name::$variant => $label_ar, )+
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = $crate::types::ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( $text => Ok($name::$variant), )+
                    other => Err($crate::types::ParseEnumError {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl ::std::convert::TryFrom<String> for $name {
            type Error = $crate::types::ParseEnumError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }
    };
}
