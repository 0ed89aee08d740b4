//! Strongly-typed identifiers.
//!
//! All identifiers are integers assigned by the backing store (rowids). The
//! newtypes keep a monitor id from being handed to a report query and vice
//! versa.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Macro to define a strongly-typed id newtype over a store rowid.
///
/// Generates: struct, `new()`, `as_i64()`, Display, Serialize, Deserialize.
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        pub struct $name(i64);

        impl $name {
            pub const fn new(raw: i64) -> Self {
                Self(raw)
            }

            pub const fn as_i64(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(raw: i64) -> Self {
                Self(raw)
            }
        }
    };
}

define_id!(MonitorId);
define_id!(ReportId);
define_id!(UserId);
define_id!(RequestId);
