//! Newtype wrappers for the string identifiers that flow through the wire
//! protocol. Keeping these distinct (rather than passing bare `String`s
//! around) makes it impossible to e.g. pass a `ClientId` where an `OrderId`
//! is expected.

use std::fmt;

macro_rules! string_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(String);

        impl $name {
            pub fn new(inner: impl Into<String>) -> Self {
                Self(inner.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(v: $name) -> String {
                v.0
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

string_newtype!(OrderId);
string_newtype!(ClientId);
string_newtype!(Symbol);

/// The `"host:port"` authority of a matching engine. Used both as a
/// directory key and as the thing `peer_client` dials.
string_newtype!(EngineAddr);
