//! Macro for defining validated string names.
//!
//! Every name type is a non-empty string that additionally passes a
//! type-specific character check (collection names may not contain `.` or
//! NUL, for instance). The macro generates the struct together with its
//! serde impls, constructors and the usual borrowing traits.

/// Define a strongly-typed, validated string name.
///
/// The `validate` function receives the candidate string and returns
/// `Err(reason)` to reject it. Emptiness is checked before `validate` runs.
macro_rules! define_name {
    (
        $(#[$meta:meta])*
        $vis:vis struct $Name:ident;
        validate = $validate:path;
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
        #[serde(transparent)]
        $vis struct $Name(String);

        impl<'de> serde::Deserialize<'de> for $Name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                $Name::parse(s).map_err(serde::de::Error::custom)
            }
        }

        impl $Name {
            /// Create a new name, panicking if it fails validation.
            ///
            /// Prefer [`parse`](Self::parse) for configuration or other
            /// untrusted input.
            pub fn new(name: impl Into<String>) -> Self {
                match Self::parse(name) {
                    Ok(n) => n,
                    Err(reason) => panic!("{}", reason),
                }
            }

            /// Validate and wrap `name`.
            pub fn parse(name: impl Into<String>) -> Result<Self, String> {
                let s = name.into();
                if s.is_empty() {
                    return Err(concat!(stringify!($Name), " must not be empty").to_string());
                }
                $validate(&s).map_err(|reason| {
                    format!(concat!("invalid ", stringify!($Name), " '{}': {}"), s, reason)
                })?;
                Ok(Self(s))
            }

            /// Return the underlying name as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the wrapper and return the inner `String`.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl std::fmt::Display for $Name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $Name {
            fn as_ref(&self) -> &str { &self.0 }
        }

        impl std::ops::Deref for $Name {
            type Target = str;
            fn deref(&self) -> &str { &self.0 }
        }

        impl std::borrow::Borrow<str> for $Name {
            fn borrow(&self) -> &str { &self.0 }
        }

        impl TryFrom<&str> for $Name {
            type Error = String;
            fn try_from(s: &str) -> Result<Self, Self::Error> {
                Self::parse(s)
            }
        }

        impl PartialEq<str> for $Name {
            fn eq(&self, other: &str) -> bool { self.0 == other }
        }

        impl PartialEq<&str> for $Name {
            fn eq(&self, other: &&str) -> bool { self.0 == *other }
        }
    };
}

pub(crate) use define_name;
