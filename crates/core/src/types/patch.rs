//! Tri-state field wrapper for partial updates.

use serde::{Deserialize, Deserializer, Serialize};

/// A field in a partial-update request body.
///
/// JSON update bodies conflate three different situations when fields are
/// modeled as plain `Option<T>`: the key being absent, the key being `null`,
/// and the key carrying a value. `Patch` keeps all three apart so "leave
/// unchanged" and "explicitly clear" are distinguishable:
///
/// - key absent → [`Patch::Missing`] (retain the stored value)
/// - key `null` → [`Patch::Null`] (explicit clear request)
/// - key present → [`Patch::Value`]
///
/// Use `#[serde(default)]` on struct fields of this type; serde only calls
/// `deserialize` for keys that are present, so absence falls through to
/// `Default`, which is `Missing`.
///
/// ```
/// use clementine_core::Patch;
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct Update {
///     #[serde(default)]
///     name: Patch<String>,
///     #[serde(default)]
///     price: Patch<f64>,
/// }
///
/// let update: Update = serde_json::from_str(r#"{"name": null, "price": 12.5}"#).unwrap();
/// assert!(update.name.is_null());
/// assert_eq!(update.price.into_value(), Some(12.5));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Patch<T> {
    /// The key was not present in the request body.
    Missing,
    /// The key was present with a `null` value.
    Null,
    /// The key was present with a value.
    Value(T),
}

impl<T> Patch<T> {
    /// Whether the key was absent from the request.
    #[must_use]
    pub const fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }

    /// Whether the key was an explicit `null`.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the carried value, if any.
    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Value(v) => Some(v),
            Self::Missing | Self::Null => None,
        }
    }

    /// Returns a reference to the carried value, if any.
    #[must_use]
    pub const fn as_value(&self) -> Option<&T> {
        match self {
            Self::Value(v) => Some(v),
            Self::Missing | Self::Null => None,
        }
    }

    /// Maps the carried value, preserving `Missing`/`Null`.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Patch<U> {
        match self {
            Self::Value(v) => Patch::Value(f(v)),
            Self::Missing => Patch::Missing,
            Self::Null => Patch::Null,
        }
    }
}

impl<T> Default for Patch<T> {
    fn default() -> Self {
        Self::Missing
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Patch<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // Only invoked for keys present in the input; absence is handled by
        // `#[serde(default)]` on the containing field.
        Option::<T>::deserialize(deserializer).map(|opt| match opt {
            Some(value) => Self::Value(value),
            None => Self::Null,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Body {
        #[serde(default)]
        name: Patch<String>,
        #[serde(default)]
        price: Patch<f64>,
        #[serde(default)]
        image: Patch<String>,
    }

    #[test]
    fn distinguishes_missing_null_and_value() {
        let body: Body = serde_json::from_str(r#"{"name": null, "price": 12.5}"#).unwrap();

        assert!(body.name.is_null());
        assert_eq!(body.price, Patch::Value(12.5));
        assert!(body.image.is_missing());
    }

    #[test]
    fn empty_body_is_all_missing() {
        let body: Body = serde_json::from_str("{}").unwrap();

        assert!(body.name.is_missing());
        assert!(body.price.is_missing());
        assert!(body.image.is_missing());
    }

    #[test]
    fn accessors() {
        let patch = Patch::Value(3);
        assert_eq!(patch.as_value(), Some(&3));
        assert_eq!(patch.into_value(), Some(3));
        assert_eq!(Patch::<i32>::Null.into_value(), None);
        assert_eq!(Patch::<i32>::Missing.into_value(), None);
    }

    #[test]
    fn map_preserves_state() {
        assert_eq!(Patch::Value(2).map(|v| v * 2), Patch::Value(4));
        assert_eq!(Patch::<i32>::Null.map(|v| v * 2), Patch::Null);
        assert_eq!(Patch::<i32>::Missing.map(|v| v * 2), Patch::Missing);
    }
}
