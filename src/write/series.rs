//! Series: identity of one metric stream (name + tag set).

use std::collections::BTreeMap;
use std::fmt;

/// Identity of a sink stream.
///
/// Tags live in a `BTreeMap`, so equality, ordering and hashing are structural
/// over the full tag set regardless of insertion order. Two series with equal
/// name and tags route to the same writer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Series {
    name: String,
    tags: BTreeMap<String, String>,
}

impl Series {
    /// Start building a series with the given measurement name.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> SeriesBuilder {
        SeriesBuilder {
            name: name.into(),
            tags: BTreeMap::new(),
        }
    }

    /// Series with no tags.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self::builder(name).build()
    }

    /// Measurement name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All tags, sorted by key.
    #[must_use]
    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    /// Value of one tag, if set.
    #[must_use]
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }
}

impl fmt::Display for Series {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        for (key, value) in &self.tags {
            write!(f, ",{key}={value}")?;
        }
        Ok(())
    }
}

/// Construction-only mutation for [`Series`].
#[derive(Debug, Clone)]
#[must_use]
pub struct SeriesBuilder {
    name: String,
    tags: BTreeMap<String, String>,
}

impl SeriesBuilder {
    /// Replace the measurement name (useful when a base builder carries shared tags).
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Add or replace one tag.
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Add or replace several tags.
    pub fn tags<I, K, V>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.tags
            .extend(tags.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Finish the series.
    pub fn build(self) -> Series {
        Series {
            name: self.name,
            tags: self.tags,
        }
    }
}
