use serde::de::{Error as DeError, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

/// Most labels one interest map holds.
pub const MAX_INTERESTS: usize = 1000;

/// Label -> interaction count, kept in first-seen order.
///
/// Serialized as a plain JSON object so stored and client-supplied profiles
/// share one shape.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Interests {
    entries: Vec<(String, u64)>,
    index: HashMap<String, usize>,
}

impl Interests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one interaction. New labels past `MAX_INTERESTS` are dropped so
    /// stored profiles always read back.
    pub fn increment(&mut self, label: &str) {
        if self.entries.len() >= MAX_INTERESTS && !self.index.contains_key(label) {
            return;
        }
        self.add(label, 1);
    }

    fn add(&mut self, label: &str, count: u64) {
        match self.index.get(label) {
            Some(&slot) => self.entries[slot].1 += count,
            None => {
                self.index.insert(label.to_string(), self.entries.len());
                self.entries.push((label.to_string(), count));
            }
        }
    }

    pub fn get(&self, label: &str) -> Option<u64> {
        self.index.get(label).map(|&slot| self.entries[slot].1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries.iter().map(|(l, c)| (l.as_str(), *c))
    }

    /// Labels ranked by count, ties resolved by first-seen order.
    pub fn top(&self, n: usize) -> Vec<String> {
        let mut ranked: Vec<&(String, u64)> = self.entries.iter().collect();
        // stable sort keeps insertion order between equal counts
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked.into_iter().take(n).map(|(l, _)| l.clone()).collect()
    }
}

impl Serialize for Interests {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (label, count) in &self.entries {
            map.serialize_entry(label, count)?;
        }
        map.end()
    }
}

struct InterestsVisitor;

impl<'de> Visitor<'de> for InterestsVisitor {
    type Value = Interests;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map of label to interaction count")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Interests, A::Error> {
        let mut interests = Interests::new();
        while let Some((label, count)) = access.next_entry::<String, u64>()? {
            interests.add(&label, count);
            if interests.len() > MAX_INTERESTS {
                return Err(A::Error::custom(format!(
                    "too many interests (max {})",
                    MAX_INTERESTS
                )));
            }
        }
        Ok(interests)
    }
}

impl<'de> Deserialize<'de> for Interests {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(InterestsVisitor)
    }
}
