use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// De-duplicated set of free-form labels. Blank labels are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct Tags(BTreeSet<String>);

impl Tags {
    pub fn new<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = Self::default();
        set.add(tags);
        set
    }

    pub fn add<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for tag in tags {
            let tag = tag.into();
            if !tag.trim().is_empty() {
                self.0.insert(tag);
            }
        }
    }

    pub fn remove<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for tag in tags {
            self.0.remove(tag.as_ref());
        }
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.contains(tag)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }
}

impl From<Vec<String>> for Tags {
    fn from(tags: Vec<String>) -> Self {
        Self::new(tags)
    }
}

impl From<Tags> for Vec<String> {
    fn from(tags: Tags) -> Self {
        tags.0.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_and_blanks_collapse() {
        let tags = Tags::new(["edge", "edge", " ", "prod"]);
        assert_eq!(tags.len(), 2);
        assert!(tags.contains("edge"));
        assert!(tags.contains("prod"));
    }

    #[test]
    fn add_and_remove_are_idempotent() {
        let mut tags = Tags::new(["a"]);
        tags.add(["a", "b"]);
        tags.add(["b"]);
        assert_eq!(tags.to_vec(), vec!["a".to_string(), "b".to_string()]);

        tags.remove(["a", "missing"]);
        tags.remove(["a"]);
        assert_eq!(tags.to_vec(), vec!["b".to_string()]);
    }
}
