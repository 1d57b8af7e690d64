//! Named ranges tracked through every operation.
//!
//! Marker names use `group:id` by convention (`comment:1`); groups drive
//! conversion events. Markers managed using operations are created and
//! changed by marker operations so they take part in undo.

use std::collections::BTreeMap;

use crate::position::Position;
use crate::range::Range;

#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub name: String,
    pub range: Range,
    pub managed_using_operations: bool,
    pub affects_data: bool,
}

impl Marker {
    /// Part of the name before the first `:`
    pub fn group(&self) -> &str {
        self.name.split(':').next().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MarkerCollection {
    markers: BTreeMap<String, Marker>,
}

impl MarkerCollection {
    pub fn get(&self, name: &str) -> Option<&Marker> {
        self.markers.get(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.markers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.markers.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Marker> {
        self.markers.values()
    }

    /// Markers named `prefix` or `prefix:...`
    pub fn in_group<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a Marker> + 'a {
        self.markers.values().filter(move |marker| {
            marker.name == prefix
                || marker
                    .name
                    .strip_prefix(prefix)
                    .is_some_and(|rest| rest.starts_with(':'))
        })
    }

    /// Markers whose range contains the position, boundaries included
    pub fn at_position<'a>(&'a self, position: &'a Position) -> impl Iterator<Item = &'a Marker> + 'a {
        self.markers.values().filter(move |marker| {
            marker.range.contains_position(position) || marker.range.start == *position || marker.range.end == *position
        })
    }

    pub fn intersecting<'a>(&'a self, range: &'a Range) -> impl Iterator<Item = &'a Marker> + 'a {
        self.markers.values().filter(move |marker| marker.range.is_intersecting(range))
    }

    /// Create or update a marker. Returns whether anything changed.
    pub(crate) fn set(&mut self, name: &str, range: Range, managed_using_operations: bool, affects_data: bool) -> bool {
        let marker = Marker {
            name: name.to_string(),
            range,
            managed_using_operations,
            affects_data,
        };
        match self.markers.get(name) {
            Some(existing) if *existing == marker => false,
            _ => {
                self.markers.insert(name.to_string(), marker);
                true
            }
        }
    }

    pub(crate) fn remove(&mut self, name: &str) -> Option<Marker> {
        self.markers.remove(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(start: usize, end: usize) -> Range {
        Range::new(Position::new("main", vec![0, start]), Position::new("main", vec![0, end]))
    }

    #[test]
    fn test_groups_and_lookup() {
        let mut markers = MarkerCollection::default();
        assert!(markers.set("comment:1", range(0, 2), true, true));
        assert!(markers.set("comment:2", range(3, 5), true, true));
        assert!(markers.set("commentary", range(1, 2), false, false));
        assert!(!markers.set("comment:1", range(0, 2), true, true));

        assert_eq!(markers.in_group("comment").count(), 2);
        assert_eq!(markers.get("comment:2").map(Marker::group), Some("comment"));

        let caret = Position::new("main", vec![0, 2]);
        let names: Vec<&str> = markers.at_position(&caret).map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["comment:1", "commentary"]);

        assert!(markers.remove("comment:1").is_some());
        assert!(!markers.has("comment:1"));
    }
}
