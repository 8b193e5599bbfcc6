//! Tag tree arena
//!
//! Tags reference their children by ID only. Tree walks look IDs up in
//! this arena and keep a visited set, so a corrupted document with a
//! repeated ID can never make a walk loop.

use super::models::{Id, Tag};
use std::collections::{HashMap, HashSet, VecDeque};

#[derive(Debug, Clone, Default)]
pub struct TagTree {
    tags: HashMap<Id, Tag>,
}

impl TagTree {
    pub fn new(tags: impl IntoIterator<Item = Tag>) -> Self {
        Self {
            tags: tags.into_iter().map(|t| (t.id.clone(), t)).collect(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&Tag> {
        self.tags.get(id)
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// The tag itself followed by all of its descendants, breadth-first.
    /// Child IDs without a tag record are still included.
    pub fn descendants(&self, id: &str) -> Vec<Id> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut out = Vec::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        queue.push_back(id);

        while let Some(current) = queue.pop_front() {
            if !seen.insert(current) {
                continue;
            }
            out.push(current.to_string());
            if let Some(tag) = self.tags.get(current) {
                queue.extend(tag.sub_tags.iter().map(String::as_str));
            }
        }

        out
    }

    /// Tags whose sub_tags list contains `id`. More than one means the tree is broken.
    pub fn parents_of(&self, id: &str) -> Vec<&Tag> {
        self.tags
            .values()
            .filter(|tag| tag.sub_tags.iter().any(|child| child == id))
            .collect()
    }

    /// Add a tag or replace the tag with the same ID
    pub fn insert(&mut self, tag: Tag) {
        self.tags.insert(tag.id.clone(), tag);
    }

    /// Whether giving `parent` these children would put `parent` below itself
    pub fn would_create_cycle(&self, parent: &str, children: &[Id]) -> bool {
        let mut seen = HashSet::new();
        children.iter().any(|child| {
            child == parent
                || !seen.insert(child.as_str())
                || self.descendants(child).iter().any(|d| d == parent)
        })
    }

    /// Check that storing `tag` keeps every tag under `root` at exactly one place
    pub fn check_update(&self, tag: &Tag, root: &str) -> std::result::Result<(), String> {
        if tag.sub_tags.iter().any(|child| child == root) {
            return Err(format!("{} cannot be a sub tag", root));
        }
        if self.would_create_cycle(&tag.id, &tag.sub_tags) {
            return Err("sub tags would create a cycle".to_string());
        }
        if let Some(child) = tag.sub_tags.iter().find(|child| {
            self.parents_of(child.as_str())
                .iter()
                .any(|parent| parent.id != tag.id)
        }) {
            return Err(format!("tag {} already has a parent", child));
        }

        let mut updated = self.clone();
        updated.insert(tag.clone());
        updated.validate(root)
    }

    /// Check that no tag is reachable twice from `root`
    pub fn validate(&self, root: &str) -> std::result::Result<(), String> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        queue.push_back(root);

        while let Some(current) = queue.pop_front() {
            if !seen.insert(current) {
                return Err(format!("tag {} is reachable more than once", current));
            }
            if let Some(tag) = self.tags.get(current) {
                queue.extend(tag.sub_tags.iter().map(String::as_str));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn animals() -> TagTree {
        TagTree::new(vec![
            Tag::new("root", "Root").with_sub_tags(vec!["animal".into(), "plant".into()]),
            Tag::new("animal", "Animal").with_sub_tags(vec!["dog".into(), "cat".into()]),
            Tag::new("dog", "Dog").with_sub_tags(vec!["puppy".into()]),
            Tag::new("cat", "Cat"),
            Tag::new("puppy", "Puppy"),
            Tag::new("plant", "Plant"),
        ])
    }

    #[test]
    fn test_descendants_include_self_and_all_levels() {
        let tree = animals();
        let ids = tree.descendants("animal");
        assert_eq!(ids, vec!["animal", "dog", "cat", "puppy"]);
        assert_eq!(tree.descendants("cat"), vec!["cat"]);
    }

    #[test]
    fn test_descendants_terminate_on_cycle() {
        let tree = TagTree::new(vec![
            Tag::new("a", "A").with_sub_tags(vec!["b".into()]),
            Tag::new("b", "B").with_sub_tags(vec!["a".into()]),
        ]);
        assert_eq!(tree.descendants("a"), vec!["a", "b"]);
        assert!(tree.validate("a").is_err());
    }

    #[test]
    fn test_parents_of() {
        let tree = animals();
        let parents: Vec<&str> = tree
            .parents_of("dog")
            .into_iter()
            .map(|t| t.id.as_str())
            .collect();
        assert_eq!(parents, vec!["animal"]);
        assert!(tree.parents_of("root").is_empty());
    }

    #[test]
    fn test_check_update_rejects_second_parent() {
        let tree = animals();

        let plant = Tag::new("plant", "Plant").with_sub_tags(vec!["cat".into()]);
        assert!(tree.check_update(&plant, "root").is_err());

        let reordered =
            Tag::new("animal", "Animal").with_sub_tags(vec!["cat".into(), "dog".into()]);
        assert!(tree.check_update(&reordered, "root").is_ok());

        let moved = Tag::new("plant", "Plant").with_sub_tags(vec!["fern".into()]);
        assert!(tree.check_update(&moved, "root").is_ok());

        let under_leaf = Tag::new("cat", "Cat").with_sub_tags(vec!["root".into()]);
        assert!(tree.check_update(&under_leaf, "root").is_err());
    }

    #[test]
    fn test_would_create_cycle() {
        let tree = animals();
        assert!(tree.would_create_cycle("dog", &["animal".to_string()]));
        assert!(tree.would_create_cycle("dog", &["dog".to_string()]));
        assert!(tree.would_create_cycle("plant", &["cat".to_string(), "cat".to_string()]));
        assert!(!tree.would_create_cycle("plant", &["cat".to_string()]));
        assert!(tree.validate("root").is_ok());
    }
}
