use std::collections::VecDeque;

use crate::images::GeneratedImage;

/// Generated images for the current session, newest first.
///
/// Records are only ever added at the front; there is no eviction, removal,
/// or reordering.
#[derive(Debug, Clone, Default)]
pub struct HistoryStore {
    records: VecDeque<GeneratedImage>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_front(&mut self, image: GeneratedImage) {
        self.records.push_front(image);
    }

    pub fn get(&self, id: &str) -> Option<&GeneratedImage> {
        self.records.iter().find(|image| image.id == id)
    }

    /// `0` is the newest record.
    pub fn get_index(&self, index: usize) -> Option<&GeneratedImage> {
        self.records.get(index)
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.records.iter().position(|image| image.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GeneratedImage> {
        self.records.iter()
    }

    pub fn ids(&self) -> Vec<String> {
        self.records.iter().map(|image| image.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
