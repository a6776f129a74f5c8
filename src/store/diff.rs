use std::collections::{HashMap, HashSet};

use uuid::Uuid;

/// Delta between a keyed view and the next full result set delivered by a
/// subscription. The store pushes whole sets, not events; this is the
/// boundary that turns them back into increments for downstream consumers.
#[derive(Debug)]
pub struct SetDiff<T> {
    pub added: Vec<T>,
    pub updated: Vec<T>,
    pub removed: Vec<Uuid>,
}

impl<T: Clone> SetDiff<T> {
    pub fn between(
        prev: &HashMap<Uuid, T>,
        next: &[T],
        key: impl Fn(&T) -> Uuid,
        is_changed: impl Fn(&T, &T) -> bool,
    ) -> Self {
        let mut next_keys = HashSet::with_capacity(next.len());
        let mut added = Vec::new();
        let mut updated = Vec::new();

        for item in next {
            let k = key(item);
            next_keys.insert(k);
            match prev.get(&k) {
                None => added.push(item.clone()),
                Some(old) if is_changed(old, item) => updated.push(item.clone()),
                Some(_) => {}
            }
        }

        let removed = prev
            .keys()
            .filter(|k| !next_keys.contains(k))
            .copied()
            .collect();

        Self {
            added,
            updated,
            removed,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }
}
