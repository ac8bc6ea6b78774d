//! Ambient propagation of the current [`TagMap`] through a thread-local call context.
//!
//! Modeled on the attach/detach `Context` pattern: code that wants to add tags for the
//! duration of a call attaches a derived map and gets back a guard; dropping the guard
//! restores whatever was current before, even across early returns or panics.

use super::TagMap;
use std::cell::RefCell;

thread_local! {
    static CURRENT_TAG_MAP: RefCell<TagMap> = RefCell::new(TagMap::empty());
}

/// Returns a clone of the tag map currently attached on this thread.
///
/// Defaults to an empty map if nothing has ever been attached.
#[must_use]
pub fn current_tag_map() -> TagMap {
    CURRENT_TAG_MAP.with(|cell| cell.borrow().clone())
}

/// Attaches `tag_map` as the current tag map for this thread and returns a guard that
/// restores the previous map when dropped.
///
/// ```
/// # use statsview::tags::{context, Key, Tag, TagMap, TagMutator};
/// let method = Key::new("method").unwrap();
/// let derived = TagMap::new(
///     &context::current_tag_map(),
///     [TagMutator::Upsert(Tag::new(method.clone(), "GET"))],
/// )
/// .unwrap();
/// {
///     let _guard = context::attach_tag_map(derived);
///     assert_eq!(context::current_tag_map().value(&method), Some("GET"));
/// }
/// assert_eq!(context::current_tag_map().value(&method), None);
/// ```
#[must_use]
pub fn attach_tag_map(tag_map: TagMap) -> TagMapGuard {
    let previous = CURRENT_TAG_MAP.with(|cell| cell.replace(tag_map));
    TagMapGuard { previous: Some(previous) }
}

/// Restores the previously-current tag map when dropped.
///
/// Must be dropped on the same thread that produced it; it is not `Send`.
#[must_use = "dropping this guard immediately restores the previous tag map"]
pub struct TagMapGuard {
    previous: Option<TagMap>,
}

impl Drop for TagMapGuard {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            CURRENT_TAG_MAP.with(|cell| {
                *cell.borrow_mut() = previous;
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::{Key, Tag, TagMutator};

    #[test]
    fn default_context_is_empty() {
        assert!(current_tag_map().is_empty());
    }

    #[test]
    fn attach_is_visible_until_guard_drops() {
        let key = Key::new("region").unwrap();
        let derived =
            TagMap::new(&current_tag_map(), [TagMutator::Upsert(Tag::new(key.clone(), "us"))])
                .unwrap();
        assert_eq!(current_tag_map().value(&key), None);
        {
            let _guard = attach_tag_map(derived);
            assert_eq!(current_tag_map().value(&key), Some("us"));
        }
        assert_eq!(current_tag_map().value(&key), None);
    }

    #[test]
    fn nested_attach_restores_intermediate_value() {
        let key = Key::new("region").unwrap();
        let outer =
            TagMap::new(&current_tag_map(), [TagMutator::Upsert(Tag::new(key.clone(), "us"))])
                .unwrap();
        let _outer_guard = attach_tag_map(outer);
        {
            let inner = TagMap::new(
                &current_tag_map(),
                [TagMutator::Upsert(Tag::new(key.clone(), "eu"))],
            )
            .unwrap();
            let _inner_guard = attach_tag_map(inner);
            assert_eq!(current_tag_map().value(&key), Some("eu"));
        }
        assert_eq!(current_tag_map().value(&key), Some("us"));
    }
}
