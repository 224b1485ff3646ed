//! Destroyable meta store.
//!
//! Meta entries are keyed by the address of the object's allocation. Each
//! entry keeps a `Weak` to its object, so an entry never keeps the object
//! alive and an address reused by a new allocation is recognized as stale.
//! Entries of dropped objects are swept once the store grows past its
//! threshold.

use std::any::Any;
use std::mem;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use smallvec::SmallVec;

use super::Destructor;

/// Lifecycle of a destroyable. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DestroyableState {
    /// Not destroyed. Objects without meta are live too.
    Live,
    /// Destruction began; children were destroyed and destructors scheduled.
    Destroying,
    /// The finalizer ran.
    Destroyed,
}

pub(crate) fn key_of(object: &Rc<dyn Any>) -> usize {
    Rc::as_ptr(object) as *const () as usize
}

pub(crate) struct DestroyableMeta {
    object: Weak<dyn Any>,
    pub(crate) label: String,
    pub(crate) parents: SmallVec<[Weak<dyn Any>; 1]>,
    pub(crate) children: SmallVec<[Rc<dyn Any>; 1]>,
    pub(crate) eager_destructors: SmallVec<[Destructor; 1]>,
    pub(crate) destructors: SmallVec<[Destructor; 1]>,
    pub(crate) state: DestroyableState,
    /// Strong reference held while a test session is tracking destroyables.
    retained: Option<Rc<dyn Any>>,
}

impl DestroyableMeta {
    fn new(object: &Rc<dyn Any>, label: String, retain: bool) -> Self {
        Self {
            object: Rc::downgrade(object),
            label,
            parents: SmallVec::new(),
            children: SmallVec::new(),
            eager_destructors: SmallVec::new(),
            destructors: SmallVec::new(),
            state: DestroyableState::Live,
            retained: retain.then(|| Rc::clone(object)),
        }
    }

    fn is_alive(&self) -> bool {
        self.object.strong_count() > 0
    }

    pub(crate) fn is_dying(&self) -> bool {
        self.state >= DestroyableState::Destroying
    }
}

pub(crate) struct DestroyableStore {
    metas: IndexMap<usize, DestroyableMeta>,
    /// The store in use before a test session began.
    stashed: Option<IndexMap<usize, DestroyableMeta>>,
    base_threshold: usize,
    sweep_threshold: usize,
    next_destructor_id: u64,
}

impl DestroyableStore {
    pub(crate) fn new(sweep_threshold: usize) -> Self {
        let threshold = sweep_threshold.max(1);
        Self {
            metas: IndexMap::new(),
            stashed: None,
            base_threshold: threshold,
            sweep_threshold: threshold,
            next_destructor_id: 0,
        }
    }

    fn is_tracking(&self) -> bool {
        self.stashed.is_some()
    }

    pub(crate) fn next_destructor_id(&mut self) -> u64 {
        self.next_destructor_id += 1;
        self.next_destructor_id
    }

    pub(crate) fn get(&self, object: &Rc<dyn Any>) -> Option<&DestroyableMeta> {
        self.metas
            .get(&key_of(object))
            .filter(|meta| meta.is_alive())
    }

    pub(crate) fn get_mut(&mut self, object: &Rc<dyn Any>) -> Option<&mut DestroyableMeta> {
        self.metas
            .get_mut(&key_of(object))
            .filter(|meta| meta.is_alive())
    }

    /// The meta of `object`, created on first use.
    pub(crate) fn get_or_create(
        &mut self,
        object: &Rc<dyn Any>,
        label: impl FnOnce() -> String,
    ) -> &mut DestroyableMeta {
        let retain = self.is_tracking();
        let key = key_of(object);
        let stale = self.metas.get(&key).is_some_and(|meta| !meta.is_alive());
        if stale {
            self.metas.shift_remove(&key);
        }
        self.metas
            .entry(key)
            .or_insert_with(|| DestroyableMeta::new(object, label(), retain))
    }

    /// Remove entries whose object was dropped, once the store is large
    /// enough to be worth it.
    ///
    /// The removed entries are returned so the caller can drop them (and the
    /// children they hold) after releasing its borrow of the store.
    pub(crate) fn sweep_if_needed(&mut self) -> Vec<DestroyableMeta> {
        if self.metas.len() < self.sweep_threshold {
            return Vec::new();
        }

        let mut swept = Vec::new();
        let mut kept = IndexMap::with_capacity(self.metas.len());
        for (key, meta) in mem::take(&mut self.metas) {
            if meta.is_alive() {
                kept.insert(key, meta);
            } else {
                swept.push(meta);
            }
        }
        self.metas = kept;

        self.sweep_threshold = (self.metas.len() * 2).max(self.base_threshold);
        tracing::debug!(
            swept = swept.len(),
            remaining = self.metas.len(),
            "swept destroyable meta store"
        );
        swept
    }

    /// Start a test session: a fresh store that keeps its objects alive.
    pub(crate) fn begin_session(&mut self) -> bool {
        if self.is_tracking() {
            return false;
        }
        self.stashed = Some(mem::take(&mut self.metas));
        true
    }

    /// End the test session, restoring the previous store.
    ///
    /// Returns the session's entries, or `None` when no session was active.
    pub(crate) fn end_session(&mut self) -> Option<IndexMap<usize, DestroyableMeta>> {
        let stashed = self.stashed.take()?;
        Some(mem::replace(&mut self.metas, stashed))
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.metas.len()
    }
}

/// Labels of every session entry that did not reach `Destroyed`.
pub(crate) fn leaked_labels(metas: &IndexMap<usize, DestroyableMeta>) -> Vec<String> {
    metas
        .values()
        .filter(|meta| meta.state != DestroyableState::Destroyed)
        .map(|meta| meta.label.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(value: i32) -> Rc<dyn Any> {
        Rc::new(value)
    }

    #[test]
    fn entries_do_not_keep_objects_alive() {
        let mut store = DestroyableStore::new(64);
        let obj = object(1);
        let weak = Rc::downgrade(&obj);
        store.get_or_create(&obj, || "one".into());

        drop(obj);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn dead_entries_are_swept_past_the_threshold() {
        let mut store = DestroyableStore::new(2);
        let keep = object(0);
        store.get_or_create(&keep, || "keep".into());
        {
            let dropped = object(1);
            store.get_or_create(&dropped, || "dropped".into());
        }
        assert_eq!(store.len(), 2);

        let swept = store.sweep_if_needed();
        assert_eq!(swept.len(), 1);
        assert_eq!(store.len(), 1);
        assert!(store.get(&keep).is_some());
    }

    #[test]
    fn sessions_retain_objects_and_restore_the_store() {
        let mut store = DestroyableStore::new(64);
        let before = object(0);
        store.get_or_create(&before, || "before".into());

        assert!(store.begin_session());
        assert!(!store.begin_session());
        assert!(store.get(&before).is_none());

        let weak = {
            let during = object(1);
            store.get_or_create(&during, || "during".into());
            Rc::downgrade(&during)
        };
        // Retained by the session.
        assert!(weak.upgrade().is_some());

        let session = store.end_session().unwrap();
        assert_eq!(leaked_labels(&session), vec!["during".to_owned()]);
        drop(session);
        assert!(weak.upgrade().is_none());
        assert!(store.get(&before).is_some());
        assert!(store.end_session().is_none());
    }
}
