//! Destroyables
//!
//! An ownership forest with cleanup callbacks. Any `Rc<T>` can take part:
//! children are attached to parents, destructors are registered on objects,
//! and destroying an object tears down its whole subtree.
//!
//! # Destruction
//!
//! Destroying an object:
//!
//! 1. returns immediately if it is already `Destroying` or `Destroyed`;
//! 2. moves it to `Destroying`;
//! 3. destroys every child, depth first;
//! 4. runs its eager destructors inline;
//! 5. hands each remaining destructor to
//!    [`GlobalContext::schedule_destroy`];
//! 6. hands a finalizer to [`GlobalContext::schedule_destroyed`], which
//!    detaches the object from its live parents and moves it to `Destroyed`.
//!
//! Destroying any one parent destroys the child, even if another parent is
//! still live. That parent drops the child from its list only once the child
//! is finalized.
//!
//! Once destruction began, the object's part of the graph is frozen:
//! attaching children to it, or adding or removing destructors, fails with
//! [`Error::AlreadyDestroying`].

mod meta;
mod testing;

use std::any::{type_name, Any};
use std::fmt;
use std::rc::Rc;

pub use meta::DestroyableState;
pub(crate) use meta::DestroyableStore;

use crate::error::{Error, Result};
use crate::reactive::{GlobalContext, Runtime};

/// A registered cleanup callback.
#[derive(Clone)]
pub struct Destructor {
    id: u64,
    callback: Rc<dyn Fn(&dyn Any)>,
}

impl Destructor {
    fn call(&self, object: &dyn Any) {
        (self.callback)(object)
    }
}

impl fmt::Debug for Destructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Destructor").field("id", &self.id).finish()
    }
}

/// Identifies a registered destructor, for [`Runtime::unregister_destructor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DestructorHandle {
    id: u64,
    eager: bool,
}

impl DestructorHandle {
    /// Whether the destructor runs inline during destruction.
    pub fn is_eager(&self) -> bool {
        self.eager
    }
}

/// A destructor waiting to be run by the embedder.
pub struct DestroyTask {
    object: Rc<dyn Any>,
    destructor: Destructor,
}

impl DestroyTask {
    /// The object being destroyed.
    pub fn object(&self) -> &Rc<dyn Any> {
        &self.object
    }

    /// Run the destructor against its object.
    pub fn run(self) {
        self.destructor.call(&*self.object);
    }
}

impl fmt::Debug for DestroyTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DestroyTask")
            .field("destructor", &self.destructor)
            .finish_non_exhaustive()
    }
}

fn as_object<T: Any>(object: &Rc<T>) -> Rc<dyn Any> {
    object.clone()
}

fn label_of<T: Any>(object: &Rc<T>) -> String {
    format!("{}@{:p}", type_name::<T>(), Rc::as_ptr(object))
}

fn opaque_label(object: &Rc<dyn Any>) -> String {
    format!("dyn Any@{:p}", Rc::as_ptr(object) as *const ())
}

fn same_object(a: &Rc<dyn Any>, b: &Rc<dyn Any>) -> bool {
    meta::key_of(a) == meta::key_of(b)
}

impl Runtime {
    fn sweep_destroyables(&self) {
        let swept = self.inner.destroyables.borrow_mut().sweep_if_needed();
        // Dropped outside the borrow: the swept entries may own the last
        // references to children whose drop glue reaches back in here.
        drop(swept);
    }

    /// Make `child` owned by `parent`: destroying `parent` destroys `child`.
    pub fn associate_destroyable_child<P: Any, C: Any>(
        &self,
        parent: &Rc<P>,
        child: &Rc<C>,
    ) -> Result<()> {
        self.sweep_destroyables();
        let parent_object = as_object(parent);
        let child_object = as_object(child);

        let mut store = self.inner.destroyables.borrow_mut();
        let parent_meta = store.get_or_create(&parent_object, || label_of(parent));
        if parent_meta.is_dying() {
            return Err(Error::AlreadyDestroying {
                action: "associate a destroyable child",
                object: parent_meta.label.clone(),
            });
        }
        if !parent_meta
            .children
            .iter()
            .any(|existing| same_object(existing, &child_object))
        {
            parent_meta.children.push(Rc::clone(&child_object));
        }

        let parent_ref = Rc::downgrade(&parent_object);
        let child_meta = store.get_or_create(&child_object, || label_of(child));
        if !child_meta.parents.iter().any(|existing| existing.ptr_eq(&parent_ref)) {
            child_meta.parents.push(parent_ref);
        }
        Ok(())
    }

    /// Register a destructor that the embedder runs after `object` starts
    /// being destroyed.
    pub fn register_destructor<T: Any>(
        &self,
        object: &Rc<T>,
        destructor: impl Fn(&T) + 'static,
    ) -> Result<DestructorHandle> {
        self.register(object, destructor, false)
    }

    /// Register a destructor that runs inline while `object` is destroyed,
    /// after its children and before any deferred destructor.
    pub fn register_eager_destructor<T: Any>(
        &self,
        object: &Rc<T>,
        destructor: impl Fn(&T) + 'static,
    ) -> Result<DestructorHandle> {
        self.register(object, destructor, true)
    }

    fn register<T: Any>(
        &self,
        object: &Rc<T>,
        destructor: impl Fn(&T) + 'static,
        eager: bool,
    ) -> Result<DestructorHandle> {
        self.sweep_destroyables();
        let erased = as_object(object);

        let mut store = self.inner.destroyables.borrow_mut();
        let id = store.next_destructor_id();
        let meta = store.get_or_create(&erased, || label_of(object));
        if meta.is_dying() {
            return Err(Error::AlreadyDestroying {
                action: "register a destructor",
                object: meta.label.clone(),
            });
        }

        let destructor = Destructor {
            id,
            callback: Rc::new(move |object: &dyn Any| {
                if let Some(object) = object.downcast_ref::<T>() {
                    destructor(object);
                }
            }),
        };
        if eager {
            meta.eager_destructors.push(destructor);
        } else {
            meta.destructors.push(destructor);
        }
        Ok(DestructorHandle { id, eager })
    }

    /// Remove a destructor registered on `object`.
    pub fn unregister_destructor<T: Any>(
        &self,
        object: &Rc<T>,
        handle: DestructorHandle,
    ) -> Result<()> {
        let debug_checks = self.inner.config.debug_checks;
        let erased = as_object(object);

        let mut store = self.inner.destroyables.borrow_mut();
        let meta = store.get_or_create(&erased, || label_of(object));
        if meta.is_dying() {
            return Err(Error::AlreadyDestroying {
                action: "unregister a destructor",
                object: meta.label.clone(),
            });
        }

        let destructors = if handle.eager {
            &mut meta.eager_destructors
        } else {
            &mut meta.destructors
        };
        match destructors.iter().position(|d| d.id == handle.id) {
            Some(index) => {
                destructors.remove(index);
                Ok(())
            }
            None if debug_checks => Err(Error::UnregisteredDestructor {
                object: meta.label.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Destroy `object` and, recursively, its children.
    ///
    /// Requires an installed [`GlobalContext`]; without one nothing changes.
    pub fn destroy<T: Any>(&self, object: &Rc<T>) -> Result<()> {
        let context = self.global_context("destroy")?;
        let erased = as_object(object);
        self.inner
            .destroyables
            .borrow_mut()
            .get_or_create(&erased, || label_of(object));
        self.destroy_object(&erased, &context);
        Ok(())
    }

    /// Destroy every current child of `object`, leaving `object` live.
    pub fn destroy_children<T: Any>(&self, object: &Rc<T>) -> Result<()> {
        let context = self.global_context("destroy children")?;
        let erased = as_object(object);
        let children = match self.inner.destroyables.borrow().get(&erased) {
            Some(meta) => meta.children.to_vec(),
            None => return Ok(()),
        };
        for child in &children {
            self.destroy_object(child, &context);
        }
        Ok(())
    }

    fn destroy_object(&self, object: &Rc<dyn Any>, context: &Rc<dyn GlobalContext>) {
        let (children, eager, deferred) = {
            let mut store = self.inner.destroyables.borrow_mut();
            let meta = store.get_or_create(object, || opaque_label(object));
            if meta.is_dying() {
                return;
            }
            meta.state = DestroyableState::Destroying;
            tracing::debug!(object = %meta.label, "destroying");
            (
                meta.children.to_vec(),
                meta.eager_destructors.to_vec(),
                meta.destructors.to_vec(),
            )
        };

        for child in &children {
            self.destroy_object(child, context);
        }

        for destructor in &eager {
            destructor.call(&**object);
        }

        for destructor in deferred {
            context.schedule_destroy(DestroyTask {
                object: Rc::clone(object),
                destructor,
            });
        }

        let runtime = self.downgrade();
        let object = Rc::clone(object);
        context.schedule_destroyed(Box::new(move || {
            if let Some(inner) = runtime.upgrade() {
                Runtime { inner }.finish_destruction(&object);
            }
        }));
    }

    fn finish_destruction(&self, object: &Rc<dyn Any>) {
        let mut store = self.inner.destroyables.borrow_mut();
        let parents = match store.get_mut(object) {
            Some(meta) => {
                meta.state = DestroyableState::Destroyed;
                tracing::debug!(object = %meta.label, "destroyed");
                meta.parents.to_vec()
            }
            None => return,
        };

        for parent in parents.iter().filter_map(|parent| parent.upgrade()) {
            if let Some(parent_meta) = store.get_mut(&parent) {
                if parent_meta.state == DestroyableState::Live {
                    parent_meta
                        .children
                        .retain(|child| !same_object(child, object));
                }
            }
        }
    }

    /// The lifecycle state of `object`. Objects never seen are live.
    pub fn destroyable_state<T: Any>(&self, object: &Rc<T>) -> DestroyableState {
        self.inner
            .destroyables
            .borrow()
            .get(&as_object(object))
            .map_or(DestroyableState::Live, |meta| meta.state)
    }

    /// Whether destruction of `object` has begun.
    pub fn is_destroying<T: Any>(&self, object: &Rc<T>) -> bool {
        self.destroyable_state(object) >= DestroyableState::Destroying
    }

    /// Whether `object` has been finalized.
    pub fn is_destroyed<T: Any>(&self, object: &Rc<T>) -> bool {
        self.destroyable_state(object) == DestroyableState::Destroyed
    }
}
