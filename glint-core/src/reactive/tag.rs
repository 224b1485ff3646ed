//! Tags
//!
//! A tag answers one question: "when did the thing I stand for last change?"
//! Tags come in three kinds, fixed and closed:
//!
//! - **Constant** tags never change. Values with no dependencies carry the
//!   constant tag, which makes "nothing to invalidate" trivially detectable.
//! - **Mutable** tags own a revision. Updating one advances its runtime's
//!   clock and stores the new revision.
//! - **Combinator** tags hold a fixed list of children and report the newest
//!   revision among them. The maximum is recomputed on every query, since the
//!   children keep changing underneath.

use std::cell::Cell;
use std::fmt;
use std::rc::{Rc, Weak};

use smallvec::SmallVec;

use super::revision::{Clock, Revision};
use super::runtime::{Runtime, RuntimeInner};

enum TagKind {
    Constant,
    Mutable(MutableTag),
    Combinator(SmallVec<[Tag; 4]>),
}

struct MutableTag {
    revision: Cell<Revision>,
    clock: Rc<Clock>,
    runtime: Weak<RuntimeInner>,
}

/// A versioned marker. Cloning a tag yields another handle to the same tag.
#[derive(Clone)]
pub struct Tag(Rc<TagKind>);

thread_local! {
    static CONSTANT_TAG: Tag = Tag(Rc::new(TagKind::Constant));
}

impl Tag {
    /// The constant tag.
    pub fn constant() -> Tag {
        CONSTANT_TAG.with(Tag::clone)
    }

    /// Create a mutable tag in the current runtime.
    pub fn mutable() -> Tag {
        Self::mutable_in(&Runtime::current())
    }

    pub(crate) fn mutable_in(runtime: &Runtime) -> Tag {
        Tag(Rc::new(TagKind::Mutable(MutableTag {
            revision: Cell::new(Revision::INITIAL),
            clock: Rc::clone(runtime.clock()),
            runtime: runtime.downgrade(),
        })))
    }

    /// Combine tags into one whose revision is the newest among them.
    ///
    /// No tags yield the constant tag and a single tag is returned as is.
    pub fn combine<I>(tags: I) -> Tag
    where
        I: IntoIterator<Item = Tag>,
    {
        let mut children: SmallVec<[Tag; 4]> = tags.into_iter().collect();
        match children.len() {
            0 => Tag::constant(),
            1 => children.swap_remove(0),
            _ => Tag(Rc::new(TagKind::Combinator(children))),
        }
    }

    /// The revision at which this tag last changed.
    pub fn revision(&self) -> Revision {
        match &*self.0 {
            TagKind::Constant => Revision::CONSTANT,
            TagKind::Mutable(tag) => tag.revision.get(),
            TagKind::Combinator(children) => children
                .iter()
                .map(Tag::revision)
                .max()
                .unwrap_or(Revision::CONSTANT),
        }
    }

    /// Whether the tag is still valid for a value captured at `snapshot`.
    pub fn validate(&self, snapshot: Revision) -> bool {
        self.revision() <= snapshot
    }

    /// Mark the tag as changed.
    ///
    /// Only mutable tags can change; updating any other tag is ignored.
    pub fn update(&self) {
        match &*self.0 {
            TagKind::Mutable(tag) => {
                let revision = tag.clock.advance();
                tag.revision.set(revision);
                tracing::trace!(%revision, "tag updated");
                if let Some(inner) = tag.runtime.upgrade() {
                    Runtime { inner }.schedule_revalidate();
                }
            }
            TagKind::Constant | TagKind::Combinator(_) => {
                tracing::warn!(tag = ?self, "attempted to update a tag that is not mutable");
            }
        }
    }

    /// Record this tag as a dependency of the running computation.
    ///
    /// The computation is whatever runs under the current runtime's top
    /// frame; see [`Runtime::consume`].
    pub fn consume(&self) {
        Runtime::current().consume(self);
    }

    /// Whether every revision behind this tag comes from `runtime`'s clock.
    pub(crate) fn belongs_to(&self, runtime: &Runtime) -> bool {
        match &*self.0 {
            TagKind::Constant => true,
            TagKind::Mutable(tag) => Rc::ptr_eq(&tag.clock, runtime.clock()),
            TagKind::Combinator(children) => children.iter().all(|child| child.belongs_to(runtime)),
        }
    }

    /// Whether this is the constant tag.
    pub fn is_constant(&self) -> bool {
        matches!(&*self.0, TagKind::Constant)
    }

    /// Whether this tag can be updated.
    pub fn is_mutable(&self) -> bool {
        matches!(&*self.0, TagKind::Mutable(_))
    }

    /// Whether two handles refer to the same tag.
    pub fn ptr_eq(&self, other: &Tag) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.0 {
            TagKind::Constant => f.write_str("Tag::Constant"),
            TagKind::Mutable(tag) => f
                .debug_tuple("Tag::Mutable")
                .field(&tag.revision.get())
                .finish(),
            TagKind::Combinator(children) => f
                .debug_struct("Tag::Combinator")
                .field("children", &children.len())
                .field("revision", &self.revision())
                .finish(),
        }
    }
}
