//! Shared heap nodes with a stable identity

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a heap node.
///
/// Ids are handed out from a process-wide counter, so no two live nodes share
/// one. A restored copy gets its own id; which snapshot entry it came from is
/// tracked by the restore, not by the id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(u64);

impl ObjectId {
    /// Allocate a fresh id
    pub fn next() -> Self {
        Self(NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct Node<T> {
    id: ObjectId,
    cell: RefCell<T>,
}

/// Reference-counted, interior-mutable heap node.
///
/// Cloning a `Handle` clones the reference, never the contents.
pub struct Handle<T> {
    inner: Rc<Node<T>>,
}

impl<T> Handle<T> {
    /// Wrap `value` in a new node with a fresh identity
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(Node {
                id: ObjectId::next(),
                cell: RefCell::new(value),
            }),
        }
    }

    pub fn id(&self) -> ObjectId {
        self.inner.id
    }

    pub fn borrow(&self) -> Ref<'_, T> {
        self.inner.cell.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, T> {
        self.inner.cell.borrow_mut()
    }

    /// True if both handles point at the same node in memory
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Memory address of the node, stable for as long as any handle is alive
    pub fn addr(&self) -> usize {
        Rc::as_ptr(&self.inner) as *const () as usize
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({})", self.inner.id)
    }
}
