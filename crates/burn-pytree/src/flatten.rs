use alloc::vec::Vec;

use crate::PytreeError;
use crate::tree::{Node, Tree};

/// Placeholder leaf of a [`TreeSpec`].
///
/// Carries the slot of the leaf in flatten order, so the `n`-th leaf met in a postorder walk
/// of a spec has index `n`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SpecLeaf {
    index: usize,
}

impl SpecLeaf {
    pub(crate) fn new(index: usize) -> Self {
        Self { index }
    }

    /// Position of this leaf in the flattened leaf array.
    pub fn index(&self) -> usize {
        self.index
    }
}

/// A structure-only tree: kinds, child counts, dict keys and custom labels, with placeholder
/// leaves.
///
/// Specs are what [`Tree::flatten`] produces next to the leaves, what [`TreeSpec::unflatten`]
/// consumes, and what the string grammar encodes. Auxiliary node values are cloned into the
/// spec and back out of it.
pub type TreeSpec<A = ()> = Tree<SpecLeaf, A>;

impl<L, A: Clone> Tree<L, A> {
    /// Clones the shape and auxiliary values of this tree into a [`TreeSpec`].
    pub fn spec(&self) -> TreeSpec<A> {
        self.rebuild(&mut |_, index| SpecLeaf::new(index))
    }

    /// Splits the tree into references to its leaves and a spec of its structure.
    ///
    /// Leaves are listed in postorder, left to right, and the returned vector holds exactly
    /// [`Tree::leaf_count`] entries.
    pub fn flatten<'a>(&'a self) -> (Vec<&'a L>, TreeSpec<A>) {
        let spec = self.spec();
        let mut leaves = Vec::with_capacity(spec.leaf_count());
        self.traverse(&mut |node: &'a Tree<L, A>| {
            if let Some(value) = node.try_value() {
                leaves.push(value);
            }
        });
        log::trace!("Flattened tree into {} leaves", leaves.len());

        (leaves, spec)
    }

    /// Same as [`Tree::flatten`], with mutable leaf references.
    ///
    /// Refreshes the cached leaf counts of the whole tree first.
    pub fn flatten_mut(&mut self) -> (Vec<&mut L>, TreeSpec<A>) {
        self.refresh_leaf_count();
        let spec = self.spec();
        let mut leaves = Vec::with_capacity(spec.leaf_count());
        collect_leaves_mut(self.node_mut(), &mut leaves);
        log::trace!("Flattened tree into {} mutable leaves", leaves.len());

        (leaves, spec)
    }

    /// Consumes the tree, returning its leaves in flatten order and a spec of its structure.
    pub fn into_flat(self) -> (Vec<L>, TreeSpec<A>) {
        let spec = self.spec();
        let mut leaves = Vec::with_capacity(spec.leaf_count());
        collect_leaves(self.into_node(), &mut leaves);
        log::trace!("Flattened owned tree into {} leaves", leaves.len());

        (leaves, spec)
    }
}

impl<A: Clone> TreeSpec<A> {
    /// Rebuilds a tree of this shape whose leaves reference `leaves`, in flatten order.
    ///
    /// # Errors
    ///
    /// [`PytreeError::LeafCountMismatch`] if `leaves` does not hold exactly
    /// [`Tree::leaf_count`] elements.
    pub fn unflatten<'a, T>(&self, leaves: &'a [T]) -> Result<Tree<&'a T, A>, PytreeError> {
        let expected = self.check_leaf_count(leaves.len())?;
        self.try_rebuild(0, &mut |_, offset| {
            leaves.get(offset).ok_or(PytreeError::LeafCountMismatch {
                expected,
                actual: leaves.len(),
            })
        })
    }

    /// Same as [`TreeSpec::unflatten`], with mutable leaf references.
    pub fn unflatten_mut<'a, T>(
        &self,
        leaves: &'a mut [T],
    ) -> Result<Tree<&'a mut T, A>, PytreeError> {
        self.unflatten_owned(leaves.iter_mut())
    }

    /// Rebuilds a tree of this shape that takes ownership of `leaves`, in flatten order.
    ///
    /// # Errors
    ///
    /// [`PytreeError::LeafCountMismatch`] if `leaves` does not yield exactly
    /// [`Tree::leaf_count`] elements.
    pub fn unflatten_owned<I>(&self, leaves: I) -> Result<Tree<I::Item, A>, PytreeError>
    where
        I: IntoIterator,
        I::IntoIter: ExactSizeIterator,
    {
        let mut leaves = leaves.into_iter();
        let actual = leaves.len();
        let expected = self.check_leaf_count(actual)?;
        self.try_rebuild(0, &mut |_, _| {
            leaves
                .next()
                .ok_or(PytreeError::LeafCountMismatch { expected, actual })
        })
    }

    fn check_leaf_count(&self, actual: usize) -> Result<usize, PytreeError> {
        let expected = self.leaf_count();
        if expected != actual {
            return Err(PytreeError::LeafCountMismatch { expected, actual });
        }
        log::trace!("Unflattening {expected} leaves");

        Ok(expected)
    }
}

/// Decodes `spec` and rebuilds a tree whose leaves reference `leaves`.
pub fn unflatten_str<'a, T>(spec: &str, leaves: &'a [T]) -> Result<Tree<&'a T>, PytreeError> {
    TreeSpec::decode(spec)?.unflatten(leaves)
}

fn collect_leaves_mut<'a, L, A>(node: &'a mut Node<L, A>, leaves: &mut Vec<&'a mut L>) {
    match node {
        Node::Leaf(value) => leaves.push(value),
        Node::None => {}
        Node::List(children)
        | Node::Tuple(children)
        | Node::NamedTuple(children)
        | Node::Dict { children, .. }
        | Node::Custom { children, .. } => {
            for child in children.iter_mut() {
                collect_leaves_mut(child.node_mut(), leaves);
            }
        }
    }
}

fn collect_leaves<L, A>(node: Node<L, A>, leaves: &mut Vec<L>) {
    match node {
        Node::Leaf(value) => leaves.push(value),
        Node::None => {}
        Node::List(children)
        | Node::Tuple(children)
        | Node::NamedTuple(children)
        | Node::Dict { children, .. }
        | Node::Custom { children, .. } => {
            for child in children.into_vec() {
                collect_leaves(child.into_node(), leaves);
            }
        }
    }
}
