use alloc::string::String;
use alloc::vec::Vec;
use core::convert::Infallible;
use core::mem;
use core::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::{Key, PytreeError};

/// The structural tag of a tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Kind {
    /// Ordered sequence, encoded as `L`.
    List,
    /// Ordered tuple, encoded as `T`.
    Tuple,
    /// Tuple with named fields, encoded as `N`. Field names are not part of the spec.
    NamedTuple,
    /// Mapping with integer or string keys, encoded as `D`.
    Dict,
    /// Terminal node holding one leaf, encoded as `$`.
    Leaf,
    /// Container with a user supplied type label, encoded as `C(<label>)`.
    Custom,
    /// Empty handle. Left behind by [`Tree::take`], never produced by decoding.
    None,
}

/// Children of a container node.
///
/// Dropping releases the subtree with an explicit work list instead of recursion, so trees
/// nested deeper than the call stack can hold are still freed.
#[derive(Debug, Clone)]
pub(crate) struct Children<L, A>(Vec<Tree<L, A>>);

impl<L, A> Children<L, A> {
    pub(crate) fn into_vec(mut self) -> Vec<Tree<L, A>> {
        mem::take(&mut self.0)
    }
}

impl<L, A> From<Vec<Tree<L, A>>> for Children<L, A> {
    fn from(children: Vec<Tree<L, A>>) -> Self {
        Self(children)
    }
}

impl<L, A> Deref for Children<L, A> {
    type Target = Vec<Tree<L, A>>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<L, A> DerefMut for Children<L, A> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<L, A> Drop for Children<L, A> {
    fn drop(&mut self) {
        let mut pending = mem::take(&mut self.0);
        while let Some(mut tree) = pending.pop() {
            if let Some(children) = tree.children_vec_mut() {
                pending.append(children);
            }
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Node<L, A = ()> {
    List(Children<L, A>),
    Tuple(Children<L, A>),
    NamedTuple(Children<L, A>),
    Dict {
        keys: Vec<Key>,
        children: Children<L, A>,
    },
    Custom {
        type_name: String,
        children: Children<L, A>,
    },
    Leaf(L),
    None,
}

impl<L, A> Node<L, A> {
    fn kind(&self) -> Kind {
        match self {
            Node::List(_) => Kind::List,
            Node::Tuple(_) => Kind::Tuple,
            Node::NamedTuple(_) => Kind::NamedTuple,
            Node::Dict { .. } => Kind::Dict,
            Node::Custom { .. } => Kind::Custom,
            Node::Leaf(_) => Kind::Leaf,
            Node::None => Kind::None,
        }
    }
}

/// An owned tree of containers whose leaves are of type `L`.
///
/// Each `Tree` exclusively owns its children; dropping it drops the whole subtree. The leaf
/// type decides what the tree holds at its leaves:
///
/// - `&T` or `&mut T` for references into a leaf array owned by the caller, as produced by
///   [`TreeSpec::unflatten`](crate::TreeSpec::unflatten),
/// - [`SpecLeaf`](crate::SpecLeaf) for structure-only spec trees,
/// - any owned value when the caller hands its leaves over.
///
/// Every node also carries an auxiliary value of type `A`, `()` unless the caller opts in
/// with [`Tree::map_aux`]. Auxiliary values travel through cloning, flattening, unflattening
/// and [`Tree::map`], and are ignored by structural equality and encoding.
///
/// Every node caches the number of leaves in its subtree. Constructors fill the cache, mutable
/// accessors mark it stale, and [`Tree::leaf_count`] recomputes a stale value on the fly, so a
/// stale count is never observed.
#[derive(Debug, Clone)]
pub struct Tree<L, A = ()> {
    node: Node<L, A>,
    leaf_count: Option<usize>,
    aux: A,
}

impl<L, A: Default> Default for Tree<L, A> {
    fn default() -> Self {
        Self::from_parts(Node::None, 0, A::default())
    }
}

impl<L> Tree<L> {
    /// Creates a leaf node.
    pub fn leaf(value: L) -> Self {
        Self::from_parts(Node::Leaf(value), 1, ())
    }

    /// Creates a list node owning `children`.
    pub fn list(children: Vec<Tree<L>>) -> Self {
        Self::container(Node::List(children.into()))
    }

    /// Creates a tuple node owning `children`.
    pub fn tuple(children: Vec<Tree<L>>) -> Self {
        Self::container(Node::Tuple(children.into()))
    }

    /// Creates a named tuple node owning `children`.
    pub fn named_tuple(children: Vec<Tree<L>>) -> Self {
        Self::container(Node::NamedTuple(children.into()))
    }

    /// Creates a dict node from `(key, child)` entries, keeping their order.
    ///
    /// Keys are not deduplicated; lookups return the first matching entry.
    pub fn dict<K, I>(entries: I) -> Self
    where
        K: Into<Key>,
        I: IntoIterator<Item = (K, Tree<L>)>,
    {
        let (keys, children): (Vec<Key>, Vec<Tree<L>>) = entries
            .into_iter()
            .map(|(key, child)| (key.into(), child))
            .unzip();
        Self::container(Node::Dict {
            keys,
            children: children.into(),
        })
    }

    /// Creates a custom container node labelled with `type_name`.
    pub fn custom(type_name: impl Into<String>, children: Vec<Tree<L>>) -> Self {
        Self::container(Node::Custom {
            type_name: type_name.into(),
            children: children.into(),
        })
    }

    /// Creates an empty handle of kind [`Kind::None`].
    pub fn none() -> Self {
        Self::default()
    }

    fn container(node: Node<L>) -> Self {
        let leaf_count = sum_leaf_counts(node_children(&node));
        Self::from_parts(node, leaf_count, ())
    }
}

impl<L, A: Default> Tree<L, A> {
    /// Moves the node out of this handle, leaving an empty [`Kind::None`] handle behind.
    pub fn take(&mut self) -> Self {
        mem::take(self)
    }
}

impl<L, A> Tree<L, A> {
    pub(crate) fn from_parts(node: Node<L, A>, leaf_count: usize, aux: A) -> Self {
        Self {
            node,
            leaf_count: Some(leaf_count),
            aux,
        }
    }

    /// The kind of this node.
    pub fn kind(&self) -> Kind {
        self.node.kind()
    }

    /// Returns true for leaf nodes.
    pub fn is_leaf(&self) -> bool {
        matches!(self.node, Node::Leaf(_))
    }

    /// Returns true for list nodes.
    pub fn is_list(&self) -> bool {
        matches!(self.node, Node::List(_))
    }

    /// Returns true for tuple nodes.
    pub fn is_tuple(&self) -> bool {
        matches!(self.node, Node::Tuple(_))
    }

    /// Returns true for named tuple nodes.
    pub fn is_named_tuple(&self) -> bool {
        matches!(self.node, Node::NamedTuple(_))
    }

    /// Returns true for dict nodes.
    pub fn is_dict(&self) -> bool {
        matches!(self.node, Node::Dict { .. })
    }

    /// Returns true for custom nodes.
    pub fn is_custom(&self) -> bool {
        matches!(self.node, Node::Custom { .. })
    }

    /// Returns true for empty handles.
    pub fn is_none(&self) -> bool {
        matches!(self.node, Node::None)
    }

    /// Number of direct children. Zero for leaves and empty handles.
    pub fn len(&self) -> usize {
        self.children().len()
    }

    /// Returns true if the node has no children.
    pub fn is_empty(&self) -> bool {
        self.children().is_empty()
    }

    /// The direct children, in order. Empty for leaves and empty handles.
    pub fn children(&self) -> &[Tree<L, A>] {
        node_children(&self.node)
    }

    /// The direct children, mutably. Marks the cached leaf count stale.
    pub fn children_mut(&mut self) -> &mut [Tree<L, A>] {
        self.leaf_count = None;
        match self.children_vec_mut() {
            Some(children) => children.as_mut_slice(),
            None => &mut [],
        }
    }

    fn children_vec_mut(&mut self) -> Option<&mut Vec<Tree<L, A>>> {
        match &mut self.node {
            Node::List(children)
            | Node::Tuple(children)
            | Node::NamedTuple(children)
            | Node::Dict { children, .. }
            | Node::Custom { children, .. } => Some(&mut children.0),
            Node::Leaf(_) | Node::None => None,
        }
    }

    /// Returns the child at `index`.
    pub fn child(&self, index: usize) -> Result<&Tree<L, A>, PytreeError> {
        let children = self.children();
        children.get(index).ok_or(PytreeError::IndexOutOfRange {
            index,
            len: children.len(),
        })
    }

    /// Returns the child at `index` mutably. Marks the cached leaf count stale.
    pub fn child_mut(&mut self, index: usize) -> Result<&mut Tree<L, A>, PytreeError> {
        let children = self.children_mut();
        let len = children.len();
        children
            .get_mut(index)
            .ok_or(PytreeError::IndexOutOfRange { index, len })
    }

    /// Appends a child to a list, tuple, named tuple or custom node.
    ///
    /// # Panics
    ///
    /// If the node is a dict, a leaf or an empty handle.
    #[track_caller]
    pub fn push(&mut self, child: Tree<L, A>) {
        let added = child.leaf_count();
        match &mut self.node {
            Node::List(children)
            | Node::Tuple(children)
            | Node::NamedTuple(children)
            | Node::Custom { children, .. } => children.push(child),
            other => invalid_access("sequence or custom", other.kind()),
        }
        self.leaf_count = self.leaf_count.map(|count| count + added);
    }

    /// Appends an entry to a dict node. Existing entries with the same key are kept.
    ///
    /// # Panics
    ///
    /// If the node is not a dict.
    #[track_caller]
    pub fn insert(&mut self, key: impl Into<Key>, child: Tree<L, A>) {
        let added = child.leaf_count();
        match &mut self.node {
            Node::Dict { keys, children } => {
                keys.push(key.into());
                children.push(child);
            }
            other => invalid_access("dict", other.kind()),
        }
        self.leaf_count = self.leaf_count.map(|count| count + added);
    }

    /// The keys of a dict node, aligned with [`Tree::children`].
    ///
    /// # Panics
    ///
    /// If the node is not a dict.
    #[track_caller]
    pub fn keys(&self) -> &[Key] {
        match &self.node {
            Node::Dict { keys, .. } => keys,
            other => invalid_access("dict", other.kind()),
        }
    }

    /// Returns the key of the dict child at `index`.
    ///
    /// # Panics
    ///
    /// If the node is not a dict.
    #[track_caller]
    pub fn key(&self, index: usize) -> Result<&Key, PytreeError> {
        let keys = self.keys();
        keys.get(index).ok_or(PytreeError::IndexOutOfRange {
            index,
            len: keys.len(),
        })
    }

    /// Returns the key of the dict child at `index` mutably.
    ///
    /// # Panics
    ///
    /// If the node is not a dict.
    #[track_caller]
    pub fn key_mut(&mut self, index: usize) -> Result<&mut Key, PytreeError> {
        match &mut self.node {
            Node::Dict { keys, .. } => {
                let len = keys.len();
                keys.get_mut(index)
                    .ok_or(PytreeError::IndexOutOfRange { index, len })
            }
            other => invalid_access("dict", other.kind()),
        }
    }

    /// Iterates over the `(key, child)` entries of a dict node.
    ///
    /// # Panics
    ///
    /// If the node is not a dict.
    #[track_caller]
    pub fn entries(&self) -> impl Iterator<Item = (&Key, &Tree<L, A>)> {
        self.keys().iter().zip(self.children())
    }

    /// Returns true if the dict holds an entry for `key`.
    ///
    /// # Panics
    ///
    /// If the node is not a dict.
    #[track_caller]
    pub fn contains_key(&self, key: &Key) -> bool {
        self.keys().contains(key)
    }

    /// Returns the child of the first dict entry matching `key`.
    ///
    /// # Panics
    ///
    /// If the node is not a dict.
    #[track_caller]
    pub fn get(&self, key: &Key) -> Result<&Tree<L, A>, PytreeError> {
        self.entries()
            .find(|(candidate, _)| *candidate == key)
            .map(|(_, child)| child)
            .ok_or_else(|| PytreeError::KeyNotFound(key.clone()))
    }

    /// Returns the child of the first dict entry matching `key` mutably. Marks the cached
    /// leaf count stale.
    ///
    /// # Panics
    ///
    /// If the node is not a dict.
    #[track_caller]
    pub fn get_mut(&mut self, key: &Key) -> Result<&mut Tree<L, A>, PytreeError> {
        let index = self
            .keys()
            .iter()
            .position(|candidate| candidate == key)
            .ok_or_else(|| PytreeError::KeyNotFound(key.clone()))?;
        self.child_mut(index)
    }

    /// The type label of a custom node.
    ///
    /// # Panics
    ///
    /// If the node is not a custom node.
    #[track_caller]
    pub fn custom_type(&self) -> &str {
        match &self.node {
            Node::Custom { type_name, .. } => type_name,
            other => invalid_access("custom", other.kind()),
        }
    }

    /// The type label of a custom node, or `None` for any other kind.
    pub fn try_custom_type(&self) -> Option<&str> {
        match &self.node {
            Node::Custom { type_name, .. } => Some(type_name),
            _ => None,
        }
    }

    /// The value held by a leaf node.
    ///
    /// # Panics
    ///
    /// If the node is not a leaf.
    #[track_caller]
    pub fn value(&self) -> &L {
        match &self.node {
            Node::Leaf(value) => value,
            other => invalid_access("leaf", other.kind()),
        }
    }

    /// The value held by a leaf node, mutably.
    ///
    /// # Panics
    ///
    /// If the node is not a leaf.
    #[track_caller]
    pub fn value_mut(&mut self) -> &mut L {
        match &mut self.node {
            Node::Leaf(value) => value,
            other => invalid_access("leaf", other.kind()),
        }
    }

    /// Replaces the value of a leaf node, returning the previous one.
    ///
    /// # Panics
    ///
    /// If the node is not a leaf.
    #[track_caller]
    pub fn set_value(&mut self, value: L) -> L {
        mem::replace(self.value_mut(), value)
    }

    /// The value held by a leaf node, or `None` for any other kind.
    pub fn try_value(&self) -> Option<&L> {
        match &self.node {
            Node::Leaf(value) => Some(value),
            _ => None,
        }
    }

    /// The value held by a leaf node mutably, or `None` for any other kind.
    pub fn try_value_mut(&mut self) -> Option<&mut L> {
        match &mut self.node {
            Node::Leaf(value) => Some(value),
            _ => None,
        }
    }

    /// The auxiliary value attached to this node.
    pub fn aux(&self) -> &A {
        &self.aux
    }

    /// The auxiliary value attached to this node, mutably. Leaf counts stay fresh.
    pub fn aux_mut(&mut self) -> &mut A {
        &mut self.aux
    }

    /// Replaces the auxiliary value of this node, returning the previous one.
    pub fn set_aux(&mut self, aux: A) -> A {
        mem::replace(&mut self.aux, aux)
    }

    /// Number of leaves in this subtree.
    ///
    /// Returns the cached count when it is fresh and recomputes it otherwise.
    pub fn leaf_count(&self) -> usize {
        match self.leaf_count {
            Some(count) => count,
            None => self.count_from_children(),
        }
    }

    /// Returns true if the cached leaf count can be used without recomputation.
    pub fn has_fresh_leaf_count(&self) -> bool {
        self.leaf_count.is_some()
    }

    /// Recomputes and caches the leaf count of every node in this subtree.
    pub fn refresh_leaf_count(&mut self) -> usize {
        let count = match self.node {
            Node::Leaf(_) => 1,
            Node::None => 0,
            _ => self
                .children_vec_mut()
                .map(|children| children.iter_mut().map(Tree::refresh_leaf_count).sum::<usize>())
                .unwrap_or_default(),
        };
        self.leaf_count = Some(count);
        count
    }

    fn count_from_children(&self) -> usize {
        match &self.node {
            Node::Leaf(_) => 1,
            _ => sum_leaf_counts(self.children()),
        }
    }

    /// Visits every node in postorder: all children, left to right, before their parent.
    pub fn traverse<'a, F>(&'a self, func: &mut F)
    where
        F: FnMut(&'a Tree<L, A>),
    {
        for child in self.children() {
            child.traverse(func);
        }
        func(self);
    }

    /// Visits every node mutably in postorder.
    ///
    /// The visitor may restructure the node it is given. Leaf counts are recomputed on the way
    /// up, so every visited node has a fresh count afterwards.
    pub fn traverse_mut<F>(&mut self, func: &mut F)
    where
        F: FnMut(&mut Tree<L, A>),
    {
        if let Some(children) = self.children_vec_mut() {
            for child in children.iter_mut() {
                child.traverse_mut(func);
            }
        }
        func(self);
        self.leaf_count = Some(self.count_from_children());
    }

    /// Compares the structure of two trees, ignoring leaf and auxiliary values.
    ///
    /// Kinds must match, children are compared pairwise, dict keys are compared by position
    /// and custom type labels must be equal. Two dicts holding the same entries in a different
    /// order are not structurally equal.
    pub fn structurally_eq<M, B>(&self, other: &Tree<M, B>) -> bool {
        match (&self.node, &other.node) {
            (Node::Leaf(_), Node::Leaf(_)) | (Node::None, Node::None) => return true,
            (Node::Dict { keys: lhs, .. }, Node::Dict { keys: rhs, .. }) if lhs != rhs => {
                return false;
            }
            (
                Node::Custom { type_name: lhs, .. },
                Node::Custom { type_name: rhs, .. },
            ) if lhs != rhs => return false,
            _ => {}
        }

        self.kind() == other.kind()
            && self.len() == other.len()
            && self
                .children()
                .iter()
                .zip(other.children())
                .all(|(lhs, rhs)| lhs.structurally_eq(rhs))
    }

    /// Builds a tree of the same shape whose leaves are `func` applied to the current ones.
    pub fn map<U, F>(self, mut func: F) -> Tree<U, A>
    where
        F: FnMut(L) -> U,
    {
        self.map_parts(&mut func, &mut |aux| aux)
    }

    /// Builds a tree of the same shape whose auxiliary values are `func` applied to the
    /// current ones, visiting nodes in preorder.
    ///
    /// ```rust
    /// use burn_pytree::Tree;
    ///
    /// let tree = Tree::list(vec![Tree::leaf(1.0f32)]).map_aux(|()| "layer");
    /// assert_eq!(*tree.child(0).unwrap().aux(), "layer");
    /// ```
    pub fn map_aux<B, F>(self, mut func: F) -> Tree<L, B>
    where
        F: FnMut(A) -> B,
    {
        self.map_parts(&mut |value| value, &mut func)
    }

    fn map_parts<U, B, F, G>(self, func: &mut F, aux_func: &mut G) -> Tree<U, B>
    where
        F: FnMut(L) -> U,
        G: FnMut(A) -> B,
    {
        let map_children =
            |children: Children<L, A>, func: &mut F, aux_func: &mut G| -> Children<U, B> {
                children
                    .into_vec()
                    .into_iter()
                    .map(|child| child.map_parts(func, aux_func))
                    .collect::<Vec<_>>()
                    .into()
            };

        let Tree { node, aux, .. } = self;
        let aux = aux_func(aux);
        let node = match node {
            Node::Leaf(value) => return Tree::from_parts(Node::Leaf(func(value)), 1, aux),
            Node::None => Node::None,
            Node::List(children) => Node::List(map_children(children, func, aux_func)),
            Node::Tuple(children) => Node::Tuple(map_children(children, func, aux_func)),
            Node::NamedTuple(children) => {
                Node::NamedTuple(map_children(children, func, aux_func))
            }
            Node::Dict { keys, children } => Node::Dict {
                keys,
                children: map_children(children, func, aux_func),
            },
            Node::Custom {
                type_name,
                children,
            } => Node::Custom {
                type_name,
                children: map_children(children, func, aux_func),
            },
        };
        let leaf_count = sum_leaf_counts(node_children(&node));
        Tree::from_parts(node, leaf_count, aux)
    }

    /// Clones the shape and auxiliary values of this tree, producing each leaf with `func`.
    ///
    /// `func` receives the current leaf and its offset in flatten order. The offset is threaded
    /// through the children and advances by each rebuilt child's leaf count.
    pub(crate) fn try_rebuild<U, E, F>(
        &self,
        offset: usize,
        func: &mut F,
    ) -> Result<Tree<U, A>, E>
    where
        A: Clone,
        F: FnMut(&L, usize) -> Result<U, E>,
    {
        let rebuild_children =
            |children: &[Tree<L, A>], func: &mut F| -> Result<(Children<U, A>, usize), E> {
                let mut rebuilt = Vec::with_capacity(children.len());
                let mut leaves_offset = 0;
                for child in children {
                    let child = child.try_rebuild(offset + leaves_offset, func)?;
                    leaves_offset += child.leaf_count();
                    rebuilt.push(child);
                }
                Ok((rebuilt.into(), leaves_offset))
            };

        let aux = self.aux.clone();
        let (node, leaf_count) = match &self.node {
            Node::Leaf(value) => {
                return Ok(Tree::from_parts(Node::Leaf(func(value, offset)?), 1, aux));
            }
            Node::None => (Node::None, 0),
            Node::List(children) => {
                let (children, count) = rebuild_children(children.as_slice(), func)?;
                (Node::List(children), count)
            }
            Node::Tuple(children) => {
                let (children, count) = rebuild_children(children.as_slice(), func)?;
                (Node::Tuple(children), count)
            }
            Node::NamedTuple(children) => {
                let (children, count) = rebuild_children(children.as_slice(), func)?;
                (Node::NamedTuple(children), count)
            }
            Node::Dict { keys, children } => {
                let (children, count) = rebuild_children(children.as_slice(), func)?;
                let keys = keys.clone();
                (Node::Dict { keys, children }, count)
            }
            Node::Custom {
                type_name,
                children,
            } => {
                let (children, count) = rebuild_children(children.as_slice(), func)?;
                let type_name = type_name.clone();
                (
                    Node::Custom {
                        type_name,
                        children,
                    },
                    count,
                )
            }
        };
        Ok(Tree::from_parts(node, leaf_count, aux))
    }

    /// Clones the shape and auxiliary values of this tree, producing each leaf with `func`.
    pub(crate) fn rebuild<U, F>(&self, func: &mut F) -> Tree<U, A>
    where
        A: Clone,
        F: FnMut(&L, usize) -> U,
    {
        match self.try_rebuild(0, &mut |value, offset| Ok::<_, Infallible>(func(value, offset))) {
            Ok(tree) => tree,
            Err(never) => match never {},
        }
    }

    pub(crate) fn node(&self) -> &Node<L, A> {
        &self.node
    }

    /// Leaves the cached leaf count untouched, callers may only rewrite leaf values.
    pub(crate) fn node_mut(&mut self) -> &mut Node<L, A> {
        &mut self.node
    }

    pub(crate) fn into_node(self) -> Node<L, A> {
        self.node
    }
}

impl<L, A, M, B> PartialEq<Tree<M, B>> for Tree<L, A> {
    fn eq(&self, other: &Tree<M, B>) -> bool {
        self.structurally_eq(other)
    }
}

impl<L, A> Eq for Tree<L, A> {}

#[track_caller]
fn invalid_access(expected: &str, found: Kind) -> ! {
    panic!("Invalid tree access: expected a {expected} node, found {found:?}")
}

fn node_children<L, A>(node: &Node<L, A>) -> &[Tree<L, A>] {
    match node {
        Node::List(children)
        | Node::Tuple(children)
        | Node::NamedTuple(children)
        | Node::Dict { children, .. }
        | Node::Custom { children, .. } => children.as_slice(),
        Node::Leaf(_) | Node::None => &[],
    }
}

fn sum_leaf_counts<L, A>(children: &[Tree<L, A>]) -> usize {
    children.iter().map(Tree::leaf_count).sum()
}
