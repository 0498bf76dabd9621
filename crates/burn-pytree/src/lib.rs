#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! # Burn Pytree
//!
//! Structure-only specs for nested containers of tensors.
//!
//! A [`Tree`] is a nest of lists, tuples, named tuples, dicts keyed by integers or strings and
//! custom containers, with leaves at the bottom. Flattening a tree separates it into the ordered
//! sequence of its leaves and a [`TreeSpec`] describing its shape, and unflattening puts the two
//! back together. Specs have a compact string encoding, so the shape of a model's inputs and
//! outputs can travel next to a flat array of tensors to a runtime that knows nothing about the
//! producer's object model.
//!
//! ```rust
//! use burn_pytree::{Key, Tree, TreeSpec};
//!
//! let weights = [0.5f32, 1.5, 2.5];
//! let tree = Tree::dict([
//!     ("encoder", Tree::list(vec![Tree::leaf(&weights[0]), Tree::leaf(&weights[1])])),
//!     ("head", Tree::leaf(&weights[2])),
//! ]);
//!
//! let (leaves, spec) = tree.flatten();
//! assert_eq!(leaves.len(), 3);
//!
//! let encoded = spec.encode().unwrap();
//! assert_eq!(encoded, "D2#2#1('encoder':L2#1#1($,$),'head':$)");
//!
//! let spec = TreeSpec::decode(&encoded).unwrap();
//! let rebuilt = spec.unflatten(&weights).unwrap();
//! assert_eq!(rebuilt, tree);
//! assert_eq!(**rebuilt.get(&Key::from("head")).unwrap().value(), 2.5);
//! ```
//!
//! The string grammar is documented in the [`spec`] module.

extern crate alloc;

mod error;
mod flatten;
mod key;
mod tree;

pub mod spec;

pub use error::{FormatError, PytreeError};
pub use flatten::{SpecLeaf, TreeSpec, unflatten_str};
pub use key::Key;
pub use spec::{DEFAULT_MAX_DEPTH, DecodeOptions, StrTreeSpec};
pub use tree::{Kind, Tree};

#[cfg(test)]
mod tests;
