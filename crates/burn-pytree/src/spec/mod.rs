//! # Tree spec string format
//!
//! A [`TreeSpec`] is written as a compact ASCII string that carries the structure of a tree and
//! never any leaf payload. Every container announces its child count and the leaf count of each
//! child up front, so a consumer can size its buffers before looking at the children.
//!
//! ```text
//! node   := '$'                                        leaf
//!         | kind count ('#' count)* '(' block ')'      container
//! kind   := 'L' | 'T' | 'N' | 'D' | 'C(' label ')'      list, tuple, named tuple, dict, custom
//! block  := ε | child (',' child)*
//! child  := node                                       for L, T, N and C
//!         | key ':' node                               for D
//! key    := '\'' text '\'' | digits                     string or integer key
//! count  := digits                                     unsigned decimal
//! ```
//!
//! | Spec                 | Tree                                      |
//! |----------------------|-------------------------------------------|
//! | `$`                  | a single leaf                             |
//! | `L2#1#1($,$)`        | list of two leaves                        |
//! | `T0()`               | empty tuple                               |
//! | `D2#1#1('a':$,1:$)`  | dict `{"a": leaf, 1: leaf}`               |
//! | `N2#2#1(T2#1#1($,$),$)` | named tuple holding a pair and a leaf  |
//! | `C(Point)2#1#1($,$)` | custom container labelled `Point`         |
//!
//! Quotes inside string keys are not escaped, so keys containing `'` cannot be encoded.
//! Integer keys are written without sign, so negative keys cannot be encoded either.
//!
//! Decoding runs in time linear in the string length: a single pre-parse pass links every
//! `(` and `,` to the next `,` or `)` of the same block and every quote to its partner, and
//! the decoder then jumps from child to child through that table. Decoding, encoding and
//! dropping keep their work on the heap, so they handle any depth the decoder accepts.
//! [`Tree::traverse`], flattening, unflattening, cloning and structural comparison recurse once
//! per nesting level and are safe up to [`DEFAULT_MAX_DEPTH`].

mod decoder;
mod encoder;
mod pre_parse;

use alloc::string::String;
use core::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{PytreeError, Tree, TreeSpec};

/// Encoded form of a [`TreeSpec`].
pub type StrTreeSpec = String;

pub(crate) const TUPLE: u8 = b'T';
pub(crate) const NAMED_TUPLE: u8 = b'N';
pub(crate) const LIST: u8 = b'L';
pub(crate) const DICT: u8 = b'D';
pub(crate) const CUSTOM: u8 = b'C';
pub(crate) const LEAF: u8 = b'$';
pub(crate) const NODE_DATA_BEGIN: u8 = b'(';
pub(crate) const NODE_DATA_END: u8 = b')';
pub(crate) const DICT_STR_KEY_QUOTE: u8 = b'\'';
pub(crate) const DICT_KEY_VALUE_SEP: u8 = b':';
pub(crate) const CHILDREN_SEP: u8 = b',';
pub(crate) const CHILDREN_DATA_SEP: u8 = b'#';

/// Default bound on the nesting depth accepted by the decoder.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Options of [`TreeSpec::decode_with_options`].
///
/// ```rust
/// use burn_pytree::{DecodeOptions, TreeSpec};
///
/// let options = DecodeOptions::new().with_max_depth(2);
/// assert!(TreeSpec::decode_with_options("L1#1(L1#1($))", &options).is_ok());
/// assert!(TreeSpec::decode_with_options("L1#1(L1#1(L1#1($)))", &options).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeOptions {
    /// Maximum number of nested children blocks, `None` for no limit.
    ///
    /// Decoding itself never recurses, but trees nested far beyond [`DEFAULT_MAX_DEPTH`] should
    /// not be traversed, flattened or cloned.
    pub max_depth: Option<usize>,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            max_depth: Some(DEFAULT_MAX_DEPTH),
        }
    }
}

impl DecodeOptions {
    /// Options with the default depth limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum nesting depth.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = Some(max_depth);
        self
    }

    /// Removes the nesting depth limit.
    pub fn without_depth_limit(mut self) -> Self {
        self.max_depth = None;
        self
    }
}

impl TreeSpec {
    /// Decodes a spec string with the default [`DecodeOptions`].
    ///
    /// # Errors
    ///
    /// [`PytreeError::Format`] if the string is malformed and
    /// [`PytreeError::DepthLimitExceeded`] if it nests too deeply. No partial tree is returned.
    pub fn decode(spec: &str) -> Result<Self, PytreeError> {
        Self::decode_with_options(spec, &DecodeOptions::default())
    }

    /// Decodes a spec string.
    pub fn decode_with_options(spec: &str, options: &DecodeOptions) -> Result<Self, PytreeError> {
        decoder::decode(spec, options)
    }
}

impl<L, A> Tree<L, A> {
    /// Encodes the structure of this tree. Leaf and auxiliary values are never read.
    ///
    /// # Errors
    ///
    /// - [`PytreeError::UnencodableKind`] if the tree contains an empty handle,
    /// - [`PytreeError::InvalidKey`] for absent keys, negative integer keys and string keys
    ///   containing a quote,
    /// - [`PytreeError::InvalidCustomType`] for custom labels that are empty or contain a
    ///   reserved character.
    pub fn encode(&self) -> Result<StrTreeSpec, PytreeError> {
        encoder::encode(self)
    }
}

/// Decoded nodes carry `A::default()` as auxiliary value.
impl<A: Default> FromStr for TreeSpec<A> {
    type Err = PytreeError;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        Ok(TreeSpec::<()>::decode(spec)?.map_aux(|()| A::default()))
    }
}

impl<A> Serialize for TreeSpec<A> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let encoded = self.encode().map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&encoded)
    }
}

impl<'de, A: Default> Deserialize<'de> for TreeSpec<A> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        encoded.parse().map_err(serde::de::Error::custom)
    }
}

/// Custom type labels are written verbatim between brackets.
pub(crate) fn is_valid_custom_type(label: &str) -> bool {
    const RESERVED: [char; 7] = ['(', ')', ',', '\'', '#', ':', '$'];

    !label.is_empty() && !label.contains(RESERVED)
}
