use alloc::string::{String, ToString};
use alloc::vec;
use alloc::vec::Vec;

use super::{
    CHILDREN_DATA_SEP, CHILDREN_SEP, CUSTOM, DICT, DICT_KEY_VALUE_SEP, DICT_STR_KEY_QUOTE, LEAF,
    LIST, NAMED_TUPLE, NODE_DATA_BEGIN, NODE_DATA_END, TUPLE, is_valid_custom_type,
};
use crate::tree::Node;
use crate::{Key, Kind, PytreeError, Tree};

/// Pending output of the encoder, popped from the end.
enum Token<'a, L, A> {
    Node(&'a Tree<L, A>),
    Key(&'a Key),
    Separator,
    Close,
}

/// Encodes the structure of `tree`.
pub(crate) fn encode<L, A>(tree: &Tree<L, A>) -> Result<String, PytreeError> {
    let mut out = String::new();
    let mut pending = vec![Token::Node(tree)];
    while let Some(token) = pending.pop() {
        match token {
            Token::Node(node) => encode_node(node, &mut out, &mut pending)?,
            Token::Key(key) => {
                encode_key(key, &mut out)?;
                out.push(char::from(DICT_KEY_VALUE_SEP));
            }
            Token::Separator => out.push(char::from(CHILDREN_SEP)),
            Token::Close => out.push(char::from(NODE_DATA_END)),
        }
    }
    log::debug!(
        "Encoded tree spec of {} bytes with {} leaves",
        out.len(),
        tree.leaf_count()
    );

    Ok(out)
}

/// Writes the header of `tree` and schedules its block.
fn encode_node<'a, L, A>(
    tree: &'a Tree<L, A>,
    out: &mut String,
    pending: &mut Vec<Token<'a, L, A>>,
) -> Result<(), PytreeError> {
    let children = tree.children();
    match tree.node() {
        Node::Leaf(_) => {
            out.push(char::from(LEAF));
            return Ok(());
        }
        Node::None => return Err(PytreeError::UnencodableKind(Kind::None)),
        Node::List(_) => out.push(char::from(LIST)),
        Node::Tuple(_) => out.push(char::from(TUPLE)),
        Node::NamedTuple(_) => out.push(char::from(NAMED_TUPLE)),
        Node::Dict { .. } => out.push(char::from(DICT)),
        Node::Custom { type_name, .. } => {
            if !is_valid_custom_type(type_name) {
                return Err(PytreeError::InvalidCustomType(type_name.clone()));
            }
            out.push(char::from(CUSTOM));
            out.push(char::from(NODE_DATA_BEGIN));
            out.push_str(type_name);
            out.push(char::from(NODE_DATA_END));
        }
    }

    out.push_str(&children.len().to_string());
    for child in children {
        out.push(char::from(CHILDREN_DATA_SEP));
        out.push_str(&child.leaf_count().to_string());
    }
    out.push(char::from(NODE_DATA_BEGIN));

    let keys = match tree.node() {
        Node::Dict { keys, .. } => Some(keys),
        _ => None,
    };
    pending.push(Token::Close);
    for (index, child) in children.iter().enumerate().rev() {
        pending.push(Token::Node(child));
        if let Some(key) = keys.and_then(|keys| keys.get(index)) {
            pending.push(Token::Key(key));
        }
        if index > 0 {
            pending.push(Token::Separator);
        }
    }

    Ok(())
}

fn encode_key(key: &Key, out: &mut String) -> Result<(), PytreeError> {
    let invalid = |reason| PytreeError::InvalidKey {
        key: key.clone(),
        reason,
    };

    match key {
        Key::Int(value) if *value < 0 => {
            return Err(invalid("integer keys are written without a sign"));
        }
        Key::Int(value) => out.push_str(&value.to_string()),
        Key::Str(value) if value.contains(char::from(DICT_STR_KEY_QUOTE)) => {
            return Err(invalid("string keys cannot contain a quote"));
        }
        Key::Str(value) => {
            out.push(char::from(DICT_STR_KEY_QUOTE));
            out.push_str(value);
            out.push(char::from(DICT_STR_KEY_QUOTE));
        }
        Key::Absent => return Err(invalid("dict keys must be integers or strings")),
    }

    Ok(())
}
