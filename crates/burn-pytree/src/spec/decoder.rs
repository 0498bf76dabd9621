use alloc::string::String;
use alloc::vec::Vec;

use super::pre_parse::{DelimiterTable, pre_parse};
use super::{
    CHILDREN_DATA_SEP, CUSTOM, DICT, DICT_KEY_VALUE_SEP, DICT_STR_KEY_QUOTE, DecodeOptions, LEAF,
    LIST, NAMED_TUPLE, NODE_DATA_BEGIN, NODE_DATA_END, TUPLE, is_valid_custom_type,
};
use crate::tree::Node;
use crate::{FormatError, Key, PytreeError, SpecLeaf, Tree, TreeSpec};

/// Decodes a whole spec string into a [`TreeSpec`].
pub(crate) fn decode(spec: &str, options: &DecodeOptions) -> Result<TreeSpec, PytreeError> {
    let table = pre_parse(spec.as_bytes(), options)?;
    let mut decoder = Decoder {
        spec,
        bytes: spec.as_bytes(),
        table,
        next_leaf: 0,
    };

    let (tree, end) = decoder.decode_root()?;
    if end != spec.len() {
        return Err(PytreeError::format(end, FormatError::TrailingData));
    }
    log::debug!(
        "Decoded tree spec of {} bytes with {} leaves",
        spec.len(),
        tree.leaf_count()
    );

    Ok(tree)
}

enum Container {
    List,
    Tuple,
    NamedTuple,
    Dict,
    Custom(String),
}

/// A container whose header is read and whose children are still being decoded.
struct Partial {
    container: Container,
    /// Declared leaf count of every child.
    layout: Vec<usize>,
    /// Position of the `(` or `,` preceding every child.
    separators: Vec<usize>,
    keys: Vec<Key>,
    children: Vec<TreeSpec>,
    /// Start of the child being decoded.
    child_pos: usize,
    /// Position right after the closing `)`.
    end: usize,
}

impl Partial {
    fn is_complete(&self) -> bool {
        self.children.len() == self.layout.len()
    }

    fn finish(self) -> (TreeSpec, usize) {
        let leaf_count = self.layout.iter().sum();
        let children = self.children.into();
        let node = match self.container {
            Container::List => Node::List(children),
            Container::Tuple => Node::Tuple(children),
            Container::NamedTuple => Node::NamedTuple(children),
            Container::Dict => Node::Dict {
                keys: self.keys,
                children,
            },
            Container::Custom(type_name) => Node::Custom {
                type_name,
                children,
            },
        };

        (Tree::from_parts(node, leaf_count, ()), self.end)
    }
}

enum Step {
    Done(TreeSpec, usize),
    Open(Partial),
}

struct Decoder<'a> {
    spec: &'a str,
    bytes: &'a [u8],
    table: DelimiterTable,
    /// Slot handed to the next decoded leaf.
    next_leaf: usize,
}

impl Decoder<'_> {
    /// Decodes the node starting at offset zero, returning it with the position right after it.
    ///
    /// Open containers live on a heap stack, so nesting is bounded by the depth limit of the
    /// pre-parse pass and never by the call stack.
    fn decode_root(&mut self) -> Result<(TreeSpec, usize), PytreeError> {
        let mut stack: Vec<Partial> = Vec::new();
        let mut pos = 0;

        loop {
            let (mut tree, mut end) = match self.begin_node(pos)? {
                Step::Done(tree, end) => (tree, end),
                Step::Open(partial) if partial.is_complete() => partial.finish(),
                Step::Open(mut partial) => {
                    pos = self.begin_child(&mut partial)?;
                    stack.push(partial);
                    continue;
                }
            };

            loop {
                let Some(mut parent) = stack.pop() else {
                    return Ok((tree, end));
                };
                self.accept_child(&mut parent, tree, end)?;
                if parent.is_complete() {
                    (tree, end) = parent.finish();
                } else {
                    pos = self.begin_child(&mut parent)?;
                    stack.push(parent);
                    break;
                }
            }
        }
    }

    /// Reads a leaf, or the header and block layout of a container starting at `pos`.
    fn begin_node(&mut self, pos: usize) -> Result<Step, PytreeError> {
        let mut cursor = pos + 1;
        let container = match self.byte_at(pos)? {
            LEAF => {
                let leaf = SpecLeaf::new(self.next_leaf);
                self.next_leaf += 1;
                return Ok(Step::Done(Tree::leaf(leaf), cursor));
            }
            LIST => Container::List,
            TUPLE => Container::Tuple,
            NAMED_TUPLE => Container::NamedTuple,
            DICT => Container::Dict,
            CUSTOM => Container::Custom(self.read_custom_type(&mut cursor)?),
            _ => {
                return Err(PytreeError::format(
                    pos,
                    FormatError::UnknownKind(self.char_at(pos)),
                ));
            }
        };

        let layout = self.read_layout(&mut cursor)?;
        self.expect(cursor, NODE_DATA_BEGIN)?;
        let separators = self.block_separators(cursor, layout.len())?;
        let end = match separators.last() {
            Some(&separator) => self.partner(separator)? + 1,
            None => cursor + 2,
        };

        Ok(Step::Open(Partial {
            container,
            children: Vec::with_capacity(layout.len()),
            layout,
            separators,
            keys: Vec::new(),
            child_pos: cursor,
            end,
        }))
    }

    /// Reads the dict key of the next child, if any, and returns where the child starts.
    fn begin_child(&self, partial: &mut Partial) -> Result<usize, PytreeError> {
        let separator = partial.separators[partial.children.len()];
        let mut child_pos = separator + 1;
        if matches!(partial.container, Container::Dict) {
            partial.keys.push(self.read_key(&mut child_pos)?);
            self.expect(child_pos, DICT_KEY_VALUE_SEP)?;
            child_pos += 1;
        }
        partial.child_pos = child_pos;

        Ok(child_pos)
    }

    /// Checks a decoded child against its separator and its declared leaf count.
    fn accept_child(
        &self,
        partial: &mut Partial,
        child: TreeSpec,
        child_end: usize,
    ) -> Result<(), PytreeError> {
        let index = partial.children.len();
        let next = self.partner(partial.separators[index])?;
        if child_end != next {
            return Err(PytreeError::format(child_end, FormatError::TrailingData));
        }

        let declared = partial.layout[index];
        let actual = child.leaf_count();
        if actual != declared {
            return Err(PytreeError::format(
                partial.child_pos,
                FormatError::LeafCountMismatch { declared, actual },
            ));
        }
        partial.children.push(child);

        Ok(())
    }

    /// Reads `(<label>)` right after a custom kind marker.
    fn read_custom_type(&self, cursor: &mut usize) -> Result<String, PytreeError> {
        let open = *cursor;
        self.expect(open, NODE_DATA_BEGIN)?;
        let close = self.partner(open)?;
        self.expect(close, NODE_DATA_END)?;

        let label = self
            .spec
            .get(open + 1..close)
            .filter(|label| is_valid_custom_type(label))
            .ok_or_else(|| PytreeError::format(open + 1, FormatError::InvalidCustomType))?;
        *cursor = close + 1;

        Ok(label.into())
    }

    /// Reads the child count and the `#` leaf count annotation of every child.
    fn read_layout(&self, cursor: &mut usize) -> Result<Vec<usize>, PytreeError> {
        let start = *cursor;
        let declared = self.read_number(cursor)?;
        // The declared count is untrusted, every annotation takes at least two bytes.
        let mut layout = Vec::with_capacity(declared.min(self.bytes.len() / 2));
        while self.bytes.get(*cursor) == Some(&CHILDREN_DATA_SEP) {
            *cursor += 1;
            layout.push(self.read_number(cursor)?);
        }

        if layout.len() != declared {
            return Err(PytreeError::format(
                start,
                FormatError::AnnotationCountMismatch {
                    declared,
                    annotations: layout.len(),
                },
            ));
        }

        Ok(layout)
    }

    /// Positions of the `(` or `,` preceding each child of the block opened at `open`.
    fn block_separators(&self, open: usize, declared: usize) -> Result<Vec<usize>, PytreeError> {
        let mut separators = Vec::with_capacity(declared);
        let mut separator = open;
        loop {
            let next = self.partner(separator)?;
            let closes_block = self.byte_at(next)? == NODE_DATA_END;
            let empty_block = separator == open && next == open + 1 && closes_block;
            if !empty_block {
                separators.push(separator);
            }
            if closes_block {
                break;
            }
            separator = next;
        }

        if separators.len() != declared {
            return Err(PytreeError::format(
                open,
                FormatError::ChildCountMismatch {
                    declared,
                    actual: separators.len(),
                },
            ));
        }

        Ok(separators)
    }

    fn read_key(&self, cursor: &mut usize) -> Result<Key, PytreeError> {
        let start = *cursor;
        if self.byte_at(start)? == DICT_STR_KEY_QUOTE {
            let close = self.partner(start)?;
            let key = self
                .spec
                .get(start + 1..close)
                .ok_or_else(|| PytreeError::format(start, FormatError::UnterminatedKey))?;
            *cursor = close + 1;
            return Ok(Key::Str(key.into()));
        }

        let value = self.read_number(cursor)?;
        i32::try_from(value)
            .map(Key::Int)
            .map_err(|_| PytreeError::format(start, FormatError::NumberOverflow))
    }

    /// Reads an unsigned decimal number, leaving the cursor on the first non digit.
    fn read_number(&self, cursor: &mut usize) -> Result<usize, PytreeError> {
        let start = *cursor;
        if !self.byte_at(start)?.is_ascii_digit() {
            return Err(PytreeError::format(
                start,
                FormatError::ExpectedDigit(self.char_at(start)),
            ));
        }

        let mut value: usize = 0;
        while let Some(digit) = self.bytes.get(*cursor).copied().filter(u8::is_ascii_digit) {
            value = value
                .checked_mul(10)
                .and_then(|value| value.checked_add(usize::from(digit - b'0')))
                .ok_or_else(|| PytreeError::format(start, FormatError::NumberOverflow))?;
            *cursor += 1;
        }

        Ok(value)
    }

    fn expect(&self, pos: usize, expected: u8) -> Result<(), PytreeError> {
        let found = self.byte_at(pos)?;
        if found != expected {
            return Err(PytreeError::format(
                pos,
                FormatError::UnexpectedChar {
                    expected: char::from(expected),
                    found: self.char_at(pos),
                },
            ));
        }
        Ok(())
    }

    fn partner(&self, pos: usize) -> Result<usize, PytreeError> {
        self.table
            .partner(pos)
            .ok_or_else(|| PytreeError::format(pos, FormatError::UnclosedGroup))
    }

    fn byte_at(&self, pos: usize) -> Result<u8, PytreeError> {
        self.bytes
            .get(pos)
            .copied()
            .ok_or_else(|| PytreeError::format(pos, FormatError::UnexpectedEnd))
    }

    fn char_at(&self, pos: usize) -> char {
        self.spec
            .get(pos..)
            .and_then(|rest| rest.chars().next())
            .unwrap_or(char::REPLACEMENT_CHARACTER)
    }
}
