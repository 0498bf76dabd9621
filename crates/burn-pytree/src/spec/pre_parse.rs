use alloc::vec;
use alloc::vec::Vec;

use super::{
    CHILDREN_SEP, DICT_STR_KEY_QUOTE, DecodeOptions, NODE_DATA_BEGIN, NODE_DATA_END,
};
use crate::{FormatError, PytreeError};

const UNLINKED: usize = usize::MAX;

/// Links every structural delimiter of a spec string to its partner.
///
/// - `(` and `,` point to the next `,` or `)` of the same children block,
/// - an opening quote points to its closing quote and the other way around.
///
/// Every other position is unlinked.
#[derive(Debug)]
pub(crate) struct DelimiterTable {
    partners: Vec<usize>,
}

impl DelimiterTable {
    pub(crate) fn partner(&self, index: usize) -> Option<usize> {
        self.partners
            .get(index)
            .copied()
            .filter(|&partner| partner != UNLINKED)
    }
}

/// An open children block: where it starts and the last separator seen inside it.
struct Frame {
    open: usize,
    last_sep: usize,
}

/// Builds the [`DelimiterTable`] of `spec` in a single left to right pass.
pub(crate) fn pre_parse(
    spec: &[u8],
    options: &DecodeOptions,
) -> Result<DelimiterTable, PytreeError> {
    let mut partners = vec![UNLINKED; spec.len()];
    let mut stack: Vec<Frame> = Vec::new();
    let mut index = 0;

    while index < spec.len() {
        match spec[index] {
            NODE_DATA_BEGIN => {
                if let Some(limit) = options.max_depth.filter(|&limit| stack.len() >= limit) {
                    return Err(PytreeError::DepthLimitExceeded { limit });
                }
                stack.push(Frame {
                    open: index,
                    last_sep: index,
                });
            }
            CHILDREN_SEP => {
                let frame = stack.last_mut().ok_or_else(|| {
                    PytreeError::format(index, FormatError::SeparatorOutsideGroup)
                })?;
                partners[frame.last_sep] = index;
                frame.last_sep = index;
            }
            NODE_DATA_END => {
                let frame = stack
                    .pop()
                    .ok_or_else(|| PytreeError::format(index, FormatError::UnmatchedClose))?;
                partners[frame.last_sep] = index;
            }
            DICT_STR_KEY_QUOTE => {
                let open = index;
                let close = spec[open + 1..]
                    .iter()
                    .position(|&byte| byte == DICT_STR_KEY_QUOTE)
                    .map(|offset| open + 1 + offset)
                    .ok_or_else(|| PytreeError::format(open, FormatError::UnterminatedKey))?;
                partners[open] = close;
                partners[close] = open;
                index = close;
            }
            _ => {}
        }
        index += 1;
    }

    if let Some(frame) = stack.last() {
        return Err(PytreeError::format(frame.open, FormatError::UnclosedGroup));
    }

    Ok(DelimiterTable { partners })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(spec: &str) -> DelimiterTable {
        pre_parse(spec.as_bytes(), &DecodeOptions::default()).unwrap()
    }

    fn error(spec: &str) -> PytreeError {
        pre_parse(spec.as_bytes(), &DecodeOptions::default()).unwrap_err()
    }

    #[test]
    fn links_separators_within_a_block() {
        // L3#1#1#1($,$,$)
        // 0123456789012345
        let table = table("L3#1#1#1($,$,$)");
        assert_eq!(table.partner(8), Some(10));
        assert_eq!(table.partner(10), Some(12));
        assert_eq!(table.partner(12), Some(14));
        assert_eq!(table.partner(14), None);
        assert_eq!(table.partner(0), None);
    }

    #[test]
    fn nested_blocks_link_independently() {
        // L2#2#1(T2#1#1($,$),$)
        // 0         1         2
        // 0123456789012345678901
        let table = table("L2#2#1(T2#1#1($,$),$)");
        assert_eq!(table.partner(6), Some(18));
        assert_eq!(table.partner(18), Some(20));
        assert_eq!(table.partner(13), Some(15));
        assert_eq!(table.partner(15), Some(17));
    }

    #[test]
    fn empty_block_links_open_to_close() {
        let table = table("T0()");
        assert_eq!(table.partner(2), Some(3));
    }

    #[test]
    fn quotes_link_both_ways_and_hide_their_content() {
        // D1#1('a,(':$)
        // 0123456789012
        let table = table("D1#1('a,(':$)");
        assert_eq!(table.partner(5), Some(9));
        assert_eq!(table.partner(9), Some(5));
        assert_eq!(table.partner(4), Some(12));
        assert_eq!(table.partner(7), None);
    }

    #[test]
    fn reports_unbalanced_delimiters() {
        assert_eq!(
            error("L1#1($))"),
            PytreeError::format(7, FormatError::UnmatchedClose)
        );
        assert_eq!(
            error("L1#1($"),
            PytreeError::format(4, FormatError::UnclosedGroup)
        );
        assert_eq!(
            error("$,$"),
            PytreeError::format(1, FormatError::SeparatorOutsideGroup)
        );
        assert_eq!(
            error("D1#1('a:$)"),
            PytreeError::format(5, FormatError::UnterminatedKey)
        );
    }

    #[test]
    fn depth_limit_is_reported() {
        let options = DecodeOptions::new().with_max_depth(1);
        assert!(pre_parse(b"L1#1($)", &options).is_ok());
        assert_eq!(
            pre_parse(b"L1#1(L1#1($))", &options).unwrap_err(),
            PytreeError::DepthLimitExceeded { limit: 1 }
        );
    }

    #[test]
    fn unbounded_depth_uses_a_growing_stack() {
        let depth = 10_000;
        let mut spec = alloc::string::String::new();
        for _ in 0..depth {
            spec.push_str("L1#1(");
        }
        spec.push('$');
        for _ in 0..depth {
            spec.push(')');
        }

        let options = DecodeOptions::new().without_depth_limit();
        assert!(pre_parse(spec.as_bytes(), &options).is_ok());
    }
}
