use alloc::vec;
use alloc::vec::Vec;

use crate::{FormatError, Key, Kind, PytreeError, Tree, TreeSpec};

#[test]
fn test_decode_list_of_two_leaves() {
    let spec = TreeSpec::decode("L2#1#1($,$)").unwrap();

    assert_eq!(spec.kind(), Kind::List);
    assert_eq!(spec.len(), 2);
    assert!(spec.child(0).unwrap().is_leaf());
    assert!(spec.child(1).unwrap().is_leaf());
    assert_eq!(spec.leaf_count(), 2);
    assert!(spec.has_fresh_leaf_count());
}

#[test]
fn test_decode_mixed_key_dict() {
    let spec = TreeSpec::decode("D2#1#1('a':$,1:$)").unwrap();

    assert_eq!(spec.kind(), Kind::Dict);
    assert_eq!(spec.keys(), &[Key::Str("a".into()), Key::Int(1)]);
    assert_eq!(spec.leaf_count(), 2);
}

#[test]
fn test_decode_every_container_kind() {
    let spec = TreeSpec::decode("T3#1#2#0($,N2#1#1($,$),L0())").unwrap();

    assert!(spec.is_tuple());
    assert!(spec.child(1).unwrap().is_named_tuple());
    assert!(spec.child(2).unwrap().is_list());
    assert!(spec.child(2).unwrap().is_empty());
    assert_eq!(spec.leaf_count(), 3);
}

#[test]
fn test_decode_custom_container() {
    let spec = TreeSpec::decode("C(Point)2#1#1($,$)").unwrap();

    assert!(spec.is_custom());
    assert_eq!(spec.custom_type(), "Point");
    assert_eq!(spec.len(), 2);
}

#[test]
fn test_decode_assigns_leaf_slots_in_order() {
    let spec = TreeSpec::decode("T2#2#1(D2#1#1(0:$,1:$),$)").unwrap();

    let mut slots = Vec::new();
    spec.traverse(&mut |node: &TreeSpec| {
        if let Some(leaf) = node.try_value() {
            slots.push(leaf.index());
        }
    });
    assert_eq!(slots, vec![0, 1, 2]);
}

#[test]
fn test_decode_keys_with_structural_characters() {
    let spec = TreeSpec::decode("D2#1#1('a,b':$,'(x):':$)").unwrap();

    assert_eq!(spec.keys(), &[Key::from("a,b"), Key::from("(x):")]);
}

#[test]
fn test_decode_unicode_key() {
    let spec = TreeSpec::decode("D1#1('poids_é':$)").unwrap();

    assert_eq!(spec.key(0).unwrap(), &Key::from("poids_é"));
}

#[test]
fn test_decode_from_str() {
    let spec: TreeSpec = "N1#1($)".parse().unwrap();

    assert_eq!(spec, Tree::named_tuple(vec![Tree::leaf(())]));
}

#[test]
fn test_decode_kind_without_child_count() {
    let err = TreeSpec::decode("L(").unwrap_err();

    assert!(matches!(err, PytreeError::Format { .. }));
}

#[test]
fn test_decode_missing_digit() {
    let err = TreeSpec::decode("L()").unwrap_err();

    assert_eq!(
        err,
        PytreeError::Format {
            position: 1,
            reason: FormatError::ExpectedDigit('('),
        }
    );
}

#[test]
fn test_decode_child_count_mismatch() {
    assert_eq!(
        TreeSpec::decode("L3#1#1#1($,$)").unwrap_err(),
        PytreeError::Format {
            position: 8,
            reason: FormatError::ChildCountMismatch {
                declared: 3,
                actual: 2,
            },
        }
    );
    assert_eq!(
        TreeSpec::decode("L0($)").unwrap_err(),
        PytreeError::Format {
            position: 2,
            reason: FormatError::ChildCountMismatch {
                declared: 0,
                actual: 1,
            },
        }
    );
}

#[test]
fn test_decode_annotation_count_mismatch() {
    assert_eq!(
        TreeSpec::decode("L2#1($,$)").unwrap_err(),
        PytreeError::Format {
            position: 1,
            reason: FormatError::AnnotationCountMismatch {
                declared: 2,
                annotations: 1,
            },
        }
    );
}

#[test]
fn test_decode_wrong_leaf_count_annotation() {
    // L2#1#2($,$)
    // 01234567890
    assert_eq!(
        TreeSpec::decode("L2#1#2($,$)").unwrap_err(),
        PytreeError::Format {
            position: 9,
            reason: FormatError::LeafCountMismatch {
                declared: 2,
                actual: 1,
            },
        }
    );
}

#[test]
fn test_decode_trailing_data() {
    assert_eq!(
        TreeSpec::decode("$$").unwrap_err(),
        PytreeError::Format {
            position: 1,
            reason: FormatError::TrailingData,
        }
    );
    assert_eq!(
        TreeSpec::decode("L1#1($x)").unwrap_err(),
        PytreeError::Format {
            position: 6,
            reason: FormatError::TrailingData,
        }
    );
}

#[test]
fn test_decode_unknown_kind() {
    assert_eq!(
        TreeSpec::decode("X0()").unwrap_err(),
        PytreeError::Format {
            position: 0,
            reason: FormatError::UnknownKind('X'),
        }
    );
}

#[test]
fn test_decode_empty_input() {
    assert_eq!(
        TreeSpec::decode("").unwrap_err(),
        PytreeError::Format {
            position: 0,
            reason: FormatError::UnexpectedEnd,
        }
    );
}

#[test]
fn test_decode_dict_key_without_separator() {
    // D1#1('a'$)
    // 0123456789
    assert_eq!(
        TreeSpec::decode("D1#1('a'$)").unwrap_err(),
        PytreeError::Format {
            position: 8,
            reason: FormatError::UnexpectedChar {
                expected: ':',
                found: '$',
            },
        }
    );
}

#[test]
fn test_decode_integer_key_overflow() {
    let err = TreeSpec::decode("D1#1(2147483648:$)").unwrap_err();

    assert_eq!(
        err,
        PytreeError::Format {
            position: 5,
            reason: FormatError::NumberOverflow,
        }
    );
    assert!(TreeSpec::decode("D1#1(2147483647:$)").is_ok());
}

#[test]
fn test_decode_child_count_overflow() {
    let err = TreeSpec::decode("L99999999999999999999999()").unwrap_err();

    assert_eq!(
        err,
        PytreeError::Format {
            position: 1,
            reason: FormatError::NumberOverflow,
        }
    );
}

#[test]
fn test_decode_invalid_custom_label() {
    assert_eq!(
        TreeSpec::decode("C()0()").unwrap_err(),
        PytreeError::Format {
            position: 2,
            reason: FormatError::InvalidCustomType,
        }
    );
    assert_eq!(
        TreeSpec::decode("C(a,b)0()").unwrap_err(),
        PytreeError::Format {
            position: 3,
            reason: FormatError::UnexpectedChar {
                expected: ')',
                found: ',',
            },
        }
    );
}
