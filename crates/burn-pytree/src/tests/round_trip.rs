use alloc::format;
use alloc::vec;
use alloc::vec::Vec;

use rstest::rstest;

use crate::{Key, Tree, TreeSpec};

fn leaf() -> Tree<()> {
    Tree::leaf(())
}

#[rstest]
#[case::single_leaf(leaf(), "$")]
#[case::list(Tree::list(vec![leaf(), leaf()]), "L2#1#1($,$)")]
#[case::empty_tuple(Tree::tuple(vec![]), "T0()")]
#[case::named_tuple(Tree::named_tuple(vec![leaf()]), "N1#1($)")]
#[case::mixed_key_dict(
    Tree::dict([(Key::from("a"), leaf()), (Key::from(1), leaf())]),
    "D2#1#1('a':$,1:$)"
)]
#[case::empty_dict(Tree::dict::<Key, _>([]), "D0()")]
#[case::custom(Tree::custom("Point", vec![leaf(), leaf()]), "C(Point)2#1#1($,$)")]
#[case::nested(
    Tree::tuple(vec![
        Tree::list(vec![leaf(), Tree::list(vec![])]),
        Tree::dict([("x", Tree::named_tuple(vec![leaf(), leaf()]))]),
    ]),
    "T2#1#2(L2#1#0($,L0()),D1#2('x':N2#1#1($,$)))"
)]
fn test_encode_known_shapes(#[case] tree: Tree<()>, #[case] expected: &str) {
    let encoded = tree.encode().unwrap();
    assert_eq!(encoded, expected);

    let decoded = TreeSpec::decode(&encoded).unwrap();
    assert_eq!(decoded, tree);
    assert_eq!(decoded.leaf_count(), tree.leaf_count());
    assert_eq!(decoded.encode().unwrap(), expected);
}

#[rstest]
#[case::leaf("$")]
#[case::list("L2#1#1($,$)")]
#[case::dict_in_list("L2#2#0(D2#1#1(0:$,'k':$),T0())")]
#[case::custom_in_dict("D1#3('model':C(torch.nn.Linear)2#1#2($,T2#1#1($,$)))")]
#[case::deep("L1#1(L1#1(L1#1(L1#1(N1#1($)))))")]
fn test_decode_then_encode_is_identity(#[case] spec: &str) {
    let decoded = TreeSpec::decode(spec).unwrap();

    assert_eq!(decoded.encode().unwrap(), spec);
}

#[test]
fn test_dict_order_is_significant() {
    let ab = TreeSpec::decode("D2#1#1('a':$,'b':$)").unwrap();
    let ba = TreeSpec::decode("D2#1#1('b':$,'a':$)").unwrap();

    assert_ne!(ab, ba);
    assert_ne!(ab.encode().unwrap(), ba.encode().unwrap());
}

#[test]
fn test_integer_and_string_keys_are_distinct() {
    let spec = TreeSpec::decode("D2#1#1(1:$,'1':$)").unwrap();

    assert_eq!(spec.keys(), &[Key::Int(1), Key::Str("1".into())]);
    assert_eq!(spec.encode().unwrap(), "D2#1#1(1:$,'1':$)");
}

#[test]
fn test_custom_labels_must_match() {
    let point = TreeSpec::decode("C(Point)1#1($)").unwrap();
    let pair = TreeSpec::decode("C(Pair)1#1($)").unwrap();

    assert_ne!(point, pair);
}

/// Small deterministic generator so shapes vary without pulling in a randomness crate.
struct ShapeGenerator {
    state: u64,
}

impl ShapeGenerator {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next(&mut self, bound: u64) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.state >> 33) % bound
    }

    fn tree(&mut self, depth: usize) -> Tree<u32> {
        if depth == 0 {
            return Tree::leaf(self.next(1000) as u32);
        }

        let width = self.next(4) as usize;
        let mut children = Vec::with_capacity(width);
        for _ in 0..width {
            children.push(self.tree(depth - 1));
        }

        match self.next(6) {
            0 => Tree::leaf(self.next(1000) as u32),
            1 => Tree::list(children),
            2 => Tree::tuple(children),
            3 => Tree::named_tuple(children),
            4 => Tree::custom("Module", children),
            _ => {
                let mut dict = Tree::dict::<Key, _>([]);
                for (index, child) in children.into_iter().enumerate() {
                    if index % 2 == 0 {
                        dict.insert(index as i32, child);
                    } else {
                        dict.insert(format!("key_{index}"), child);
                    }
                }
                dict
            }
        }
    }
}

#[test]
fn test_generated_shapes_round_trip() {
    let mut generator = ShapeGenerator::new(42);

    for _ in 0..200 {
        let tree = generator.tree(4);
        let (leaves, spec) = tree.flatten();

        let encoded = spec.encode().unwrap();
        let decoded = TreeSpec::decode(&encoded).unwrap();
        assert_eq!(decoded, tree, "shape changed through {encoded}");
        assert_eq!(decoded.encode().unwrap(), encoded);

        let values: Vec<u32> = leaves.into_iter().copied().collect();
        let rebuilt = decoded.unflatten(&values).unwrap();
        assert_eq!(rebuilt, tree);
        let (rebuilt_leaves, _) = rebuilt.flatten();
        assert!(rebuilt_leaves.into_iter().map(|leaf| **leaf).eq(values.iter().copied()));
    }
}
