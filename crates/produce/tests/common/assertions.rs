#![allow(dead_code)]

use produce::{apply_patches, Key, Patch, Value};

pub fn path(steps: &[&str]) -> Vec<Key> {
    steps
        .iter()
        .map(|s| match s.parse::<usize>() {
            Ok(i) => Key::Index(i),
            Err(_) => Key::from(*s),
        })
        .collect()
}

pub fn at<'a>(value: &'a Value, steps: &[&str]) -> &'a Value {
    value
        .at(&path(steps))
        .unwrap_or_else(|| panic!("nothing at {steps:?} in {value:?}"))
}

/// Asserts that `a` and `b` hold the same container at `steps`.
pub fn assert_shared(a: &Value, b: &Value, steps: &[&str]) {
    assert!(at(a, steps).same(at(b, steps)), "{steps:?} is not shared");
}

pub fn assert_not_shared(a: &Value, b: &Value, steps: &[&str]) {
    assert!(!at(a, steps).same(at(b, steps)), "{steps:?} is unexpectedly shared");
}

/// Replays `patches` on `base` and `inverse` on `result`.
pub fn assert_round_trip(base: &Value, result: &Value, patches: &[Patch], inverse: &[Patch]) {
    assert_eq!(&apply_patches(base, patches).unwrap(), result, "forward patches: {patches:?}");
    assert_eq!(&apply_patches(result, inverse).unwrap(), base, "inverse patches: {inverse:?}");
}
