mod common;

use common::assertions::{assert_round_trip, assert_shared, path};
use common::fixtures::{app_state, inventory};
use produce::codec::json::{from_json_patch, to_json_patch};
use produce::{produce_with_patches, DraftMut, Key, Patch, ProduceError, Value};
use serde_json::json;

fn record<F>(base: &Value, recipe: F) -> (Value, Vec<Patch>, Vec<Patch>)
where
    F: FnOnce(&mut DraftMut<'_>) -> Result<(), ProduceError>,
{
    let (result, patches, inverse) = produce_with_patches(base, recipe).unwrap();
    assert_round_trip(base, &result, &patches, &inverse);
    (result, patches, inverse)
}

#[test]
fn app_state_patches() {
    let base = app_state();
    let (result, patches, inverse) = record(&base, |draft| {
        draft.seq_at("users")?.push(Value::from(json!({"id": 3, "name": "user3"})))?;
        draft.record_at("settings")?.set("theme", "dark")
    });
    assert_eq!(
        to_json_patch(&patches),
        json!([
            {"op": "add", "path": ["users", 2], "value": {"id": 3, "name": "user3"}},
            {"op": "replace", "path": ["settings", "theme"], "value": "dark"}
        ])
    );
    assert_eq!(
        to_json_patch(&inverse),
        json!([
            {"op": "replace", "path": ["settings", "theme"], "value": "light"},
            {"op": "remove", "path": ["users", 2]}
        ])
    );
    assert_shared(&result, &base, &["users", "0"]);
}

#[test]
fn codec_round_trip_replays_identically() {
    let base = app_state();
    let (result, patches, inverse) = record(&base, |draft| {
        draft.seq_at("users")?.remove(0)?;
        draft.child("users")?.child(0)?.set("name", "renamed")?;
        draft.delete("settings").map(|_| ())
    });
    let decoded = from_json_patch(&to_json_patch(&patches)).unwrap();
    assert_eq!(decoded, patches);
    let decoded_inverse = from_json_patch(&to_json_patch(&inverse)).unwrap();
    assert_eq!(produce::apply_patches(&result, &decoded_inverse).unwrap(), base);
}

#[test]
fn record_add_replace_delete() {
    let base = Value::from(json!({"keep": {"x": 1}, "change": 1, "drop": [1, 2]}));
    let (_, patches, _) = record(&base, |draft| {
        draft.set("change", 2)?;
        draft.set("new", Value::from(json!({"nested": true})))?;
        draft.delete("drop")?;
        draft.delete("missing")?;
        Ok(())
    });
    let ops: Vec<_> = patches.iter().map(|p| (p.op_name(), p.path().clone())).collect();
    assert_eq!(
        ops,
        vec![("replace", path(&["change"])), ("add", path(&["new"])), ("remove", path(&["drop"]))]
    );
}

#[test]
fn sequence_shifts() {
    let base = Value::from(json!([{"n": 0}, {"n": 1}, {"n": 2}, {"n": 3}]));
    record(&base, |draft| {
        let mut seq = draft.as_seq()?;
        seq.child(3)?.set("n", 30)?;
        seq.insert(0, "head")?;
        seq.remove(2)?;
        seq.child(3)?.set("m", 1)?;
        seq.swap(0, 1)?;
        seq.move_item(3, 0)?;
        seq.pop()?;
        seq.set(1, "replaced")?;
        Ok(())
    });
}

#[test]
fn sequence_truncate_and_clear() {
    let base = Value::from(json!({"a": [1, 2, 3, 4], "b": [{"x": 1}, 2]}));
    let (result, patches, _) = record(&base, |draft| {
        draft.seq_at("a")?.truncate(1)?;
        draft.child("b")?.child(0)?.set("x", 2)?;
        draft.seq_at("b")?.clear()
    });
    assert_eq!(result, Value::from(json!({"a": [1], "b": []})));
    // Trailing removals go last-first so every index is valid when replayed.
    assert_eq!(patches[0].path(), &path(&["a", "3"]));
}

#[test]
fn map_patches() {
    let base = inventory();
    let (result, patches, _) = record(&base, |draft| {
        let mut stock = draft.map_at("stock")?;
        stock.insert("apple", 3)?;
        stock.insert("orange", 1)?;
        stock.remove("banana")?;
        Ok(())
    });
    assert_eq!(result.at(&path(&["stock", "orange"])), Some(&Value::from(1)));
    assert!(patches.iter().all(|p| p.path()[0] == Key::from("stock")));
}

#[test]
fn map_entries_can_be_drafted() {
    let base = Value::map([(Value::from(7), Value::from(json!({"seen": false})))]);
    let (result, patches, _) = record(&base, |draft| draft.as_map()?.entry(7)?.set("seen", true));
    assert_eq!(patches[0].path(), &vec![Key::Entry(Value::from(7)), Key::from("seen")]);
    assert_eq!(result, Value::map([(Value::from(7), Value::from(json!({"seen": true})))]));
}

#[test]
fn set_patches_restore_order() {
    let base = inventory();
    let (_, patches, inverse) = record(&base, |draft| {
        let mut colors = draft.set_at("colors")?;
        colors.add("green")?;
        colors.remove("red")?;
        colors.add("red")?;
        colors.clear()
    });
    assert_eq!(
        patches[1],
        Patch::Remove { path: path(&["colors", "0"]), value: Some(Value::from("red")) }
    );
    let reverted = produce::apply_patches(&produce::apply_patches(&base, &patches).unwrap(), &inverse).unwrap();
    let order: Vec<_> = reverted
        .at(&path(&["colors"]))
        .and_then(|v| v.as_set())
        .map(|s| s.iter().filter_map(|v| v.as_str().map(str::to_owned)).collect())
        .unwrap_or_default();
    assert_eq!(order, ["red", "blue"]);
}

#[test]
fn shared_draft_linked_after_modification() {
    let shared = Value::from(json!({"v": 1}));
    let base = Value::from(json!({"list": [], "slot": null}));
    let base = produce::produce(&base, |draft| {
        draft.seq_at("list")?.push(shared.clone())?;
        draft.set("slot", shared.clone())
    })
    .unwrap();
    record(&base, |draft| {
        draft.child("list")?.child(0)?.set("v", 2)?;
        draft.child("slot")?.set("w", 3)
    });
}

#[test]
fn detached_draft_edits_are_not_recorded() {
    let base = Value::from(json!({"a": {"b": 1}, "c": 1}));
    let (result, patches, _) = record(&base, |draft| {
        let handle = draft.child("a")?.handle();
        draft.delete("a")?;
        draft.at(handle)?.set("b", 2)
    });
    assert_eq!(result, Value::from(json!({"c": 1})));
    assert_eq!(patches.len(), 1);
}

#[test]
fn replacement_round_trips() {
    let base = app_state();
    let (result, patches, inverse) =
        produce_with_patches(&base, |_| Ok::<_, ProduceError>(Value::from(json!({"reset": true})))).unwrap();
    assert_round_trip(&base, &result, &patches, &inverse);
}

#[test]
fn identical_writes_record_nothing() {
    let base = app_state();
    let (result, patches, inverse) = record(&base, |draft| {
        let users = draft.get("users").unwrap_or(Value::Null);
        draft.set("users", users)?;
        draft.record_at("settings")?.set("theme", "light")
    });
    assert!(result.same(&base));
    assert!(patches.is_empty() && inverse.is_empty());
}
