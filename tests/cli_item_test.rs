//! Integration tests for `boq item` bookkeeping commands.

mod common;

use common::TestEnv;
use predicates::prelude::*;

/// Add one item and fill it in: 10 x 100 at 50% this period.
fn seed_item(env: &TestEnv) {
    env.json(&["item", "add"]);
    env.json(&["item", "edit", "0", "description", "Concrete works"]);
    env.json(&["item", "edit", "0", "qty", "10"]);
    env.json(&["item", "edit", "0", "rate", "100"]);
    env.json(&["item", "edit", "0", "curr-perc", "50"]);
}

#[test]
fn test_item_add_creates_variation_order() {
    let env = TestEnv::with_project("J-1");
    let json = env.json(&["item", "add"]);
    assert_eq!(json["added"], true);
    assert_eq!(json["index"], 0);
    assert_eq!(json["item"]["id"], "V.O.");
    assert_eq!(json["item"]["description"], "New Item");
    assert_eq!(json["item"]["qty"], 0.0);
}

#[test]
fn test_item_add_without_project_is_noop() {
    let env = TestEnv::init();
    let json = env.json(&["item", "add"]);
    assert_eq!(json["added"], false);
    assert!(json["reason"].is_string());
}

#[test]
fn test_item_edit_rolls_up_progress() {
    let env = TestEnv::with_project("J-1");
    seed_item(&env);

    let list = env.json(&["item", "list"]);
    assert_eq!(list["rows"][0]["amount"], 1000.0);
    assert_eq!(list["rows"][0]["work_done_value"], 500.0);
    assert_eq!(list["totals"]["progress"], 50);

    let projects = env.json(&["project", "list"]);
    assert_eq!(projects["projects"][0]["progress"], 50);
}

#[test]
fn test_item_edit_clamps_current_percentage() {
    let env = TestEnv::with_project("J-1");
    env.json(&["item", "add"]);

    let json = env.json(&["item", "edit", "0", "curr-perc", "150"]);
    assert_eq!(json["item"]["curr_perc"], 100.0);

    let json = env.json(&["item", "edit", "0", "curr-perc", "-5"]);
    assert_eq!(json["item"]["curr_perc"], 0.0);
}

#[test]
fn test_item_edit_lenient_numbers() {
    let env = TestEnv::with_project("J-1");
    env.json(&["item", "add"]);

    assert_eq!(env.json(&["item", "edit", "0", "qty", "12.5 m3"])["item"]["qty"], 12.5);
    assert_eq!(env.json(&["item", "edit", "0", "qty", "abc"])["item"]["qty"], 0.0);
    assert_eq!(env.json(&["item", "edit", "0", "rate", "-40"])["item"]["rate"], 0.0);
}

#[test]
fn test_item_edit_text_field_stored_raw() {
    let env = TestEnv::with_project("J-1");
    env.json(&["item", "add"]);
    let json = env.json(&["item", "edit", "0", "unit", " m2 "]);
    assert_eq!(json["item"]["unit"], " m2 ");
}

#[test]
fn test_item_edit_unknown_field_and_index() {
    let env = TestEnv::with_project("J-1");
    env.json(&["item", "add"]);

    env.boq()
        .args(["item", "edit", "0", "prev-perc", "10"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown field"));

    env.boq()
        .args(["item", "edit", "5", "qty", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_item_delete_requires_yes() {
    let env = TestEnv::with_project("J-1");
    seed_item(&env);

    env.boq()
        .args(["item", "delete", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Delete item: Concrete works?"));
    assert_eq!(env.json(&["item", "list"])["item_count"], 1);

    let json = env.json(&["item", "delete", "0", "--yes"]);
    assert_eq!(json["remaining"], 0);
    assert_eq!(json["item"]["description"], "Concrete works");

    let list = env.json(&["item", "list"]);
    assert_eq!(list["item_count"], 0);
    assert_eq!(list["totals"]["progress"], 0);
}

#[test]
fn test_item_delete_shifts_indices() {
    let env = TestEnv::with_project("J-1");
    for _ in 0..3 {
        env.json(&["item", "add"]);
    }
    env.json(&["item", "edit", "2", "id", "C"]);
    env.json(&["item", "delete", "1", "-y"]);

    let list = env.json(&["item", "list"]);
    assert_eq!(list["item_count"], 2);
    assert_eq!(list["rows"][1]["id"], "C");
    assert_eq!(list["rows"][1]["index"], 1);
}

#[test]
fn test_item_list_search_filters_rows_only() {
    let env = TestEnv::with_project("J-1");
    seed_item(&env);
    env.json(&["item", "add"]);

    let json = env.json(&["item", "list", "--search", "CONCRETE"]);
    assert_eq!(json["rows"].as_array().unwrap().len(), 1);
    assert_eq!(json["item_count"], 2);
    assert_eq!(json["totals"]["total_value"], 1000.0);

    let by_id = env.json(&["item", "list", "-s", "v.o."]);
    assert_eq!(by_id["rows"].as_array().unwrap().len(), 2);
}

#[test]
fn test_item_list_human_table() {
    let env = TestEnv::with_project("J-1");
    seed_item(&env);

    env.boq()
        .args(["item", "list", "-H"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Concrete works"))
        .stdout(predicate::str::contains("1,000.00 AED"));
}

#[test]
fn test_item_totals() {
    let env = TestEnv::with_project("J-1");
    seed_item(&env);

    let json = env.json(&["item", "totals"]);
    assert_eq!(json["totals"]["total_value"], 1000.0);
    assert_eq!(json["totals"]["total_work_done"], 500.0);
    assert_eq!(json["totals"]["progress"], 50);
    assert_eq!(json["progress_updated"], false);
}

#[test]
fn test_item_totals_empty_boq() {
    let env = TestEnv::with_project("J-1");
    let json = env.json(&["item", "totals"]);
    assert_eq!(json["totals"]["total_value"], 0.0);
    assert_eq!(json["totals"]["progress"], 0);
    assert_eq!(json["item_count"], 0);
}
