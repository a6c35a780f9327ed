//! End-to-end session scenarios: initial payload plus diff streams, with
//! the published document asserted after every cycle.

use serde_json::json;

use live_render::RenderSession;

#[test]
fn literal_slots_update_independently() {
    let mut session = RenderSession::new();
    let html = session.apply_initial(&json!({
        "0": "Hello",
        "1": "World",
        "s": ["<p>", " ", "</p>"],
    }));
    assert_eq!(html, "<p>Hello World</p>");

    assert_eq!(session.apply_diff(&json!({"0": "Goodbye"})), "<p>Goodbye World</p>");
    assert_eq!(session.apply_diff(&json!({"1": "Moon"})), "<p>Goodbye Moon</p>");
}

#[test]
fn keyed_list_grows_shrinks_and_regrows() {
    let mut session = RenderSession::new();
    let html = session.apply_initial(&json!({
        "0": {
            "entries": {"0": {"0": "A"}, "1": {"0": "B"}, "2": {"0": "C"}},
            "count": 3,
            "s": ["<li>", "</li>"],
        },
        "s": ["<ul>", "</ul>"],
    }));
    assert_eq!(html, "<ul><li>A</li><li>B</li><li>C</li></ul>");

    // Shrink: the trailing entry stays in storage but leaves the output.
    let html = session.apply_diff(&json!({"0": {"count": 2}}));
    assert_eq!(html, "<ul><li>A</li><li>B</li></ul>");

    // Regrow without resending entry 2.
    let html = session.apply_diff(&json!({"0": {"count": 3}}));
    assert_eq!(html, "<ul><li>A</li><li>B</li><li>C</li></ul>");
}

#[test]
fn keyed_list_move_reproduces_old_content() {
    let mut session = RenderSession::new();
    session.apply_initial(&json!({
        "0": {
            "entries": {"0": {"0": "first"}, "1": {"0": "second"}, "2": {"0": "third"}},
            "count": 3,
            "s": ["<li>", "</li>"],
        },
        "s": ["", ""],
    }));

    // Rotate all three in a single message; every move reads pre-merge
    // positions, independent of the other moves.
    let html = session.apply_diff(&json!({
        "0": {"entries": {"0": 2, "1": 0, "2": [1, {"0": "second*"}]}, "count": 3},
    }));
    assert_eq!(html, "<li>third</li><li>first</li><li>second*</li>");
}

#[test]
fn component_inherits_statics_by_reference() {
    let mut session = RenderSession::new();
    let html = session.apply_initial(&json!({
        "0": 1,
        "1": 2,
        "s": ["", "", ""],
        "c": {
            "1": {"0": "one", "s": ["<b>", "</b>"]},
            "2": {"0": "X", "s": 1},
        },
    }));
    assert_eq!(html, "<b>one</b><b>X</b>");

    // Updating only the shared parent leaves the inheritor's resolved
    // template alone.
    let html = session.apply_diff(&json!({"c": {"1": {"0": "uno"}}}));
    assert_eq!(html, "<b>uno</b><b>X</b>");
}

#[test]
fn component_diff_relative_to_its_own_prior_template() {
    let mut session = RenderSession::new();
    session.apply_initial(&json!({
        "0": 3,
        "s": ["", ""],
        "c": {"3": {"0": "v1", "s": ["<em>", "</em>"]}},
    }));
    let html = session.apply_diff(&json!({"c": {"3": {"0": "v2", "s": -3}}}));
    assert_eq!(html, "<em>v2</em>");
}

#[test]
fn template_table_shares_statics_within_one_message() {
    let mut session = RenderSession::new();
    let html = session.apply_initial(&json!({
        "0": {"0": "left", "s": 0},
        "1": {"0": "right", "s": 0},
        "s": ["", "|", ""],
        "p": [["<span>", "</span>"]],
    }));
    assert_eq!(html, "<span>left</span>|<span>right</span>");
}

#[test]
fn missing_template_index_degrades_to_empty_slot() {
    let mut session = RenderSession::new();
    let html = session.apply_initial(&json!({
        "0": {"0": "lost", "s": 9},
        "s": ["before|", "|after"],
        "p": [["only-row-", ""]],
    }));
    assert_eq!(html, "before||after");
}

#[test]
fn statics_at_a_path_replace_the_whole_subtree() {
    let mut session = RenderSession::new();
    session.apply_initial(&json!({
        "0": {"0": {"0": "deep", "s": ["(", ")"]}, "s": ["<i>", "</i>"]},
        "s": ["", ""],
    }));
    // The replacement has no slot 0; the old nested dynamics must be gone.
    let html = session.apply_diff(&json!({"0": {"s": ["<u>static only</u>"]}}));
    assert_eq!(html, "<u>static only</u>");
}

#[test]
fn shell_splices_content_and_title() {
    let shell = concat!(
        "<html><head><title data-suffix=\" · TaskApp\">TaskApp</title></head>",
        "<body><div id=\"lv-1\" data-main=\"lv-1\">placeholder</div></body></html>",
    );
    let mut session = RenderSession::with_shell(shell.to_owned(), "data-main", "lv-1");
    let html = session.apply_initial(&json!({
        "0": "Groceries",
        "s": ["<div class=\"list\"><h1>", "</h1></div>"],
        "t": "Groceries",
    }));
    assert!(html.contains("<title data-suffix=\" · TaskApp\">Groceries · TaskApp</title>"));
    assert!(html.contains(
        "<div id=\"lv-1\" data-main=\"lv-1\"><div class=\"list\"><h1>Groceries</h1></div></div>"
    ));

    // Rendered content containing nested containers must not shift the
    // mount boundaries of the following cycle.
    session.apply_diff(&json!({"0": "Unbalanced<div><div>"}));
    let html = session.apply_diff(&json!({"0": "Clean", "t": "Clean"}));
    assert!(html.contains(
        "<div id=\"lv-1\" data-main=\"lv-1\"><div class=\"list\"><h1>Clean</h1></div></div>"
    ));
    assert!(html.contains("<title data-suffix=\" · TaskApp\">Clean · TaskApp</title>"));
}

#[test]
fn events_and_reply_ride_alongside_content() {
    let mut session = RenderSession::new();
    session.apply_initial(&json!({"0": "x", "s": ["", ""]}));
    session.apply_diff(&json!({
        "0": "y",
        "e": [["item-added", {"id": 1}], ["item-added", {"id": 2}]],
        "r": {"status": "ok"},
    }));
    session.apply_diff(&json!({"e": [["item-removed", {"id": 1}]]}));

    let actions: Vec<&str> = session
        .current_events()
        .iter()
        .map(|event| event.action.as_str())
        .collect();
    assert_eq!(actions, ["item-added", "item-added", "item-removed"]);
    assert_eq!(session.reply(), Some(&json!({"status": "ok"})));

    session.clear_events();
    assert!(session.current_events().is_empty());
    assert_eq!(session.current_html(), "y");
}

#[test]
fn many_sessions_are_independent() {
    let initial = json!({"0": "shared", "s": ["<p>", "</p>"]});
    let mut a = RenderSession::new();
    let mut b = RenderSession::new();
    a.apply_initial(&initial);
    b.apply_initial(&initial);
    a.apply_diff(&json!({"0": "only-a"}));
    assert_eq!(a.current_html(), "<p>only-a</p>");
    assert_eq!(b.current_html(), "<p>shared</p>");
}
