//! Built-in plugins working together on one editor.

use quire_core::{
    Editor, EditorConfig, EventName, HeadlessSurface, KeyEvent, NativeEvent, NativeSelection,
    PluginState,
};
use quire_document::{Document, NodeId, Point, TextRange};
use quire_plugin::builtin::{code, footnote, slash, word_count};
use quire_plugin::{
    BuiltinError, Code, Footnote, KnownPlugin, Preset, SlashCommands, WordCount,
};

fn editor_with(config: EditorConfig) -> (Editor, HeadlessSurface) {
    let platform = HeadlessSurface::new();
    let sources = Preset::sources_for(&config);
    let editor = Editor::builder()
        .config(config)
        .mount(platform.clone())
        .plugins(sources)
        .build()
        .unwrap();
    (editor, platform)
}

fn full_editor() -> (Editor, HeadlessSurface) {
    editor_with(EditorConfig {
        preset: Some("full".into()),
        ..EditorConfig::default()
    })
}

/// First text node in document order.
fn first_text(doc: &Document) -> NodeId {
    let mut stack = vec![doc.root()];
    while let Some(id) = stack.pop() {
        let node = doc.node(id).unwrap();
        if node.as_text().is_some() {
            return id;
        }
        stack.extend(node.children().iter().rev().copied());
    }
    panic!("document has no text");
}

/// Clicks into the first text node.
fn put_caret(editor: &Editor, platform: &HeadlessSurface, offset: usize) {
    let text = first_text(&editor.surface().read());
    platform.set_native_selection(NativeSelection::single(TextRange::caret(Point::new(
        text, offset,
    ))));
    editor.handle_native_event(NativeEvent::MouseUp);
}

#[test]
fn test_full_preset_loads_every_plugin() {
    let (editor, _) = full_editor();
    let names = editor.plugins().names();
    assert_eq!(names.len(), 7);
    for name in &names {
        assert_eq!(editor.plugins().state(name), Some(PluginState::Active));
    }
    assert!(matches!(
        KnownPlugin::resolve(&editor, slash::NAME),
        KnownPlugin::SlashCommands(_)
    ));
}

#[test]
fn test_slash_menu_inserts_code_block() {
    let (editor, platform) = full_editor();
    editor.set_data("<p>Hello </p>");
    let slash = editor.plugins().get_as::<SlashCommands>(slash::NAME).unwrap();

    // "/" after a space opens the menu
    put_caret(&editor, &platform, 6);
    editor.handle_native_event(NativeEvent::KeyDown(KeyEvent::new("/")));
    assert!(slash.is_open());

    // The user types "/co"
    platform.set_content("<p>Hello /co</p>");
    editor.handle_native_event(NativeEvent::Input);
    put_caret(&editor, &platform, 9);
    editor.handle_native_event(NativeEvent::KeyUp(KeyEvent::new("o")));
    let menu = slash.menu();
    assert_eq!(menu.query, "co");
    assert_eq!(menu.matches, vec!["Code Block"]);

    editor.handle_native_event(NativeEvent::KeyDown(KeyEvent::new("Enter")));
    assert!(!slash.is_open());

    let data = editor.get_data();
    assert!(data.starts_with("<p>Hello <div class=\"quire-code-block\""), "{data}");
    assert!(!data.contains("/co"));

    // Removing the slash text and inserting the block are separate steps
    assert!(editor.exec_command("undo", None));
    assert_eq!(editor.get_data(), "<p>Hello </p>");
    assert!(editor.exec_command("undo", None));
    assert_eq!(editor.get_data(), "<p>Hello /co</p>");
}

#[test]
fn test_slash_does_not_open_mid_word() {
    let (editor, platform) = full_editor();
    editor.set_data("<p>and</p>");
    let slash = editor.plugins().get_as::<SlashCommands>(slash::NAME).unwrap();
    put_caret(&editor, &platform, 3);
    editor.handle_native_event(NativeEvent::KeyDown(KeyEvent::new("/")));
    assert!(!slash.is_open());
}

#[test]
fn test_escape_closes_menu() {
    let (editor, platform) = full_editor();
    editor.set_data("<p>x</p>");
    let slash = editor.plugins().get_as::<SlashCommands>(slash::NAME).unwrap();
    put_caret(&editor, &platform, 0);
    editor.handle_native_event(NativeEvent::KeyDown(KeyEvent::new("/")));
    assert!(slash.is_open());
    editor.handle_native_event(NativeEvent::KeyDown(KeyEvent::new("ArrowDown")));
    assert_eq!(slash.menu().selected, 1);
    editor.handle_native_event(NativeEvent::KeyDown(KeyEvent::new("Escape")));
    assert!(!slash.is_open());
    assert_eq!(editor.get_data(), "<p>x</p>");
}

#[test]
fn test_slash_degrades_without_target_plugin() {
    let editor = Editor::builder()
        .mount(HeadlessSurface::new())
        .plugin(SlashCommands::source())
        .build()
        .unwrap();
    editor.set_data("<p>Text</p>");
    let slash = editor.plugins().get_as::<SlashCommands>(slash::NAME).unwrap();

    assert!(KnownPlugin::resolve(&editor, code::NAME).is_absent());
    assert_eq!(
        slash.run("Code Block"),
        Err(BuiltinError::Unavailable(code::NAME.to_string()))
    );
    assert_eq!(editor.get_data(), "<p>Text</p>");
    assert!(!editor.commands().can_undo());

    // Plain markup entries still work
    assert_eq!(slash.run("Heading 2"), Ok(true));
    assert!(editor.get_data().ends_with("<h2>Heading 2</h2>"));
}

#[test]
fn test_late_registered_plugin_becomes_reachable() {
    let editor = Editor::builder()
        .mount(HeadlessSurface::new())
        .plugin(SlashCommands::source())
        .build()
        .unwrap();
    let slash = editor.plugins().get_as::<SlashCommands>(slash::NAME).unwrap();
    assert!(slash.run("Code Block").is_err());

    editor
        .register_plugin(Code::source(), &serde_json::Value::Null)
        .unwrap();
    assert_eq!(slash.run("Code Block"), Ok(true));
    assert!(editor.get_data().contains("quire-code-block"));
}

#[test]
fn test_footnotes_number_in_document_order() {
    let (editor, platform) = full_editor();
    editor.set_data("<p>First second</p>");
    let notes = editor.plugins().get_as::<Footnote>(footnote::NAME).unwrap();

    put_caret(&editor, &platform, 12);
    let later = notes.insert_footnote(Some("Later")).unwrap().unwrap();
    put_caret(&editor, &platform, 5);
    let earlier = notes.insert_footnote(Some("Earlier")).unwrap().unwrap();

    let refs = notes.references().unwrap();
    let ids: Vec<&str> = refs.iter().map(|r| r.id.as_str()).collect();
    let numbers: Vec<&str> = refs.iter().map(|r| r.number.as_str()).collect();
    assert_eq!(ids, vec![earlier.as_str(), later.as_str()]);
    assert_eq!(numbers, vec!["1", "2"]);
    assert_eq!(editor.get_data().matches("<li class=\"quire-fn-item\"").count(), 2);

    assert!(editor.exec_command("undo", None));
    let refs = notes.references().unwrap();
    assert_eq!(refs.len(), 1);
    assert_eq!(refs[0].id, later);
    assert_eq!(refs[0].number, "1");

    assert!(editor.exec_command("undo", None));
    assert_eq!(editor.get_data(), "<p>First second</p>");

    assert!(editor.exec_command("redo", None));
    assert_eq!(notes.references().unwrap().len(), 1);
    assert!(editor.get_data().contains("quire-fn-container"));
}

#[test]
fn test_word_count_follows_plugin_edits() {
    let (editor, _) = editor_with(EditorConfig {
        preset: Some("standard".into()),
        content: "<p>Two words</p>".into(),
        ..EditorConfig::default()
    });
    let counter = editor.plugins().get_as::<WordCount>(word_count::NAME).unwrap();
    assert_eq!(counter.stats().words, 2);

    let code = editor.plugins().get_as::<Code>(code::NAME).unwrap();
    code.insert_code_block(Some("python")).unwrap();
    // "// Type code here..." adds four words
    assert_eq!(counter.stats().words, 6);
}

#[test]
fn test_destroy_releases_every_subscription() {
    let (editor, _) = full_editor();
    assert!(editor.events().subscriber_count(EventName::KeyDown) > 0);
    editor.destroy();
    for event in [EventName::Change, EventName::KeyDown, EventName::KeyUp] {
        assert_eq!(editor.events().subscriber_count(event), 0);
    }
    assert!(editor.plugins().is_empty());
}
