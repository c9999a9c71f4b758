use std::path::PathBuf;

use super::*;

fn tree_from_toml(raw: &str) -> ConfigTree {
    parse_toml_tree(raw).expect("fixture must parse")
}

#[test]
fn merge_keeps_user_values_and_fills_template_defaults() {
    let template = tree_from_toml("A = 1\nB = 2\n");
    let user = tree_from_toml("A = 5\n");

    let outcome = merge_into_template(&template, &user, DriftPolicy::Preserve);

    assert_eq!(outcome.tree.value("A"), Some(&ConfigValue::Integer(5)));
    assert_eq!(outcome.tree.value("B"), Some(&ConfigValue::Integer(2)));
    assert_eq!(outcome.tree.keys().collect::<Vec<_>>(), vec!["A", "B"]);
    assert!(outcome.unknown_keys.is_empty());
    assert!(outcome.restructured.is_empty());
}

#[test]
fn merge_recurses_into_nested_sections_in_template_order() {
    let template = tree_from_toml(
        r#"
[Station]
location = "Nowhere"
altitude = [0, "foot"]

[Station.Extra]
unit = "metric"

[Engine]
interval = 300
"#,
    );
    let user = tree_from_toml(
        r#"
[Engine]
interval = 60

[Station.Extra]
unit = "us"

[Station]
location = "Hood River"
"#,
    );

    let outcome = merge_into_template(&template, &user, DriftPolicy::Preserve);

    assert_eq!(
        outcome.tree.keys().collect::<Vec<_>>(),
        vec!["Station", "Engine"]
    );
    let station = outcome.tree.section("Station").expect("station section");
    assert_eq!(
        station.keys().collect::<Vec<_>>(),
        vec!["location", "altitude", "Extra"]
    );
    assert_eq!(station.value("location"), Some(&ConfigValue::from("Hood River")));
    assert_eq!(
        outcome.tree.get_path("Station.Extra.unit"),
        Some(&ConfigNode::Value(ConfigValue::from("us")))
    );
    assert_eq!(
        outcome.tree.get_path("Engine.interval"),
        Some(&ConfigNode::Value(ConfigValue::Integer(60)))
    );
}

#[test]
fn merge_preserve_policy_appends_user_only_keys() {
    let template = tree_from_toml("[Station]\nlocation = \"x\"\n");
    let user = tree_from_toml("[Station]\nlocation = \"y\"\nretired = true\n");

    let outcome = merge_into_template(&template, &user, DriftPolicy::Preserve);

    let station = outcome.tree.section("Station").expect("station section");
    assert_eq!(station.keys().collect::<Vec<_>>(), vec!["location", "retired"]);
    assert_eq!(outcome.unknown_keys, vec!["Station.retired"]);
}

#[test]
fn merge_drop_policy_discards_user_only_keys_but_reports_them() {
    let template = tree_from_toml("[Station]\nlocation = \"x\"\n");
    let user = tree_from_toml("legacy = 1\n[Station]\nretired = true\n");

    let outcome = merge_into_template(&template, &user, DriftPolicy::Drop);

    assert!(!outcome.tree.contains_key("legacy"));
    let station = outcome.tree.section("Station").expect("station section");
    assert!(!station.contains_key("retired"));
    assert_eq!(station.value("location"), Some(&ConfigValue::from("x")));
    assert_eq!(outcome.unknown_keys, vec!["Station.retired", "legacy"]);
}

#[test]
fn merge_keeps_template_shape_when_user_restructured_a_key() {
    let template = tree_from_toml("[Logging]\nlevel = \"info\"\n");
    let user = tree_from_toml("Logging = \"verbose\"\n");

    let outcome = merge_into_template(&template, &user, DriftPolicy::Preserve);

    assert_eq!(outcome.restructured, vec!["Logging"]);
    assert_eq!(
        outcome.tree.get_path("Logging.level"),
        Some(&ConfigNode::Value(ConfigValue::from("info")))
    );
}

#[test]
fn drift_policy_parses_known_names_only() {
    assert_eq!(
        DriftPolicy::parse("preserve").expect("must parse"),
        DriftPolicy::Preserve
    );
    assert_eq!(DriftPolicy::parse("drop").expect("must parse"), DriftPolicy::Drop);
    assert!(DriftPolicy::parse("warn").is_err());
}

#[test]
fn tree_set_replaces_in_place_and_appends_new_keys() {
    let mut tree = ConfigTree::new();
    tree.set_value("first", 1_i64);
    tree.set_value("second", 2_i64);
    let previous = tree.set_value("first", 10_i64);

    assert_eq!(previous, Some(ConfigNode::Value(ConfigValue::Integer(1))));
    assert_eq!(tree.keys().collect::<Vec<_>>(), vec!["first", "second"]);
    assert_eq!(tree.value("first"), Some(&ConfigValue::Integer(10)));

    tree.remove("first");
    assert_eq!(tree.keys().collect::<Vec<_>>(), vec!["second"]);
}

#[test]
fn ensure_section_replaces_scalar_with_empty_section() {
    let mut tree = ConfigTree::new();
    tree.set_value("Station", "flat");
    tree.ensure_section("Station").set_value("location", "here");

    assert_eq!(
        tree.get_path("Station.location"),
        Some(&ConfigNode::Value(ConfigValue::from("here")))
    );
}

#[test]
fn apply_profile_writes_station_and_driver_sections() {
    let mut tree = tree_from_toml("[Station]\nlocation = \"x\"\nstation_type = \"Unset\"\n");
    let mut profile = StationProfile::default_profile();
    profile
        .settings
        .insert("location".to_string(), "Hood River".to_string());
    profile
        .driver_settings
        .insert("loop_on_init".to_string(), "true".to_string());

    apply_profile(&mut tree, &profile);

    let station = tree.section(STATION_SECTION).expect("station section");
    assert_eq!(
        station.keys().collect::<Vec<_>>(),
        vec!["location", "station_type"]
    );
    assert_eq!(station.value("station_type"), Some(&ConfigValue::from("Simulator")));
    assert_eq!(station.value("location"), Some(&ConfigValue::from("Hood River")));
    let driver = tree.section("Simulator").expect("driver section");
    assert_eq!(
        driver.value("driver"),
        Some(&ConfigValue::from("upkeep.drivers.simulator"))
    );
    assert_eq!(driver.value("loop_on_init"), Some(&ConfigValue::from("true")));
}

#[test]
fn toml_round_trip_preserves_section_order() {
    let raw = "ROOT = \"/opt/station\"\n\n[Zeta]\nb = 2\na = 1\n\n[Alpha]\nflag = true\n";
    let tree = tree_from_toml(raw);
    let rendered = render_toml_tree(&tree);
    let reparsed = tree_from_toml(&rendered);

    assert_eq!(reparsed, tree);
    assert_eq!(reparsed.keys().collect::<Vec<_>>(), vec!["ROOT", "Zeta", "Alpha"]);
    assert_eq!(
        reparsed.section("Zeta").expect("zeta").keys().collect::<Vec<_>>(),
        vec!["b", "a"]
    );
}

#[test]
fn comments_stay_bound_to_their_keys_through_render() {
    let raw = "# calibrated by hand\nA = 5 # do not change\n\n# where the station is\n[Station]\n# town name\nlocation = \"Hood River\"\n# end of file\n";
    let tree = tree_from_toml(raw);

    let a = tree.comment("A").expect("A keeps its comments");
    assert_eq!(a.leading.as_deref(), Some("# calibrated by hand\n"));
    assert!(a
        .trailing
        .as_deref()
        .is_some_and(|text| text.contains("# do not change")));
    let station = tree.section("Station").expect("station section");
    assert!(tree
        .comment("Station")
        .and_then(|comment| comment.leading.as_deref())
        .is_some_and(|text| text.contains("# where the station is")));
    assert_eq!(
        station
            .comment("location")
            .and_then(|comment| comment.leading.as_deref()),
        Some("# town name\n")
    );
    assert!(tree.footer().is_some_and(|text| text.contains("# end of file")));

    let rendered = render_toml_tree(&tree);
    for line in [
        "# calibrated by hand",
        "# do not change",
        "# where the station is",
        "# town name",
        "# end of file",
    ] {
        assert!(rendered.contains(line), "missing {line:?} in:\n{rendered}");
    }
    assert_eq!(tree_from_toml(&rendered), tree);
}

#[test]
fn merge_carries_user_comments_and_falls_back_to_template_comments() {
    let template = tree_from_toml(
        "# template note for A\nA = 1\n# template note for B\nB = 2\n[Logging]\nlevel = \"info\"\n",
    );
    let user = tree_from_toml(
        "# my antenna calibration, do not change\nA = 5\n# kept from an old release\nold = true\n# user note\nLogging = \"verbose\"\n",
    );

    let outcome = merge_into_template(&template, &user, DriftPolicy::Preserve);
    let leading = |key: &str| {
        outcome
            .tree
            .comment(key)
            .and_then(|comment| comment.leading.clone())
    };

    assert_eq!(
        leading("A").as_deref(),
        Some("# my antenna calibration, do not change\n")
    );
    assert_eq!(leading("B").as_deref(), Some("# template note for B\n"));
    assert_eq!(leading("old").as_deref(), Some("# kept from an old release\n"));
    assert_eq!(leading("Logging"), None, "restructured keys take the template's comment");

    let rendered = render_toml_tree(&outcome.tree);
    assert!(rendered.contains("# my antenna calibration, do not change\nA = 5"));
    assert!(!rendered.contains("# template note for A"));
}

#[test]
fn comments_follow_keys_removed_from_the_tree() {
    let mut tree = tree_from_toml("# note\nA = 1\n");
    tree.remove("A");
    tree.set_value("A", 2_i64);
    assert_eq!(tree.comment("A"), None);
}

#[test]
fn empty_document_parses_to_empty_tree() {
    assert!(tree_from_toml("").is_empty());
}

#[test]
fn parse_error_names_the_offending_file() {
    let path = std::env::temp_dir().join(format!(
        "upkeep-core-tests-{}-broken.toml",
        std::process::id()
    ));
    std::fs::write(&path, "[Station\nlocation = ").expect("must write fixture");

    let err = TomlConfigStore
        .load(&path)
        .expect_err("broken syntax must be rejected");

    assert!(matches!(err, ConfigLoadError::Parse { .. }));
    assert_eq!(err.path(), path.as_path());
    assert!(err.to_string().contains("syntax error in configuration file"));
    let _ = std::fs::remove_file(&path);
}

#[test]
fn missing_file_is_an_io_error() {
    let path = PathBuf::from("/nonexistent/upkeep/station.toml");
    let err = TomlConfigStore.load(&path).expect_err("missing file must fail");
    assert!(matches!(err, ConfigLoadError::Io { .. }));
}

#[test]
fn manifest_groups_entries_by_category() {
    let manifest = ContentManifest::from_toml_str(
        r#"
[[entries]]
dir = "skins/Seasons"
files = ["skins/Seasons/index.html.tmpl", "skins/Seasons/skin.conf"]

[[entries]]
dir = "skins/Seasons/font"
files = ["skins/Seasons/font/OpenSans.woff"]

[[entries]]
dir = "skins/Mobile"
files = ["skins/Mobile/index.html.tmpl"]

[[entries]]
dir = "docs"
files = ["docs/usersguide.htm"]
"#,
    )
    .expect("manifest must parse");

    assert_eq!(manifest.file_count(), 5);
    assert_eq!(manifest.group_names("skins"), vec!["Seasons", "Mobile"]);
    assert_eq!(manifest.entries[1].group_name("skins").as_deref(), Some("Seasons"));
    assert_eq!(manifest.entries[3].group_name("skins"), None);
}

#[test]
fn manifest_rejects_parent_traversal() {
    let err = ContentManifest::from_toml_str(
        "[[entries]]\ndir = \"skins/../../etc\"\nfiles = []\n",
    )
    .expect_err("traversal must be rejected");
    assert!(err.to_string().contains("must be relative"));
}
