mod common;

use addon_keeper_lib::core::name_cache::NameCache;
use addon_keeper_lib::core::reconciler::Reconciler;
use addon_keeper_lib::models::addon::{ActivationMode, ScanIssue, TransitionOutcome};
use addon_keeper_lib::models::catalog::{Metadata, ResultCode};
use addon_keeper_lib::models::error::{SError, TransitionHalf};
use addon_keeper_lib::models::paths::GameLayout;
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::sync::Arc;

fn reconciler(layout: &GameLayout, mode: ActivationMode) -> Reconciler {
    Reconciler::new(layout.clone(), mode, Arc::new(RwLock::new(NameCache::default())))
}

fn ids(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_enable_materialises_content_and_config() {
    let (_tmp, root) = common::setup_game_root();
    let layout = common::layout(&root);
    common::create_archive(&layout, "123");
    let mut rec = reconciler(&layout, ActivationMode::Workshop);

    assert_eq!(rec.set_enabled("123", true).unwrap(), TransitionOutcome::Enabled);

    let canonical = layout.content_path("123").join("pak01_dir.vpk");
    assert_eq!(fs::read_to_string(canonical).unwrap(), "VPK 123");
    assert!(layout.archive_path("123").exists());
    assert!(common::config_text(&layout).contains("Game\tleft4dead2\\addons\\workshop\\123"));

    let addon = rec.scan().unwrap().get("123").cloned().unwrap();
    assert!(addon.enabled());
    assert!(addon.config_active);
}

#[test]
fn test_enable_and_disable_are_idempotent() {
    let (_tmp, root) = common::setup_game_root();
    let layout = common::layout(&root);
    common::create_archive(&layout, "1");
    let mut rec = reconciler(&layout, ActivationMode::Workshop);

    rec.set_enabled("1", true).unwrap();
    let after_once = common::config_text(&layout);
    assert_eq!(rec.set_enabled("1", true).unwrap(), TransitionOutcome::Unchanged);
    assert_eq!(common::config_text(&layout), after_once);
    assert!(layout.content_path("1").is_dir());

    assert_eq!(rec.set_enabled("1", false).unwrap(), TransitionOutcome::Disabled);
    let after_disable = common::config_text(&layout);
    assert_eq!(rec.set_enabled("1", false).unwrap(), TransitionOutcome::Unchanged);
    assert_eq!(common::config_text(&layout), after_disable);
    assert!(!layout.content_path("1").exists());
}

#[test]
fn test_round_trip_restores_config_and_dirs() {
    let (_tmp, root) = common::setup_game_root();
    let layout = common::layout(&root);
    common::create_archive(&layout, "10");
    common::create_archive(&layout, "20");
    let mut rec = reconciler(&layout, ActivationMode::Workshop);
    rec.set_enabled("20", true).unwrap();

    let before_text = common::config_text(&layout);
    let before = rec.scan().unwrap();

    rec.set_enabled("10", true).unwrap();
    rec.set_enabled("10", false).unwrap();

    let after = rec.scan().unwrap();
    assert_eq!(common::config_text(&layout), before_text);
    assert_eq!(before.addons, after.addons);
}

#[test]
fn test_enabled_derives_from_presence_flags() {
    let (_tmp, root) = common::setup_game_root();
    let layout = common::layout(&root);
    common::create_archive(&layout, "1");
    common::create_archive(&layout, "2");
    common::create_content_dir(&layout, "2");
    common::create_content_dir(&layout, "3");
    let mut rec = reconciler(&layout, ActivationMode::Workshop);
    common::create_archive(&layout, "4");
    rec.set_enabled("4", true).unwrap();

    let outcome = rec.scan().unwrap();
    assert_eq!(outcome.addons.len(), 4);
    for addon in &outcome.addons {
        assert_eq!(addon.enabled(), addon.archive_present && addon.directory_present);
    }
    assert_eq!(outcome.enabled_count(), 2);
}

#[test]
fn test_present_but_unconfigured_is_drift() {
    let (_tmp, root) = common::setup_game_root();
    let layout = common::layout(&root);
    common::create_archive(&layout, "123");
    common::create_content_dir(&layout, "123");
    let rec = reconciler(&layout, ActivationMode::Workshop);

    let outcome = rec.scan().unwrap();
    let addon = outcome.get("123").unwrap();
    assert!(addon.archive_present);
    assert!(addon.directory_present);
    assert!(!addon.config_active);
    assert!(addon.enabled());
    assert!(outcome.issues.contains(&ScanIssue::PresentButInactive {
        id: "123".to_string()
    }));

    assert_eq!(rec.resync(&ids(&["123"])).unwrap(), ids(&["123"]));
}

#[test]
fn test_resync_flags_out_of_band_delete_without_fixing_it() {
    let (_tmp, root) = common::setup_game_root();
    let layout = common::layout(&root);
    common::create_archive(&layout, "7");
    common::create_archive(&layout, "8");
    let mut rec = reconciler(&layout, ActivationMode::Workshop);
    rec.set_enabled("7", true).unwrap();
    rec.set_enabled("8", true).unwrap();
    assert!(rec.resync(&ids(&["7", "8"])).unwrap().is_empty());

    fs::remove_dir_all(layout.content_path("7")).unwrap();
    let config = common::config_text(&layout);

    assert_eq!(rec.resync(&ids(&["7", "8"])).unwrap(), ids(&["7"]));
    assert!(!layout.content_path("7").exists());
    assert_eq!(common::config_text(&layout), config);
}

#[test]
fn test_config_failure_leaves_content_in_place() {
    let (_tmp, root) = common::setup_game_root();
    let layout = common::layout(&root);
    common::create_archive(&layout, "55");
    fs::write(&layout.config_path, "\"GameInfo\"\n{\n}\n").unwrap();
    let mut rec = reconciler(&layout, ActivationMode::Workshop);

    match rec.set_enabled("55", true) {
        Err(SError::PartialTransition { id, failed, cause }) => {
            assert_eq!(id, "55");
            assert_eq!(failed, TransitionHalf::Config);
            assert!(matches!(*cause, SError::ConfigSectionNotFound(_)));
        }
        other => panic!("expected a partial transition, got {other:?}"),
    }

    assert!(layout.content_path("55").is_dir());
    let outcome = rec.scan().unwrap();
    assert!(outcome.issues.contains(&ScanIssue::PresentButInactive {
        id: "55".to_string()
    }));
}

#[test]
fn test_enable_without_archive_is_not_found() {
    let (_tmp, root) = common::setup_game_root();
    let layout = common::layout(&root);
    let mut rec = reconciler(&layout, ActivationMode::Workshop);

    assert!(matches!(
        rec.set_enabled("404", true),
        Err(SError::AddonNotFound(_))
    ));
    assert!(!layout.content_path("404").exists());
}

#[test]
fn test_set_all_enabled_isolates_failures() {
    let (_tmp, root) = common::setup_game_root();
    let layout = common::layout(&root);
    common::create_archive(&layout, "1");
    common::create_archive(&layout, "2");
    // Directory without an archive: cannot be enabled.
    common::create_content_dir(&layout, "3");
    let mut rec = reconciler(&layout, ActivationMode::Workshop);

    let report = rec.set_all_enabled(true).unwrap();
    assert_eq!(report.len(), 3);
    assert_eq!(report["1"].as_ref().unwrap(), &TransitionOutcome::Enabled);
    assert_eq!(report["2"].as_ref().unwrap(), &TransitionOutcome::Enabled);
    assert!(matches!(report["3"], Err(SError::AddonNotFound(_))));

    let report = rec.set_all_enabled(false).unwrap();
    assert!(report.values().all(|r| r.is_ok()));
    assert_eq!(rec.scan().unwrap().enabled_count(), 0);
}

#[test]
fn test_scan_uses_cached_names() {
    let (_tmp, root) = common::setup_game_root();
    let layout = common::layout(&root);
    common::create_archive(&layout, "31");
    let names = Arc::new(RwLock::new(NameCache::default()));
    names.write().merge([&Metadata {
        id: "31".into(),
        title: "Better Tank".into(),
        description: "A tank".into(),
        file_size: None,
        result: ResultCode::Found,
    }]);
    let rec = Reconciler::new(layout.clone(), ActivationMode::Workshop, names);

    let outcome = rec.scan().unwrap();
    let addon = outcome.get("31").unwrap();
    assert_eq!(addon.display_name.as_deref(), Some("Better Tank"));
    assert_eq!(addon.description.as_deref(), Some("A tank"));
}

#[test]
fn test_restore_backup_after_transitions() {
    let (_tmp, root) = common::setup_game_root();
    let layout = common::layout(&root);
    let pristine = common::config_text(&layout);
    common::create_archive(&layout, "1");
    let mut rec = reconciler(&layout, ActivationMode::Workshop);

    rec.set_enabled("1", true).unwrap();
    assert_ne!(common::config_text(&layout), pristine);
    rec.restore_backup().unwrap();
    assert_eq!(common::config_text(&layout), pristine);
}

#[test]
fn test_pirate_mode_toggles_suffix() {
    let (_tmp, root) = common::setup_game_root();
    let layout = common::layout(&root);
    let enabled = common::create_loose_archive(&layout, "Tank Skin", false);
    let mut rec = reconciler(&layout, ActivationMode::Pirate);

    assert!(rec.scan().unwrap().get("Tank Skin").unwrap().enabled());

    assert_eq!(
        rec.set_enabled("Tank Skin", false).unwrap(),
        TransitionOutcome::Disabled
    );
    assert!(!enabled.exists());
    assert!(layout.addons_dir.join("Tank Skin.vpk.disabled").exists());
    assert_eq!(
        rec.set_enabled("Tank Skin", false).unwrap(),
        TransitionOutcome::Unchanged
    );
    assert!(!rec.scan().unwrap().get("Tank Skin").unwrap().enabled());

    assert_eq!(
        rec.set_enabled("Tank Skin", true).unwrap(),
        TransitionOutcome::Enabled
    );
    assert!(enabled.exists());
    assert!(rec.resync(&ids(&["Tank Skin"])).unwrap().is_empty());
}

#[test]
fn test_pirate_mode_refuses_collisions() {
    let (_tmp, root) = common::setup_game_root();
    let layout = common::layout(&root);
    common::create_loose_archive(&layout, "Map", false);
    common::create_loose_archive(&layout, "Map", true);
    let mut rec = reconciler(&layout, ActivationMode::Pirate);

    assert!(matches!(
        rec.set_enabled("Map", false),
        Err(SError::FileCollision(_))
    ));
    assert!(matches!(
        rec.set_enabled("Nope", true),
        Err(SError::AddonNotFound(_))
    ));
}

#[test]
fn test_invalid_ids_are_rejected_before_touching_disk() {
    let (_tmp, root) = common::setup_game_root();
    let layout = common::layout(&root);
    common::create_archive(&layout, "111");
    common::create_archive(&layout, "222");
    common::create_loose_archive(&layout, "Map", false);
    let config = common::config_text(&layout);
    let mut rec = reconciler(&layout, ActivationMode::Workshop);

    for (id, want) in [("", false), ("..", false), ("../x", false), ("", true)] {
        assert!(matches!(
            rec.set_enabled(id, want),
            Err(SError::InvalidId(_))
        ));
    }
    assert!(layout.content_dir.is_dir());
    assert!(layout.archive_path("111").exists());
    assert!(layout.archive_path("222").exists());
    assert!(layout.addons_dir.join("Map.vpk").exists());
    assert_eq!(common::config_text(&layout), config);

    let mut rec = reconciler(&layout, ActivationMode::Pirate);
    for id in ["../x", "..", "sub/Map"] {
        assert!(matches!(
            rec.set_enabled(id, false),
            Err(SError::InvalidId(_))
        ));
    }
    assert!(layout.addons_dir.join("Map.vpk").exists());
}

#[test]
fn test_non_utf8_config_scans_but_is_not_rewritten() {
    let (_tmp, root) = common::setup_game_root();
    let layout = common::layout(&root);
    common::create_archive(&layout, "7");
    let mut rec = reconciler(&layout, ActivationMode::Workshop);
    rec.set_enabled("7", true).unwrap();
    common::create_archive(&layout, "8");

    let mut file = fs::OpenOptions::new()
        .append(true)
        .open(&layout.config_path)
        .unwrap();
    file.write_all(b"// caf\xe9\n").unwrap();
    drop(file);
    let before = fs::read(&layout.config_path).unwrap();

    let outcome = rec.scan().unwrap();
    assert!(outcome.get("7").unwrap().config_active);
    assert!(outcome.get("8").is_some());

    match rec.set_enabled("8", true) {
        Err(SError::PartialTransition { id, failed, cause }) => {
            assert_eq!(id, "8");
            assert_eq!(failed, TransitionHalf::Config);
            assert!(matches!(*cause, SError::ParseError(_)));
        }
        other => panic!("expected a partial transition, got {other:?}"),
    }
    assert_eq!(fs::read(&layout.config_path).unwrap(), before);
}

#[test]
fn test_unreadable_config_is_a_scan_issue() {
    let (_tmp, root) = common::setup_game_root();
    let layout = common::layout(&root);
    common::create_archive(&layout, "9");
    fs::remove_file(&layout.config_path).unwrap();
    fs::create_dir_all(&layout.config_path).unwrap();
    let rec = reconciler(&layout, ActivationMode::Workshop);

    let outcome = rec.scan().unwrap();
    assert!(outcome.get("9").is_some());
    assert!(outcome
        .issues
        .iter()
        .any(|i| matches!(i, ScanIssue::Unreadable { path, .. } if *path == layout.config_path)));
}
