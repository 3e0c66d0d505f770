use super::*;
use tempfile::TempDir;

fn library() -> (TempDir, PipelineLibrary) {
    let dir = tempfile::tempdir().unwrap();
    let library = PipelineLibrary::open(dir.path(), None).unwrap();
    (dir, library)
}

fn item(name: &str, created: i64, used: i64, favorite: bool) -> PipelineItem {
    PipelineItem {
        id: format!("id-{}", name),
        name: name.to_string(),
        pipeline: "videotestsrc ! fakesink".to_string(),
        created_time: created,
        last_used_time: used,
        is_favorite: favorite,
    }
}

#[test]
fn empty_library_loads_nothing() {
    let (_dir, library) = library();
    assert!(library.load().unwrap().is_empty());
    assert_eq!(library.export_json().unwrap(), "[]");
}

#[test]
fn add_update_delete() {
    let (_dir, library) = library();
    let mut entry = PipelineItem::new("Ball", "videotestsrc pattern=ball ! autovideosink");
    library.add(entry.clone()).unwrap();
    assert_eq!(library.get(&entry.id).unwrap().as_ref(), Some(&entry));

    entry.pipeline = "rtspsrc location=rtsp://cam ! decodebin ! autovideosink".into();
    assert!(library.update(entry.clone()).unwrap());
    let stored = library.get(&entry.id).unwrap().unwrap();
    assert_eq!(stored.category(), PipelineCategory::Rtsp);

    assert!(!library.update(item("ghost", 0, 0, false)).unwrap());
    assert!(library.delete(&entry.id).unwrap());
    assert!(!library.delete(&entry.id).unwrap());
    assert!(library.load().unwrap().is_empty());
}

#[test]
fn touch_updates_last_used() {
    let (_dir, library) = library();
    library.add(item("old", 10, 10, false)).unwrap();
    let touched = library.touch("id-old").unwrap();
    assert!(touched.last_used_time > 10);
    assert_eq!(library.get("id-old").unwrap().unwrap().last_used_time, touched.last_used_time);
    assert!(matches!(library.touch("missing"), Err(LibraryError::NotFound(_))));
}

#[test]
fn favourites_sort_first_in_every_order() {
    let (_dir, library) = library();
    library
        .save(&[
            item("charlie", 3, 1, false),
            item("Alpha", 1, 3, false),
            item("bravo", 2, 2, true),
            item("delta", 4, 0, true),
        ])
        .unwrap();

    let names = |order| -> Vec<String> {
        library.sorted(order).unwrap().into_iter().map(|i| i.name).collect()
    };
    assert_eq!(names(SortOrder::Name), ["bravo", "delta", "Alpha", "charlie"]);
    assert_eq!(names(SortOrder::Recent), ["bravo", "delta", "Alpha", "charlie"]);
    assert_eq!(names(SortOrder::Created), ["delta", "bravo", "charlie", "Alpha"]);
}

#[test]
fn sort_order_parses_case_insensitively() {
    assert_eq!("Recent".parse::<SortOrder>().unwrap(), SortOrder::Recent);
    assert!("size".parse::<SortOrder>().is_err());
}

#[test]
fn import_validates_every_entry_before_writing() {
    let (_dir, library) = library();
    library.add(item("keep", 1, 1, false)).unwrap();

    let bad = r#"[{"name":"a","pipeline":"fakesrc ! fakesink"},{"name":"b"}]"#;
    assert!(matches!(library.import_json(bad), Err(LibraryError::Invalid(_))));
    assert_eq!(library.load().unwrap().len(), 1);
    assert!(library.import_json("not json").is_err());

    let good = r#"[{"name":"a","pipeline":"fakesrc ! fakesink","isFavorite":true}]"#;
    assert_eq!(library.import_json(good).unwrap(), 1);
    let items = library.load().unwrap();
    assert_eq!(items.len(), 1);
    assert!(items[0].is_favorite);
    assert!(!items[0].id.is_empty());
}

#[test]
fn export_round_trips_through_import() {
    let (_dir, library) = library();
    library.save(&[item("one", 1, 2, true), item("two", 3, 4, false)]).unwrap();
    let exported = library.export_json().unwrap();

    let (_other_dir, other) = self::library();
    other.import_json(&exported).unwrap();
    assert_eq!(other.load().unwrap(), library.load().unwrap());
}

#[test]
fn backups_are_written_and_importable() {
    let dir = tempfile::tempdir().unwrap();
    let backups = dir.path().join("backups");
    let library = PipelineLibrary::open(&dir.path().join("lib"), Some(&backups)).unwrap();

    library
        .add(PipelineItem::new("Front cam/HD", "v4l2src ! autovideosink").favorite())
        .unwrap();
    let files = library.list_pipeline_files().unwrap();
    assert_eq!(files, vec![backups.join("Front_cam_HD.gstpipe")]);

    let contents: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&files[0]).unwrap()).unwrap();
    assert_eq!(contents["name"], "Front cam/HD");
    assert_eq!(contents["pipeline"], "v4l2src ! autovideosink");

    let imported = library.import_pipeline_file(&files[0]).unwrap();
    assert!(!imported.is_favorite);
    let items = library.load().unwrap();
    assert_eq!(items.len(), 2);
    assert_ne!(items[0].id, items[1].id);
}

#[test]
fn no_backup_dir_lists_no_files() {
    let (_dir, library) = library();
    library.add(item("x", 1, 1, false)).unwrap();
    assert!(library.list_pipeline_files().unwrap().is_empty());
}

#[test]
fn sanitized_names_keep_safe_characters() {
    assert_eq!(sanitize_file_name("cam-1_main"), "cam-1_main");
    assert_eq!(sanitize_file_name("a b.c/d"), "a_b_c_d");
}

#[test]
fn templates_only_seed_an_empty_library() {
    let (_dir, library) = library();
    assert_eq!(templates::load_defaults_if_empty(&library).unwrap(), 2);
    assert_eq!(templates::load_defaults_if_empty(&library).unwrap(), 0);

    let items = library.sorted(SortOrder::Name).unwrap();
    let names: Vec<_> = items.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, ["CDS_HIGH_LOW", "VAST"]);
    assert!(items.iter().all(|i| i.is_favorite));
    assert!(items.iter().all(|i| i.category() == PipelineCategory::Udp));
}

#[test]
fn status_tracker_persists_the_active_id() {
    let dir = tempfile::tempdir().unwrap();
    let tracker = StatusTracker::new(dir.path());
    assert_eq!(tracker.active(), None);

    tracker.set_active("abc").unwrap();
    assert!(StatusTracker::new(dir.path()).is_active("abc"));
    assert!(!tracker.is_active("def"));

    tracker.clear().unwrap();
    assert_eq!(tracker.active(), None);
}
