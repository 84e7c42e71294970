mod common;

use common::{InstrumentedFs, Trees};
use converge_transfer::{
    Cause, Direction, FileSystem, LinkOption, LocalFileSystem, ResourcesSpecification,
    TeraTemplating, TransferBehavior, TransferEngine, TransferError, TransferUnit, UnitErrorKind,
    resolve_all,
};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn local() -> Arc<dyn FileSystem> {
    Arc::new(LocalFileSystem)
}

fn upload(max_par: usize) -> TransferEngine {
    TransferEngine::new(local(), local(), Direction::Upload, max_par)
}

fn file_units(trees: &Trees, count: usize) -> Vec<TransferUnit> {
    (0..count)
        .map(|i| {
            let name = format!("f{}.txt", i);
            let source = trees.source_file(&name, &format!("content {}", i));
            TransferUnit::new(source, trees.dst().join(&name), trees.src())
        })
        .collect()
}

fn mode_of(path: &Path) -> u32 {
    std::fs::metadata(path).unwrap().permissions().mode() & 0o7777
}

#[tokio::test]
async fn test_pool_never_exceeds_max_par_and_collects_failures() {
    let trees = Trees::new();
    let units = file_units(&trees, 10);

    let source_fs = Arc::new(InstrumentedFs::new().with_read_delay(Duration::from_millis(30)));
    let destination_fs = Arc::new(InstrumentedFs::new());
    destination_fs.fail_write(trees.dst().join("f3.txt"));

    let engine = TransferEngine::new(
        source_fs.clone(),
        destination_fs.clone(),
        Direction::Upload,
        3,
    );
    let err = engine
        .run(units, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(source_fs.max_active() <= 3);
    assert_eq!(source_fs.reads(), 10);

    let TransferError::Failed(errors) = &err else {
        panic!("expected a failed run, got {:?}", err);
    };
    assert_eq!(errors.len(), 1);
    assert!(err.to_string().contains("f3.txt"));

    // The units that made it are still reported.
    let report = err.report().unwrap();
    assert_eq!(report.transferred(), 9);
    assert!(!report.contains(&trees.dst().join("f3.txt")));

    for i in (0..10).filter(|i| *i != 3) {
        assert_eq!(trees.read_dst(&format!("f{}.txt", i)), format!("content {}", i));
    }
    assert!(!trees.dst().join("f3.txt").exists());
}

#[tokio::test]
async fn test_pool_is_limited_by_the_number_of_units() {
    let trees = Trees::new();
    let units = file_units(&trees, 2);
    let source_fs = Arc::new(InstrumentedFs::new().with_read_delay(Duration::from_millis(20)));

    let engine = TransferEngine::new(source_fs.clone(), local(), Direction::Upload, 10);
    let report = engine.run(units, &CancellationToken::new()).await.unwrap();

    assert_eq!(report.transferred(), 2);
    assert!(source_fs.max_active() <= 2);
}

#[tokio::test]
async fn test_worker_panic_is_critical_and_others_finish() {
    let trees = Trees::new();
    let units = file_units(&trees, 4);

    let source_fs = Arc::new(InstrumentedFs::new());
    source_fs.panic_on_read(trees.src().join("f1.txt"));
    // A regular failure does not hide the crash.
    let destination_fs = Arc::new(InstrumentedFs::new());
    destination_fs.fail_write(trees.dst().join("f2.txt"));

    let engine = TransferEngine::new(source_fs, destination_fs, Direction::Upload, 2);
    let err = engine
        .run(units, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, TransferError::Critical(_)));
    assert_eq!(err.causes().len(), 2);
    assert!(
        err.causes()
            .iter()
            .any(|c| matches!(c, Cause::Worker(m) if m.contains("injected panic")))
    );
    assert_eq!(trees.read_dst("f0.txt"), "content 0");
    assert_eq!(trees.read_dst("f3.txt"), "content 3");
    assert_eq!(err.report().map(|r| r.transferred()), Some(2));
}

#[tokio::test]
async fn test_cancelled_before_start_transfers_nothing() {
    let trees = Trees::new();
    let units = file_units(&trees, 3);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = upload(3).run(units, &cancel).await.unwrap_err();

    assert!(err.is_interrupted());
    assert!(err.causes().is_empty());
    assert!(err.report().is_some_and(|r| r.is_empty()));
    assert!(!trees.dst().join("f0.txt").exists());
}

#[tokio::test]
async fn test_cancel_lets_in_flight_units_finish() {
    let trees = Trees::new();
    let units = file_units(&trees, 5);
    let source_fs = Arc::new(InstrumentedFs::new().with_read_delay(Duration::from_millis(200)));
    let engine = TransferEngine::new(source_fs, local(), Direction::Upload, 1);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = engine.run(units, &cancel).await.unwrap_err();

    assert!(err.is_interrupted());
    assert_eq!(trees.read_dst("f0.txt"), "content 0");
    assert!(!trees.dst().join("f4.txt").exists());

    let report = err.report().unwrap();
    assert!(report.contains(&trees.dst().join("f0.txt")));
    assert!(!report.contains(&trees.dst().join("f4.txt")));
}

#[tokio::test]
async fn test_missing_source_is_skipped() {
    let trees = Trees::new();
    let unit = TransferUnit::new(
        trees.src().join("absent.txt"),
        trees.dst().join("absent.txt"),
        trees.src(),
    );

    let report = upload(1)
        .run(vec![unit], &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.missing(), 1);
    assert!(!trees.dst().join("absent.txt").exists());
}

#[tokio::test]
async fn test_parent_directories_are_created() {
    let trees = Trees::new();
    let source = trees.source_file("a.txt", "a");
    let unit = TransferUnit::new(source, trees.dst().join("deep/er/a.txt"), trees.src());

    upload(1)
        .run(vec![unit], &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(trees.read_dst("deep/er/a.txt"), "a");
}

#[tokio::test]
async fn test_unsafe_link_is_copied_and_safe_link_is_kept() {
    let trees = Trees::new();
    std::fs::write(trees.dir.path().join("outside.txt"), "secret").unwrap();
    trees.source_file("v2.txt", "v2");
    std::os::unix::fs::symlink("../outside.txt", trees.src().join("escape")).unwrap();
    std::os::unix::fs::symlink("v2.txt", trees.src().join("current")).unwrap();

    let units = vec![
        TransferUnit::new(trees.src().join("escape"), trees.dst().join("escape"), trees.src()),
        TransferUnit::new(trees.src().join("current"), trees.dst().join("current"), trees.src()),
    ];
    upload(2)
        .run(units, &CancellationToken::new())
        .await
        .unwrap();

    let escape = trees.dst().join("escape");
    assert!(!std::fs::symlink_metadata(&escape).unwrap().file_type().is_symlink());
    assert_eq!(std::fs::read_to_string(&escape).unwrap(), "secret");

    let current = trees.dst().join("current");
    assert!(std::fs::symlink_metadata(&current).unwrap().file_type().is_symlink());
    assert_eq!(std::fs::read_link(&current).unwrap(), Path::new("v2.txt"));
}

#[tokio::test]
async fn test_keep_links_recreates_then_skips_identical_link() {
    let trees = Trees::new();
    std::os::unix::fs::symlink("/nowhere/at/all", trees.src().join("dangling")).unwrap();
    let unit = TransferUnit::new(
        trees.src().join("dangling"),
        trees.dst().join("dangling"),
        trees.src(),
    )
    .with_link_option(LinkOption::KeepLinks);

    let engine = upload(1);
    let first = engine
        .run(vec![unit.clone()], &CancellationToken::new())
        .await
        .unwrap();
    let second = engine
        .run(vec![unit], &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(first.transferred(), 1);
    assert_eq!(second.skipped(), 1);
    assert_eq!(
        std::fs::read_link(trees.dst().join("dangling")).unwrap(),
        Path::new("/nowhere/at/all")
    );
}

#[tokio::test]
async fn test_copy_links_with_dangling_target_removes_stale_destination() {
    let trees = Trees::new();
    std::os::unix::fs::symlink("gone.txt", trees.src().join("link")).unwrap();
    std::fs::write(trees.dst().join("link"), "stale").unwrap();
    let unit = TransferUnit::new(trees.src().join("link"), trees.dst().join("link"), trees.src())
        .with_link_option(LinkOption::CopyLinks);

    let report = upload(1)
        .run(vec![unit], &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.missing(), 1);
    assert!(std::fs::symlink_metadata(trees.dst().join("link")).is_err());
}

#[tokio::test]
async fn test_transfer_behaviors() {
    let trees = Trees::new();
    for name in ["skip.txt", "fail.txt", "force.txt"] {
        trees.source_file(name, "new");
        std::fs::write(trees.dst().join(name), "old").unwrap();
    }
    let unit = |name: &str, behavior| {
        TransferUnit::new(trees.src().join(name), trees.dst().join(name), trees.src())
            .with_behavior(behavior)
    };

    let err = upload(3)
        .run(
            vec![
                unit("skip.txt", TransferBehavior::SkipIfExists),
                unit("fail.txt", TransferBehavior::FailIfExists),
                unit("force.txt", TransferBehavior::ForceOverwrite),
            ],
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, TransferError::Failed(_)));
    assert_eq!(err.causes().len(), 1);
    assert!(matches!(
        &err.causes()[0],
        Cause::Unit(e) if matches!(e.kind, UnitErrorKind::AlreadyExists(_))
    ));
    assert_eq!(trees.read_dst("skip.txt"), "old");
    assert_eq!(trees.read_dst("fail.txt"), "old");
    assert_eq!(trees.read_dst("force.txt"), "new");
}

#[tokio::test]
async fn test_force_overwrite_replaces_a_directory() {
    let trees = Trees::new();
    let source = trees.source_file("conf", "file now");
    std::fs::create_dir_all(trees.dst().join("conf/old")).unwrap();

    upload(1)
        .run(
            vec![TransferUnit::new(source, trees.dst().join("conf"), trees.src())],
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(trees.read_dst("conf"), "file now");
}

#[tokio::test]
async fn test_modes_are_applied() {
    let trees = Trees::new();
    let file = trees.source_file("bin/run.sh", "#!/bin/sh\n");
    let units = vec![
        TransferUnit::new(trees.src().join("bin"), trees.dst().join("bin"), trees.src())
            .with_dir_mode(0o750),
        TransferUnit::new(file, trees.dst().join("bin/run.sh"), trees.src()).with_file_mode(0o700),
    ];

    upload(1)
        .run(units, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(mode_of(&trees.dst().join("bin")), 0o750);
    assert_eq!(mode_of(&trees.dst().join("bin/run.sh")), 0o700);
}

#[tokio::test]
async fn test_skip_if_exists_still_applies_mode() {
    let trees = Trees::new();
    let source = trees.source_file("app.env", "new");
    let destination = trees.dst().join("app.env");
    std::fs::write(&destination, "old").unwrap();
    std::fs::set_permissions(&destination, std::fs::Permissions::from_mode(0o644)).unwrap();

    let report = upload(1)
        .run(
            vec![
                TransferUnit::new(source, destination.clone(), trees.src())
                    .with_behavior(TransferBehavior::SkipIfExists)
                    .with_file_mode(0o600),
            ],
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(report.skipped(), 1);
    assert_eq!(trees.read_dst("app.env"), "old");
    assert_eq!(mode_of(&destination), 0o600);
}

#[tokio::test]
async fn test_upload_renders_templates() {
    let trees = Trees::new();
    let source = trees.source_file("app.conf", "port={{ port }}");
    let mut templating = TeraTemplating::new().unwrap();
    templating.add_variable("port", serde_json::json!(8080));

    let engine = upload(1).with_templating(Arc::new(templating));
    engine
        .run(
            vec![
                TransferUnit::new(source.clone(), trees.dst().join("app.conf"), trees.src())
                    .with_template(true),
            ],
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(trees.read_dst("app.conf"), "port=8080");
    assert_eq!(std::fs::read_to_string(source).unwrap(), "port={{ port }}");
}

#[tokio::test]
async fn test_download_renders_destination_in_place() {
    let trees = Trees::new();
    let source = trees.source_file("motd", "hello {{ who }}");
    let mut templating = TeraTemplating::new().unwrap();
    templating.add_variable("who", serde_json::json!("world"));

    let engine = TransferEngine::new(local(), local(), Direction::Download, 1)
        .with_templating(Arc::new(templating));
    engine
        .run(
            vec![TransferUnit::new(source, trees.dst().join("motd"), trees.src()).with_template(true)],
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(trees.read_dst("motd"), "hello world");
}

#[tokio::test]
async fn test_template_without_handler_fails_the_unit() {
    let trees = Trees::new();
    let source = trees.source_file("app.conf", "{{ x }}");

    let err = upload(1)
        .run(
            vec![TransferUnit::new(source, trees.dst().join("app.conf"), trees.src()).with_template(true)],
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        &err.causes()[0],
        Cause::Unit(e) if matches!(e.kind, UnitErrorKind::NoTemplatingHandler(_))
    ));
}

#[tokio::test]
async fn test_resolved_specification_end_to_end() {
    let trees = Trees::new();
    trees.source_file("site/index.html", "<h1/>");
    trees.source_file("site/css/main.css", "body{}");
    trees.source_file("site/notes.md", "skip me");

    let mut spec = ResourcesSpecification::new(trees.src(), "site/**/*.*ss", trees.dst());
    spec.file_mode = Some(0o644);
    let mut html = ResourcesSpecification::new(trees.src(), "site/*.html", trees.dst());
    html.transfer_behavior = TransferBehavior::SkipIfExists;

    let units = resolve_all(&[spec, html]).unwrap();
    let report = upload(4)
        .run(units, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.transferred(), 2);
    assert_eq!(trees.read_dst("site/css/main.css"), "body{}");
    assert_eq!(trees.read_dst("site/index.html"), "<h1/>");
    assert_eq!(mode_of(&trees.dst().join("site/css/main.css")), 0o644);
    assert!(!trees.dst().join("site/notes.md").exists());
}

#[tokio::test]
async fn test_broken_template_fails_even_when_destination_is_kept() {
    let trees = Trees::new();
    let source = trees.source_file("app.conf", "port={{ port");
    std::fs::write(trees.dst().join("app.conf"), "old").unwrap();
    let templating = TeraTemplating::new().unwrap();

    let err = upload(1)
        .with_templating(Arc::new(templating))
        .run(
            vec![
                TransferUnit::new(source, trees.dst().join("app.conf"), trees.src())
                    .with_template(true)
                    .with_behavior(TransferBehavior::SkipIfExists),
            ],
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, TransferError::Failed(_)));
    assert!(matches!(
        &err.causes()[0],
        Cause::Unit(e) if matches!(e.kind, UnitErrorKind::Template(_))
    ));
    assert_eq!(trees.read_dst("app.conf"), "old");
}
