//! Viewer integration tests against the fixture engine

use std::sync::{Arc, Mutex};

use pretty_assertions::assert_eq;
use tokio_test::{assert_err, assert_ok};

use spingen_core::test_utils::{skin, spray, CallLog, EngineCall, FixtureEngine};
use spingen_core::{
    ArchiveFile, Discovery, LoadSummary, SpingenClient, SprayId, SpriteScale, ViewerConfig,
    WorkerConfig,
};
use spingen_viewer::{Notification, Notifier, Viewer};

#[derive(Default)]
struct Recorder(Mutex<Vec<Notification>>);

impl Recorder {
    fn seen(&self) -> Vec<Notification> {
        self.0.lock().unwrap().clone()
    }
}

impl Notifier for Recorder {
    fn notify(&self, notification: &Notification) {
        self.0.lock().unwrap().push(notification.clone());
    }
}

fn engine() -> FixtureEngine {
    FixtureEngine::new()
        .with_default_sprays(vec![spray("default"), spray("blue")])
        .with_archive(
            "kart.pk3",
            vec![
                Discovery::Spray(spray("red")),
                Discovery::Skin(skin(
                    "sonic",
                    &[("STIN", &["A", "B"]), ("SLWN", &["A", "B", "C"])],
                )),
                Discovery::Skin(skin("tails", &[("STIN", &["A"])])),
            ],
        )
        .with_archive(
            "extra.wad",
            vec![
                Discovery::Skin(skin("sonic", &[("STIN", &["Z"])])),
                Discovery::Skin(skin("knuckles", &[("STIN", &["A"])])),
            ],
        )
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn viewer_with(fixture: FixtureEngine) -> (Viewer, Arc<Recorder>) {
    init_tracing();
    let (client, _worker) = SpingenClient::start(fixture, &WorkerConfig::default()).unwrap();
    let recorder = Arc::new(Recorder::default());
    let mut viewer = Viewer::with_notifier(client, &ViewerConfig::default(), recorder.clone());
    viewer.ready().await.unwrap();
    (viewer, recorder)
}

async fn loaded_viewer() -> (Viewer, Arc<Recorder>) {
    let (mut viewer, recorder) = viewer_with(engine()).await;
    viewer
        .load_file(ArchiveFile::new("kart.pk3", vec![1, 2, 3]))
        .await
        .unwrap();
    (viewer, recorder)
}

fn sprays(viewer: &Viewer) -> Vec<&str> {
    viewer.catalog().sprays().iter().map(|s| s.id.as_str()).collect()
}

fn skins(viewer: &Viewer) -> Vec<&str> {
    viewer.catalog().skins().iter().map(|s| s.name.as_str()).collect()
}

#[tokio::test]
async fn test_ready_fills_default_sprays_without_slots() {
    let (viewer, _) = viewer_with(engine()).await;

    assert!(viewer.catalog().is_ready());
    assert_eq!(sprays(&viewer), vec!["default", "blue"]);
    assert_eq!(viewer.slot_count(), 0);
}

#[tokio::test]
async fn test_loaded_skins_get_thumbnails() {
    let (mut viewer, recorder) = loaded_viewer().await;

    assert_eq!(sprays(&viewer), vec!["default", "blue", "red"]);
    assert_eq!(skins(&viewer), vec!["sonic", "tails"]);
    assert!(viewer.settle().await.is_empty());

    assert_eq!(viewer.thumbnail("sonic").unwrap().bytes(), b"thumb:sonic:preferred");
    assert_eq!(viewer.thumbnail("tails").unwrap().bytes(), b"thumb:tails:preferred");
    assert_eq!(viewer.client().images().stats().live, 2);
    assert_eq!(
        recorder.seen(),
        vec![
            Notification::Loading {
                file: "kart.pk3".to_string()
            },
            Notification::Loaded {
                file: "kart.pk3".to_string(),
                summary: LoadSummary { sprays: 1, skins: 2 },
            },
        ]
    );
}

#[tokio::test]
async fn test_opening_a_skin_fetches_icons_and_preview() {
    let (mut viewer, _) = loaded_viewer().await;
    viewer.select_skin(Some("sonic"));
    assert!(viewer.settle().await.is_empty());

    assert_eq!(viewer.selected_skin().unwrap().name, "sonic");
    assert_eq!(viewer.preview().unwrap().bytes(), b"anim:sonic:preferred:STINA:1x");
    assert_eq!(
        viewer.spray_icon(&SprayId::new("red")).unwrap().bytes(),
        b"spray:red"
    );
    // 2 thumbnails, 3 icons, 1 preview
    assert_eq!(viewer.slot_count(), 6);
    assert_eq!(viewer.client().images().stats().live, 6);
}

#[tokio::test]
async fn test_choosing_a_spray_replaces_thumbnail_and_preview() {
    let (mut viewer, _) = loaded_viewer().await;
    viewer.select_skin(Some("sonic"));
    viewer.settle().await;
    let before = viewer.client().images().stats();

    viewer.select_spray(SprayId::new("red"));
    assert!(viewer.settle().await.is_empty());

    assert_eq!(viewer.spray_for("sonic"), Some(&SprayId::new("red")));
    assert_eq!(viewer.thumbnail("sonic").unwrap().bytes(), b"thumb:sonic:red");
    assert_eq!(viewer.preview().unwrap().bytes(), b"anim:sonic:red:STINA:1x");
    assert_eq!(viewer.thumbnail("tails").unwrap().bytes(), b"thumb:tails:preferred");

    let after = viewer.client().images().stats();
    assert_eq!(after.acquired - before.acquired, 2);
    assert_eq!(after.released - before.released, 2);
    assert_eq!(after.live, before.live);

    viewer.use_preferred_spray();
    viewer.settle().await;
    assert_eq!(viewer.spray_for("sonic"), None);
    assert_eq!(viewer.preview().unwrap().bytes(), b"anim:sonic:preferred:STINA:1x");
}

#[tokio::test]
async fn test_closing_the_skin_tears_down_its_slots() {
    let (mut viewer, _) = loaded_viewer().await;
    viewer.select_skin(Some("sonic"));
    viewer.settle().await;

    viewer.select_skin(None);

    assert_eq!(viewer.slot_count(), 2);
    assert!(viewer.preview().is_none());
    assert_eq!(viewer.client().images().stats().live, 2);
}

#[tokio::test]
async fn test_filtering_skins_releases_hidden_thumbnails() {
    let (mut viewer, _) = loaded_viewer().await;
    viewer.settle().await;

    viewer.show_only_skins(["tails"]);
    assert!(viewer.thumbnail("sonic").is_none());
    assert_eq!(viewer.client().images().stats().live, 1);

    viewer.show_all_skins();
    viewer.settle().await;
    assert_eq!(viewer.thumbnail("sonic").unwrap().bytes(), b"thumb:sonic:preferred");
    assert_eq!(viewer.client().images().stats().live, 2);
}

#[tokio::test]
async fn test_controls_drive_the_preview() {
    let fixture = engine();
    let log = fixture.log();
    let (mut viewer, _) = viewer_with(fixture).await;
    viewer
        .load_file(ArchiveFile::new("kart.pk3", vec![]))
        .await
        .unwrap();
    viewer.select_skin(Some("sonic"));
    viewer.settle().await;

    viewer.set_sprite("SLWN");
    viewer.set_frame("C");
    viewer.set_scale(SpriteScale::X4);
    assert!(viewer.settle().await.is_empty());
    assert_eq!(viewer.preview().unwrap().bytes(), b"anim:sonic:preferred:SLWNC:4x");

    // C does not exist in STIN, so the frame goes back to A
    viewer.set_sprite("STIN");
    viewer.settle().await;
    assert_eq!(viewer.controls().frame(), "A");

    // Unknown sprite resets to STIN/A, which is what is already shown
    let animations = |log: &CallLog| {
        log.count(|c| matches!(c, EngineCall::SkinAnimation { .. }))
    };
    let before = animations(&log);
    viewer.set_sprite("DEAD");
    assert_eq!(viewer.settle().await, vec![]);
    assert_eq!(animations(&log), before);
    assert_eq!(viewer.controls().sprite(), "STIN");

    viewer.reset_controls();
    viewer.settle().await;
    assert_eq!(viewer.preview().unwrap().bytes(), b"anim:sonic:preferred:STINA:1x");
}

#[tokio::test]
async fn test_second_archive_duplicates_are_ignored() {
    let (mut viewer, recorder) = loaded_viewer().await;
    let summary = viewer
        .load_file(ArchiveFile::new("extra.wad", vec![]))
        .await
        .unwrap();

    // The worker still reports both; the catalog keeps the first sonic
    assert_eq!(summary, Some(LoadSummary { sprays: 0, skins: 2 }));
    assert_eq!(skins(&viewer), vec!["sonic", "tails", "knuckles"]);
    assert!(viewer.catalog().skin("sonic").unwrap().sprites.contains("SLWN"));
    assert_eq!(recorder.seen().len(), 4);
}

#[tokio::test]
async fn test_files_load_independently() {
    let (mut viewer, recorder) = viewer_with(engine()).await;
    let results = viewer
        .load_files(vec![
            ArchiveFile::new("kart.pk3", vec![]),
            ArchiveFile::new("broken.wad", vec![]),
            ArchiveFile::new("readme.txt", vec![]),
        ])
        .await;

    assert_eq!(results[0], Ok(Some(LoadSummary { sprays: 1, skins: 2 })));
    assert_ok!(results[0].clone());
    assert!(assert_err!(results[1].clone()).is_engine());
    assert_eq!(results[2], Ok(None));
    assert_eq!(skins(&viewer), vec!["sonic", "tails"]);

    let file = |name: &str| name.to_string();
    assert_eq!(
        recorder.seen(),
        vec![
            Notification::Loading { file: file("kart.pk3") },
            Notification::Loaded {
                file: file("kart.pk3"),
                summary: LoadSummary { sprays: 1, skins: 2 },
            },
            Notification::Loading { file: file("broken.wad") },
            Notification::Failed {
                file: file("broken.wad"),
                error: "Failed to read broken.wad: not a valid archive".to_string(),
            },
            Notification::Skipped { file: file("readme.txt") },
        ]
    );
}

#[tokio::test]
async fn test_load_path_reads_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let archive = dir.path().join("kart.pk3");
    std::fs::write(&archive, b"PK\x03\x04").unwrap();

    let (mut viewer, recorder) = viewer_with(engine()).await;
    let summary = viewer.intake().load_path(&archive).await.unwrap();
    assert_eq!(summary, Some(LoadSummary { sprays: 1, skins: 2 }));

    viewer.sync();
    assert_eq!(skins(&viewer), vec!["sonic", "tails"]);

    let missing = dir.path().join("gone.wad");
    assert!(viewer.intake().load_path(&missing).await.is_err());
    assert!(matches!(
        recorder.seen().last(),
        Some(Notification::Failed { file, .. }) if file == "gone.wad"
    ));
}
