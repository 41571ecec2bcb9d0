use super::*;
use crate::memory::MemoryStore;
use shared::domain::EventFields;
use std::time::Duration;
use tokio::time::timeout;

#[derive(Default)]
struct RecordingRenderer {
    frames: usize,
    live: bool,
    rows: Vec<String>,
    tracks: Vec<String>,
    form_open: bool,
    errors: Vec<String>,
}

impl Renderer for RecordingRenderer {
    fn render(&mut self, frame: &ViewFrame<'_>) {
        self.frames += 1;
        self.live = frame.live;
        self.rows = frame.rows.iter().map(|r| r.fields.nombre.clone()).collect();
        self.tracks = frame.tracks.to_vec();
        self.form_open = frame.draft.open;
    }

    fn report(&mut self, error: &DashboardError) {
        self.errors.push(error.to_string());
    }
}

fn talk(nombre: &str, track: &str, estado: Estado) -> EventFields {
    EventFields {
        nombre: nombre.into(),
        expo: "speaker".into(),
        hora: "09:30".into(),
        track: track.into(),
        estado,
    }
}

async fn seeded() -> (MemoryStore, Dashboard<RecordingRenderer>) {
    let store = MemoryStore::with_records(
        "devfest",
        [
            talk("Opening", "A", Estado::Finished),
            talk("Async Rust", "B", Estado::InProgress),
            talk("Closing", "A", Estado::NotStarted),
        ],
    )
    .await;
    let renderer = RecordingRenderer::default();
    let mut dashboard = Dashboard::new(Arc::new(store.clone()), "devfest", renderer);
    dashboard.activate().await;
    pump(&mut dashboard, 1).await;
    (store, dashboard)
}

/// Handles exactly `events` snapshot pushes or completions.
async fn pump(dashboard: &mut Dashboard<RecordingRenderer>, events: usize) {
    for _ in 0..events {
        timeout(Duration::from_secs(2), dashboard.pump())
            .await
            .expect("event in time");
    }
}

fn field(field: DraftField, value: &str) -> Intent {
    Intent::SetDraftField {
        field,
        value: value.into(),
    }
}

#[tokio::test]
async fn activation_renders_live_view_with_in_progress_first() {
    let (_store, dashboard) = seeded().await;

    let renderer = dashboard.renderer();
    assert!(renderer.live);
    assert_eq!(renderer.rows, vec!["Async Rust", "Opening", "Closing"]);
    assert_eq!(renderer.tracks, vec!["A", "B"]);
}

#[tokio::test]
async fn selecting_a_track_rerenders_without_a_store_call() {
    let (_store, mut dashboard) = seeded().await;
    let before = dashboard.renderer().frames;

    dashboard.handle_intent(Intent::SelectTrack(Some("A".into())));
    assert_eq!(dashboard.renderer().rows, vec!["Opening", "Closing"]);

    dashboard.handle_intent(Intent::SelectTrack(None));
    assert_eq!(dashboard.renderer().rows.len(), 3);
    assert_eq!(dashboard.renderer().frames, before + 2);
}

#[tokio::test]
async fn status_change_shows_up_through_the_next_snapshot() {
    let (store, mut dashboard) = seeded().await;
    let id = store.records("devfest").await[2].id.clone();

    dashboard.handle_intent(Intent::SetStatus {
        id,
        estado: Estado::InProgress,
    });
    // Nothing changes locally until the store pushes.
    assert_eq!(dashboard.renderer().rows, vec!["Async Rust", "Opening", "Closing"]);

    pump(&mut dashboard, 2).await;
    assert_eq!(dashboard.renderer().rows, vec!["Async Rust", "Closing", "Opening"]);
    assert!(dashboard.renderer().errors.is_empty());
}

#[tokio::test]
async fn successful_create_closes_the_form() {
    let (store, mut dashboard) = seeded().await;

    dashboard.handle_intent(Intent::OpenCreate);
    dashboard.handle_intent(field(DraftField::Nombre, "Lightning talks"));
    dashboard.handle_intent(field(DraftField::Track, "C"));
    dashboard.handle_intent(Intent::Submit);
    assert!(dashboard.renderer().form_open);

    pump(&mut dashboard, 2).await;
    assert!(!dashboard.renderer().form_open);
    assert_eq!(dashboard.state().draft(), &Draft::default());

    let records = store.records("devfest").await;
    assert_eq!(records.len(), 4);
    assert_eq!(records[3].fields.nombre, "Lightning talks");
    assert_eq!(records[3].fields.estado, Estado::NotStarted);
    assert_eq!(dashboard.renderer().tracks, vec!["A", "B", "C"]);
}

#[tokio::test]
async fn failed_create_keeps_the_draft_open() {
    let (store, mut dashboard) = seeded().await;
    store.fail_writes("offline").await;

    dashboard.handle_intent(Intent::OpenCreate);
    dashboard.handle_intent(field(DraftField::Nombre, "Lost talk"));
    dashboard.handle_intent(Intent::Submit);
    pump(&mut dashboard, 1).await;

    let draft = dashboard.state().draft();
    assert!(draft.open);
    assert_eq!(draft.fields.nombre, "Lost talk");
    assert_eq!(dashboard.renderer().errors.len(), 1);
    assert!(dashboard.renderer().errors[0].starts_with("create failed"));
    assert_eq!(store.records("devfest").await.len(), 3);
}

#[tokio::test]
async fn edit_overwrites_every_field() {
    let (store, mut dashboard) = seeded().await;
    let id = store.records("devfest").await[0].id.clone();

    dashboard.handle_intent(Intent::OpenEdit(id.clone()));
    assert_eq!(dashboard.state().draft().fields.nombre, "Opening");
    dashboard.handle_intent(field(DraftField::Hora, "18:00"));
    dashboard.handle_intent(field(DraftField::Estado, "in_progress"));
    dashboard.handle_intent(Intent::Submit);
    pump(&mut dashboard, 2).await;

    assert!(!dashboard.state().draft().open);
    let updated = store.records("devfest").await.into_iter().find(|r| r.id == id).expect("record");
    assert_eq!(updated.fields.hora, "18:00");
    assert_eq!(updated.fields.estado, Estado::InProgress);
    assert_eq!(updated.fields.nombre, "Opening");
}

#[tokio::test]
async fn failed_edit_keeps_form_and_target() {
    let (store, mut dashboard) = seeded().await;
    let id = store.records("devfest").await[0].id.clone();
    store.fail_writes("offline").await;

    dashboard.handle_intent(Intent::OpenEdit(id.clone()));
    dashboard.handle_intent(field(DraftField::Hora, "23:00"));
    dashboard.handle_intent(Intent::Submit);
    pump(&mut dashboard, 1).await;

    let draft = dashboard.state().draft();
    assert!(draft.open);
    assert_eq!(draft.editing, Some(id));
    assert_eq!(draft.fields.hora, "23:00");
    assert_eq!(draft.fields.nombre, "Opening");
    assert!(dashboard.renderer().errors[0].starts_with("edit failed"));
    assert_eq!(store.records("devfest").await[0].fields.hora, "09:30");
}

#[tokio::test]
async fn editing_a_deleted_event_reports_and_keeps_the_form() {
    let (store, mut dashboard) = seeded().await;
    let id = store.records("devfest").await[0].id.clone();

    dashboard.handle_intent(Intent::OpenEdit(id.clone()));
    store.delete_by_id("devfest", &id).await.expect("delete");
    dashboard.handle_intent(field(DraftField::Nombre, "Renamed"));
    dashboard.handle_intent(Intent::Submit);
    // Snapshot without the record, then the rejected edit.
    pump(&mut dashboard, 2).await;

    let draft = dashboard.state().draft();
    assert!(draft.open);
    assert_eq!(draft.editing, Some(id));
    assert_eq!(draft.fields.nombre, "Renamed");
    assert_eq!(dashboard.renderer().errors.len(), 1);
    assert!(dashboard.renderer().errors[0].starts_with("edit failed"));
    assert_eq!(store.records("devfest").await.len(), 2);
}

#[tokio::test]
async fn completion_of_an_abandoned_submit_leaves_new_form_alone() {
    let (_store, mut dashboard) = seeded().await;

    dashboard.handle_intent(Intent::OpenCreate);
    dashboard.handle_intent(field(DraftField::Nombre, "First"));
    dashboard.handle_intent(Intent::Submit);
    dashboard.handle_intent(Intent::CancelForm);
    dashboard.handle_intent(Intent::OpenCreate);
    dashboard.handle_intent(field(DraftField::Nombre, "Second"));

    pump(&mut dashboard, 2).await;
    let draft = dashboard.state().draft();
    assert!(draft.open);
    assert_eq!(draft.fields.nombre, "Second");
}

#[tokio::test]
async fn submit_with_closed_form_does_nothing() {
    let (store, mut dashboard) = seeded().await;
    dashboard.handle_intent(Intent::Submit);

    let nothing = timeout(Duration::from_millis(200), dashboard.pump()).await;
    assert!(nothing.is_err());
    assert_eq!(store.records("devfest").await.len(), 3);
}

#[tokio::test]
async fn delete_removes_the_row() {
    let (store, mut dashboard) = seeded().await;
    let id = store.records("devfest").await[1].id.clone();

    dashboard.handle_intent(Intent::Delete(id));
    pump(&mut dashboard, 2).await;

    assert_eq!(dashboard.renderer().rows, vec!["Opening", "Closing"]);
}

#[tokio::test]
async fn status_change_on_unknown_id_is_reported() {
    let (_store, mut dashboard) = seeded().await;

    dashboard.handle_intent(Intent::SetStatus {
        id: EventId::new("ghost"),
        estado: Estado::Finished,
    });
    pump(&mut dashboard, 1).await;

    assert_eq!(dashboard.renderer().errors.len(), 1);
    assert!(dashboard.renderer().errors[0].starts_with("status change failed"));
}

#[tokio::test]
async fn subscription_failure_clears_the_view() {
    let (store, mut dashboard) = seeded().await;

    store.break_subscriptions("devfest", "permission denied").await;
    pump(&mut dashboard, 1).await;

    let renderer = dashboard.renderer();
    assert!(!renderer.live);
    assert!(renderer.rows.is_empty());
    assert!(renderer.errors[0].starts_with("live subscription failed"));
    assert!(!dashboard.is_live());
}

#[tokio::test]
async fn run_applies_queued_intents_then_cancels() {
    let store =
        MemoryStore::with_records("devfest", [talk("Opening", "A", Estado::NotStarted)]).await;
    let renderer = RecordingRenderer::default();
    let mut dashboard = Dashboard::new(Arc::new(store.clone()), "devfest", renderer);
    let (tx, rx) = mpsc::channel(8);
    tx.send(Intent::SelectTrack(Some("A".into()))).await.expect("send");
    drop(tx);

    timeout(Duration::from_secs(2), dashboard.run(rx))
        .await
        .expect("run returns once intents close");

    assert_eq!(dashboard.state().selected_track(), Some("A"));
    assert!(!dashboard.is_live());

    // Later writes are not delivered anywhere.
    store
        .insert("devfest", &talk("Late", "A", Estado::NotStarted))
        .await
        .expect("insert");
    assert!(!dashboard.is_live());
}
