use super::*;
use shared::domain::{Estado, EventFields, EventId};

fn record(id: &str, nombre: &str, track: &str, estado: Estado) -> EventRecord {
    EventRecord::new(
        EventId::new(id),
        EventFields {
            nombre: nombre.into(),
            expo: "Ana".into(),
            hora: "10:00".into(),
            track: track.into(),
            estado,
        },
    )
}

fn table(rows: &[EventRecord]) -> String {
    let mut out = Vec::new();
    write_table(&mut out, rows).expect("write");
    String::from_utf8(out).expect("utf8")
}

#[test]
fn empty_view_says_no_events() {
    assert_eq!(table(&[]), "no events\n");
}

#[test]
fn table_has_header_rule_and_one_line_per_row() {
    let output = table(&[
        record("e2", "Async Rust", "Backend", Estado::InProgress),
        record("e1", "Keynote", "Main", Estado::Finished),
    ]);
    let lines: Vec<&str> = output.lines().collect();

    assert_eq!(lines.len(), 4);
    assert!(lines[0].starts_with("Id"));
    assert!(lines[0].contains("Expositor"));
    assert!(lines[1].starts_with("--"));
    assert!(lines[2].contains("Async Rust") && lines[2].ends_with("En proceso"));
    assert!(lines[3].contains("Keynote") && lines[3].ends_with("Finalizado"));
    // Columns line up.
    assert_eq!(lines[2].find("Backend"), lines[3].find("Main"));
}

#[test]
fn frame_shows_filter_and_open_draft() {
    let rows = vec![record("e1", "Keynote", "Main", Estado::NotStarted)];
    let tracks = vec!["Main".to_string(), "Web".to_string()];
    let draft = Draft {
        editing: Some(EventId::new("e1")),
        open: true,
        ..Draft::default()
    };
    let frame = ViewFrame {
        collection: "devfest",
        live: true,
        tracks: &tracks,
        selected_track: Some("Main"),
        rows: &rows,
        draft: &draft,
    };

    let mut renderer = TerminalRenderer::new(Vec::new());
    renderer.render(&frame);
    let output = String::from_utf8(renderer.into_inner()).expect("utf8");

    assert!(output.contains("== devfest (live) =="));
    assert!(output.contains("track: Main   tracks: Main, Web"));
    assert!(output.contains("No ha comenzado"));
    assert!(output.contains("-- editing e1 --"));
}
