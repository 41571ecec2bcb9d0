use std::io::{self, Write};

use client_core::{DashboardError, Draft, Renderer, ViewFrame};
use shared::domain::EventRecord;
use tracing::warn;

const HEADERS: [&str; 6] = ["Id", "Nombre", "Expositor", "Hora", "Track", "Estado"];

/// Writes the rows as a plain column-aligned table, or "no events".
pub fn write_table<W: Write>(out: &mut W, rows: &[EventRecord]) -> io::Result<()> {
    if rows.is_empty() {
        return writeln!(out, "no events");
    }

    let cells: Vec<[String; 6]> = rows
        .iter()
        .map(|record| {
            [
                record.id.to_string(),
                record.fields.nombre.clone(),
                record.fields.expo.clone(),
                record.fields.hora.clone(),
                record.fields.track.clone(),
                record.fields.estado.label().to_string(),
            ]
        })
        .collect();

    let mut widths = HEADERS.map(|header| header.chars().count());
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    write_row(out, &widths, HEADERS.iter().copied())?;
    let rule: Vec<String> = widths.iter().map(|width| "-".repeat(*width)).collect();
    write_row(out, &widths, rule.iter().map(String::as_str))?;
    for row in &cells {
        write_row(out, &widths, row.iter().map(String::as_str))?;
    }
    Ok(())
}

fn write_row<'a, W: Write>(
    out: &mut W,
    widths: &[usize; 6],
    cells: impl Iterator<Item = &'a str>,
) -> io::Result<()> {
    let line: Vec<String> = cells
        .zip(widths.iter().copied())
        .map(|(cell, width)| format!("{cell:<width$}"))
        .collect();
    writeln!(out, "{}", line.join("  ").trim_end())
}

fn write_draft<W: Write>(out: &mut W, draft: &Draft) -> io::Result<()> {
    match &draft.editing {
        Some(id) => writeln!(out, "-- editing {id} --")?,
        None => writeln!(out, "-- new event --")?,
    }
    let fields = &draft.fields;
    writeln!(out, "  nombre: {}", fields.nombre)?;
    writeln!(out, "  expo:   {}", fields.expo)?;
    writeln!(out, "  hora:   {}", fields.hora)?;
    writeln!(out, "  track:  {}", fields.track)?;
    writeln!(out, "  estado: {}", fields.estado)?;
    if draft.submitted.is_some() {
        writeln!(out, "  (saving...)")?;
    }
    Ok(())
}

/// Redraws the whole board on every frame.
pub struct TerminalRenderer<W: Write> {
    out: W,
}

impl<W: Write> TerminalRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_frame(&mut self, frame: &ViewFrame<'_>) -> io::Result<()> {
        let out = &mut self.out;
        writeln!(out)?;
        let status = if frame.live { "live" } else { "offline" };
        writeln!(out, "== {} ({status}) ==", frame.collection)?;
        writeln!(
            out,
            "track: {}   tracks: {}",
            frame.selected_track.unwrap_or("all"),
            if frame.tracks.is_empty() {
                "-".to_string()
            } else {
                frame.tracks.join(", ")
            }
        )?;
        write_table(out, frame.rows)?;
        if frame.draft.open {
            write_draft(out, frame.draft)?;
        }
        out.flush()
    }
}

impl<W: Write> Renderer for TerminalRenderer<W> {
    fn render(&mut self, frame: &ViewFrame<'_>) {
        if let Err(err) = self.write_frame(frame) {
            warn!(error = %err, "failed to draw board");
        }
    }

    fn report(&mut self, error: &DashboardError) {
        if let Err(err) = writeln!(self.out, "! {error}") {
            warn!(error = %err, "failed to draw board");
        }
    }
}

#[cfg(test)]
#[path = "tests/render_tests.rs"]
mod tests;
