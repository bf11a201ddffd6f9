//! Plain-text rendering of snapshots for the CLI.

use std::fmt::Write as _;

use serde::Serialize;

use crate::model::{Container, ContainerSummary, Host, Image, ImageSummary};

const SIZE_UNITS: [&str; 5] = ["Bytes", "KB", "MB", "GB", "TB"];

/// Human-readable size, 1024-based and rounded to a whole number.
///
/// - `0` → `"0 Byte"`
/// - `512` → `"512 Bytes"`
/// - `1536` → `"2 KB"`
pub fn format_bytes(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Byte".to_string();
    }
    let mut unit = 0;
    let mut scaled = bytes;
    while scaled >= 1024 && unit < SIZE_UNITS.len() - 1 {
        scaled /= 1024;
        unit += 1;
    }
    #[allow(clippy::cast_precision_loss)]
    let value = bytes as f64 / 1024f64.powi(i32::try_from(unit).unwrap_or(0));
    format!("{} {}", value.round(), SIZE_UNITS[unit])
}

/// Shorten a docker id to the 12 characters `docker ps` shows.
pub fn short_id(id: &str) -> &str {
    let id = id.strip_prefix("sha256:").unwrap_or(id);
    match id.char_indices().nth(12) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}

pub fn container_detail(c: &Container) -> Vec<(&'static str, String)> {
    vec![
        ("Status", c.status().to_string()),
        ("Name", c.display_name().to_string()),
        ("Restart Count", c.restart_count.to_string()),
        ("Image", c.image().to_string()),
    ]
}

pub fn image_detail(i: &Image) -> Vec<(&'static str, String)> {
    vec![
        ("Architecture", i.architecture.clone()),
        ("Os", i.os.clone()),
        ("Size", format_bytes(i.size)),
    ]
}

/// Detail card followed by the whole inspect document.
pub fn container_view(c: &Container) -> String {
    format!("{}\n{}", render_detail(&container_detail(c)), document(c))
}

pub fn image_view(i: &Image) -> String {
    format!("{}\n{}", render_detail(&image_detail(i)), document(i))
}

/// Pretty-printed JSON of a snapshot, unknown fields included.
pub fn document<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("<unprintable document: {e}>"))
}

/// Render `label: value` lines with values aligned.
pub fn render_detail(rows: &[(&str, String)]) -> String {
    let width = rows.iter().map(|(l, _)| l.chars().count()).max().unwrap_or(0);
    let mut out = String::new();
    for (label, value) in rows {
        let _ = writeln!(out, "{:<width$}  {value}", format!("{label}:"), width = width + 1);
    }
    out
}

pub fn host_table(hosts: &[Host]) -> String {
    let rows: Vec<Vec<String>> = hosts
        .iter()
        .map(|h| {
            vec![
                if h.is_reachable() { "✔" } else { "✘" }.to_string(),
                h.host_name.clone(),
                h.ip.clone(),
                h.os.clone(),
                h.error.clone(),
            ]
        })
        .collect();
    render_table(&["", "HOSTNAME", "IP", "OS", "ERROR"], &rows)
}

pub fn container_table(containers: &[ContainerSummary]) -> String {
    let rows: Vec<Vec<String>> = containers
        .iter()
        .map(|c| {
            vec![
                short_id(&c.id).to_string(),
                c.names.clone(),
                c.image.clone(),
                c.state.clone(),
                c.status.clone(),
            ]
        })
        .collect();
    render_table(&["ID", "NAMES", "IMAGE", "STATE", "STATUS"], &rows)
}

pub fn image_table(images: &[ImageSummary]) -> String {
    let rows: Vec<Vec<String>> = images
        .iter()
        .map(|i| {
            vec![
                short_id(&i.id).to_string(),
                i.repository.clone(),
                i.tag.clone(),
                i.size.clone(),
                i.containers.clone(),
            ]
        })
        .collect();
    render_table(&["ID", "REPOSITORY", "TAG", "SIZE", "CONTAINERS"], &rows)
}

/// Left-aligned columns separated by two spaces; trailing whitespace trimmed.
fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    let header: Vec<String> = headers.iter().map(|h| (*h).to_string()).collect();
    for row in std::iter::once(&header).chain(rows) {
        let mut line = String::new();
        for (i, (cell, w)) in row.iter().zip(&widths).enumerate() {
            if i > 0 {
                line.push_str("  ");
            }
            line.push_str(cell);
            line.push_str(&" ".repeat(w.saturating_sub(cell.chars().count())));
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}
