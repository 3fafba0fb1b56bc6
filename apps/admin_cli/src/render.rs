//! Plain-text rendering of list snapshots, records and insights.

use std::fmt::Write as _;

use client_core::{ListSnapshot, LoadStatus};
use shared::{domain::Record, protocol::InsightResponse};

const MISSING: &str = "-";

pub fn render_page<R: Record>(snapshot: &ListSnapshot<R>) -> String {
    let view = &snapshot.view;
    if view.status != LoadStatus::Ready {
        return format!("status: {:?}\n", view.status);
    }
    if view.items.is_empty() {
        return "No records found.\n".to_string();
    }

    let mut columns = vec!["id"];
    columns.extend_from_slice(R::FILTER_FIELDS);
    let rows: Vec<Vec<String>> = view.items.iter().map(|item| row(item, &columns)).collect();

    let mut widths: Vec<usize> = columns.iter().map(|c| c.len()).collect();
    for cells in &rows {
        for (width, cell) in widths.iter_mut().zip(cells) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    let header: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
    push_line(&mut out, &header, &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    push_line(&mut out, &rule, &widths);
    for cells in &rows {
        push_line(&mut out, cells, &widths);
    }

    if let Some(meta) = view.meta {
        let _ = writeln!(
            out,
            "\nPage {} of {} ({} total){}{}",
            meta.page,
            meta.pages,
            view.total,
            if meta.has_prev { " [prev]" } else { "" },
            if meta.has_next { " [next]" } else { "" },
        );
    }
    out
}

fn row<R: Record>(item: &R, columns: &[&str]) -> Vec<String> {
    let attributes = item.attributes();
    columns
        .iter()
        .map(|column| {
            if *column == "id" {
                return item.id().to_string();
            }
            attributes
                .iter()
                .find(|(name, _)| name == column)
                .and_then(|(_, value)| *value)
                .unwrap_or(MISSING)
                .to_string()
        })
        .collect()
}

fn push_line(out: &mut String, cells: &[String], widths: &[usize]) {
    let padded: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{cell:<width$}"))
        .collect();
    let _ = writeln!(out, "{}", padded.join("  ").trim_end());
}

pub fn render_record<R: Record>(record: &R) -> String {
    let attributes = record.attributes();
    let width = attributes
        .iter()
        .map(|(name, _)| name.len())
        .max()
        .unwrap_or(0)
        .max("id".len());

    let mut out = format!("{:<width$}  {}\n", "id", record.id());
    for (name, value) in attributes {
        let _ = writeln!(out, "{name:<width$}  {}", value.unwrap_or(MISSING));
    }
    out
}

pub fn render_insight(response: &InsightResponse) -> String {
    let generated_at = response
        .generated_at()
        .map(|at| at.to_rfc3339())
        .unwrap_or_else(|| response.generated_at.clone());
    format!(
        "{} ({})\n\n{}\n\nconfidence {:.0}%, model {}, generated {}\n",
        response.name,
        response.entity_type.singular(),
        response.insight,
        response.confidence_score * 100.0,
        response.model_version,
        generated_at,
    )
}

pub fn render_fields<R: Record>() -> String {
    format!(
        "{}\n  filter: {}\n  sort:   {}\n",
        R::RESOURCE,
        R::FILTER_FIELDS.join(", "),
        R::SORT_FIELDS.join(", "),
    )
}

#[cfg(test)]
#[path = "tests/render_tests.rs"]
mod tests;
