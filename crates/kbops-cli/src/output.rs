//! Terminal output helpers
//!
//! Author: hephaex@gmail.com

use chrono::{DateTime, Utc};

pub const RULE_WIDTH: usize = 50;

/// Title followed by a `=` rule
pub fn banner(title: &str) {
    println!("{title}");
    println!("{}", "=".repeat(RULE_WIDTH));
}

/// Blank line, then a section heading
pub fn section(title: &str) {
    println!("\n{title}");
}

pub fn divider() {
    println!("{}", "-".repeat(40));
}

pub fn time_or_na(time: Option<DateTime<Utc>>) -> String {
    time.map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "N/A".to_string())
}

pub fn or_na(value: Option<&str>) -> &str {
    value.unwrap_or("N/A")
}

/// First `max` characters, with `...` when cut
pub fn preview(text: &str, max: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

pub fn mark(ok: bool) -> &'static str {
    if ok {
        "✅"
    } else {
        "❌"
    }
}

/// Render rows as a left-aligned text table with a header rule
pub fn render_table(columns: &[String], rows: &[Vec<String>]) -> String {
    if columns.is_empty() {
        return String::new();
    }

    let mut widths: Vec<usize> = columns.iter().map(|c| c.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate().take(widths.len()) {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let line = |cells: &[String]| -> String {
        widths
            .iter()
            .enumerate()
            .map(|(i, &w)| {
                let cell = cells.get(i).map(String::as_str).unwrap_or("");
                format!("{cell:<w$}")
            })
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };

    let mut out = line(columns);
    out.push('\n');
    out.push_str(
        &widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-"),
    );
    for row in rows {
        out.push('\n');
        out.push_str(&line(row));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_render_table_aligns_columns() {
        let table = render_table(
            &strings(&["extname", "extversion"]),
            &[strings(&["vector", "0.7.0"]), strings(&["plpgsql", "1.0"])],
        );
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "extname | extversion");
        assert_eq!(lines[1], "--------+-----------");
        assert_eq!(lines[2], "vector  | 0.7.0");
        assert_eq!(lines[3], "plpgsql | 1.0");
    }

    #[test]
    fn test_render_table_short_rows() {
        let table = render_table(&strings(&["a", "b"]), &[strings(&["1"])]);
        assert_eq!(table.lines().last(), Some("1 |"));
        assert_eq!(render_table(&[], &[]), "");
    }

    #[test]
    fn test_preview() {
        assert_eq!(preview("short", 10), "short");
        assert_eq!(preview("0123456789abc", 10), "0123456789...");
        assert_eq!(preview("굴삭기 사양서", 3), "굴삭기...");
    }

    #[test]
    fn test_time_or_na() {
        assert_eq!(time_or_na(None), "N/A");
        let t = DateTime::from_timestamp(1_700_000_000, 0);
        assert_eq!(time_or_na(t), "2023-11-14 22:13:20 UTC");
    }
}
