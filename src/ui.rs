//! Terminal output helpers.
//!
//! - `Table` - box-drawn table sized to the terminal
//! - `spinner` - progress spinner for slow git work
//! - `print_report` - end-of-install summary

use crate::deps::BatchReport;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: &[&str]) -> Self {
        Self {
            headers: headers.iter().map(|s| s.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// Rows with the wrong number of cells are dropped.
    pub fn add_row(&mut self, row: Vec<String>) {
        if row.len() == self.headers.len() {
            self.rows.push(row);
        }
    }

    fn column_widths(&self, max_width: usize) -> Vec<usize> {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(console::measure_text_width(cell));
            }
        }

        // Shrink the widest column until the table fits, never below 8.
        let overhead = 3 + 3 * widths.len();
        let budget = max_width.saturating_sub(overhead);
        while widths.iter().sum::<usize>() > budget {
            let Some((idx, &widest)) = widths.iter().enumerate().max_by_key(|(_, w)| **w) else {
                break;
            };
            if widest <= 8 {
                break;
            }
            widths[idx] -= 1;
        }
        widths
    }

    pub fn print(&self) {
        if self.headers.is_empty() {
            return;
        }

        let (_, term_width) = console::Term::stdout().size();
        let widths = self.column_widths(term_width as usize);

        let border = |left: &str, mid: &str, right: &str| {
            let segments: Vec<String> = widths.iter().map(|w| "─".repeat(w + 2)).collect();
            format!("  {}{}{}", left, segments.join(mid), right)
        };
        let line = |cells: &[String], bold: bool| {
            let mut out = String::from("  │");
            for (cell, width) in cells.iter().zip(&widths) {
                let flat = cell.replace(['\n', '\r', '\t'], " ");
                let text = console::truncate_str(&flat, *width, "...").to_string();
                let pad = width.saturating_sub(console::measure_text_width(&text));
                let text = if bold { text.bold().to_string() } else { text };
                out.push_str(&format!(" {}{} │", text, " ".repeat(pad)));
            }
            out
        };

        println!("{}", border("┌", "┬", "┐"));
        println!("{}", line(&self.headers, true));
        println!("{}", border("├", "┼", "┤"));
        for row in &self.rows {
            println!("{}", line(row, false));
        }
        println!("{}", border("└", "┴", "┘"));
    }
}

pub fn spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.blue} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⣾⣽⣻⢿⡿⣟⣯⣷"),
    );
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}

pub fn print_report(report: &BatchReport) {
    if report.outcomes.is_empty() {
        println!("{} No dependencies to install.", "!".yellow());
        return;
    }

    let mut table = Table::new(&["Package", "Status", "Detail"]);
    for outcome in &report.outcomes {
        let row = match &outcome.result {
            Ok(installed) => vec![
                installed.spec.to_string(),
                "✓ vendored".green().to_string(),
                installed.destination.display().to_string(),
            ],
            Err(err) => vec![
                outcome.raw.clone(),
                format!("x {}", err.kind()).red().to_string(),
                err.to_string(),
            ],
        };
        table.add_row(row);
    }
    table.print();

    let failed = report.failures().count();
    if failed == 0 {
        println!(
            "{} Installed {} packages.",
            "✓".green(),
            report.outcomes.len()
        );
    } else {
        println!(
            "{} {} of {} packages failed.",
            "x".red(),
            failed,
            report.outcomes.len()
        );
    }
}
