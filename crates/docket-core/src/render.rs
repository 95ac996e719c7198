use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use unicode_width::UnicodeWidthStr;

use crate::calendar::MonthGrid;
use crate::config::Config;
use crate::datetime::format_local;
use crate::model::Model;
use crate::reminder::format_reminder_text;
use crate::task::{Category, Task};
use crate::view::{CategoryCounts, Sections};

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self { color })
    }

    /// Open tasks first, then a "Completed" block. The `#` column is the
    /// task's position in the whole list, which is what commands accept.
    #[tracing::instrument(skip_all, fields(tasks = sections.len()))]
    pub fn print_sections(
        &mut self,
        sections: &Sections<'_>,
        model: &Model,
        now: DateTime<Utc>,
        tz: &Tz,
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        if sections.is_empty() {
            writeln!(out, "No tasks.")?;
            return Ok(());
        }

        if !sections.incomplete.is_empty() {
            let rows = self.task_rows(&sections.incomplete, model, now, tz);
            write_table(&mut out, task_headers(), rows)?;
        }

        if !sections.completed.is_empty() {
            if !sections.incomplete.is_empty() {
                writeln!(out)?;
            }
            let heading = format!("Completed ({})", sections.completed.len());
            writeln!(out, "{}", self.paint(&heading, "1"))?;
            let rows = self.task_rows(&sections.completed, model, now, tz);
            write_table(&mut out, task_headers(), rows)?;
        }

        Ok(())
    }

    #[tracing::instrument(skip(self, task, model, now, tz))]
    pub fn print_task_info(
        &mut self,
        position: usize,
        task: &Task,
        model: &Model,
        now: DateTime<Utc>,
        tz: &Tz,
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        writeln!(out, "position  {position}")?;
        writeln!(out, "id        {}", task.id())?;
        writeln!(out, "title     {}", task.title)?;
        writeln!(
            out,
            "status    {}",
            if task.completed { "completed" } else { "open" }
        )?;
        writeln!(out, "starred   {}", if task.is_starred { "yes" } else { "no" })?;
        if let Some(description) = &task.description {
            writeln!(out, "desc      {description}")?;
        }
        if let Some(category_id) = task.category_id {
            let name = model
                .category(category_id)
                .map(|category| self.paint_category(category))
                .unwrap_or_else(|| format!("(missing {category_id})"));
            writeln!(out, "category  {name}")?;
        }
        writeln!(
            out,
            "created   {}",
            format_local(task.created_at(), tz, "%Y-%m-%d %H:%M")
        )?;
        if let Some(due) = task.due_date {
            writeln!(out, "due       {}", format_local(due, tz, "%Y-%m-%d %H:%M"))?;
        }
        if let Some(reminder) = task.reminder_date {
            writeln!(out, "reminder  {}", format_reminder_text(reminder, now, tz))?;
        }

        Ok(())
    }

    #[tracing::instrument(skip_all)]
    pub fn print_categories(&mut self, counts: &CategoryCounts<'_>) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        let headers = vec!["Category".to_string(), "Color".to_string(), "Tasks".to_string()];
        let mut rows = vec![
            vec!["All".to_string(), String::new(), counts.all.to_string()],
            vec![
                "Uncategorized".to_string(),
                String::new(),
                counts.uncategorized.to_string(),
            ],
        ];
        for (category, count) in &counts.per_category {
            rows.push(vec![
                self.paint_category(category),
                category.color.clone(),
                count.to_string(),
            ]);
        }

        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    /// Month grid with a per-day count of due tasks, followed by the tasks
    /// themselves grouped by day.
    #[tracing::instrument(skip_all, fields(year = grid.year, month0 = grid.month0))]
    pub fn print_month(
        &mut self,
        grid: &MonthGrid,
        tasks: &[Task],
        today: NaiveDate,
        tz: &Tz,
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let buckets = grid.bucket(tasks, tz);

        let month_name = MONTH_NAMES
            .get(grid.month0 as usize)
            .copied()
            .unwrap_or("?");
        writeln!(out, "{}", self.paint(&format!("{month_name} {}", grid.year), "1"))?;
        writeln!(out, " Mon   Tue   Wed   Thu   Fri   Sat   Sun")?;

        for week in &buckets {
            let mut line = String::new();
            for (cell, due) in week {
                let mut text = format!("{:>3}", cell.day);
                if due.is_empty() {
                    text.push_str("   ");
                } else if due.len() > 9 {
                    text.push_str("*+ ");
                } else {
                    text.push_str(&format!("*{} ", due.len()));
                }

                let text = if cell.date == today {
                    self.paint(&text, "7")
                } else if !cell.in_month {
                    self.paint(&text, "2")
                } else {
                    text
                };
                line.push_str(&text);
            }
            writeln!(out, "{}", line.trim_end())?;
        }

        let mut wrote_heading = false;
        for (cell, due) in buckets.iter().flatten() {
            if !cell.in_month || due.is_empty() {
                continue;
            }
            if !wrote_heading {
                writeln!(out)?;
                wrote_heading = true;
            }
            for task in due {
                let mark = if task.completed { "x" } else { " " };
                writeln!(
                    out,
                    "{}  [{mark}] {}",
                    cell.date.format("%a %d"),
                    task.title
                )?;
            }
        }

        Ok(())
    }

    fn task_rows(
        &self,
        tasks: &[&Task],
        model: &Model,
        now: DateTime<Utc>,
        tz: &Tz,
    ) -> Vec<Vec<String>> {
        tasks
            .iter()
            .map(|task| {
                let position = model
                    .tasks()
                    .iter()
                    .position(|candidate| candidate.id() == task.id())
                    .map(|idx| (idx + 1).to_string())
                    .unwrap_or_else(|| "-".to_string());

                let star = if task.is_starred {
                    self.paint("*", "33")
                } else {
                    String::new()
                };

                let category = task
                    .category_id
                    .and_then(|id| model.category(id))
                    .map(|category| self.paint_category(category))
                    .unwrap_or_default();

                let due = task
                    .due_date
                    .map(|due| {
                        let text = format_local(due, tz, "%Y-%m-%d");
                        if due < now && !task.completed {
                            self.paint(&text, "31")
                        } else {
                            text
                        }
                    })
                    .unwrap_or_default();

                let reminder = task
                    .reminder_date
                    .map(|reminder| format_reminder_text(reminder, now, tz))
                    .unwrap_or_default();

                vec![
                    self.paint(&position, "33"),
                    star,
                    task.title.clone(),
                    category,
                    due,
                    reminder,
                ]
            })
            .collect()
    }

    fn paint_category(&self, category: &Category) -> String {
        match hex_to_ansi(&category.color) {
            Some(code) => self.paint(&category.name, &code),
            None => category.name.clone(),
        }
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn task_headers() -> Vec<String> {
    ["#", "", "Title", "Category", "Due", "Reminder"]
        .iter()
        .map(|header| header.to_string())
        .collect()
}

/// `#rrggbb` to a 24-bit foreground escape parameter.
fn hex_to_ansi(color: &str) -> Option<String> {
    let hex = color.trim().strip_prefix('#')?;
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some(format!("38;2;{r};{g};{b}"))
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths: Vec<usize> = headers
        .iter()
        .map(|header| UnicodeWidthStr::width(header.as_str()))
        .collect();

    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    let header_line: Vec<String> = headers
        .iter()
        .zip(&widths)
        .map(|(header, width)| format!("{header:width$}"))
        .collect();
    writeln!(writer, "{}", header_line.join(" ").trim_end())?;

    let rule: Vec<String> = widths.iter().map(|width| "-".repeat(*width)).collect();
    writeln!(writer, "{}", rule.join(" "))?;

    for row in rows {
        let mut line = String::new();
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            if idx > 0 {
                line.push(' ');
            }
            line.push_str(cell);
            line.push_str(&" ".repeat(padding));
        }
        writeln!(writer, "{}", line.trim_end())?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::{hex_to_ansi, strip_ansi, write_table};

    #[test]
    fn hex_colors_map_to_truecolor() {
        assert_eq!(hex_to_ansi("#4299e1").as_deref(), Some("38;2;66;153;225"));
        assert_eq!(hex_to_ansi("blue"), None);
        assert_eq!(hex_to_ansi("#12345"), None);
    }

    #[test]
    fn table_pads_by_visible_width() {
        let mut buf = Vec::new();
        write_table(
            &mut buf,
            vec!["#".to_string(), "Title".to_string()],
            vec![
                vec!["\x1b[33m1\x1b[0m".to_string(), "café".to_string()],
                vec!["10".to_string(), "x".to_string()],
            ],
        )
        .expect("write table");

        let text = String::from_utf8(buf).expect("utf8");
        let lines: Vec<String> = text.lines().map(strip_ansi).collect();
        assert_eq!(lines, ["#  Title", "-- -----", "1  café", "10 x"]);
    }
}
