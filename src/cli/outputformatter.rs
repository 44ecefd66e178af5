use terminal_size::{terminal_size, Height, Width};

use crate::model::{Issue, Job, RowPage, Severity};
use crate::session::{DraftBuffer, JobSessionState, RowQuery};

const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const GREEN: &str = "\x1b[32m";
const CYAN: &str = "\x1b[36m";
const RESET: &str = "\x1b[0m";

/// Cap for any single column so one long value cannot push the grid off screen.
const MAX_CELL_WIDTH: usize = 40;

/// Render the current page as an ASCII grid in canonical column order.
/// Flagged cells are colored by severity and suffixed with `!`; cells with a
/// pending draft show the draft text prefixed with `~`.
pub fn render_rows(
    state: &JobSessionState,
    page: &RowPage,
    query: &RowQuery,
    drafts: &DraftBuffer,
    termw: usize,
) -> String {
    let mut cols: Vec<String> = vec!["row_id".to_string()];
    cols.extend(state.canonical_columns().iter().cloned());

    // (plain text, color) per cell; widths are measured on the plain text
    let mut grid: Vec<Vec<(String, Option<&'static str>)>> = Vec::with_capacity(page.rows.len());
    for row in &page.rows {
        let mut line = vec![(row.row_id.clone(), None)];
        for col in state.canonical_columns() {
            let mut text = match drafts.get(&row.row_id, col) {
                Some(draft) => format!("~{}", draft),
                None => row.cell_text(col).to_string(),
            };
            let color = state.issue_for_cell(&row.row_id, col).map(|issue| {
                text.push('!');
                severity_color(issue.severity)
            });
            line.push((text, color));
        }
        grid.push(line);
    }

    let mut widths: Vec<usize> = cols.iter().map(|c| visible_len(c).min(MAX_CELL_WIDTH)).collect();
    for line in &grid {
        for (i, (text, _)) in line.iter().enumerate() {
            widths[i] = widths[i].max(visible_len(text).min(MAX_CELL_WIDTH));
        }
    }

    let mut out = Vec::new();
    let sep = build_separator(&widths);
    out.push(sep.clone());
    out.push(build_header(&cols, &widths));
    out.push(sep.clone());
    for line in &grid {
        out.push(build_row(line, &widths));
    }
    out.push(sep);
    out.push(page_footer(page, query));
    fit_lines(out, termw)
}

fn page_footer(page: &RowPage, query: &RowQuery) -> String {
    let total = match (query.filters.is_empty(), page.total_filtered) {
        (false, Some(filtered)) => format!("{} matching of {} rows", filtered, page.total_rows),
        _ => format!("{} rows", page.total_rows),
    };
    let first = if page.rows.is_empty() { 0 } else { query.offset + 1 };
    let last = query.offset + page.rows.len() as u64;
    let mut footer = format!("showing {}-{} of {} (page size {})", first, last, total, query.limit);
    if !query.filters.is_empty() {
        let parts: Vec<String> = query
            .filters
            .iter()
            .map(|f| match &f.value {
                Some(v) => format!("{} {} '{}'", f.column, f.op.as_str(), v),
                None => format!("{} {}", f.column, f.op.as_str()),
            })
            .collect();
        footer.push_str(&format!(", filters: {}", parts.join(" AND ")));
    }
    footer
}

/// Render the issue list as a table.
pub fn render_issues(issues: &[Issue], termw: usize) -> String {
    if issues.is_empty() {
        return "no issues".to_string();
    }
    let cols: Vec<String> = ["severity", "type", "row", "column", "message", "suggestion"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let grid: Vec<Vec<(String, Option<&'static str>)>> = issues
        .iter()
        .map(|i| {
            let sev = match i.severity {
                Severity::Error => "error",
                Severity::Warning => "warning",
            };
            vec![
                (sev.to_string(), Some(severity_color(i.severity))),
                (i.kind.clone(), None),
                (i.row_id.clone().unwrap_or_else(|| "-".into()), None),
                (i.column.clone().unwrap_or_else(|| "-".into()), None),
                (i.message.clone(), None),
                (i.suggestion.clone().unwrap_or_default(), None),
            ]
        })
        .collect();
    let mut widths: Vec<usize> = cols.iter().map(|c| visible_len(c)).collect();
    for line in &grid {
        for (i, (text, _)) in line.iter().enumerate() {
            widths[i] = widths[i].max(visible_len(text).min(MAX_CELL_WIDTH * 2));
        }
    }
    let sep = build_separator(&widths);
    let mut out = vec![sep.clone(), build_header(&cols, &widths), sep.clone()];
    for line in &grid {
        out.push(build_row(line, &widths));
    }
    out.push(sep);
    let errors = issues.iter().filter(|i| i.severity == Severity::Error).count();
    out.push(format!("issues: {} ({} errors, {} warnings)", issues.len(), errors, issues.len() - errors));
    fit_lines(out, termw)
}

pub fn render_overview(job: &Job) -> String {
    let mut out = vec![
        format!("{}job{}            {}", CYAN, RESET, job.job_id),
        format!("status         {}", job.status),
        format!("created_at     {}", job.created_at.to_rfc3339()),
        format!("schema         {}", job.schema_version),
        format!("limits         {} rows, {} bytes", job.limits.max_rows, job.limits.max_bytes),
    ];
    match &job.dataset {
        Some(ds) => {
            out.push(format!("dataset        {} rows x {} columns", ds.total_rows, ds.total_columns));
            out.push(format!("columns        {}", ds.canonical_columns.join(", ")));
            if !ds.unknown_columns.is_empty() {
                let unknown: Vec<&str> = ds.unknown_columns.iter().map(|s| s.as_str()).collect();
                out.push(format!("{}unknown{}        {}", YELLOW, RESET, unknown.join(", ")));
            }
        }
        None => out.push("dataset        (not parsed yet)".to_string()),
    }
    match &job.validation {
        Some(v) => out.push(format!(
            "validation     {} errors, {} warnings (at {})",
            v.error_count,
            v.warning_count,
            v.last_validated_at.to_rfc3339()
        )),
        None => out.push("validation     (not run)".to_string()),
    }
    out.join("\n")
}

fn severity_color(severity: Severity) -> &'static str {
    match severity {
        Severity::Error => RED,
        Severity::Warning => YELLOW,
    }
}

pub fn terminal_width() -> usize {
    match terminal_size() {
        Some((Width(w), Height(_))) if w > 4 => (w - 4) as usize,
        _ => 80,
    }
}

fn build_separator(widths: &[usize]) -> String {
    let mut s = String::from("+");
    for w in widths {
        s.push_str(&"-".repeat(*w + 2));
        s.push('+');
    }
    s
}

// Header names in green; padding follows the visible width.
fn build_header(cells: &[String], widths: &[usize]) -> String {
    let mut s = String::from("|");
    for (i, w) in widths.iter().enumerate() {
        let text = truncate(cells.get(i).map(|c| c.as_str()).unwrap_or(""), *w);
        s.push(' ');
        s.push_str(&format!("{}{}{}", GREEN, text, RESET));
        s.push_str(&" ".repeat(w.saturating_sub(visible_len(&text))));
        s.push_str(" |");
    }
    s
}

fn build_row(cells: &[(String, Option<&'static str>)], widths: &[usize]) -> String {
    let mut s = String::from("|");
    for (i, w) in widths.iter().enumerate() {
        let (raw, color) = cells.get(i).map(|(t, c)| (t.as_str(), *c)).unwrap_or(("", None));
        let text = truncate(raw, *w);
        let pad = " ".repeat(w.saturating_sub(visible_len(&text)));
        let painted = match color {
            Some(c) => format!("{}{}{}", c, text, RESET),
            None => text.clone(),
        };
        s.push(' ');
        if is_numeric_like(raw) {
            s.push_str(&pad);
            s.push_str(&painted);
        } else {
            s.push_str(&painted);
            s.push_str(&pad);
        }
        s.push_str(" |");
    }
    s
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    if max <= 1 {
        return "…".to_string();
    }
    s.chars().take(max - 1).collect::<String>() + "…"
}

// crude detection for right-aligning numbers
fn is_numeric_like(s: &str) -> bool {
    let st = s.trim();
    let mut has_digit = false;
    for ch in st.chars() {
        if ch.is_ascii_digit() {
            has_digit = true;
        } else if !".-+eE,_".contains(ch) {
            return false;
        }
    }
    has_digit
}

fn fit_lines(lines: Vec<String>, maxw: usize) -> String {
    lines.iter().map(|l| fit_line_to_width(l, maxw)).collect::<Vec<_>>().join("\n")
}

fn fit_line_to_width(s: &str, maxw: usize) -> String {
    if visible_len(s) <= maxw {
        return s.to_string();
    }
    // Cut at the visible budget, keeping escape sequences intact.
    let mut out = String::new();
    let mut seen = 0usize;
    let mut chars = s.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\x1b' {
            out.push(ch);
            while let Some(&next) = chars.peek() {
                out.push(next);
                chars.next();
                if next.is_ascii_alphabetic() {
                    break;
                }
            }
            continue;
        }
        if seen + 1 >= maxw {
            break;
        }
        out.push(ch);
        seen += 1;
    }
    out.push('…');
    out.push_str(RESET);
    out
}

/// Visible Unicode chars, skipping ANSI escape sequences.
fn visible_len(s: &str) -> usize {
    let mut count = 0;
    let mut in_escape = false;
    for ch in s.chars() {
        if in_escape {
            if ch.is_ascii_alphabetic() {
                in_escape = false;
            }
        } else if ch == '\x1b' {
            in_escape = true;
        } else {
            count += 1;
        }
    }
    count
}
