//! Interpreter command parsing.

use std::path::PathBuf;

use anyhow::{anyhow, bail, Result};

use crate::model::{ApplyScope, Filter, FilterOp};
use crate::session::{BulkForm, BulkMode, View};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Upload(PathBuf),
    Refresh,
    View(View),
    Next,
    Prev,
    Limit(u64),
    Filter(Filter),
    ClearFilters,
    Draft { row_id: String, column: String, value: String },
    Commit { row_id: String, column: String },
    Edit { row_id: String, column: String, value: String },
    Bulk(BulkForm),
    Export(Option<PathBuf>),
    Delete,
    Status,
    Health,
    Help,
    Quit,
}

pub const HELP: &str = "Commands:
  upload <path>                          upload a CSV/XLSX file and open the rows view
  refresh                                re-read the job snapshot
  view <upload|overview|issues|rows>     switch view
  next | prev                            page through rows
  limit <5|10|20|50>                     set page size
  filter <column> <eq|neq|contains|is_null> [value]   add a filter (AND)
  clear-filters                          drop all filters
  draft <row_id> <column> <value>        stage a cell value
  commit <row_id> <column>               send a staged value (skipped when unchanged)
  edit <row_id> <column> <value>         stage and send in one step
  bulk map <column> [apply_to=..] [default=..] [old=new ...]
  bulk replace <column> <from> <to> [apply_to=..]
  bulk <column> [apply_to=..] [from=..] [to=..] [default=..] [old=new ...]
                                         a non-empty from= sends replace, otherwise map
  export [path]                          save the cleaned file
  delete                                 delete the job (asks first)
  status                                 show session state
  health                                 ping the job service
  help                                   show this help
  quit | exit                            leave

Quote values containing spaces: edit r4 Department \"Human Resources\".
In mappings an empty new value maps to null: N/A=";

/// Split on whitespace, honoring double quotes.
pub fn split_words(line: &str) -> Result<Vec<String>> {
    let mut words = Vec::new();
    let mut cur = String::new();
    let mut in_quotes = false;
    let mut has_word = false;
    for ch in line.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                has_word = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if has_word {
                    words.push(std::mem::take(&mut cur));
                    has_word = false;
                }
            }
            c => {
                cur.push(c);
                has_word = true;
            }
        }
    }
    if in_quotes {
        bail!("unterminated quote");
    }
    if has_word {
        words.push(cur);
    }
    Ok(words)
}

fn arg<'a>(words: &'a [String], idx: usize, what: &str) -> Result<&'a str> {
    words.get(idx).map(|s| s.as_str()).ok_or_else(|| anyhow!("missing {}", what))
}

/// Parse one interpreter line; `Ok(None)` for a blank line.
pub fn parse(line: &str) -> Result<Option<Command>> {
    let words = split_words(line)?;
    let Some(head) = words.first() else { return Ok(None) };
    let cmd = match head.to_ascii_lowercase().as_str() {
        "upload" => Command::Upload(PathBuf::from(arg(&words, 1, "path")?)),
        "refresh" => Command::Refresh,
        "view" => Command::View(arg(&words, 1, "view name")?.parse::<View>().map_err(|e| anyhow!(e))?),
        "next" => Command::Next,
        "prev" => Command::Prev,
        "limit" => {
            let raw = arg(&words, 1, "page size")?;
            Command::Limit(raw.parse().map_err(|_| anyhow!("page size '{}' is not a number", raw))?)
        }
        "filter" => Command::Filter(parse_filter(&words[1..])?),
        "clear-filters" => Command::ClearFilters,
        "draft" | "edit" => {
            let row_id = arg(&words, 1, "row_id")?.to_string();
            let column = arg(&words, 2, "column")?.to_string();
            if words.len() < 4 {
                bail!("missing value");
            }
            let value = words[3..].join(" ");
            if head.eq_ignore_ascii_case("draft") {
                Command::Draft { row_id, column, value }
            } else {
                Command::Edit { row_id, column, value }
            }
        }
        "commit" => Command::Commit {
            row_id: arg(&words, 1, "row_id")?.to_string(),
            column: arg(&words, 2, "column")?.to_string(),
        },
        "bulk" => Command::Bulk(parse_bulk(&words[1..])?),
        "export" => Command::Export(words.get(1).map(PathBuf::from)),
        "delete" => Command::Delete,
        "status" => Command::Status,
        "health" => Command::Health,
        "help" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => bail!("unknown command '{}' (try help)", other),
    };
    Ok(Some(cmd))
}

fn parse_filter(words: &[String]) -> Result<Filter> {
    let column = arg(words, 0, "column")?;
    let op: FilterOp = arg(words, 1, "operator")?.parse().map_err(|e: String| anyhow!(e))?;
    if op == FilterOp::IsNull {
        if words.len() > 2 {
            bail!("is_null takes no value");
        }
        return Ok(Filter::is_null(column));
    }
    if words.len() < 3 {
        bail!("{} needs a value", op.as_str());
    }
    Ok(Filter::new(column, op, words[2..].join(" ")))
}

fn parse_bulk(words: &[String]) -> Result<BulkForm> {
    let first = arg(words, 0, "column or mode")?;
    let (mode, rest) = match first.parse::<BulkMode>() {
        Ok(mode) => (Some(mode), &words[1..]),
        Err(_) => (None, words),
    };
    let mut form = BulkForm { column: arg(rest, 0, "column")?.to_string(), mode, ..Default::default() };
    let mut positional = Vec::new();
    for word in &rest[1..] {
        let Some((key, value)) = word.split_once('=') else {
            positional.push(word.clone());
            continue;
        };
        match key {
            "apply_to" => form.apply_to = value.parse::<ApplyScope>().map_err(|e| anyhow!(e))?,
            "default" => form.default = Some(value.to_string()),
            "from" => form.replace_from = Some(value.to_string()),
            "to" => form.replace_to = Some(value.to_string()),
            old => {
                let new = if value.is_empty() { None } else { Some(value.to_string()) };
                form.mapping.insert(old.to_string(), new);
            }
        }
    }
    match (mode, positional.as_slice()) {
        (_, []) => {}
        (Some(BulkMode::Replace), [from, to]) => {
            form.replace_from = Some(from.clone());
            form.replace_to = Some(to.clone());
        }
        (Some(BulkMode::Replace), _) => bail!("bulk replace takes <column> <from> <to>"),
        (_, extra) => bail!("unexpected argument '{}'", extra[0]),
    }
    Ok(form)
}
