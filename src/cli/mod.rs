//! Interactive interpreter driving a `SessionController`.

pub mod commands;
pub mod outputformatter;

use anyhow::{Context, Result};
use rustyline::error::ReadlineError;
use rustyline::history::History;
use rustyline::DefaultEditor;
use tokio::runtime::Runtime;
use tracing::debug;

use crate::api::JobService;
use crate::session::{CommitOutcome, SessionController, SessionError, View};
use commands::{Command, HELP};
use outputformatter::{render_issues, render_overview, render_rows, terminal_width};

/// Result of one interpreter command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    Quit,
}

/// Render whatever the current view shows.
pub fn render_view<S: JobService>(ctl: &SessionController<S>, termw: usize) -> String {
    let session = ctl.session();
    match (session.view(), session.job()) {
        (View::Overview, Some(job)) => render_overview(job),
        (View::Issues, Some(_)) => render_issues(session.issues(), termw),
        (View::Rows, Some(_)) => match session.rows().page() {
            Some(page) => render_rows(session.state(), page, session.rows().query(), session.drafts(), termw),
            None => "no rows loaded".to_string(),
        },
        _ => "no active job; upload a file to start".to_string(),
    }
}

pub fn render_status<S: JobService>(ctl: &SessionController<S>) -> String {
    let s = ctl.session();
    let mut out = vec![format!("view           {}", s.view())];
    match s.job() {
        Some(job) => out.push(format!("job            {} ({})", job.job_id, job.status)),
        None => out.push("job            none".to_string()),
    }
    let q = s.rows().query();
    out.push(format!("page           offset {} limit {} filters {}", q.offset, q.limit, q.filters.len()));
    out.push(format!("drafts         {}", s.drafts().len()));
    out.push(format!("issues         {}", s.issues().len()));
    out.push(format!("export path    {}", ctl.export_path().display()));
    if let Some(err) = s.last_error() {
        let status = err.status.map(|c| c.to_string()).unwrap_or_else(|| "-".into());
        out.push(format!("last error     {:?} {}: {}", err.kind, status, err.message));
    }
    out.join("\n")
}

/// Execute one parsed command. `confirm` is asked before destructive actions.
pub async fn dispatch<S, F>(
    ctl: &mut SessionController<S>,
    cmd: Command,
    confirm: F,
    termw: usize,
) -> Result<Reply, SessionError>
where
    S: JobService,
    F: FnOnce(&str) -> bool,
{
    let text = match cmd {
        Command::Quit => return Ok(Reply::Quit),
        Command::Help => HELP.to_string(),
        Command::Status => render_status(ctl),
        Command::Health => format!("service status: {}", ctl.health().await?),
        Command::Upload(path) => {
            ctl.upload_file(&path).await?;
            render_view(ctl, termw)
        }
        Command::Refresh => {
            ctl.refresh().await?;
            render_view(ctl, termw)
        }
        Command::View(view) => {
            ctl.select_view(view).await?;
            render_view(ctl, termw)
        }
        Command::Next => {
            ctl.next_page().await?;
            render_view(ctl, termw)
        }
        Command::Prev => {
            ctl.prev_page().await?;
            render_view(ctl, termw)
        }
        Command::Limit(n) => {
            ctl.set_page_size(n).await?;
            render_view(ctl, termw)
        }
        Command::Filter(filter) => {
            ctl.add_filter(filter).await?;
            render_view(ctl, termw)
        }
        Command::ClearFilters => {
            ctl.clear_filters().await?;
            render_view(ctl, termw)
        }
        Command::Draft { row_id, column, value } => {
            ctl.set_draft(&row_id, &column, value)?;
            format!("draft staged for {}:{}", row_id, column)
        }
        Command::Commit { row_id, column } => {
            let outcome = ctl.commit_cell(&row_id, &column).await?;
            commit_reply(ctl, outcome, termw)
        }
        Command::Edit { row_id, column, value } => {
            let outcome = ctl.apply_edit(&row_id, &column, &value).await?;
            commit_reply(ctl, outcome, termw)
        }
        Command::Bulk(form) => {
            ctl.bulk_form(form).await?;
            render_view(ctl, termw)
        }
        Command::Export(dest) => {
            let saved = ctl.export(dest.as_deref()).await?;
            format!("exported to {}", saved.display())
        }
        Command::Delete => {
            let job_id = match ctl.session().job() {
                Some(job) => job.job_id.clone(),
                None => return Err(SessionError::NoActiveJob),
            };
            if !confirm(&format!("delete job {}? this cannot be undone [y/N] ", job_id)) {
                return Ok(Reply::Text("delete cancelled".to_string()));
            }
            ctl.delete().await?;
            format!("job {} deleted", job_id)
        }
    };
    Ok(Reply::Text(text))
}

fn commit_reply<S: JobService>(ctl: &SessionController<S>, outcome: CommitOutcome, termw: usize) -> String {
    match outcome {
        CommitOutcome::Unchanged => "value unchanged; nothing sent".to_string(),
        CommitOutcome::Committed(_) => render_view(ctl, termw),
    }
}

/// Describe a failed command, including a session reset if one happened.
pub fn describe_failure<S: JobService>(ctl: &SessionController<S>, err: &SessionError) -> String {
    match err.api() {
        Some(api) if api.is_not_found() && ctl.session().job().is_none() => {
            format!("Error: {}\nthe job no longer exists; upload a file to start again", api.message())
        }
        Some(api) => match api.status() {
            Some(status) => format!("Error ({}): {}", status, api.message()),
            None => format!("Error: {}", api.message()),
        },
        None => format!("Error: {}", err),
    }
}

/// Record a line in the editor history. A failure only costs recall, so it is
/// logged and the command still runs.
fn remember<H: History>(history: &mut H, line: &str) -> bool {
    match history.add(line) {
        Ok(added) => added,
        Err(e) => {
            debug!(target: "databuddy", "history entry not recorded: {}", e);
            false
        }
    }
}

/// Read-eval-print loop. Each command runs to completion on `rt` before the
/// next line is read.
pub fn run_repl<S: JobService>(rt: &Runtime, ctl: &mut SessionController<S>) -> Result<()> {
    let mut rl = DefaultEditor::new().context("failed to initialize line editor")?;
    println!("databuddy interpreter. Type 'help' for commands.");
    loop {
        let prompt = match ctl.session().job() {
            Some(job) => format!("databuddy[{}:{}]> ", job.job_id, ctl.session().view()),
            None => "databuddy> ".to_string(),
        };
        let line = match rl.readline(&prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e).context("failed to read command"),
        };
        if line.trim().is_empty() {
            continue;
        }
        remember(rl.history_mut(), &line);
        let cmd = match commands::parse(&line) {
            Ok(Some(cmd)) => cmd,
            Ok(None) => continue,
            Err(e) => {
                eprintln!("{}", e);
                continue;
            }
        };
        debug!(target: "databuddy", "command: {:?}", cmd);
        // Delete confirmation reads its own line; the answer is gathered up
        // front so the async dispatch never blocks on input.
        let confirmed = if cmd == Command::Delete && ctl.session().job().is_some() {
            let question = format!(
                "delete job {}? this cannot be undone [y/N] ",
                ctl.session().job().map(|j| j.job_id.as_str()).unwrap_or("")
            );
            matches!(rl.readline(&question), Ok(answer) if answer.trim().eq_ignore_ascii_case("y"))
        } else {
            false
        };
        let termw = terminal_width();
        match rt.block_on(dispatch(ctl, cmd, |_| confirmed, termw)) {
            Ok(Reply::Quit) => break,
            Ok(Reply::Text(text)) => println!("{}", text),
            Err(err) => eprintln!("{}", describe_failure(ctl, &err)),
        }
    }
    Ok(())
}
