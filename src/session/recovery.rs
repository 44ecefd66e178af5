//! Error & session-recovery handling.
//!
//! A NotFound from the service means the job is gone: the whole session is
//! torn down and the user is sent back to upload. Every other failure is only
//! recorded for display and leaves the session exactly as it was.

use tracing::warn;

use super::Session;
use crate::error::{ApiError, ErrorKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfacedError {
    pub kind: ErrorKind,
    pub status: Option<u16>,
    pub message: String,
}

impl From<&ApiError> for SurfacedError {
    fn from(err: &ApiError) -> Self {
        Self { kind: err.kind(), status: err.status(), message: err.message().to_string() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    SessionReset,
    Surfaced,
}

pub fn handle_failure(session: &mut Session, err: &ApiError) -> Recovery {
    session.last_error = Some(SurfacedError::from(err));
    match err.kind() {
        ErrorKind::NotFound => {
            warn!(target: "databuddy", "job no longer exists on the service; resetting session: {}", err);
            session.reset();
            Recovery::SessionReset
        }
        ErrorKind::Rejected | ErrorKind::Server | ErrorKind::Network => {
            warn!(target: "databuddy", "request failed ({:?}): {}", err.kind(), err);
            Recovery::Surfaced
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::rows::tests::page_of;
    use crate::session::state::tests::job;
    use crate::session::view::View;

    fn active_session() -> Session {
        let mut session = Session::new(10);
        session.state.initialize(job("job_1", &["Salary"]));
        session.rows.install(page_of(0, 10, 12, None));
        session.drafts.set("r1", "Salary", "1");
        session.view.select(View::Rows, true);
        session
    }

    #[test]
    fn not_found_resets_everything() {
        let mut session = active_session();
        let recovery = handle_failure(&mut session, &ApiError::not_found("not_found", "Job not found"));
        assert_eq!(recovery, Recovery::SessionReset);
        assert!(session.job().is_none());
        assert!(session.issues().is_empty());
        assert!(session.rows().page().is_none());
        assert!(session.drafts().is_empty());
        assert_eq!(session.view(), View::Upload);
        assert_eq!(session.last_error().unwrap().status, Some(404));
    }

    #[test]
    fn other_failures_leave_session_untouched() {
        for err in [
            ApiError::rejected(400, "bad_request", "unknown column"),
            ApiError::server(500, "internal", "boom"),
            ApiError::network("connection refused"),
        ] {
            let mut session = active_session();
            assert_eq!(handle_failure(&mut session, &err), Recovery::Surfaced);
            assert_eq!(session.job().unwrap().job_id, "job_1");
            assert_eq!(session.issues().len(), 1);
            assert_eq!(session.rows().page().unwrap().rows.len(), 10);
            assert_eq!(session.drafts().len(), 1);
            assert_eq!(session.view(), View::Rows);
            assert_eq!(session.last_error().unwrap().message, err.message());
        }
    }
}
