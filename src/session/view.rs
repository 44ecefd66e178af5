use std::fmt::{Display, Formatter};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Upload,
    Overview,
    Issues,
    Rows,
}

impl Display for View {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            View::Upload => "upload",
            View::Overview => "overview",
            View::Issues => "issues",
            View::Rows => "rows",
        };
        f.write_str(s)
    }
}

impl FromStr for View {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "upload" => Ok(View::Upload),
            "overview" => Ok(View::Overview),
            "issues" => Ok(View::Issues),
            "rows" => Ok(View::Rows),
            other => Err(format!("unknown view '{}'", other)),
        }
    }
}

/// Which slice of the session is displayed. Job views need an active job.
#[derive(Debug, Default)]
pub struct ViewRouter {
    current: View,
}

impl ViewRouter {
    pub fn current(&self) -> View {
        self.current
    }

    pub fn is_rows_active(&self) -> bool {
        self.current == View::Rows
    }

    /// Returns false (and stays put) when a job view is requested without a job.
    pub fn select(&mut self, view: View, has_job: bool) -> bool {
        if view != View::Upload && !has_job {
            return false;
        }
        self.current = view;
        true
    }

    pub fn reset(&mut self) {
        self.current = View::Upload;
    }
}
