//! core-status: the editor-wide status taxonomy.
//!
//! Every fallible operation in the workspace reports through this crate so
//! that a call chain always surfaces the *most severe* condition it saw.
//! The ladder, least to most severe:
//!
//! `Success < NotFound < Failure < UserAbort < ScriptExit < UserExit <
//! HelpExit < OsError < Fatal`
//!
//! `NotFound` is a non-error signal: boundary-hitting motion primitives and
//! failed pattern matches return it, callers branch on it, and it never
//! reaches the user as an error. Anything at `Failure` or above carries a
//! message destined for the message line. Out-of-memory and structural
//! invariant violations do not use this type at all; they panic.

use std::fmt;

/// Severity rung. Ordering is semantic: `merge` keeps the larger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Success,
    NotFound,
    Failure,
    UserAbort,
    ScriptExit,
    UserExit,
    HelpExit,
    OsError,
    Fatal,
}

impl Severity {
    /// True for rungs that terminate the session rather than the command.
    pub fn is_exit(self) -> bool {
        matches!(self, Severity::ScriptExit | Severity::UserExit | Severity::HelpExit)
    }
}

/// A status cell: severity plus the message (if any) riding along with it.
///
/// `Status` is the `Err` side of [`Outcome`]. `Success` never appears inside
/// an `Err`; constructors only build the non-success rungs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub struct Status {
    severity: Severity,
    message: Option<String>,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(m) => write!(f, "{m}"),
            None => write!(f, "{:?}", self.severity),
        }
    }
}

impl Status {
    pub fn not_found() -> Self {
        Status { severity: Severity::NotFound, message: None }
    }

    pub fn failure(msg: impl Into<String>) -> Self {
        Status { severity: Severity::Failure, message: Some(msg.into()) }
    }

    pub fn user_abort() -> Self {
        Status { severity: Severity::UserAbort, message: Some("Aborted".into()) }
    }

    pub fn script_exit(msg: impl Into<String>) -> Self {
        Status { severity: Severity::ScriptExit, message: Some(msg.into()) }
    }

    pub fn user_exit() -> Self {
        Status { severity: Severity::UserExit, message: None }
    }

    pub fn help_exit(msg: impl Into<String>) -> Self {
        Status { severity: Severity::HelpExit, message: Some(msg.into()) }
    }

    pub fn os_error(msg: impl Into<String>) -> Self {
        Status { severity: Severity::OsError, message: Some(msg.into()) }
    }

    pub fn fatal(msg: impl Into<String>) -> Self {
        Status { severity: Severity::Fatal, message: Some(msg.into()) }
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn is_not_found(&self) -> bool {
        self.severity == Severity::NotFound
    }

    pub fn is_abort(&self) -> bool {
        self.severity == Severity::UserAbort
    }

    /// Keep the more severe of two statuses. Ties keep `self` so the first
    /// message recorded at a given rung survives re-wrapping.
    pub fn merge(self, other: Status) -> Status {
        if other.severity > self.severity { other } else { self }
    }

    /// Attach or replace the message without touching the severity.
    pub fn with_message(mut self, msg: impl Into<String>) -> Status {
        self.message = Some(msg.into());
        self
    }

    /// The `force` script modifier: `NotFound` and `Failure` collapse into a
    /// captured success (the message survives as the returned string); more
    /// severe rungs pass through untouched.
    pub fn forced(self) -> Result<Option<String>, Status> {
        match self.severity {
            Severity::NotFound | Severity::Failure => Ok(self.message),
            _ => Err(self),
        }
    }
}

/// Workspace-wide result alias.
pub type Outcome<T> = Result<T, Status>;

/// Convenience adapters over `Outcome`.
pub trait OutcomeExt<T> {
    /// Map `NotFound` to `Ok(None)`, success to `Ok(Some(_))`; real errors
    /// pass through.
    fn allow_not_found(self) -> Outcome<Option<T>>;
}

impl<T> OutcomeExt<T> for Outcome<T> {
    fn allow_not_found(self) -> Outcome<Option<T>> {
        match self {
            Ok(v) => Ok(Some(v)),
            Err(st) if st.is_not_found() => Ok(None),
            Err(st) => Err(st),
        }
    }
}

/// The message line cell. One message is pending at a time; a new posting
/// wins only if it is forced or at least as severe as the one already shown.
/// The next input read consumes it.
#[derive(Debug, Default)]
pub struct MessageCell {
    pending: Option<(Severity, String)>,
}

impl MessageCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Post a message. Returns true if it became the pending message.
    pub fn post(&mut self, severity: Severity, text: impl Into<String>, force: bool) -> bool {
        let accept = force
            || match &self.pending {
                Some((held, _)) => severity >= *held,
                None => true,
            };
        if accept {
            self.pending = Some((severity, text.into()));
        }
        accept
    }

    pub fn post_status(&mut self, st: &Status) -> bool {
        match st.message() {
            Some(m) => self.post(st.severity(), m, false),
            None => false,
        }
    }

    /// Take the pending message for rendering; clears the cell.
    pub fn take(&mut self) -> Option<(Severity, String)> {
        self.pending.take()
    }

    pub fn peek(&self) -> Option<&str> {
        self.pending.as_ref().map(|(_, m)| m.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ladder_ordering() {
        assert!(Severity::Success < Severity::NotFound);
        assert!(Severity::NotFound < Severity::Failure);
        assert!(Severity::Failure < Severity::UserAbort);
        assert!(Severity::UserAbort < Severity::ScriptExit);
        assert!(Severity::ScriptExit < Severity::UserExit);
        assert!(Severity::UserExit < Severity::HelpExit);
        assert!(Severity::HelpExit < Severity::OsError);
        assert!(Severity::OsError < Severity::Fatal);
    }

    #[test]
    fn merge_keeps_most_severe() {
        let a = Status::failure("first");
        let b = Status::user_abort();
        assert_eq!(a.clone().merge(b.clone()).severity(), Severity::UserAbort);
        assert_eq!(b.clone().merge(a.clone()).severity(), Severity::UserAbort);
        // Ties keep the first message.
        let c = Status::failure("second");
        assert_eq!(a.merge(c).message(), Some("first"));
    }

    #[test]
    fn force_collapses_failure_only() {
        assert_eq!(Status::failure("no such file").forced(), Ok(Some("no such file".into())));
        assert_eq!(Status::not_found().forced(), Ok(None));
        assert!(Status::user_abort().forced().is_err());
        assert!(Status::user_exit().forced().is_err());
    }

    #[test]
    fn allow_not_found_adapter() {
        let hit: Outcome<u32> = Ok(7);
        let miss: Outcome<u32> = Err(Status::not_found());
        let bad: Outcome<u32> = Err(Status::failure("x"));
        assert_eq!(hit.allow_not_found().unwrap(), Some(7));
        assert_eq!(miss.allow_not_found().unwrap(), None);
        assert!(bad.allow_not_found().is_err());
    }

    #[test]
    fn message_cell_severity_gate() {
        let mut cell = MessageCell::new();
        assert!(cell.post(Severity::Success, "saved", false));
        assert!(cell.post(Severity::Failure, "broke", false));
        // Lower severity does not displace a failure...
        assert!(!cell.post(Severity::Success, "fine", false));
        // ...unless forced.
        assert!(cell.post(Severity::Success, "override", true));
        assert_eq!(cell.take().unwrap().1, "override");
        assert!(cell.take().is_none());
    }
}
