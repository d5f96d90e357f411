/// Status returned from one call to [`Connection::dispatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStatus {
    /// No more complete messages are queued for delivery right now.
    Complete,
    /// More complete messages remain; call `dispatch` again.
    DataRemains,
    /// Delivery could not proceed for lack of memory; the loop will back
    /// off and retry the same connection.
    NeedMemory,
}

/// A connection that may have complete, already-parsed messages queued up
/// for delivery to the application. Message parsing itself is out of
/// scope for this crate; only the dispatch handoff is.
pub trait Connection: Send + Sync {
    fn dispatch(&self) -> DispatchStatus;
}
