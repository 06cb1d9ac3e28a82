//! State markers.

/// Greeting received, not yet logged in.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotAuthenticated;

/// Logged in, no mailbox open.
#[derive(Debug, Clone, Copy, Default)]
pub struct Authenticated;

/// A mailbox is open; IDLE and UID FETCH are available.
#[derive(Debug, Clone, Copy, Default)]
pub struct Selected;
