use crate::types::SessionState;

/// Snapshot of the live session broadcast to the TUI via watch channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionView {
    pub state: SessionState,
    /// Last user-visible error; cleared on the next start.
    pub error: Option<String>,
    pub frames_sent: u64,
    pub chunks_played: u64,
    pub chunks_dropped: u64,
    pub interruptions: u64,
    pub queued_buffers: usize,
    pub model_text: Vec<String>,
}

/// Commands sent from TUI → session controller via mpsc channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiCommand {
    Start,
    Stop,
    Quit,
}
