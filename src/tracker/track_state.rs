/// Track lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackState {
    /// Newly created, not yet matched on enough consecutive frames
    #[default]
    Tentative,
    /// Matched on `n_init` consecutive frames; visible downstream
    Confirmed,
    /// Unmatched for too long; removed from the active set
    Deleted,
}
