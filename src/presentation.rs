//! Hand-off of annotated frames to whatever displays them.

mod annotate;
mod font;
mod slot;

pub use annotate::{AnnotatedFrame, Annotator, ClassNames, Overlay};
pub use slot::{SlotReceiver, SlotSender, latest_slot};

/// What the presentation consumer receives.
#[derive(Debug, Clone)]
pub enum Presentation {
    Frame(AnnotatedFrame),
    /// Terminal state; no frames follow
    Ended { frames: u64, reason: String },
}
