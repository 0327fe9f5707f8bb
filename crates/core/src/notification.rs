//! Notices shown outside of the chat transcript.

use std::sync::atomic::{AtomicBool, Ordering};

/// A message for the user that is not part of a conversation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    /// A short headline.
    pub title: &'static str,
    /// The explanation.
    pub body: &'static str,
    /// Whether the notice stays until the user dismisses it.
    pub persistent: bool,
}

const CAPABILITY_UNAVAILABLE: Notice = Notice {
    title: "Language model unavailable",
    body: "The language model could not be reached or is not installed. \
           Check the model provider settings and try again.",
    persistent: true,
};

/// Decides which notices are shown.
///
/// One instance is created at startup and lives for the whole process.
#[derive(Debug, Default)]
pub struct NotificationCenter {
    capability_notice_shown: AtomicBool,
}

impl NotificationCenter {
    /// Creates a notification center that has not shown anything yet.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the "capability unavailable" notice the first time it is
    /// called, `None` afterwards.
    pub fn capability_unavailable(&self) -> Option<Notice> {
        if self.capability_notice_shown.swap(true, Ordering::AcqRel) {
            return None;
        }
        info!("raising the capability unavailable notice");
        Some(CAPABILITY_UNAVAILABLE)
    }
}
