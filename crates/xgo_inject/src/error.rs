//! Errors the injection engine cannot express as diagnostics.

/// A hook point whose declaration cannot be rewritten.
///
/// Unlike a rejected link, which is left for the re-check to report, these
/// mean the patched runtime and the code calling it disagree.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InjectError {
    /// The trap hook needs a second parameter to carry the caller's PC.
    #[error("{func}: trap hook needs at least 2 parameters, found {found}")]
    MissingPcSlot {
        /// The declaring function.
        func: String,
        /// Number of declared parameters.
        found: usize,
    },

    /// A hook point's requester is absent from the link table.
    #[error("hook point {requester} has no link target")]
    UnmappedHook {
        /// The hook point's magic identifier.
        requester: String,
    },
}
