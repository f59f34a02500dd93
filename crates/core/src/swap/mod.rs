//! Turning a chosen trade into signed transactions for the relay.
pub mod call;
pub mod gas;
mod pipeline;
pub mod signer;
pub mod wallet;

#[cfg(test)]
pub(crate) mod testing;

pub use pipeline::{
    Submission, SubmissionSettings, SubmissionState, SubmittedApproval, SwapAttempt, SwapSubmitter,
};
