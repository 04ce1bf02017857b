//! CLI command implementations.

pub mod archive;
pub mod keys;
pub mod signature;
pub mod store;
pub mod trust;

use ark_format::CorruptDocument;

/// Tell the user a durable document was reset.
pub(crate) fn report_recovery(what: &str, recovery: Option<&CorruptDocument>) {
    if let Some(recovery) = recovery {
        eprintln!("warning: {what} reset to empty: {recovery}");
    }
}
