//! Core SMTP types.

mod extension;
mod reply;

pub use extension::{AuthMechanism, Extension};
pub use reply::{Reply, ReplyCode, ReplyLine};
