//! Rust compiler host.
//!
//! Builds declaration snapshots from inline `syn` modules and splices the
//! rendered registration procedures back into them. The `savegen_derive`
//! crate exposes this as `#[save_module]`.

mod expand;
mod syn_source;

pub use expand::{expand_save_module, parse_save_module_args};
pub use syn_source::{SynSource, extract_save_marker};
