// crates/scrubcut-cli/src/helpers/mod.rs
//
// Output helpers for the front end. Nothing here touches the core.

pub mod png_out;
pub mod sparkline;
