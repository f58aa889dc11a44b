// crates/scrubcut-core/src/helpers/mod.rs
//
// Pure pixel/sample helpers shared by scrubcut-media tasks and front ends.

pub mod scale;
