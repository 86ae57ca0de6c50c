//! Purpose: Plan liquid-handling robot protocols and emit `.gwl` worklists.
//! Exports: `core` (labware state, composition, partitioning, recording), `notice`.
//! Role: Library backing protocol-generation scripts; there is no CLI surface.
//! Invariants: Planning is single-threaded; identical call sequences produce
//! Invariants: bit-identical instruction logs and labware state.
pub mod core;
pub mod notice;
