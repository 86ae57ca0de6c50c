// Core modules implementing labware state, partitioning, and recording.
pub mod composition;
pub mod device;
pub mod error;
pub mod labware;
pub mod partition;
pub mod wells;
pub mod worklist;
