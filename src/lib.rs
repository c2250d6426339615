pub mod build_target;
pub mod file_target;
pub mod fs;
pub mod hash;
pub mod hash_target;
pub mod perf;
pub mod target;
pub mod task;
pub mod trace;
