pub mod board;
pub mod local;
pub mod mapping;
pub mod mutation;
pub mod project;
pub mod sync_pair;
