pub mod compare;
pub mod dedup;
pub mod entity;
pub mod error;
pub mod flags;
