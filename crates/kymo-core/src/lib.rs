pub mod columns;
pub mod consts;
pub mod error;
pub mod kymograph;
pub mod pipeline;
pub mod rows;
pub mod scheduler;
pub mod signal;
pub mod store;
