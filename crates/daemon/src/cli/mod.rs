pub mod args;
pub mod op;
pub mod ops;

pub use ops::{Cleanup, Directory, Download, Init, Lookup, Mirror, New, Store};
