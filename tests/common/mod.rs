#![allow(dead_code)]

pub mod builders;
pub mod doubles;
pub mod workers;

pub use builders::*;
pub use doubles::*;
pub use workers::*;
