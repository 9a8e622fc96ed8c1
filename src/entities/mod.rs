pub mod prelude;

pub mod ads;
pub mod pages;
