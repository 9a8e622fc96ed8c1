pub mod ads;
pub mod pages;
