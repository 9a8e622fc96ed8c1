pub mod ad_library;

pub use ad_library::{AdLibraryApi, AdLibraryClient, AdLibraryError};
