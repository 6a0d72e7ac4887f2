//! Reads RSS/Atom feed entries aloud through a caller-supplied speak
//! callback, with a GPIO button that can stop the read-out part way.

pub mod config;
pub mod feed;
pub mod reader;
pub mod util;
