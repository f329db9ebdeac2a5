//! Link parsing for simple index pages
//!
//! Turns the HTML of a project page into an ordered list of release
//! links, following `homepage`/`download` pages one hop deep.

mod crawl;
mod link;
pub mod meta;
mod parser;

pub use crawl::perform_crawling;
pub use link::Link;
pub use meta::{is_archive_of_project, BasenameMeta, LegacyVersion};
pub use parser::{parse_index, LinkSet};
