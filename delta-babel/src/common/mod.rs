//! Logic shared by the converters of every surface format.

pub mod inline;
pub mod runs;
pub mod slug;
