pub mod matcher;
pub mod model;

pub use matcher::{SongMatch, SongMatcher};
pub use model::{Difficulty, PatternFeed, Song, SongCatalog, SongFeed};
