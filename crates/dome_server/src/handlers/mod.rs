pub mod matches;
pub mod season;
pub mod standings;
pub mod tournaments;
pub mod ws;
