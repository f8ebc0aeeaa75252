pub mod app;
pub mod artwork;
pub mod config;
pub mod fanart;
pub mod locale;
pub mod lookup;
pub mod models;
pub mod plex;
pub mod processor;
pub mod report;
pub mod resolve;
pub mod scanner;
pub mod schedule;
pub mod tmdb;
