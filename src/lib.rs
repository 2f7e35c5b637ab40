pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod game;
pub mod params;
pub mod utils;

#[cfg(test)]
mod test;
