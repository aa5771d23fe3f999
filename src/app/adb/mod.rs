pub mod locator;
pub mod parse;
pub mod reset;
pub mod runner;
