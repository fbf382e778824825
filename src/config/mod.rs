pub mod chains;
pub mod penguin;
