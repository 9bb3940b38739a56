pub mod assets;
pub mod uploads;
