pub mod draw;
pub mod logging;
pub mod schedule;
pub mod stream;
