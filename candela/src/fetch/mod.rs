pub mod download;
pub mod funding;
pub mod history;
pub mod retry;
pub mod segments;

pub mod util;
