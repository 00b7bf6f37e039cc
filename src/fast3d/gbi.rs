pub mod defines;
pub mod utils;
