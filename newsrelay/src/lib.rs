// Library interface for newsrelay modules
// This allows tests and other binaries to import modules

pub mod identity;
pub mod storage;
pub mod scraping;
pub mod filter;
pub mod summary;
pub mod messenger;
pub mod operator;
pub mod approval;
pub mod driver;
