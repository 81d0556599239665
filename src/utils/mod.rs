pub mod devlog;
pub mod json;
pub mod logger;
pub mod num;
