pub mod code;
pub mod encoding;
pub mod http;
