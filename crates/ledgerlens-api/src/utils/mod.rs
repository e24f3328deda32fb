pub mod ip_extraction;
pub mod multipart;

pub use ip_extraction::{extract_client_ip, ClientIp};
