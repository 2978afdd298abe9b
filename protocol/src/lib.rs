pub mod address;
pub mod ccm;
pub mod error;
pub mod general;
pub mod plug_info;
pub mod stream_format;
pub mod subunit_info;
pub mod transaction;
