//! Backend wire formats
//!
//! Each module holds the validated request parameters and the serde structs
//! of one backend's JSON API. They are only used at the transport boundary.

pub mod openai;
