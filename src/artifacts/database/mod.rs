//! Database entry types
//!
//! Types describing objects as they leave or enter the object database as
//! raw canonical bytes, which is the form transports move them in.

pub mod packed_object;
