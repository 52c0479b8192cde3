//! Hyperstack header schema and plane marshalling.
//!
//! A stack travels as one header frame followed by one frame per plane:
//!
//! - The header frame is UTF-8 text of form-encoded `key=value` pairs joined
//!   by `&` ([`Header`]), validated into a typed [`StackHeader`].
//! - Each plane frame is raw row-major samples, one byte per sample for 8-bit
//!   stacks and little-endian byte pairs for 16-bit stacks.
//!
//! An empty header frame is the sentinel that ends a response stream.

pub mod error;
pub mod header;
pub mod image;
pub mod marshal;
pub mod schema;

pub use error::{HeaderError, Result, StackError};
pub use header::Header;
pub use image::{ImageStack, Planes};
pub use marshal::{pack_u16_le, receive_stack, send_sentinel, send_stack, unpack_u16_le};
pub use schema::{BitDepth, Dimensions, StackHeader, REQUIRED_KEYS};
