//! Encode/decode primitives consumed by the response parser (to turn literal payloads and header
//! blocks into usable text) and by callers inspecting MIME bodies.
//!
//! Nothing in here talks to the wire; it's pure byte-in/byte-out transforms.

pub mod base64;
pub mod encoded_word;
pub mod header;
pub mod quoted_printable;
pub mod utf7;
