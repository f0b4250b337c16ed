//! Block-wise transfer of payloads too large for one datagram.
//!
//! The [`splitter`] fragments a source (file, or zipped directory) into
//! numbered CONTENT responses and feeds them through the transaction
//! pool's congestion window; the [`Assembler`] buffers arriving blocks
//! and writes them to the destination strictly in block-number order,
//! whatever order the network delivers them in.

/// Fragmenting sources into block responses
pub mod splitter;

/// Reassembling arriving blocks
pub mod assembler;

pub use assembler::Assembler;
