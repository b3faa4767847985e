//! The 64 KiB MB50 output image, its write window, the assembly listing
//! accumulator, and the `.bin`/`.mif` file formats.
//!
//! This crate exists so that [`mb50as`](../mb50as/index.html) (which produces
//! an image) and [`mb50dbg`](../mb50dbg/index.html) (whose `load`/`save`
//! commands read and write the exact same `.bin` format) don't duplicate the
//! format logic between them.

mod format;
mod image;
mod listing;

pub use format::{decode_bin, encode_bin, encode_mif, write_outputs, FormatError};
pub use image::{Image, Width};
pub use listing::{Listing, ListingLine};
