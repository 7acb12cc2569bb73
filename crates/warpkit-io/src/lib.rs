pub mod filetype;
pub mod tags;
pub mod mgh;
pub mod warp_io;
pub mod morph_io;
pub mod nifti_io;
pub mod convert;

pub use filetype::FileType;
pub use mgh::{read_mgh, write_mgh};
pub use warp_io::{read_warp, write_warp, WarpFieldIo};
pub use morph_io::{read_morph, write_morph};
pub use nifti_io::export_nifti;
pub use convert::{convert_morph_file, invert_morph_file};
