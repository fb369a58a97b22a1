pub mod event;
pub mod file_formats;
pub mod labware;
pub mod material;
pub mod protocol;
pub mod quantity;
