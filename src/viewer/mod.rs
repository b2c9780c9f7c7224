mod machine;
mod window;

pub use machine::{GalleryViewer, Thumbnail, ViewerState};
