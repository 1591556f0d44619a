pub mod archive;
pub mod concat;
pub mod files;
pub mod minify;
pub mod optimize;
pub mod prefix;
pub mod rewrite;
pub mod sprite;
