pub mod browser;
pub mod image_anchor;
pub mod status;
pub mod template;
