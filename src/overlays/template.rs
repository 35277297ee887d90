use crate::tracking::ReferenceImage;

/// Reference image name that gets the enlarged, animated arrow.
pub const ARROW_IMAGE_NAME: &str = "1";

pub const ARROW_TEXTURE: &str = "arrow";
pub const DEFAULT_TEXTURE: &str = "test";

/// How to draw the overlay for a detected reference image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayTemplate {
    pub texture: &'static str,
    pub width: f32,
    pub height: f32,
    pub z_offset: f32,
    pub animated: bool,
}

impl OverlayTemplate {
    /// Exact match on [`ARROW_IMAGE_NAME`], everything else (unnamed images included) gets the default.
    pub fn lookup(image: &ReferenceImage) -> Self {
        let size = image.physical_size;
        if is_arrow_image(image) {
            Self {
                texture: ARROW_TEXTURE,
                width: size.x * 2.,
                height: size.y * 2.,
                z_offset: 0.,
                animated: true,
            }
        } else {
            Self {
                texture: DEFAULT_TEXTURE,
                width: size.x,
                height: size.y / 2.,
                z_offset: -size.x,
                animated: false,
            }
        }
    }
}

pub fn is_arrow_image(image: &ReferenceImage) -> bool {
    image.name.as_deref() == Some(ARROW_IMAGE_NAME)
}

#[cfg(test)]
mod tests {
    use glam::Vec2;
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn arrow_image_is_enlarged_and_animated() {
        let t = OverlayTemplate::lookup(&ReferenceImage::new("1", 0.1, 0.05));
        assert_eq!(t.texture, ARROW_TEXTURE);
        assert!((t.width - 0.2).abs() < 1e-6);
        assert!((t.height - 0.1).abs() < 1e-6);
        assert_eq!(t.z_offset, 0.);
        assert!(t.animated);
    }

    #[test]
    fn other_images_sit_behind_the_anchor() {
        let t = OverlayTemplate::lookup(&ReferenceImage::new("logo", 0.2, 0.1));
        assert_eq!(t.texture, DEFAULT_TEXTURE);
        assert!((t.width - 0.2).abs() < 1e-6);
        assert!((t.height - 0.05).abs() < 1e-6);
        assert!((t.z_offset + 0.2).abs() < 1e-6);
        assert!(!t.animated);
    }

    #[test]
    fn unnamed_image_uses_default() {
        let image = ReferenceImage {
            name: None,
            physical_size: Vec2::new(0.3, 0.2),
        };
        let t = OverlayTemplate::lookup(&image);
        assert_eq!(t.texture, DEFAULT_TEXTURE);
        assert!(!t.animated);
    }

    proptest! {
        #[test]
        fn arrow_scales_double(w in 0.01f32..2.0, h in 0.01f32..2.0) {
            let t = OverlayTemplate::lookup(&ReferenceImage::new("1", w, h));
            prop_assert!(t.animated);
            prop_assert_eq!(t.z_offset, 0.);
            prop_assert_eq!(t.width, w * 2.);
            prop_assert_eq!(t.height, h * 2.);
        }

        #[test]
        fn default_for_every_other_name(name in "\\PC*", w in 0.01f32..2.0, h in 0.01f32..2.0) {
            prop_assume!(name != ARROW_IMAGE_NAME);
            let t = OverlayTemplate::lookup(&ReferenceImage::new(&name, w, h));
            prop_assert!(!t.animated);
            prop_assert_eq!(t.z_offset, -w);
            prop_assert_eq!(t.width, w);
            prop_assert_eq!(t.height, h / 2.);
        }
    }
}
