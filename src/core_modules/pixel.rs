// THEORY (single-pixel colour planes):
// The `Pixel` module is the lowest layer of the segmentation pipeline. It is a
// "dumb" data container for one RGB pixel plus the single-pixel heuristics the
// marker threshold needs: hue, HSV saturation and HSV value. Nothing here looks
// at neighbours; connectivity and shape belong to `region` and `segmentation`.
//
// The marker's colour signature is calibrated on 0..=255 planes, so every
// heuristic has a byte form:
//   • hue:        degrees [0, 360) scaled by 255/360
//   • saturation: chroma / max, scaled to 0..=255
//   • value:      max(R, G, B)
//
// `swap_to_hsv_planes` applies these per pixel and writes H, S and V into the
// R, G and B channels of a new image. That remap is the first step of the
// pipeline: in the swapped basis the marker is a compact box that a plain
// per-channel range test can isolate.

pub mod pixel {
    use image::{Rgb, RgbImage};

    pub type Channel = u8;
    pub type NormalizedChannel = f32;
    pub type Hue = f32;
    pub type SaturationHSV = f32;
    pub type ValueHSV = f32;
    pub type Chroma = f32;

    /// A "dumb" data container representing a single RGB pixel.
    #[derive(Debug, Clone, Copy, PartialEq, Default)]
    pub struct Pixel {
        pub red: Channel,
        pub green: Channel,
        pub blue: Channel,
        /// The red channel value (0.0-1.0).
        pub red_normalized: NormalizedChannel,
        /// The green channel value (0.0-1.0).
        pub green_normalized: NormalizedChannel,
        /// The blue channel value (0.0-1.0).
        pub blue_normalized: NormalizedChannel,
    }

    impl Pixel {
        pub fn new(red: Channel, green: Channel, blue: Channel) -> Self {
            Pixel {
                red,
                green,
                blue,
                red_normalized: red as NormalizedChannel / 255.0,
                green_normalized: green as NormalizedChannel / 255.0,
                blue_normalized: blue as NormalizedChannel / 255.0,
            }
        }

        fn max_channel(&self) -> NormalizedChannel {
            self.red_normalized
                .max(self.green_normalized.max(self.blue_normalized))
        }

        fn min_channel(&self) -> NormalizedChannel {
            self.red_normalized
                .min(self.green_normalized.min(self.blue_normalized))
        }

        /// Colour purity: max(R, G, B) − min(R, G, B), normalized.
        pub fn chroma(&self) -> Chroma {
            self.max_channel() - self.min_channel()
        }

        /// Hue angle in degrees [0, 360). Grays report 0.
        pub fn hue(&self) -> Hue {
            let maximum_channel = self.max_channel();
            let chroma = self.chroma();

            if chroma <= 1e-6 {
                return 0.0;
            }

            let inverse_chroma = 1.0 / chroma;

            let (base_difference, sector_offset) = if maximum_channel == self.red_normalized {
                (self.green_normalized - self.blue_normalized, 0.0)
            } else if maximum_channel == self.green_normalized {
                (self.blue_normalized - self.red_normalized, 2.0)
            } else {
                (self.red_normalized - self.green_normalized, 4.0)
            };

            let mut hue_degrees = (base_difference * inverse_chroma + sector_offset) * 60.0;
            if hue_degrees < 0.0 {
                hue_degrees += 360.0;
            }
            hue_degrees
        }

        /// HSV saturation: chroma / value; zero for black.
        pub fn saturation_hsv(&self) -> SaturationHSV {
            let value = self.value_hsv();
            if value <= 1e-6 {
                return 0.0;
            }
            self.chroma() / value
        }

        /// HSV value: max(R, G, B), normalized.
        pub fn value_hsv(&self) -> ValueHSV {
            self.max_channel()
        }

        /// Hue on the 0..=255 plane scale.
        pub fn hue_byte(&self) -> Channel {
            to_byte(self.hue() / 360.0)
        }

        pub fn saturation_byte(&self) -> Channel {
            to_byte(self.saturation_hsv())
        }

        pub fn value_byte(&self) -> Channel {
            self.red.max(self.green.max(self.blue))
        }

        /// The pixel re-expressed as `[H, S, V]` bytes.
        pub fn hsv_planes(&self) -> [Channel; 3] {
            [self.hue_byte(), self.saturation_byte(), self.value_byte()]
        }
    }

    #[inline]
    fn to_byte(unit: f32) -> Channel {
        (unit * 255.0).round().clamp(0.0, 255.0) as Channel
    }

    impl From<Rgb<u8>> for Pixel {
        fn from(rgb: Rgb<u8>) -> Self {
            Pixel::new(rgb[0], rgb[1], rgb[2])
        }
    }

    /// Returns a copy of `image` with hue in R, saturation in G and value in B.
    pub fn swap_to_hsv_planes(image: &RgbImage) -> RgbImage {
        let mut swapped = RgbImage::new(image.width(), image.height());
        for (src, dst) in image.pixels().zip(swapped.pixels_mut()) {
            *dst = Rgb(Pixel::from(*src).hsv_planes());
        }
        swapped
    }

}
