use image::{GrayImage, Rgb, RgbImage};

pub fn rgb_to_gray(rgb: &RgbImage) -> GrayImage {
    image::imageops::grayscale(rgb)
}

pub fn gray_to_rgb(gray: &GrayImage) -> RgbImage {
    let mut out = RgbImage::new(gray.width(), gray.height());
    for (x, y, p) in gray.enumerate_pixels() {
        let v = p[0];
        out.put_pixel(x, y, Rgb([v, v, v]));
    }
    out
}
