use nalgebra::{Matrix3, Point2};

/// Apply a 3x3 projective transform to a 2D point in homogeneous form.
pub fn project_point(h: &Matrix3<f64>, pt: Point2<f64>) -> Point2<f64> {
    let x = pt.x;
    let y = pt.y;

    let w = h[(2, 0)] * x + h[(2, 1)] * y + h[(2, 2)];

    if w.abs() > 1e-12 {
        Point2::new(
            (h[(0, 0)] * x + h[(0, 1)] * y + h[(0, 2)]) / w,
            (h[(1, 0)] * x + h[(1, 1)] * y + h[(1, 2)]) / w,
        )
    } else {
        Point2::new(
            h[(0, 0)] * x + h[(0, 1)] * y + h[(0, 2)],
            h[(1, 0)] * x + h[(1, 1)] * y + h[(1, 2)],
        )
    }
}

/// The four corners of a `width` x `height` image, in pixel coordinates,
/// counter-clockwise from the origin.
pub fn image_corners(width: u32, height: u32) -> [Point2<f64>; 4] {
    let w = width as f64;
    let h = height as f64;
    [
        Point2::new(0.0, 0.0),
        Point2::new(0.0, h),
        Point2::new(w, h),
        Point2::new(w, 0.0),
    ]
}

/// Image corners mapped through a projective transform.
pub fn project_corners(h: &Matrix3<f64>, width: u32, height: u32) -> [Point2<f64>; 4] {
    image_corners(width, height).map(|c| project_point(h, c))
}

pub fn translation_matrix(dx: f64, dy: f64) -> Matrix3<f64> {
    Matrix3::new(1.0, 0.0, dx, 0.0, 1.0, dy, 0.0, 0.0, 1.0)
}

/// Rotation by `angle` radians about an arbitrary center, as a homography.
pub fn rotation_about(center: Point2<f64>, angle: f64) -> Matrix3<f64> {
    let cos_a = angle.cos();
    let sin_a = angle.sin();
    let rot = Matrix3::new(cos_a, -sin_a, 0.0, sin_a, cos_a, 0.0, 0.0, 0.0, 1.0);
    translation_matrix(center.x, center.y) * rot * translation_matrix(-center.x, -center.y)
}

pub fn is_invertible(h: &Matrix3<f64>, eps: f64) -> bool {
    h.determinant().abs() > eps
}
