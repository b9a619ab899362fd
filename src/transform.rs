use crate::tensor::Tensor;
use crate::Point2;

/// Anything whose x-coordinates can be remapped in place.
///
/// Implemented for plain point sets and for live [`Tensor`] buffers, so the
/// flip transform is written once and is type-preserving: a materialized
/// result flips into a materialized result, a buffer-typed result into a
/// buffer-typed one.
pub trait FlipTarget {
    fn map_x(&mut self, f: &mut dyn FnMut(f32) -> f32);
}

impl FlipTarget for [Point2] {
    fn map_x(&mut self, f: &mut dyn FnMut(f32) -> f32) {
        for p in self.iter_mut() {
            p.x = f(p.x);
        }
    }
}

impl FlipTarget for Vec<Point2> {
    fn map_x(&mut self, f: &mut dyn FnMut(f32) -> f32) {
        self.as_mut_slice().map_x(f);
    }
}

impl FlipTarget for Point2 {
    fn map_x(&mut self, f: &mut dyn FnMut(f32) -> f32) {
        self.x = f(self.x);
    }
}

impl FlipTarget for Tensor {
    fn map_x(&mut self, f: &mut dyn FnMut(f32) -> f32) {
        Tensor::map_x(self, f);
    }
}

/// Mirror every x-coordinate about the vertical centerline of an image
/// `width` pixels wide: `x -> (width - 1) - x`. y-coordinates are untouched.
///
/// Bounding-box corners keep their labels: the corner stored as `top_left`
/// stays `top_left` after mirroring even though its x may then exceed
/// `bottom_right.x`. Callers index corners by label, not by extent.
pub fn flip_horizontal<T: FlipTarget + ?Sized>(target: &mut T, width: f32) {
    let edge = width - 1.0;
    target.map_x(&mut |x| edge - x);
}
