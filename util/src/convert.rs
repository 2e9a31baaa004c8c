//! Implements `Convert` functions between various external types.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::{Scalar, Vector2};

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

pub trait Convert<O> {
    fn convert(&self) -> O;
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<N: Scalar + Copy> Convert<Vector2<N>> for [N; 2] {
    fn convert(&self) -> Vector2<N> {
        Vector2::new(self[0], self[1])
    }
}

impl<N: Scalar + Copy> Convert<[N; 2]> for Vector2<N> {
    fn convert(&self) -> [N; 2] {
        [self.x, self.y]
    }
}
