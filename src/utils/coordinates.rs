// SPDX-License-Identifier: GPL-3.0-only

//! Type-safe coordinate system wrappers to prevent coordinate space confusion.
//!
//! Two coordinate spaces appear throughout the compositor:
//! - Global: the shared coordinate space all outputs and views are placed in
//! - OutputRelative: coordinates relative to a specific output's top-left
//!
//! Using wrapper types prevents accidentally passing the wrong coordinate
//! space to a function expecting the other.

use smithay::utils::{Logical, Point, Rectangle, Size};
use std::ops::{Add, Sub};

/// A point in the shared global coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GlobalPoint(pub Point<i32, Logical>);

/// A point relative to a physical output's coordinate space (0,0 at the output's top-left).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputRelativePoint(pub Point<i32, Logical>);

/// A floating-point position in the global coordinate space, used for cursor tracking.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlobalPointF64(pub Point<f64, Logical>);

/// A rectangle in the shared global coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalRect(pub Rectangle<i32, Logical>);

/// A rectangle relative to a physical output's coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputRelativeRect(pub Rectangle<i32, Logical>);

impl GlobalPoint {
    pub fn new(x: i32, y: i32) -> Self {
        Self(Point::new(x, y))
    }

    pub fn to_output_relative(self, output_position: GlobalPoint) -> OutputRelativePoint {
        OutputRelativePoint(self.0 - output_position.0)
    }

    pub fn as_point(&self) -> Point<i32, Logical> {
        self.0
    }

    pub fn to_f64(&self) -> smithay::utils::Point<f64, Logical> {
        self.0.to_f64()
    }
}

impl OutputRelativePoint {
    pub fn new(x: i32, y: i32) -> Self {
        Self(Point::new(x, y))
    }

    pub fn to_global(self, output_position: GlobalPoint) -> GlobalPoint {
        GlobalPoint(self.0 + output_position.0)
    }

    pub fn offset_by(self, dx: i32, dy: i32) -> Self {
        Self(Point::new(self.0.x + dx, self.0.y + dy))
    }

    pub fn as_point(&self) -> Point<i32, Logical> {
        self.0
    }
}

impl GlobalPointF64 {
    pub fn new(x: f64, y: f64) -> Self {
        Self(Point::from((x, y)))
    }

    pub fn as_point(&self) -> Point<f64, Logical> {
        self.0
    }

    pub fn to_i32_round(&self) -> Point<i32, Logical> {
        Point::new(self.0.x.round() as i32, self.0.y.round() as i32)
    }

    pub fn from_center(rect: Rectangle<i32, Logical>) -> Self {
        Self::new(
            rect.loc.x as f64 + rect.size.w as f64 / 2.0,
            rect.loc.y as f64 + rect.size.h as f64 / 2.0,
        )
    }
}

impl From<(f64, f64)> for GlobalPointF64 {
    fn from((x, y): (f64, f64)) -> Self {
        Self::new(x, y)
    }
}

impl Add<Point<f64, Logical>> for GlobalPointF64 {
    type Output = Self;

    fn add(self, rhs: Point<f64, Logical>) -> Self::Output {
        Self(self.0 + rhs)
    }
}

impl Sub for GlobalPointF64 {
    type Output = Point<f64, Logical>;

    fn sub(self, rhs: Self) -> Self::Output {
        self.0 - rhs.0
    }
}

impl GlobalRect {
    pub fn new(loc: GlobalPoint, size: Size<i32, Logical>) -> Self {
        Self(Rectangle::new(loc.0, size))
    }

    pub fn from_loc_and_size(loc: GlobalPoint, size: Size<i32, Logical>) -> Self {
        Self::new(loc, size)
    }

    pub fn location(&self) -> GlobalPoint {
        GlobalPoint(self.0.loc)
    }

    pub fn size(&self) -> Size<i32, Logical> {
        self.0.size
    }

    pub fn as_rectangle(&self) -> Rectangle<i32, Logical> {
        self.0
    }

    pub fn to_f64(&self) -> smithay::utils::Rectangle<f64, Logical> {
        self.0.to_f64()
    }

    pub fn contains(&self, point: impl Into<Point<i32, Logical>>) -> bool {
        self.0.contains(point)
    }
}

impl OutputRelativeRect {
    pub fn new(loc: OutputRelativePoint, size: Size<i32, Logical>) -> Self {
        Self(Rectangle::new(loc.0, size))
    }

    pub fn location(&self) -> OutputRelativePoint {
        OutputRelativePoint(self.0.loc)
    }

    pub fn size(&self) -> Size<i32, Logical> {
        self.0.size
    }

    pub fn as_rectangle(&self) -> Rectangle<i32, Logical> {
        self.0
    }
}

impl Add<GlobalPoint> for Point<i32, Logical> {
    type Output = GlobalPoint;

    fn add(self, rhs: GlobalPoint) -> Self::Output {
        GlobalPoint(self + rhs.0)
    }
}

/// Helper trait for easy conversion from smithay `Output` methods.
pub trait OutputExt {
    fn current_location_typed(&self) -> GlobalPoint;
}

impl OutputExt for smithay::output::Output {
    fn current_location_typed(&self) -> GlobalPoint {
        GlobalPoint(self.current_location())
    }
}

impl From<Point<i32, Logical>> for GlobalPoint {
    fn from(point: Point<i32, Logical>) -> Self {
        Self(point)
    }
}

impl From<Point<i32, Logical>> for OutputRelativePoint {
    fn from(point: Point<i32, Logical>) -> Self {
        Self(point)
    }
}

impl From<Rectangle<i32, Logical>> for GlobalRect {
    fn from(rect: Rectangle<i32, Logical>) -> Self {
        Self(rect)
    }
}

impl From<Rectangle<i32, Logical>> for OutputRelativeRect {
    fn from(rect: Rectangle<i32, Logical>) -> Self {
        Self(rect)
    }
}

impl From<GlobalRect> for Rectangle<i32, Logical> {
    fn from(rect: GlobalRect) -> Self {
        rect.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_to_output_relative_round_trips() {
        let output_pos = GlobalPoint::new(1920, 0);
        let global = GlobalPoint::new(2020, 40);
        let relative = global.to_output_relative(output_pos);
        assert_eq!(relative.as_point(), Point::new(100, 40));
        assert_eq!(relative.to_global(output_pos), global);
    }

    #[test]
    fn rect_contains_checks_bounds() {
        let rect = GlobalRect::from_loc_and_size(GlobalPoint::new(0, 0), Size::new(100, 100));
        assert!(rect.contains(Point::new(50, 50)));
        assert!(!rect.contains(Point::new(150, 50)));
    }
}
