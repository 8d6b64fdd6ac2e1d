//! Swapchain description and selection policy.
//!
//! The functions here are the API-independent half of swapchain creation:
//! given what the surface reports, decide what to ask for. Backends feed them
//! raw capability data and build the actual swapchain from the answer.

use std::fmt;

use crate::error::{FrameError, Result};

/// Width/height pair in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    /// Value a surface reports when its size is decided by the swapchain.
    pub const UNDEFINED: u32 = u32::MAX;

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True if either dimension is zero (e.g. a minimized window).
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// True if either dimension carries the undefined sentinel.
    pub const fn is_undefined(&self) -> bool {
        self.width == Self::UNDEFINED || self.height == Self::UNDEFINED
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Read-only view of a built swapchain, as the frame driver needs it.
pub trait SwapchainTarget {
    /// Pixel format of every image.
    type Format: Copy + PartialEq + fmt::Debug;
    /// Presentation mode.
    type PresentMode: Copy + PartialEq + fmt::Debug;

    fn format(&self) -> Self::Format;
    fn present_mode(&self) -> Self::PresentMode;
    fn extent(&self) -> Extent;

    /// Number of presentable images. Decided by the surface, not the caller.
    fn image_count(&self) -> usize;

    /// True if the surface left the extent undefined and it was derived from
    /// the requested size, clamped to the supported range.
    fn is_clamped(&self) -> bool;
}

/// Pick the first entry matching `is_preferred`, falling back to the first
/// available entry. Returns `None` only when `available` is empty.
pub fn pick_preferred<T, F>(available: &[T], is_preferred: F) -> Option<T>
where
    T: Copy,
    F: Fn(&T) -> bool,
{
    available
        .iter()
        .find(|candidate| is_preferred(candidate))
        .or_else(|| available.first())
        .copied()
}

/// Image count to request: the surface maximum when one is advertised,
/// otherwise the minimum.
pub const fn choose_image_count(min_image_count: u32, max_image_count: u32) -> u32 {
    if max_image_count > 0 {
        max_image_count
    } else {
        min_image_count
    }
}

/// Extent to request from the surface.
///
/// The surface's current extent wins when it is defined. With the undefined
/// sentinel the caller's `fallback` (usually the window framebuffer size) is
/// clamped into the supported range; without a fallback the surface is not
/// ready yet and creation must not proceed.
pub fn choose_extent(
    current: Extent,
    min: Extent,
    max: Extent,
    fallback: Option<Extent>,
) -> Result<Extent> {
    if !current.is_undefined() {
        return Ok(current);
    }

    let fallback = fallback.ok_or(FrameError::UndefinedExtent)?;
    Ok(Extent {
        width: fallback.width.clamp(min.width, max.width),
        height: fallback.height.clamp(min.height, max.height),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preferred_entry_wins() {
        let modes = [3, 1, 2];
        assert_eq!(pick_preferred(&modes, |m| *m == 2), Some(2));
    }

    #[test]
    fn falls_back_to_first_available() {
        let modes = [3, 1, 2];
        assert_eq!(pick_preferred(&modes, |m| *m == 7), Some(3));
        assert_eq!(pick_preferred::<u32, _>(&[], |_| true), None);
    }

    #[test]
    fn image_count_prefers_maximum() {
        assert_eq!(choose_image_count(2, 5), 5);
        assert_eq!(choose_image_count(3, 0), 3);
    }

    #[test]
    fn defined_extent_is_used_verbatim() {
        let current = Extent::new(800, 600);
        let extent = choose_extent(
            current,
            Extent::new(1, 1),
            Extent::new(4096, 4096),
            Some(Extent::new(10, 10)),
        )
        .unwrap();
        assert_eq!(extent, current);
    }

    #[test]
    fn undefined_extent_clamps_fallback() {
        let undefined = Extent::new(Extent::UNDEFINED, Extent::UNDEFINED);
        let extent = choose_extent(
            undefined,
            Extent::new(64, 64),
            Extent::new(1024, 1024),
            Some(Extent::new(2000, 10)),
        )
        .unwrap();
        assert_eq!(extent, Extent::new(1024, 64));
    }

    #[test]
    fn undefined_extent_without_fallback_fails() {
        let undefined = Extent::new(Extent::UNDEFINED, Extent::UNDEFINED);
        let result = choose_extent(undefined, Extent::default(), Extent::default(), None);
        assert!(matches!(result, Err(FrameError::UndefinedExtent)));
    }

    #[test]
    fn empty_extent_detection() {
        assert!(Extent::new(0, 600).is_empty());
        assert!(!Extent::new(800, 600).is_empty());
    }
}
