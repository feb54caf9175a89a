//! Cursor framebuffer creation.

use cursor_core::{cursor_quadrants, CursorSize, PixelFormat};
use tracing::{debug, warn};

use super::display_device::{DeviceError, DisplayDevice, FbHandle};

/// Allocates an ARGB8888 framebuffer of `cursor` size and paints the
/// four-quadrant test pattern into it.
///
/// # Errors
///
/// Propagates allocation or drawing failures from the device.  A partially
/// created framebuffer is removed before returning.
pub fn create_cursor_fb<D: DisplayDevice + ?Sized>(
    device: &mut D,
    cursor: CursorSize,
) -> Result<FbHandle, DeviceError> {
    let fb = device.create_fb(cursor.width, cursor.height, PixelFormat::Argb8888)?;

    if let Err(e) = device.fill_rects(fb, &cursor_quadrants(cursor)) {
        // The fill error is the one worth reporting.
        if let Err(cleanup) = device.remove_fb(fb) {
            warn!(fb = fb.0, "removing unpainted cursor framebuffer failed: {cleanup}");
        }
        return Err(e);
    }

    debug!(fb = fb.0, %cursor, "cursor framebuffer ready");
    Ok(fb)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::display_device::MockDisplayDevice;
    use mockall::predicate::eq;

    #[test]
    fn test_create_cursor_fb_allocates_argb_and_paints_four_quadrants() {
        // Arrange
        let mut device = MockDisplayDevice::new();
        device
            .expect_create_fb()
            .with(eq(128), eq(128), eq(PixelFormat::Argb8888))
            .times(1)
            .returning(|_, _, _| Ok(FbHandle(9)));
        device
            .expect_fill_rects()
            .withf(|fb, rects| *fb == FbHandle(9) && rects.len() == 4)
            .times(1)
            .returning(|_, _| Ok(()));

        // Act
        let fb = create_cursor_fb(&mut device, CursorSize::square(128));

        // Assert
        assert_eq!(fb, Ok(FbHandle(9)));
    }

    #[test]
    fn test_create_cursor_fb_removes_fb_when_fill_fails() {
        // Arrange
        let mut device = MockDisplayDevice::new();
        device
            .expect_create_fb()
            .returning(|_, _, _| Ok(FbHandle(3)));
        device
            .expect_fill_rects()
            .returning(|fb, _| Err(DeviceError::UnknownFramebuffer(fb)));
        device
            .expect_remove_fb()
            .with(eq(FbHandle(3)))
            .times(1)
            .returning(|_| Ok(()));

        // Act
        let result = create_cursor_fb(&mut device, CursorSize::square(64));

        // Assert
        assert_eq!(result, Err(DeviceError::UnknownFramebuffer(FbHandle(3))));
    }

    #[test]
    fn test_create_cursor_fb_keeps_fill_error_when_cleanup_fails() {
        // Arrange
        let mut device = MockDisplayDevice::new();
        device
            .expect_create_fb()
            .returning(|_, _, _| Ok(FbHandle(5)));
        device
            .expect_fill_rects()
            .returning(|_, _| Err(DeviceError::InvalidFramebuffer("fill".to_string())));
        device
            .expect_remove_fb()
            .with(eq(FbHandle(5)))
            .times(1)
            .returning(|fb| Err(DeviceError::UnknownFramebuffer(fb)));

        // Act
        let result = create_cursor_fb(&mut device, CursorSize::square(64));

        // Assert
        assert_eq!(
            result,
            Err(DeviceError::InvalidFramebuffer("fill".to_string()))
        );
    }
}
