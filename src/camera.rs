//! Camera device adapter: a thin, synchronous interface over a video
//! source. Workers run on blocking OS threads, so this trait is
//! deliberately synchronous rather than `async_trait` — there is no
//! executor here to yield to between device calls.

use crate::error::DeviceError;
use crate::image::ByteImage;

/// A device property settable via [`CameraDevice::set`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Property {
    FrameWidth,
    FrameHeight,
    AutoExposure,
    Exposure,
}

/// The value accompanying a [`Property`] write.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PropertyValue {
    Int(i64),
    AutoExposure(AutoExposureMode),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AutoExposureMode {
    Auto,
    Manual,
}

/// Thin interface over a video source: open, configure, grab, release.
/// Any concrete capture library satisfying this contract is acceptable;
/// [`MockCameraDevice`] is the only adapter shipped here.
pub trait CameraDevice: Send {
    fn open(index: usize) -> Result<Self, DeviceError>
    where
        Self: Sized;

    fn set(&mut self, property: Property, value: PropertyValue) -> Result<(), DeviceError>;

    /// Grab a frame. `Ok((false, None))` signals a soft failure the
    /// caller should retry; `Err` signals the device itself is unusable.
    fn read(&mut self) -> Result<(bool, Option<ByteImage>), DeviceError>;

    fn release(&mut self);
}

/// Deterministic mock camera. Synthesizes frames whose mean intensity
/// responds to the configured exposure, so the settling loop and bracket
/// logic are exercised meaningfully without real hardware.
pub struct MockCameraDevice {
    index: usize,
    width: usize,
    height: usize,
    exposure: i64,
    auto_exposure: AutoExposureMode,
    frame_count: u64,
    /// Frames remaining after an exposure change before the synthesized
    /// mean reaches its target plateau — models sensor settling.
    settle_remaining: u32,
    fail_reads: u32,
}

impl MockCameraDevice {
    /// Exposure (device units) above which a read transiently fails,
    /// purely for exercising the capture worker's retry path in tests.
    pub fn with_transient_failures(mut self, count: u32) -> Self {
        self.fail_reads = count;
        self
    }

    fn target_mean(&self) -> f64 {
        match self.auto_exposure {
            AutoExposureMode::Auto => 128.0,
            // Map exposure (device units, larger == brighter in this mock)
            // onto a [10, 245] mean-intensity band.
            AutoExposureMode::Manual => {
                let e = self.exposure.max(1) as f64;
                (10.0 + 235.0 * (e.ln() / 9000f64.ln()).clamp(0.0, 1.0)).clamp(10.0, 245.0)
            }
        }
    }
}

impl CameraDevice for MockCameraDevice {
    fn open(index: usize) -> Result<Self, DeviceError> {
        Ok(Self {
            index,
            width: 640,
            height: 480,
            exposure: 10_000,
            auto_exposure: AutoExposureMode::Auto,
            frame_count: 0,
            settle_remaining: 0,
            fail_reads: 0,
        })
    }

    fn set(&mut self, property: Property, value: PropertyValue) -> Result<(), DeviceError> {
        match (property, value) {
            (Property::FrameWidth, PropertyValue::Int(w)) => self.width = w.max(1) as usize,
            (Property::FrameHeight, PropertyValue::Int(h)) => self.height = h.max(1) as usize,
            (Property::Exposure, PropertyValue::Int(e)) => {
                self.exposure = e;
                self.settle_remaining = 3;
            }
            (Property::AutoExposure, PropertyValue::AutoExposure(mode)) => {
                self.auto_exposure = mode;
                self.settle_remaining = 3;
            }
            _ => {
                return Err(DeviceError::ReadFailed(format!(
                    "device {}: property/value mismatch",
                    self.index
                )))
            }
        }
        Ok(())
    }

    fn read(&mut self) -> Result<(bool, Option<ByteImage>), DeviceError> {
        if self.fail_reads > 0 {
            self.fail_reads -= 1;
            return Ok((false, None));
        }

        self.frame_count += 1;
        let target = self.target_mean();
        // Approach the target geometrically so several frames are needed
        // to "settle", as the real sensor pipeline would.
        let progress = if self.settle_remaining > 0 {
            self.settle_remaining -= 1;
            0.5
        } else {
            1.0
        };
        let mean = target * progress + 128.0 * (1.0 - progress);
        let v = mean.clamp(0.0, 255.0) as u8;
        let img = ByteImage::filled(self.width, self.height, [v, v, v]);
        Ok((true, Some(img)))
    }

    fn release(&mut self) {
        self.auto_exposure = AutoExposureMode::Auto;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_exposure_moves_mean_away_from_auto_default() {
        let mut dev = MockCameraDevice::open(0).unwrap();
        dev.set(Property::Exposure, PropertyValue::Int(20)).unwrap();
        dev.set(
            Property::AutoExposure,
            PropertyValue::AutoExposure(AutoExposureMode::Manual),
        )
        .unwrap();
        // Drain the settling frames.
        let mut last = 0.0;
        for _ in 0..5 {
            let (ok, frame) = dev.read().unwrap();
            assert!(ok);
            last = frame.unwrap().mean();
        }
        assert!(last < 128.0, "expected low exposure to darken the mock frame, got {last}");
    }
}
