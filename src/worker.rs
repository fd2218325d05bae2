//! Per-camera capture worker: a blocking state machine that interleaves
//! live streaming with bracketed, fusion-producing capture.
//!
//! Runs on a dedicated OS thread per camera. Workers are blocking — they
//! block on device reads and on timed sleeps — rather than cooperating
//! with an async executor, since the only shared resource they touch
//! (the state store) is already safe to use from any thread.

use std::str::FromStr;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::camera::{AutoExposureMode, CameraDevice, Property, PropertyValue};
use crate::fusion;
use crate::quality::QualityWeights;
use crate::record::FusionState;
use crate::state::{ImagePayload, SharedState, Value};

/// Bracket exposures, in device-native units. Opaque to this crate;
/// passed straight through to the adapter.
pub const BRACKET_EXPOSURES: [i64; 3] = [5000, 1000, 20];

const LIVE_RETRY_DELAY: Duration = Duration::from_millis(100);
const SETTLE_MAX_WAIT: Duration = Duration::from_secs(2);
const SETTLE_CHANGE_THRESHOLD: f64 = 0.15;
const SETTLE_STABLE_DELTA: f64 = 1.0;
const SETTLE_STABLE_COUNT_REQUIRED: u32 = 3;
const MEAN_EPSILON: f64 = 1e-9;

/// Drives one camera's device through its whole lifecycle. Owned
/// exclusively by the thread running [`CaptureWorker::run`] — no other
/// component may touch the device.
pub struct CaptureWorker<D: CameraDevice> {
    camera_id: String,
    device: D,
    shared: SharedState,
    weights: QualityWeights,
    last_mean: f64,
}

impl<D: CameraDevice> CaptureWorker<D> {
    pub fn new(camera_id: impl Into<String>, device: D, shared: SharedState) -> Self {
        Self {
            camera_id: camera_id.into(),
            device,
            shared,
            weights: QualityWeights::default(),
            last_mean: 0.0,
        }
    }

    fn record_path(&self, field: &str) -> String {
        format!("camera/{}/{}", self.camera_id, field)
    }

    fn fusion_state(&self) -> FusionState {
        self.shared
            .get(&self.record_path("fusion_state"))
            .ok()
            .and_then(|v| v.as_str().and_then(|s| FusionState::from_str(s).ok()))
            .unwrap_or(FusionState::Idle)
    }

    fn set_fusion_state(&self, state: FusionState) {
        let _ = self.shared.set(&self.record_path("fusion_state"), state.into());
    }

    fn camera_running(&self) -> bool {
        self.shared
            .get(&self.record_path("is_running"))
            .ok()
            .map(|v| matches!(v, Value::Bool(true)))
            .unwrap_or(false)
    }

    fn global_running(&self) -> bool {
        self.shared
            .get("is_running")
            .ok()
            .map(|v| matches!(v, Value::Bool(true)))
            .unwrap_or(false)
    }

    fn should_run(&self) -> bool {
        self.global_running() && self.camera_running()
    }

    fn publish_latest_frame(&self, ok: bool, frame: Option<crate::image::ByteImage>) {
        let payload = match frame {
            Some(img) => ImagePayload::Raw(img),
            None => {
                // No frame to publish; leave the previous one in place but
                // flip the `ok` flag so readers know the camera stalled.
                let _ = self.shared.set(
                    &format!("{}/0", self.record_path("latest_frame_data")),
                    Value::Bool(ok),
                );
                return;
            }
        };
        let _ = self.shared.set(
            &format!("{}/0", self.record_path("latest_frame_data")),
            Value::Bool(ok),
        );
        let _ = self
            .shared
            .publish_image(&format!("{}/1", self.record_path("latest_frame_data")), payload);
    }

    /// Top-level loop: run until shutdown is signalled. Returns once the
    /// device has been released.
    pub fn run(&mut self) {
        info!(camera_id = %self.camera_id, "capture worker starting");
        while self.should_run() {
            match self.fusion_state() {
                FusionState::Idle => self.live_tick(),
                FusionState::Requested => self.run_bracket(),
                // PROCESSING/READY are only ever written by this worker;
                // if observed here it means we are mid-transition and
                // should simply keep looping until the state catches up.
                FusionState::Processing | FusionState::Ready => {
                    thread::sleep(LIVE_RETRY_DELAY);
                }
            }
        }
        self.device.release();
        info!(camera_id = %self.camera_id, "capture worker stopped");
    }

    /// One iteration of the live-streaming loop: grab a frame, publish it,
    /// or back off 100ms on failure.
    fn live_tick(&mut self) {
        match self.device.read() {
            Ok((true, Some(frame))) => self.publish_latest_frame(true, Some(frame)),
            Ok(_) => {
                thread::sleep(LIVE_RETRY_DELAY);
            }
            Err(e) => {
                warn!(camera_id = %self.camera_id, error = %e, "frame grab failed, retrying");
                thread::sleep(LIVE_RETRY_DELAY);
            }
        }
    }

    /// Drives the device through the whole exposure bracket, fuses the
    /// result, and transitions back to READY.
    fn run_bracket(&mut self) {
        self.set_fusion_state(FusionState::Processing);

        if let Err(e) = self.device.set(
            Property::AutoExposure,
            PropertyValue::AutoExposure(AutoExposureMode::Manual),
        ) {
            warn!(camera_id = %self.camera_id, error = %e, "failed to switch to manual exposure");
        }
        // Seed `last_mean` from a baseline frame taken right after switching
        // into manual exposure but before the first bracket exposure is
        // commanded, so the settling loop's change-detection check for the
        // first step has a real pre-change reference instead of racing off
        // the zero-initialized default (which would otherwise read as an
        // immediate, spurious 15% change and collapse the two-phase
        // detect-then-stabilize wait into a single phase).
        match self.device.read() {
            Ok((true, Some(frame))) => {
                self.last_mean = frame.mean();
                self.publish_latest_frame(true, Some(frame));
            }
            Ok(_) => {}
            Err(e) => warn!(camera_id = %self.camera_id, error = %e, "baseline frame read failed"),
        }

        let mut accumulator = Vec::with_capacity(BRACKET_EXPOSURES.len());
        for &exposure in &BRACKET_EXPOSURES {
            if let Err(e) = self.device.set(
                Property::AutoExposure,
                PropertyValue::AutoExposure(AutoExposureMode::Manual),
            ) {
                warn!(camera_id = %self.camera_id, error = %e, "failed to switch to manual exposure");
                continue;
            }
            if let Err(e) = self.device.set(Property::Exposure, PropertyValue::Int(exposure)) {
                warn!(camera_id = %self.camera_id, error = %e, "failed to set exposure");
                continue;
            }

            if let Some(frame) = self.settle(exposure) {
                self.last_mean = frame.mean();
                accumulator.push(frame);
            }
        }

        if accumulator.is_empty() {
            warn!(camera_id = %self.camera_id, "bracket produced no frames, fused_result left absent");
        } else {
            match fusion::fuse(&accumulator, self.weights) {
                Ok(fused) => {
                    let _ = self
                        .shared
                        .publish_image(&self.record_path("fused_result"), ImagePayload::Raw(fused));
                }
                Err(e) => warn!(camera_id = %self.camera_id, error = %e, "fusion failed"),
            }
        }

        let _ = self.device.set(
            Property::AutoExposure,
            PropertyValue::AutoExposure(AutoExposureMode::Auto),
        );
        // Flush one discarded frame to clear any latent buffer.
        let _ = self.device.read();

        // Always transition to READY, even if capture failed partway
        // through and fused_result is still null — a stuck PROCESSING
        // state would wedge the controller with no way to retry.
        self.set_fusion_state(FusionState::Ready);
    }

    /// Adaptive settling loop: waits for the sensor to converge on the
    /// newly commanded exposure before accepting a frame as representative
    /// of that bracket step.
    fn settle(&mut self, _exposure: i64) -> Option<crate::image::ByteImage> {
        let start = Instant::now();
        let mut has_changed = false;
        let mut stable_count: u32 = 0;
        let mut prev_mean = 0.0;
        let mut last_frame = None;

        while start.elapsed() < SETTLE_MAX_WAIT {
            let (ok, frame) = match self.device.read() {
                Ok(r) => r,
                Err(_) => break,
            };
            if !ok {
                break;
            }
            let Some(frame) = frame else { break };

            self.publish_latest_frame(true, Some(frame.clone()));
            let curr_mean = frame.mean();

            if !has_changed {
                let denom = self.last_mean.max(MEAN_EPSILON);
                if (curr_mean - self.last_mean).abs() / denom > SETTLE_CHANGE_THRESHOLD {
                    has_changed = true;
                }
            } else {
                if (curr_mean - prev_mean).abs() < SETTLE_STABLE_DELTA {
                    stable_count += 1;
                } else {
                    stable_count = 0;
                }
                last_frame = Some(frame.clone());
                if stable_count >= SETTLE_STABLE_COUNT_REQUIRED {
                    last_frame = Some(frame);
                    break;
                }
            }

            prev_mean = curr_mean;
            last_frame = Some(frame);
        }

        last_frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::MockCameraDevice;
    use crate::record::{new_root, CameraSettings};

    fn worker_with_fresh_state(id: &str) -> CaptureWorker<MockCameraDevice> {
        let root = new_root("0.0.0.0", 5000, &[(id.to_string(), CameraSettings { width: 16, height: 16 })]);
        let shared = SharedState::from_root(root);
        let device = MockCameraDevice::open(0).unwrap();
        CaptureWorker::new(id, device, shared)
    }

    #[test]
    fn live_tick_publishes_a_frame() {
        let mut worker = worker_with_fresh_state("0");
        worker.live_tick();
        let latest = worker.shared.get(&worker.record_path("latest_frame_data")).unwrap();
        let seq = match latest {
            Value::Sequence(s) => s,
            _ => panic!("expected sequence"),
        };
        assert_eq!(seq[0], Value::Bool(true));
    }

    #[test]
    fn requested_state_eventually_reaches_ready_with_fused_result() {
        let mut worker = worker_with_fresh_state("0");
        worker.set_fusion_state(FusionState::Requested);
        worker.run_bracket();
        assert_eq!(worker.fusion_state(), FusionState::Ready);
        let fused = worker.shared.get(&worker.record_path("fused_result")).unwrap();
        assert_ne!(fused, Value::Null);
    }
}
