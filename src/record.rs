//! Per-camera record shape and the `fusion_state` mailbox protocol.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::state::Value;

/// The per-camera mailbox coordinating the capture-fusion protocol between
/// controller and worker. Transitions are strictly forward:
/// `IDLE -> REQUESTED -> PROCESSING -> READY -> IDLE`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FusionState {
    Idle,
    Requested,
    Processing,
    Ready,
}

impl fmt::Display for FusionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FusionState::Idle => "IDLE",
            FusionState::Requested => "REQUESTED",
            FusionState::Processing => "PROCESSING",
            FusionState::Ready => "READY",
        };
        write!(f, "{s}")
    }
}

impl FromStr for FusionState {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IDLE" => Ok(FusionState::Idle),
            "REQUESTED" => Ok(FusionState::Requested),
            "PROCESSING" => Ok(FusionState::Processing),
            "READY" => Ok(FusionState::Ready),
            _ => Err(()),
        }
    }
}

impl From<FusionState> for Value {
    fn from(state: FusionState) -> Self {
        Value::String(state.to_string())
    }
}

/// Fixed frame dimensions for a camera; fixed at worker startup, with no
/// hot-reconfiguration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CameraSettings {
    pub width: usize,
    pub height: usize,
}

/// Build the initial `Value` tree for one camera record.
pub fn new_camera_record(settings: CameraSettings) -> Value {
    let mut setting = BTreeMap::new();
    setting.insert("CAP_PROP_FRAME_WIDTH".to_string(), Value::Int(settings.width as i64));
    setting.insert("CAP_PROP_FRAME_HEIGHT".to_string(), Value::Int(settings.height as i64));

    let mut record = BTreeMap::new();
    record.insert("setting".to_string(), Value::Mapping(setting));
    record.insert("is_running".to_string(), Value::Bool(true));
    record.insert(
        "latest_frame_data".to_string(),
        Value::Sequence(vec![Value::Bool(false), Value::Null]),
    );
    record.insert("fused_result".to_string(), Value::Null);
    record.insert("fusion_state".to_string(), FusionState::Idle.into());
    Value::Mapping(record)
}

/// Build the initial root `SharedState` tree: `is_running`, `ipv4`,
/// `port`, and one `camera/{id}` record per configured camera.
pub fn new_root(ipv4: &str, port: u16, cameras: &[(String, CameraSettings)]) -> Value {
    let mut camera = BTreeMap::new();
    for (id, settings) in cameras {
        camera.insert(id.clone(), new_camera_record(*settings));
    }

    let mut root = BTreeMap::new();
    root.insert("is_running".to_string(), Value::Bool(true));
    root.insert("ipv4".to_string(), Value::String(ipv4.to_string()));
    root.insert("port".to_string(), Value::Int(port as i64));
    root.insert("camera".to_string(), Value::Mapping(camera));
    Value::Mapping(root)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fusion_state_round_trips_through_strings() {
        for s in [
            FusionState::Idle,
            FusionState::Requested,
            FusionState::Processing,
            FusionState::Ready,
        ] {
            let text = s.to_string();
            assert_eq!(text.parse::<FusionState>().unwrap(), s);
        }
    }

    #[test]
    fn new_root_has_one_camera_entry_per_config() {
        let root = new_root(
            "0.0.0.0",
            5000,
            &[("0".to_string(), CameraSettings { width: 64, height: 48 })],
        );
        let map = root.as_mapping().unwrap();
        let cameras = map.get("camera").unwrap().as_mapping().unwrap();
        assert_eq!(cameras.len(), 1);
        assert!(cameras.contains_key("0"));
    }
}
