//! sync2gear API operations organized by resource
//!
//! Playback control endpoints live under `/playback/control/`, the state
//! fetch under `/playback/state/` and the zone listing under `/zones/`.

pub mod playback;
pub mod state;
pub mod zones;

pub use playback::{
    NextOperation, NextOperationRequest, PauseOperation, PauseOperationRequest, PlayOperation,
    PlayOperationRequest, PreviousOperation, PreviousOperationRequest, ResumeOperation,
    ResumeOperationRequest, SeekOperation, SeekOperationRequest, SetVolumeOperation,
    SetVolumeOperationRequest,
};
pub use state::{GetPlaybackStateOperation, GetPlaybackStateRequest};
pub use zones::{ListZonesOperation, ListZonesRequest};
