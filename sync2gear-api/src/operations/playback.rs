//! Transport control operations
//!
//! Every control endpoint takes the zone id in the body and answers with a
//! short acknowledgement. The new playback state is never part of the answer;
//! it arrives later on the realtime feed.

use crate::define_zone_operation;
use crate::error::ApiError;

/// Highest volume the backend accepts
pub const MAX_VOLUME: u8 = 100;

define_zone_operation! {
    operation: PlayOperation,
    path: "/playback/control/play/",
    request: {
        shuffle: bool,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        playlist_ids: Vec<String>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        music_file_ids: Vec<String>,
    },
    validate: |req| check_content(&req.playlist_ids, &req.music_file_ids),
}

define_zone_operation! {
    operation: PauseOperation,
    path: "/playback/control/pause/",
    request: {},
}

define_zone_operation! {
    operation: ResumeOperation,
    path: "/playback/control/resume/",
    request: {},
}

define_zone_operation! {
    operation: NextOperation,
    path: "/playback/control/next/",
    request: {},
}

define_zone_operation! {
    operation: PreviousOperation,
    path: "/playback/control/previous/",
    request: {},
}

define_zone_operation! {
    operation: SetVolumeOperation,
    path: "/playback/control/volume/",
    request: {
        volume: u8,
    },
    validate: |req| check_volume(req.volume),
}

define_zone_operation! {
    operation: SeekOperation,
    path: "/playback/control/seek/",
    request: {
        position: f64,
    },
    validate: |req| check_position(req.position),
}

fn check_content(playlist_ids: &[String], music_file_ids: &[String]) -> crate::Result<()> {
    if playlist_ids.is_empty() && music_file_ids.is_empty() {
        return Err(ApiError::InvalidParameter(
            "playlist_ids or music_file_ids are required".to_string(),
        ));
    }
    if !playlist_ids.is_empty() && !music_file_ids.is_empty() {
        return Err(ApiError::InvalidParameter(
            "playlist_ids and music_file_ids are mutually exclusive".to_string(),
        ));
    }
    Ok(())
}

fn check_volume(volume: u8) -> crate::Result<()> {
    if volume > MAX_VOLUME {
        return Err(ApiError::InvalidParameter(format!(
            "volume must be between 0 and {}, got {}",
            MAX_VOLUME, volume
        )));
    }
    Ok(())
}

fn check_position(position: f64) -> crate::Result<()> {
    if !position.is_finite() || position < 0.0 {
        return Err(ApiError::InvalidParameter(format!(
            "position must be a non-negative number of seconds, got {}",
            position
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::{ControlOperation, HttpMethod};

    const ZONE: &str = "2f1c9a4e-0000-4000-8000-000000000001";

    #[test]
    fn test_play_body_omits_empty_selection() {
        let request = PlayOperationRequest {
            zone_id: ZONE.to_string(),
            shuffle: true,
            playlist_ids: vec!["p1".to_string()],
            music_file_ids: vec![],
        };

        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"zone_id": ZONE, "shuffle": true, "playlist_ids": ["p1"]})
        );
        assert!(PlayOperation::validate(&request).is_ok());
        assert_eq!(PlayOperation::METHOD, HttpMethod::Post);
    }

    #[test]
    fn test_play_requires_exactly_one_selection() {
        let mut request = PlayOperationRequest {
            zone_id: ZONE.to_string(),
            shuffle: false,
            playlist_ids: vec![],
            music_file_ids: vec![],
        };
        assert!(PlayOperation::validate(&request).is_err());

        request.playlist_ids = vec!["p1".to_string()];
        request.music_file_ids = vec!["m1".to_string()];
        assert!(PlayOperation::validate(&request).is_err());
    }

    #[test]
    fn test_volume_bounds() {
        let mut request = SetVolumeOperationRequest {
            zone_id: ZONE.to_string(),
            volume: 100,
        };
        assert!(SetVolumeOperation::validate(&request).is_ok());

        request.volume = 101;
        assert!(matches!(
            SetVolumeOperation::validate(&request),
            Err(ApiError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_seek_rejects_negative_and_nan() {
        for position in [-1.0, f64::NAN, f64::INFINITY] {
            let request = SeekOperationRequest {
                zone_id: ZONE.to_string(),
                position,
            };
            assert!(SeekOperation::validate(&request).is_err());
        }
    }

    #[test]
    fn test_empty_zone_rejected() {
        let request = PauseOperationRequest {
            zone_id: String::new(),
        };
        assert!(PauseOperation::validate(&request).is_err());
        assert_eq!(PauseOperation::PATH, "/playback/control/pause/");
        assert_eq!(PauseOperation::NAME, "PauseOperation");
    }
}
