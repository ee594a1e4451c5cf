//! Exit-zone geometry and routing (§3, §4.3).

use crate::camera::{Camera, CameraId, CameraRole};
use crate::rect::NormalizedRect;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Label of a zone within a camera's frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
pub enum ZoneLabel {
    Left,
    Right,
    RightTop,
    RightBottom,
    LeftTop,
    LeftBottom,
    Top,
    Bottom,
    /// Center zone on MIDDLE cameras, routed by sign of horizontal velocity.
    Equal,
}

/// A camera's labeled, possibly-overlapping set of exit zones.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ZoneSet {
    pub zones: HashMap<ZoneLabel, NormalizedRect>,
}

impl ZoneSet {
    /// The zone (if any) whose rectangle contains the normalized point.
    /// When multiple zones overlap, the first match in a stable label order wins.
    pub fn containing(&self, x: f64, y: f64) -> Option<ZoneLabel> {
        const ORDER: &[ZoneLabel] = &[
            ZoneLabel::Equal,
            ZoneLabel::Left,
            ZoneLabel::Right,
            ZoneLabel::RightTop,
            ZoneLabel::RightBottom,
            ZoneLabel::LeftTop,
            ZoneLabel::LeftBottom,
            ZoneLabel::Top,
            ZoneLabel::Bottom,
        ];
        for label in ORDER {
            if let Some(rect) = self.zones.get(label) {
                if rect.contains(x, y) {
                    return Some(*label);
                }
            }
        }
        None
    }
}

/// Total routing map: `(camera_id, zone_label) -> target camera_id`.
///
/// `EQUAL` zones on MIDDLE cameras are not looked up directly — callers
/// resolve them via [`RoutingTable::resolve_equal`] using the sign of the
/// horizontal velocity, per §4.3.
#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    routes: HashMap<(CameraId, ZoneLabel), CameraId>,
    left_camera: Option<CameraId>,
    right_camera: Option<CameraId>,
}

/// Error building zone geometry/routing from a camera role set.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum RoutingBuildError {
    #[error("routing target for camera {0:?} zone {1:?} would equal the source camera")]
    SelfRoute(CameraId, ZoneLabel),
}

impl RoutingTable {
    /// Build zone routing from role assignments, per the rules in §4.3:
    /// - LEFT routes its RIGHT/RIGHT_TOP/RIGHT_BOTTOM/TOP/BOTTOM/LEFT zones toward
    ///   MIDDLE if present, else toward RIGHT.
    /// - RIGHT is symmetric.
    /// - MIDDLE routes LEFT->LEFT, RIGHT->RIGHT, TOP/BOTTOM/EQUAL by velocity sign.
    /// - `middle_opposite` inverts all routing (middle camera on the opposite sideline).
    pub fn build(cameras: &[Camera], middle_opposite: bool) -> Result<Self, RoutingBuildError> {
        let left = cameras.iter().find(|c| c.role == CameraRole::Left).map(|c| c.id);
        let right = cameras.iter().find(|c| c.role == CameraRole::Right).map(|c| c.id);
        let middle = cameras.iter().find(|c| c.role == CameraRole::Middle).map(|c| c.id);

        let mut routes = HashMap::new();

        if let Some(left_id) = left {
            let target = middle.unwrap_or_else(|| right.unwrap_or(left_id));
            for label in [
                ZoneLabel::Right,
                ZoneLabel::RightTop,
                ZoneLabel::RightBottom,
                ZoneLabel::Top,
                ZoneLabel::Bottom,
                ZoneLabel::Left,
            ] {
                if target == left_id {
                    return Err(RoutingBuildError::SelfRoute(left_id, label));
                }
                routes.insert((left_id, label), target);
            }
        }

        if let Some(right_id) = right {
            let target = middle.unwrap_or_else(|| left.unwrap_or(right_id));
            for label in [
                ZoneLabel::Left,
                ZoneLabel::LeftTop,
                ZoneLabel::LeftBottom,
                ZoneLabel::Top,
                ZoneLabel::Bottom,
                ZoneLabel::Right,
            ] {
                if target == right_id {
                    return Err(RoutingBuildError::SelfRoute(right_id, label));
                }
                routes.insert((right_id, label), target);
            }
        }

        if let Some(middle_id) = middle {
            if let Some(left_id) = left {
                routes.insert((middle_id, ZoneLabel::Left), left_id);
            }
            if let Some(right_id) = right {
                routes.insert((middle_id, ZoneLabel::Right), right_id);
            }
            // TOP/BOTTOM/EQUAL resolved dynamically via resolve_equal.
        }

        let (left_camera, right_camera) = if middle_opposite {
            (right, left)
        } else {
            (left, right)
        };

        Ok(Self {
            routes,
            left_camera,
            right_camera,
        })
    }

    /// Direct lookup for a non-velocity-dependent zone.
    pub fn route(&self, camera: CameraId, label: ZoneLabel) -> Option<CameraId> {
        self.routes.get(&(camera, label)).copied()
    }

    /// Resolve a MIDDLE camera's TOP/BOTTOM/EQUAL zone by sign of horizontal
    /// velocity: `vx < 0` routes LEFT, `vx >= 0` routes RIGHT (§4.3, §9 open question:
    /// tie-breaking uses sign only, not velocity smoothness).
    pub fn resolve_equal(&self, vx: f64) -> Option<CameraId> {
        if vx < 0.0 {
            self.left_camera
        } else {
            self.right_camera
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cam(id: CameraId, role: CameraRole) -> Camera {
        Camera::new(id, role, format!("cam{id}.mp4"), 30.0)
    }

    #[test]
    fn zone_set_containing_picks_first_match() {
        let mut zs = ZoneSet::default();
        zs.zones.insert(ZoneLabel::Right, NormalizedRect::new(0.8, 0.0, 0.2, 1.0));
        assert_eq!(zs.containing(0.9, 0.5), Some(ZoneLabel::Right));
        assert_eq!(zs.containing(0.1, 0.5), None);
    }

    #[test]
    fn two_camera_left_right_routes_to_each_other() {
        let cams = vec![cam(0, CameraRole::Left), cam(1, CameraRole::Right)];
        let table = RoutingTable::build(&cams, false).unwrap();
        assert_eq!(table.route(0, ZoneLabel::Right), Some(1));
        assert_eq!(table.route(1, ZoneLabel::Left), Some(0));
    }

    #[test]
    fn three_camera_outer_cameras_route_through_middle() {
        let cams = vec![
            cam(0, CameraRole::Left),
            cam(1, CameraRole::Middle),
            cam(2, CameraRole::Right),
        ];
        let table = RoutingTable::build(&cams, false).unwrap();
        assert_eq!(table.route(0, ZoneLabel::Right), Some(1));
        assert_eq!(table.route(2, ZoneLabel::Left), Some(1));
        assert_eq!(table.route(1, ZoneLabel::Left), Some(0));
        assert_eq!(table.route(1, ZoneLabel::Right), Some(2));
    }

    #[test]
    fn middle_resolves_equal_zone_by_velocity_sign() {
        let cams = vec![
            cam(0, CameraRole::Left),
            cam(1, CameraRole::Middle),
            cam(2, CameraRole::Right),
        ];
        let table = RoutingTable::build(&cams, false).unwrap();
        assert_eq!(table.resolve_equal(-0.01), Some(0));
        assert_eq!(table.resolve_equal(0.01), Some(2));
        assert_eq!(table.resolve_equal(0.0), Some(2));
    }

    #[test]
    fn middle_opposite_inverts_velocity_routing() {
        let cams = vec![
            cam(0, CameraRole::Left),
            cam(1, CameraRole::Middle),
            cam(2, CameraRole::Right),
        ];
        let table = RoutingTable::build(&cams, true).unwrap();
        assert_eq!(table.resolve_equal(-0.01), Some(2));
        assert_eq!(table.resolve_equal(0.01), Some(0));
    }
}
