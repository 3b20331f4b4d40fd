//! Events sent from the rendering surface to the engine.

use serde::{Deserialize, Serialize};

use crate::types::SurfaceHandle;

/// Lifecycle callbacks of the surface the camera renders into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SurfaceEvent {
    /// Surface became available.
    Created(SurfaceHandle),

    /// Surface format or size changed.
    Changed(SurfaceHandle),

    /// Surface is going away.
    Destroyed,
}
