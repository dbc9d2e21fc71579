// camera.rs — 视点相机（透视投影 + FOV 作为变焦代理）

use glam::Mat4;

pub const DEFAULT_FOV_DEG: f32 = 75.0;

/// 投影类型。FOV 变焦只对透视投影有意义。
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    Perspective { fov_deg: f32 },
    Orthographic { height: f32 },
}

#[derive(Debug, Clone, Copy)]
pub struct Camera {
    pub projection: Projection,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    pub fn perspective(fov_deg: f32) -> Self {
        Self {
            projection: Projection::Perspective { fov_deg },
            near: 0.1,
            far: 1000.0,
        }
    }

    pub fn fov_deg(&self) -> Option<f32> {
        match self.projection {
            Projection::Perspective { fov_deg } => Some(fov_deg),
            Projection::Orthographic { .. } => None,
        }
    }

    /// 仅对透视相机生效；返回是否写入。
    pub fn set_fov_deg(&mut self, fov: f32) -> bool {
        match &mut self.projection {
            Projection::Perspective { fov_deg } => {
                *fov_deg = fov;
                true
            }
            Projection::Orthographic { .. } => false,
        }
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        match self.projection {
            Projection::Perspective { fov_deg } => {
                // tan(fov/2) 在 180° 处发散，渲染前夹取
                let safe = fov_deg.clamp(1.0, 179.0);
                Mat4::perspective_rh(safe.to_radians(), aspect.max(1e-4), self.near, self.far)
            }
            Projection::Orthographic { height } => {
                let half_h = height * 0.5;
                let half_w = half_h * aspect.max(1e-4);
                Mat4::orthographic_rh(-half_w, half_w, -half_h, half_h, self.near, self.far)
            }
        }
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::perspective(DEFAULT_FOV_DEG)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perspective_fov_round_trips() {
        let mut cam = Camera::default();
        assert_eq!(cam.fov_deg(), Some(DEFAULT_FOV_DEG));
        assert!(cam.set_fov_deg(50.0));
        assert_eq!(cam.fov_deg(), Some(50.0));
    }

    #[test]
    fn orthographic_has_no_fov() {
        let mut cam = Camera {
            projection: Projection::Orthographic { height: 2.0 },
            near: 0.1,
            far: 10.0,
        };
        assert_eq!(cam.fov_deg(), None);
        assert!(!cam.set_fov_deg(50.0));
    }

    #[test]
    fn projection_matrix_is_finite_at_extremes() {
        let cam = Camera::perspective(180.0);
        let m = cam.projection_matrix(16.0 / 9.0);
        assert!(m.to_cols_array().iter().all(|v| v.is_finite()));
    }
}
