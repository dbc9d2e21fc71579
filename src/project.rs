// project.rs — 项目数据记录（静态 JSON，运行期只读）

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// 一个建筑项目：平面图库 + 可选 360° 导览。
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default, rename = "images360")]
    pub images_360: Vec<Panorama>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub year: Option<u32>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub area: Option<String>,
    #[serde(default)]
    pub specifications: BTreeMap<String, String>,
}

/// 一张 360° 全景照片。
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Panorama {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub image_url: String,
    /// 进入该全景时的默认相机角度 [θ, φ]（弧度）。
    #[serde(default)]
    pub default_camera_position: Option<[f32; 2]>,
    #[serde(default)]
    pub nodes: Vec<Hotspot>,
}

/// 锚定在全景球面上的导航标记。
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hotspot {
    pub id: String,
    pub label: String,
    pub spherical: Spherical,
    #[serde(default = "default_scale")]
    pub scale: f32,
    pub target_photo_id: String,
    /// 导航完成后应用的相机角度 [θ, φ]。
    #[serde(default)]
    pub camera_position: Option<[f32; 2]>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Spherical {
    pub theta: f32,
    pub phi: f32,
}

fn default_scale() -> f32 {
    1.0
}

impl Project {
    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn load(path: &Path) -> Result<Self, std::io::Error> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    pub fn has_tour(&self) -> bool {
        !self.images_360.is_empty()
    }

    pub fn panorama(&self, id: &str) -> Option<&Panorama> {
        self.images_360.iter().find(|p| p.id == id)
    }
}
