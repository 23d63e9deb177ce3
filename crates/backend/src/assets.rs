use fleetwatch_shared::models::Entity;
use std::path::Path;

pub struct Assets {
    pub vehicles: Vec<Entity>,
}

impl Assets {
    pub fn load(assets_dir: &Path) -> Result<Self, String> {
        let vehicles_path = assets_dir.join("vehicles.json");

        let vehicles_data = std::fs::read_to_string(&vehicles_path)
            .map_err(|e| format!("Failed to read {}: {}", vehicles_path.display(), e))?;

        let vehicles: Vec<Entity> = serde_json::from_str(&vehicles_data)
            .map_err(|e| format!("Failed to parse vehicles.json: {}", e))?;

        if let Some(blank) = vehicles.iter().position(|v| v.id.trim().is_empty()) {
            return Err(format!("vehicles.json entry {} has an empty id", blank));
        }

        tracing::info!(vehicles = vehicles.len(), "Loaded fleet assets");

        Ok(Assets { vehicles })
    }
}
