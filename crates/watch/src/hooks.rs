//! Collaborators the watchdogs call out to.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use worldtrack_common::{EntityId, PoolHandle};

/// What the watchdogs need to know about a live vehicle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleSample {
    pub position: Vec3,
    /// Unit up vector of the vehicle's orientation.
    pub up: Vec3,
    pub move_speed: Vec3,
    pub turn_speed: Vec3,
}

/// Looks vehicles up by pool handle.
pub trait VehicleSource {
    /// `None` if the handle no longer names a live vehicle.
    fn sample_vehicle(&self, handle: PoolHandle) -> Option<VehicleSample>;
}

/// Per-type teardown run on mission end for entities the mission created.
pub trait EntityCleanup {
    fn is_resident(&self, id: EntityId) -> bool;
    fn cleanup_vehicle(&mut self, handle: PoolHandle);
    fn cleanup_ped(&mut self, handle: PoolHandle);
    fn cleanup_object(&mut self, handle: PoolHandle);
}

/// One global simulation parameter put back to its idle value when a
/// mission ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GlobalReset {
    /// Stop forcing every random ped to one type.
    RandomPedType,
    PedDensity,
    CarDensity,
    CrimeSensitivity,
    CameraRestore,
    WidescreenOff,
    MissionAudio,
    Weather,
    /// Release special characters and cutscene models from streaming.
    MissionModels,
    EnableStreaming,
    HudFlash,
    HelpMessage,
    OnscreenTimer,
    IgnoredByCops,
    IgnoredByEveryone,
    PlayerSafe,
    StoredVehicle,
}

/// Every reset a mission end applies, in order.
pub const MISSION_END_RESETS: [GlobalReset; 17] = [
    GlobalReset::RandomPedType,
    GlobalReset::PedDensity,
    GlobalReset::CarDensity,
    GlobalReset::CrimeSensitivity,
    GlobalReset::CameraRestore,
    GlobalReset::WidescreenOff,
    GlobalReset::MissionAudio,
    GlobalReset::Weather,
    GlobalReset::MissionModels,
    GlobalReset::EnableStreaming,
    GlobalReset::HudFlash,
    GlobalReset::HelpMessage,
    GlobalReset::OnscreenTimer,
    GlobalReset::IgnoredByCops,
    GlobalReset::IgnoredByEveryone,
    GlobalReset::PlayerSafe,
    GlobalReset::StoredVehicle,
];

/// Receives global resets.
pub trait SimulationControl {
    fn apply(&mut self, reset: GlobalReset);
}

/// Plain-data stand-in for the global simulation state a mission can bend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationParams {
    pub forced_ped_type: Option<u32>,
    pub ped_density: f32,
    pub car_density: f32,
    pub crime_sensitivity: f32,
    pub camera_scripted: bool,
    pub widescreen: bool,
    pub mission_audio_loaded: bool,
    pub weather_forced: bool,
    pub mission_models_required: bool,
    pub streaming_disabled: bool,
    pub hud_flash_item: Option<u32>,
    pub help_message: Option<String>,
    pub onscreen_timer_disabled: bool,
    pub ignored_by_cops: bool,
    pub ignored_by_everyone: bool,
    pub player_safe: bool,
    pub stored_vehicle: Option<PoolHandle>,
    pub stored_vehicle_was_random: bool,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            forced_ped_type: None,
            ped_density: 1.0,
            car_density: 1.0,
            crime_sensitivity: 1.0,
            camera_scripted: false,
            widescreen: false,
            mission_audio_loaded: false,
            weather_forced: false,
            mission_models_required: false,
            streaming_disabled: false,
            hud_flash_item: None,
            help_message: None,
            onscreen_timer_disabled: false,
            ignored_by_cops: false,
            ignored_by_everyone: false,
            player_safe: false,
            stored_vehicle: None,
            stored_vehicle_was_random: true,
        }
    }
}

impl SimulationControl for SimulationParams {
    fn apply(&mut self, reset: GlobalReset) {
        let idle = Self::default();
        match reset {
            GlobalReset::RandomPedType => self.forced_ped_type = idle.forced_ped_type,
            GlobalReset::PedDensity => self.ped_density = idle.ped_density,
            GlobalReset::CarDensity => self.car_density = idle.car_density,
            GlobalReset::CrimeSensitivity => self.crime_sensitivity = idle.crime_sensitivity,
            GlobalReset::CameraRestore => self.camera_scripted = false,
            GlobalReset::WidescreenOff => self.widescreen = false,
            GlobalReset::MissionAudio => self.mission_audio_loaded = false,
            GlobalReset::Weather => self.weather_forced = false,
            GlobalReset::MissionModels => self.mission_models_required = false,
            GlobalReset::EnableStreaming => self.streaming_disabled = false,
            GlobalReset::HudFlash => self.hud_flash_item = None,
            GlobalReset::HelpMessage => self.help_message = None,
            GlobalReset::OnscreenTimer => self.onscreen_timer_disabled = false,
            GlobalReset::IgnoredByCops => self.ignored_by_cops = false,
            GlobalReset::IgnoredByEveryone => self.ignored_by_everyone = false,
            GlobalReset::PlayerSafe => self.player_safe = false,
            GlobalReset::StoredVehicle => {
                self.stored_vehicle = None;
                self.stored_vehicle_was_random = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_resets_restore_idle_state() {
        let mut params = SimulationParams {
            forced_ped_type: Some(4),
            ped_density: 0.0,
            car_density: 3.0,
            crime_sensitivity: 0.5,
            camera_scripted: true,
            widescreen: true,
            mission_audio_loaded: true,
            weather_forced: true,
            mission_models_required: true,
            streaming_disabled: true,
            hud_flash_item: Some(2),
            help_message: Some("get in the car".into()),
            onscreen_timer_disabled: true,
            ignored_by_cops: true,
            ignored_by_everyone: true,
            player_safe: true,
            stored_vehicle: Some(PoolHandle::new(3, 1)),
            stored_vehicle_was_random: false,
        };
        for reset in MISSION_END_RESETS {
            params.apply(reset);
        }
        assert_eq!(params, SimulationParams::default());
    }

    #[test]
    fn single_reset_leaves_the_rest() {
        let mut params = SimulationParams {
            ped_density: 0.2,
            car_density: 0.2,
            ..SimulationParams::default()
        };
        params.apply(GlobalReset::PedDensity);
        assert_eq!(params.ped_density, 1.0);
        assert_eq!(params.car_density, 0.2);
    }

    #[test]
    fn params_load_from_partial_json() {
        let params: SimulationParams = serde_json::from_str(r#"{ "widescreen": true }"#).unwrap();
        assert!(params.widescreen);
        assert_eq!(params.ped_density, 1.0);
    }
}
