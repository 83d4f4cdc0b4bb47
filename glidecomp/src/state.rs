//! The derived flight state written once per tick.
//!
//! [`DerivedState`] is one flat record of named sub-records. Downstream
//! consumers read it through a snapshot or a lease (see
//! [`crate::shared`]); only the [`crate::computer::FlightComputer`] writes
//! it.

use std::fmt;

use crate::freshness::Stamped;
use crate::geo::GeoPoint;
use crate::units::SpeedVector;

/// Glide ratio value meaning "no valid ratio".
pub const INVALID_GLIDE_RATIO: f64 = 999.0;

/// Percentage value meaning "no statistics yet".
pub const INVALID_PERCENTAGE: f64 = -1.0;

/// Flight regime classification.
///
/// `Cruise` and `Climb` are the settled states; the two `Possible*` states
/// debounce transitions between them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum CirclingMode {
    #[default]
    Cruise,
    PossibleClimb,
    Climb,
    PossibleCruise,
}

impl CirclingMode {
    /// Whether the aircraft counts as circling in this mode.
    pub fn is_circling(self) -> bool {
        matches!(self, CirclingMode::Climb | CirclingMode::PossibleCruise)
    }
}

impl fmt::Display for CirclingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CirclingMode::Cruise => write!(f, "Cruise"),
            CirclingMode::PossibleClimb => write!(f, "Possible climb"),
            CirclingMode::Climb => write!(f, "Climb"),
            CirclingMode::PossibleCruise => write!(f, "Possible cruise"),
        }
    }
}

/// Where the published baro altitude came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AltitudeSource {
    #[default]
    Unavailable,
    /// Reported by the device, no reference pressure configured.
    Device,
    /// Computed from static pressure or pressure altitude and the QNH.
    QnhCorrected,
    /// Pressure altitude published because no reference pressure is known.
    PressureFallback,
}

impl fmt::Display for AltitudeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AltitudeSource::Unavailable => write!(f, "Unavailable"),
            AltitudeSource::Device => write!(f, "Device"),
            AltitudeSource::QnhCorrected => write!(f, "QNH"),
            AltitudeSource::PressureFallback => write!(f, "Pressure altitude"),
        }
    }
}

/// Provenance of the effective wind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WindSource {
    #[default]
    None,
    Manual,
    External,
    Auto,
}

impl fmt::Display for WindSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindSource::None => write!(f, "None"),
            WindSource::Manual => write!(f, "Manual"),
            WindSource::External => write!(f, "External"),
            WindSource::Auto => write!(f, "Auto"),
        }
    }
}

/// Altitudes derived by the basic stage.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AltitudeInfo {
    /// Published baro altitude, see [`AltitudeInfo::baro_altitude_source`].
    pub baro_altitude: Stamped<f64>,
    pub baro_altitude_source: AltitudeSource,
    /// Baro altitude if enabled and available, else GPS altitude.
    pub nav_altitude: Stamped<f64>,
    /// TAS² / 2g, zero without airspeed.
    pub energy_height: f64,
    /// Nav altitude plus energy height.
    pub te_altitude: f64,
}

/// Vertical speeds in m/s.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VarioInfo {
    pub gps_vario: Stamped<f64>,
    /// GPS vario plus the rate of change of energy height.
    pub gps_vario_te: f64,
    pub brutto_vario: f64,
    pub netto_vario: f64,
    /// Polar sink rate at the current IAS (positive down), zero when unknown.
    pub sink_rate: f64,
    /// 30 s average of brutto vario.
    pub average: f64,
    /// 30 s average of netto vario.
    pub netto_average: f64,
}

/// Bank, pitch and load factor, measured or estimated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dynamics {
    /// Degrees, positive right.
    pub bank_angle: f64,
    /// Degrees, positive nose up.
    pub pitch_angle: f64,
    pub g_load: f64,
}

impl Default for Dynamics {
    fn default() -> Self {
        Self {
            bank_angle: 0.0,
            pitch_angle: 0.0,
            g_load: 1.0,
        }
    }
}

/// Takeoff/landing state.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FlightState {
    pub flying: bool,
    /// Seconds airborne in this flight.
    pub flight_time: f64,
    pub takeoff_time: Option<f64>,
    pub takeoff_location: Option<GeoPoint>,
    pub takeoff_altitude: Option<f64>,
    pub landing_time: Option<f64>,
}

/// Snapshot taken at the start of a leg or thermal.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LegStart {
    pub time: f64,
    pub location: Option<GeoPoint>,
    pub nav_altitude: f64,
    pub energy_height: f64,
}

impl LegStart {
    /// Nav altitude plus energy height at the snapshot.
    pub fn te_altitude(&self) -> f64 {
        self.nav_altitude + self.energy_height
    }
}

/// Circling state machine output and statistics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CirclingInfo {
    pub mode: CirclingMode,
    pub circling: bool,
    pub turning: bool,

    /// Degrees per second from track, unsmoothed.
    pub turn_rate: f64,
    pub turn_rate_smoothed: f64,
    /// Degrees per second from heading, unsmoothed.
    pub turn_rate_heading: f64,
    pub turn_rate_heading_smoothed: f64,

    pub turn_start: Option<LegStart>,
    pub climb_start: Option<LegStart>,
    pub cruise_start: Option<LegStart>,

    pub time_circling: f64,
    pub time_cruise: f64,
    pub time_climb_circling: f64,
    pub time_climb_cruise: f64,
    pub total_height_gain: f64,

    pub circling_percentage: f64,
    pub circling_climb_percentage: f64,
    pub noncircling_climb_percentage: f64,
}

impl Default for CirclingInfo {
    fn default() -> Self {
        Self {
            mode: CirclingMode::Cruise,
            circling: false,
            turning: false,
            turn_rate: 0.0,
            turn_rate_smoothed: 0.0,
            turn_rate_heading: 0.0,
            turn_rate_heading_smoothed: 0.0,
            turn_start: None,
            climb_start: None,
            cruise_start: None,
            time_circling: 0.0,
            time_cruise: 0.0,
            time_climb_circling: 0.0,
            time_climb_cruise: 0.0,
            total_height_gain: 0.0,
            circling_percentage: INVALID_PERCENTAGE,
            circling_climb_percentage: INVALID_PERCENTAGE,
            noncircling_climb_percentage: INVALID_PERCENTAGE,
        }
    }
}

/// Height gain over a climb.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ClimbStats {
    pub start_time: f64,
    pub end_time: f64,
    pub start_altitude: f64,
    /// Metres gained (total energy).
    pub gain: f64,
    /// Average climb rate in m/s.
    pub lift_rate: f64,
}

impl ClimbStats {
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}

/// Current and last thermal.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ThermalInfo {
    pub current: Option<ClimbStats>,
    pub last: Option<ClimbStats>,
    /// Low-pass filtered average of finished thermals.
    pub last_lift_rate_smoothed: f64,
    pub thermal_count: u32,
}

/// Wind estimate and the effective wind.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WindInfo {
    /// Latest automatic estimate.
    pub estimated: Stamped<SpeedVector>,
    /// Effective wind after source selection.
    pub wind: Stamped<SpeedVector>,
    pub source: WindSource,
    /// Positive for a headwind, m/s.
    pub head_wind: Option<f64>,
}

/// Glide ratios, [`INVALID_GLIDE_RATIO`] when undefined.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlideRatioInfo {
    /// Instantaneous, from GPS distance and altitude loss.
    pub ld: f64,
    /// From indicated airspeed over TE vario.
    pub ld_vario: f64,
    /// Since the start of the current cruise.
    pub cruise_ld: f64,
    /// Over the rotary trip window.
    pub average_ld: f64,
}

impl Default for GlideRatioInfo {
    fn default() -> Self {
        Self {
            ld: INVALID_GLIDE_RATIO,
            ld_vario: INVALID_GLIDE_RATIO,
            cruise_ld: INVALID_GLIDE_RATIO,
            average_ld: INVALID_GLIDE_RATIO,
        }
    }
}

/// Convection forecast from the temperature sounding.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SondeInfo {
    /// Predicted thermal top, metres MSL.
    pub thermal_height: Option<f64>,
    /// Predicted cloud base, metres MSL.
    pub cloud_base: Option<f64>,
}

/// Aggregated output of one tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DerivedState {
    pub altitude: AltitudeInfo,
    pub vario: VarioInfo,
    /// True heading in degrees.
    pub heading: Stamped<f64>,
    pub dynamics: Dynamics,
    pub flight: FlightState,
    pub circling: CirclingInfo,
    pub thermal: ThermalInfo,
    pub wind: WindInfo,
    pub glide: GlideRatioInfo,
    pub sonde: SondeInfo,
}

impl DerivedState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets every field, e.g. at the start of a new flight.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Previous and current values of the state that downstream layers turn
/// into notifications.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickEdges {
    pub previous_mode: CirclingMode,
    pub mode: CirclingMode,
    pub was_flying: bool,
    pub flying: bool,
    /// A thermal was finalised on this tick.
    pub thermal_finished: bool,
}

impl TickEdges {
    pub fn took_off(&self) -> bool {
        !self.was_flying && self.flying
    }

    pub fn landed(&self) -> bool {
        self.was_flying && !self.flying
    }

    /// Entered `Climb`, i.e. a new thermal was detected.
    pub fn thermal_detected(&self) -> bool {
        self.previous_mode != CirclingMode::Climb && self.mode == CirclingMode::Climb
    }

    pub fn circling_entered(&self) -> bool {
        !self.previous_mode.is_circling() && self.mode.is_circling()
    }

    pub fn circling_left(&self) -> bool {
        self.previous_mode.is_circling() && !self.mode.is_circling()
    }

    pub fn mode_changed(&self) -> bool {
        self.previous_mode != self.mode
    }
}
