//! Measurement record types, one per destination table family
//!
//! Optional fields map to nullable columns. Satellite numbers and solar
//! region numbers are never null: unparseable values are stored as `0`.

use chrono::{DateTime, Utc};

use crate::dataset::{ParticleChannel, SatelliteRole};

/// Boulder station 1-minute K index
#[derive(Debug, Clone, PartialEq)]
pub struct BoulderKIndex {
    pub time_tag: DateTime<Utc>,
    pub k_index: Option<f64>,
}

/// DSCOVR 1-second magnetic field in GSE and GSM coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct DscovrMag {
    pub time_tag: DateTime<Utc>,
    pub bt: Option<f64>,
    pub bx_gse: Option<f64>,
    pub by_gse: Option<f64>,
    pub bz_gse: Option<f64>,
    pub theta_gse: Option<f64>,
    pub phi_gse: Option<f64>,
    pub bx_gsm: Option<f64>,
    pub by_gsm: Option<f64>,
    pub bz_gsm: Option<f64>,
    pub theta_gsm: Option<f64>,
    pub phi_gsm: Option<f64>,
}

/// GOES magnetometer reading
#[derive(Debug, Clone, PartialEq)]
pub struct MagnetometerReading {
    pub time_tag: DateTime<Utc>,
    pub satellite: i8,
    pub he: Option<f64>,
    pub hp: Option<f64>,
    pub hn: Option<f64>,
    pub total: Option<f64>,
    pub arcjet_flag: Option<bool>,
}

/// Planetary K index, 1-minute cadence
#[derive(Debug, Clone, PartialEq)]
pub struct PlanetaryKIndex {
    pub time_tag: DateTime<Utc>,
    pub kp_index: i8,
    pub estimated_kp: Option<f64>,
    /// Fractional notation such as "2M" or "3P"
    pub kp: Option<String>,
}

/// One active region on one observation day
#[derive(Debug, Clone, PartialEq)]
pub struct SolarRegion {
    pub observed_date: DateTime<Utc>,
    pub region: i16,
    pub latitude: Option<i16>,
    pub longitude: Option<i16>,
    pub location: Option<String>,
    pub carrington_longitude: Option<i16>,
    pub old_carrington_longitude: Option<i16>,
    pub area: Option<i16>,
    pub spot_class: Option<String>,
    pub extent: Option<i16>,
    pub number_spots: Option<i16>,
    pub mag_class: Option<String>,
    pub mag_string: Option<String>,
    pub status: Option<String>,
    pub c_xray_events: Option<i8>,
    pub m_xray_events: Option<i8>,
    pub x_xray_events: Option<i8>,
    pub proton_events: Option<String>,
    pub s_flares: Option<i8>,
    pub impulse_flares: [Option<i8>; 4],
    pub protons: Option<String>,
    pub c_flare_probability: Option<i8>,
    pub m_flare_probability: Option<i8>,
    pub x_flare_probability: Option<i8>,
    pub proton_probability: Option<i8>,
    pub first_date: Option<DateTime<Utc>>,
}

/// Proton or electron flux in one energy band
///
/// `yaw_flip` and `channel` are only populated for differential protons.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleFlux {
    pub time_tag: DateTime<Utc>,
    pub satellite: i8,
    pub flux: Option<f64>,
    pub energy: String,
    pub yaw_flip: Option<i8>,
    pub channel: Option<String>,
}

/// GOES X-ray flux in one wavelength band
#[derive(Debug, Clone, PartialEq)]
pub struct XrayFlux {
    pub time_tag: DateTime<Utc>,
    pub satellite: i8,
    pub flux: Option<f64>,
    pub observed_flux: Option<f64>,
    pub electron_correction: Option<f64>,
    pub electron_contamination: Option<bool>,
    pub energy: String,
}

/// Mapped rows of one file, tagged by destination
#[derive(Debug, Clone, PartialEq)]
pub enum RecordBatch {
    BoulderKIndex(Vec<BoulderKIndex>),
    DscovrMag(Vec<DscovrMag>),
    Magnetometers(Vec<MagnetometerReading>),
    PlanetaryKIndex(Vec<PlanetaryKIndex>),
    SolarRegions(Vec<SolarRegion>),
    ParticleFlux(ParticleChannel, Vec<ParticleFlux>),
    Xray(SatelliteRole, Vec<XrayFlux>),
}

impl RecordBatch {
    pub fn len(&self) -> usize {
        match self {
            RecordBatch::BoulderKIndex(rows) => rows.len(),
            RecordBatch::DscovrMag(rows) => rows.len(),
            RecordBatch::Magnetometers(rows) => rows.len(),
            RecordBatch::PlanetaryKIndex(rows) => rows.len(),
            RecordBatch::SolarRegions(rows) => rows.len(),
            RecordBatch::ParticleFlux(_, rows) => rows.len(),
            RecordBatch::Xray(_, rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn table_name(&self) -> &'static str {
        match self {
            RecordBatch::BoulderKIndex(_) => "boulder_k_index_1m",
            RecordBatch::DscovrMag(_) => "dscovr_mag_1s",
            RecordBatch::Magnetometers(_) => "magnetometers_1_day",
            RecordBatch::PlanetaryKIndex(_) => "planetary_k_index_1m",
            RecordBatch::SolarRegions(_) => "solar_regions",
            RecordBatch::ParticleFlux(channel, _) => channel.table_name(),
            RecordBatch::Xray(role, _) => crate::dataset::xray_table_name(*role),
        }
    }
}
