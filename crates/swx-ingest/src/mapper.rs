//! Turn raw CSV rows into typed records
//!
//! The first row of every file is a header and is never mapped. A data row is
//! dropped only when it is shorter than its dataset's minimum width or when
//! its timestamp column does not parse; every other malformed field degrades
//! to `None` (or `0` for never-null integers).

use chrono::{DateTime, Utc};

use crate::dataset::{DatasetKind, ParticleChannel};
use crate::parsers::{
    parse_bounded_i16, parse_bounded_i8, parse_optional_bool, parse_optional_f64,
    parse_optional_i16, parse_optional_i8, parse_optional_string, parse_optional_timestamp,
    parse_timestamp,
};
use crate::records::{
    BoulderKIndex, DscovrMag, MagnetometerReading, ParticleFlux, PlanetaryKIndex, RecordBatch,
    SolarRegion, XrayFlux,
};

/// Result of mapping one file
#[derive(Debug, Clone, PartialEq)]
pub enum MapOutcome {
    Records(RecordBatch),
    /// Unknown or long-period dataset, or no valid rows
    NoOp,
}

/// Borrowed view of one CSV row; columns past the end read as ""
struct Row<'a>(&'a [String]);

impl<'a> Row<'a> {
    fn field(&self, index: usize) -> &'a str {
        self.0.get(index).map(|s| s.trim()).unwrap_or("")
    }
}

/// Minimum number of columns a row must carry to be mapped
pub fn min_columns(kind: &DatasetKind) -> Option<usize> {
    match kind {
        DatasetKind::BoulderKIndex1m => Some(2),
        DatasetKind::DscovrMag1s => Some(12),
        DatasetKind::Magnetometers1Day => Some(6),
        DatasetKind::PlanetaryKIndex1m => Some(4),
        DatasetKind::SolarRegions => Some(28),
        DatasetKind::ParticleFlux(channel) if channel.has_channel_columns() => Some(6),
        DatasetKind::ParticleFlux(_) => Some(4),
        DatasetKind::Xray(_) => Some(3),
        DatasetKind::LongPeriod(_) | DatasetKind::Unknown(_) => None,
    }
}

/// Map every data row of a file (header included in `rows`)
pub fn map_records(kind: &DatasetKind, rows: &[Vec<String>]) -> MapOutcome {
    let Some(min_width) = min_columns(kind) else {
        return MapOutcome::NoOp;
    };

    let batch = match kind {
        DatasetKind::BoulderKIndex1m => {
            RecordBatch::BoulderKIndex(collect(rows, min_width, map_boulder))
        },
        DatasetKind::DscovrMag1s => RecordBatch::DscovrMag(collect(rows, min_width, map_dscovr)),
        DatasetKind::Magnetometers1Day => {
            RecordBatch::Magnetometers(collect(rows, min_width, map_magnetometer))
        },
        DatasetKind::PlanetaryKIndex1m => {
            RecordBatch::PlanetaryKIndex(collect(rows, min_width, map_planetary))
        },
        DatasetKind::SolarRegions => {
            RecordBatch::SolarRegions(collect(rows, min_width, map_solar_region))
        },
        DatasetKind::ParticleFlux(channel) => {
            let channel = *channel;
            RecordBatch::ParticleFlux(
                channel,
                collect(rows, min_width, |time_tag, row| map_particle(channel, time_tag, row)),
            )
        },
        DatasetKind::Xray(role) => RecordBatch::Xray(*role, collect(rows, min_width, map_xray)),
        DatasetKind::LongPeriod(_) | DatasetKind::Unknown(_) => return MapOutcome::NoOp,
    };

    if batch.is_empty() {
        MapOutcome::NoOp
    } else {
        MapOutcome::Records(batch)
    }
}

/// Skip the header, enforce width, parse column 0 as the timestamp
fn collect<T, F>(rows: &[Vec<String>], min_width: usize, build: F) -> Vec<T>
where
    F: Fn(DateTime<Utc>, &Row<'_>) -> T,
{
    rows.iter()
        .skip(1)
        .filter(|row| row.len() >= min_width)
        .filter_map(|row| {
            let row = Row(row);
            parse_timestamp(row.field(0))
                .ok()
                .map(|time_tag| build(time_tag, &row))
        })
        .collect()
}

fn map_boulder(time_tag: DateTime<Utc>, row: &Row<'_>) -> BoulderKIndex {
    BoulderKIndex {
        time_tag,
        k_index: parse_optional_f64(row.field(1)),
    }
}

fn map_dscovr(time_tag: DateTime<Utc>, row: &Row<'_>) -> DscovrMag {
    let f = |i| parse_optional_f64(row.field(i));
    DscovrMag {
        time_tag,
        bt: f(1),
        bx_gse: f(2),
        by_gse: f(3),
        bz_gse: f(4),
        theta_gse: f(5),
        phi_gse: f(6),
        bx_gsm: f(7),
        by_gsm: f(8),
        bz_gsm: f(9),
        theta_gsm: f(10),
        phi_gsm: f(11),
    }
}

fn map_magnetometer(time_tag: DateTime<Utc>, row: &Row<'_>) -> MagnetometerReading {
    MagnetometerReading {
        time_tag,
        satellite: parse_bounded_i8(row.field(1)),
        he: parse_optional_f64(row.field(2)),
        hp: parse_optional_f64(row.field(3)),
        hn: parse_optional_f64(row.field(4)),
        total: parse_optional_f64(row.field(5)),
        arcjet_flag: parse_optional_bool(row.field(6)),
    }
}

fn map_planetary(time_tag: DateTime<Utc>, row: &Row<'_>) -> PlanetaryKIndex {
    PlanetaryKIndex {
        time_tag,
        kp_index: parse_bounded_i8(row.field(1)),
        estimated_kp: parse_optional_f64(row.field(2)),
        kp: parse_optional_string(row.field(3)),
    }
}

fn map_solar_region(observed_date: DateTime<Utc>, row: &Row<'_>) -> SolarRegion {
    let small = |i| parse_optional_i8(row.field(i));
    let int = |i| parse_optional_i16(row.field(i));
    let text = |i| parse_optional_string(row.field(i));

    SolarRegion {
        observed_date,
        region: parse_bounded_i16(row.field(1)),
        latitude: int(2),
        longitude: int(3),
        location: text(4),
        carrington_longitude: int(5),
        old_carrington_longitude: int(6),
        area: int(7),
        spot_class: text(8),
        extent: int(9),
        number_spots: int(10),
        mag_class: text(11),
        mag_string: text(12),
        status: text(13),
        c_xray_events: small(14),
        m_xray_events: small(15),
        x_xray_events: small(16),
        proton_events: text(17),
        s_flares: small(18),
        impulse_flares: [small(19), small(20), small(21), small(22)],
        protons: text(23),
        c_flare_probability: small(24),
        m_flare_probability: small(25),
        x_flare_probability: small(26),
        proton_probability: small(27),
        first_date: parse_optional_timestamp(row.field(28)),
    }
}

fn map_particle(channel: ParticleChannel, time_tag: DateTime<Utc>, row: &Row<'_>) -> ParticleFlux {
    let (yaw_flip, channel_name) = if channel.has_channel_columns() {
        (parse_optional_i8(row.field(4)), parse_optional_string(row.field(5)))
    } else {
        (None, None)
    };

    ParticleFlux {
        time_tag,
        satellite: parse_bounded_i8(row.field(1)),
        flux: parse_optional_f64(row.field(2)),
        energy: row.field(3).to_string(),
        yaw_flip,
        channel: channel_name,
    }
}

fn map_xray(time_tag: DateTime<Utc>, row: &Row<'_>) -> XrayFlux {
    XrayFlux {
        time_tag,
        satellite: parse_bounded_i8(row.field(1)),
        flux: parse_optional_f64(row.field(2)),
        observed_flux: parse_optional_f64(row.field(3)),
        electron_correction: parse_optional_f64(row.field(4)),
        electron_contamination: parse_optional_bool(row.field(5)),
        energy: row.field(6).to_string(),
    }
}
