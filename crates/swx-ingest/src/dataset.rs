//! Dataset kinds
//!
//! A CSV file's kind is derived from its name once, at the file boundary,
//! and every later step (mapping, loading, skipping) matches on the resulting
//! [`DatasetKind`].

use std::fmt;

/// Which GOES satellite of the pair produced the series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SatelliteRole {
    Primary,
    Secondary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Species {
    Protons,
    Electrons,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Aggregation {
    Differential,
    Integral,
}

/// One particle-flux series: species x satellite x spectrum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParticleChannel {
    pub species: Species,
    pub role: SatelliteRole,
    pub aggregation: Aggregation,
}

impl ParticleChannel {
    pub fn new(species: Species, role: SatelliteRole, aggregation: Aggregation) -> Self {
        Self {
            species,
            role,
            aggregation,
        }
    }

    /// Differential proton files carry two extra columns (yaw flip, channel)
    pub fn has_channel_columns(&self) -> bool {
        self.species == Species::Protons && self.aggregation == Aggregation::Differential
    }

    /// e.g. `primary_differential_protons_1_day`
    pub fn table_name(&self) -> &'static str {
        use Aggregation::*;
        use SatelliteRole::*;
        use Species::*;

        match (self.role, self.aggregation, self.species) {
            (Primary, Differential, Protons) => "primary_differential_protons_1_day",
            (Primary, Integral, Protons) => "primary_integral_protons_1_day",
            (Secondary, Differential, Protons) => "secondary_differential_protons_1_day",
            (Secondary, Integral, Protons) => "secondary_integral_protons_1_day",
            (Primary, Differential, Electrons) => "primary_differential_electrons_1_day",
            (Primary, Integral, Electrons) => "primary_integral_electrons_1_day",
            (Secondary, Differential, Electrons) => "secondary_differential_electrons_1_day",
            (Secondary, Integral, Electrons) => "secondary_integral_electrons_1_day",
        }
    }
}

/// Multi-year aggregate products published alongside the daily files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LongPeriodProduct {
    PredictedSolarCycle,
    ObservedSolarCycleIndices,
    F107cmFlux,
}

/// Every dataset the pipeline knows how to handle, plus `Unknown`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DatasetKind {
    BoulderKIndex1m,
    DscovrMag1s,
    Magnetometers1Day,
    PlanetaryKIndex1m,
    SolarRegions,
    ParticleFlux(ParticleChannel),
    Xray(SatelliteRole),
    /// Cross-date data; never ingested per date
    LongPeriod(LongPeriodProduct),
    Unknown(String),
}

impl DatasetKind {
    /// Resolve a tag (file name without the `_<date>.csv` suffix)
    ///
    /// Exact tags win. Otherwise the tag is classified by family (`protons`,
    /// `electrons`, `xray`, checked in that order) and then by the
    /// satellite/spectrum marker inside the family.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "boulder_k_index_1m" => return DatasetKind::BoulderKIndex1m,
            "dscovr_mag_1s" => return DatasetKind::DscovrMag1s,
            "magnetometers-1-day" => return DatasetKind::Magnetometers1Day,
            "planetary_k_index_1m" => return DatasetKind::PlanetaryKIndex1m,
            "solar_regions" => return DatasetKind::SolarRegions,
            "predicted-solar-cycle" => {
                return DatasetKind::LongPeriod(LongPeriodProduct::PredictedSolarCycle)
            },
            "observed-solar-cycle-indices" => {
                return DatasetKind::LongPeriod(LongPeriodProduct::ObservedSolarCycleIndices)
            },
            // the archives spell it with a dash
            "f10.7cm-flux" | "f10-7cm-flux" => {
                return DatasetKind::LongPeriod(LongPeriodProduct::F107cmFlux)
            },
            _ => {},
        }

        let family = if tag.contains("protons") {
            Some(Species::Protons)
        } else if tag.contains("electrons") {
            Some(Species::Electrons)
        } else {
            None
        };

        if let Some(species) = family {
            return particle_channel(tag, species)
                .map(DatasetKind::ParticleFlux)
                .unwrap_or_else(|| DatasetKind::Unknown(tag.to_string()));
        }

        if tag.contains("xray") {
            if tag.contains("primary") {
                return DatasetKind::Xray(SatelliteRole::Primary);
            }
            if tag.contains("secondary") {
                return DatasetKind::Xray(SatelliteRole::Secondary);
            }
        }

        DatasetKind::Unknown(tag.to_string())
    }

    pub fn is_long_period(&self) -> bool {
        matches!(self, DatasetKind::LongPeriod(_))
    }

    /// Destination table, `None` for kinds that are never loaded
    pub fn table_name(&self) -> Option<&'static str> {
        match self {
            DatasetKind::BoulderKIndex1m => Some("boulder_k_index_1m"),
            DatasetKind::DscovrMag1s => Some("dscovr_mag_1s"),
            DatasetKind::Magnetometers1Day => Some("magnetometers_1_day"),
            DatasetKind::PlanetaryKIndex1m => Some("planetary_k_index_1m"),
            DatasetKind::SolarRegions => Some("solar_regions"),
            DatasetKind::ParticleFlux(channel) => Some(channel.table_name()),
            DatasetKind::Xray(role) => Some(xray_table_name(*role)),
            DatasetKind::LongPeriod(_) | DatasetKind::Unknown(_) => None,
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetKind::LongPeriod(product) => write!(f, "long-period:{:?}", product),
            DatasetKind::Unknown(tag) => write!(f, "unknown:{}", tag),
            other => f.write_str(other.table_name().unwrap_or("unknown")),
        }
    }
}

pub fn xray_table_name(role: SatelliteRole) -> &'static str {
    match role {
        SatelliteRole::Primary => "primary_xray_1_day",
        SatelliteRole::Secondary => "secondary_xray_1_day",
    }
}

fn particle_channel(tag: &str, species: Species) -> Option<ParticleChannel> {
    const MARKERS: [(&str, SatelliteRole, Aggregation); 4] = [
        ("primary-differential", SatelliteRole::Primary, Aggregation::Differential),
        ("primary-integral", SatelliteRole::Primary, Aggregation::Integral),
        ("secondary-differential", SatelliteRole::Secondary, Aggregation::Differential),
        ("secondary-integral", SatelliteRole::Secondary, Aggregation::Integral),
    ];

    MARKERS
        .iter()
        .find(|(marker, _, _)| tag.contains(marker))
        .map(|&(_, role, aggregation)| ParticleChannel::new(species, role, aggregation))
}
