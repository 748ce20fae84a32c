//! Bulk insert of mapped records
//!
//! Every call runs in one transaction and writes multi-row
//! `INSERT ... ON CONFLICT (<natural key>) DO NOTHING` statements, so loading
//! the same file twice leaves the table unchanged.

use sqlx::postgres::{PgPool, Postgres};
use sqlx::query_builder::Separated;
use sqlx::QueryBuilder;
use tracing::debug;

use crate::error::Result;
use crate::records::{
    BoulderKIndex, DscovrMag, MagnetometerReading, ParticleFlux, PlanetaryKIndex, RecordBatch,
    SolarRegion, XrayFlux,
};

/// Postgres rejects statements with more bind parameters than this
pub const MAX_BIND_PARAMETERS: usize = 65_535;

/// A record that can be written as one row of a multi-row INSERT
///
/// The table name is supplied by the caller since the particle and xray
/// record types are shared by several tables.
pub trait Insertable: Sync {
    /// Column list, in `bind_row` order
    const COLUMNS: &'static [&'static str];

    /// Natural key backing the table's unique constraint
    const CONFLICT_TARGET: &'static [&'static str];

    fn bind_row<'args>(&'args self, row: &mut Separated<'_, 'args, Postgres, &'static str>);
}

/// Rows per INSERT statement: `batch_size`, capped by the bind-parameter limit
pub fn rows_per_statement<T: Insertable>(batch_size: usize) -> usize {
    batch_size.clamp(1, MAX_BIND_PARAMETERS / T::COLUMNS.len())
}

/// Insert `records` into `table`, skipping rows whose natural key exists
///
/// Returns the number of rows actually inserted. Empty input is a no-op and
/// does not open a transaction.
pub async fn insert_records<T: Insertable>(
    pool: &PgPool,
    table: &str,
    records: &[T],
    batch_size: usize,
) -> Result<u64> {
    if records.is_empty() {
        return Ok(0);
    }

    let chunk_size = rows_per_statement::<T>(batch_size);
    if chunk_size < batch_size {
        debug!(table = table, batch_size, chunk_size, "Batch size capped by bind-parameter limit");
    }

    let mut tx = pool.begin().await?;
    let mut inserted = 0u64;

    for chunk in records.chunks(chunk_size) {
        let mut query_builder: QueryBuilder<'_, Postgres> =
            QueryBuilder::new(format!("INSERT INTO {} ({}) ", table, T::COLUMNS.join(", ")));

        query_builder.push_values(chunk, |mut b, record| record.bind_row(&mut b));
        query_builder.push(format!(" ON CONFLICT ({}) DO NOTHING", T::CONFLICT_TARGET.join(", ")));

        inserted += query_builder.build().execute(&mut *tx).await?.rows_affected();
    }

    tx.commit().await?;

    debug!(
        table = table,
        attempted = records.len(),
        inserted = inserted,
        "Bulk insert committed"
    );

    Ok(inserted)
}

/// Insert a mapped batch into its destination table
pub async fn insert_batch(pool: &PgPool, batch: &RecordBatch, batch_size: usize) -> Result<u64> {
    let table = batch.table_name();
    match batch {
        RecordBatch::BoulderKIndex(rows) => insert_records(pool, table, rows, batch_size).await,
        RecordBatch::DscovrMag(rows) => insert_records(pool, table, rows, batch_size).await,
        RecordBatch::Magnetometers(rows) => insert_records(pool, table, rows, batch_size).await,
        RecordBatch::PlanetaryKIndex(rows) => insert_records(pool, table, rows, batch_size).await,
        RecordBatch::SolarRegions(rows) => insert_records(pool, table, rows, batch_size).await,
        RecordBatch::ParticleFlux(_, rows) => insert_records(pool, table, rows, batch_size).await,
        RecordBatch::Xray(_, rows) => insert_records(pool, table, rows, batch_size).await,
    }
}

// Postgres has no 1-byte integer; i8 fields go into SMALLINT columns.
fn widen(value: Option<i8>) -> Option<i16> {
    value.map(i16::from)
}

impl Insertable for BoulderKIndex {
    const COLUMNS: &'static [&'static str] = &["time_tag", "k_index"];
    const CONFLICT_TARGET: &'static [&'static str] = &["time_tag"];

    fn bind_row<'args>(&'args self, row: &mut Separated<'_, 'args, Postgres, &'static str>) {
        row.push_bind(self.time_tag).push_bind(self.k_index);
    }
}

impl Insertable for DscovrMag {
    const COLUMNS: &'static [&'static str] = &[
        "time_tag", "bt", "bx_gse", "by_gse", "bz_gse", "theta_gse", "phi_gse", "bx_gsm",
        "by_gsm", "bz_gsm", "theta_gsm", "phi_gsm",
    ];
    const CONFLICT_TARGET: &'static [&'static str] = &["time_tag"];

    fn bind_row<'args>(&'args self, row: &mut Separated<'_, 'args, Postgres, &'static str>) {
        row.push_bind(self.time_tag)
            .push_bind(self.bt)
            .push_bind(self.bx_gse)
            .push_bind(self.by_gse)
            .push_bind(self.bz_gse)
            .push_bind(self.theta_gse)
            .push_bind(self.phi_gse)
            .push_bind(self.bx_gsm)
            .push_bind(self.by_gsm)
            .push_bind(self.bz_gsm)
            .push_bind(self.theta_gsm)
            .push_bind(self.phi_gsm);
    }
}

impl Insertable for MagnetometerReading {
    const COLUMNS: &'static [&'static str] =
        &["time_tag", "satellite", "he", "hp", "hn", "total", "arcjet_flag"];
    const CONFLICT_TARGET: &'static [&'static str] = &["time_tag", "satellite"];

    fn bind_row<'args>(&'args self, row: &mut Separated<'_, 'args, Postgres, &'static str>) {
        row.push_bind(self.time_tag)
            .push_bind(i16::from(self.satellite))
            .push_bind(self.he)
            .push_bind(self.hp)
            .push_bind(self.hn)
            .push_bind(self.total)
            .push_bind(self.arcjet_flag);
    }
}

impl Insertable for PlanetaryKIndex {
    const COLUMNS: &'static [&'static str] = &["time_tag", "kp_index", "estimated_kp", "kp"];
    const CONFLICT_TARGET: &'static [&'static str] = &["time_tag"];

    fn bind_row<'args>(&'args self, row: &mut Separated<'_, 'args, Postgres, &'static str>) {
        row.push_bind(self.time_tag)
            .push_bind(i16::from(self.kp_index))
            .push_bind(self.estimated_kp)
            .push_bind(self.kp.as_deref());
    }
}

impl Insertable for SolarRegion {
    const COLUMNS: &'static [&'static str] = &[
        "observed_date",
        "region",
        "latitude",
        "longitude",
        "location",
        "carrington_longitude",
        "old_carrington_longitude",
        "area",
        "spot_class",
        "extent",
        "number_spots",
        "mag_class",
        "mag_string",
        "status",
        "c_xray_events",
        "m_xray_events",
        "x_xray_events",
        "proton_events",
        "s_flares",
        "impulse_flares_1",
        "impulse_flares_2",
        "impulse_flares_3",
        "impulse_flares_4",
        "protons",
        "c_flare_probability",
        "m_flare_probability",
        "x_flare_probability",
        "proton_probability",
        "first_date",
    ];
    const CONFLICT_TARGET: &'static [&'static str] = &["observed_date", "region"];

    fn bind_row<'args>(&'args self, row: &mut Separated<'_, 'args, Postgres, &'static str>) {
        row.push_bind(self.observed_date)
            .push_bind(self.region)
            .push_bind(self.latitude)
            .push_bind(self.longitude)
            .push_bind(self.location.as_deref())
            .push_bind(self.carrington_longitude)
            .push_bind(self.old_carrington_longitude)
            .push_bind(self.area)
            .push_bind(self.spot_class.as_deref())
            .push_bind(self.extent)
            .push_bind(self.number_spots)
            .push_bind(self.mag_class.as_deref())
            .push_bind(self.mag_string.as_deref())
            .push_bind(self.status.as_deref())
            .push_bind(widen(self.c_xray_events))
            .push_bind(widen(self.m_xray_events))
            .push_bind(widen(self.x_xray_events))
            .push_bind(self.proton_events.as_deref())
            .push_bind(widen(self.s_flares));

        for flares in self.impulse_flares {
            row.push_bind(widen(flares));
        }

        row.push_bind(self.protons.as_deref())
            .push_bind(widen(self.c_flare_probability))
            .push_bind(widen(self.m_flare_probability))
            .push_bind(widen(self.x_flare_probability))
            .push_bind(widen(self.proton_probability))
            .push_bind(self.first_date);
    }
}

impl Insertable for ParticleFlux {
    const COLUMNS: &'static [&'static str] =
        &["time_tag", "satellite", "flux", "energy", "yaw_flip", "channel"];
    const CONFLICT_TARGET: &'static [&'static str] = &["time_tag", "satellite", "energy"];

    fn bind_row<'args>(&'args self, row: &mut Separated<'_, 'args, Postgres, &'static str>) {
        row.push_bind(self.time_tag)
            .push_bind(i16::from(self.satellite))
            .push_bind(self.flux)
            .push_bind(self.energy.as_str())
            .push_bind(widen(self.yaw_flip))
            .push_bind(self.channel.as_deref());
    }
}

impl Insertable for XrayFlux {
    const COLUMNS: &'static [&'static str] = &[
        "time_tag",
        "satellite",
        "flux",
        "observed_flux",
        "electron_correction",
        "electron_contamination",
        "energy",
    ];
    const CONFLICT_TARGET: &'static [&'static str] = &["time_tag", "satellite", "energy"];

    fn bind_row<'args>(&'args self, row: &mut Separated<'_, 'args, Postgres, &'static str>) {
        row.push_bind(self.time_tag)
            .push_bind(i16::from(self.satellite))
            .push_bind(self.flux)
            .push_bind(self.observed_flux)
            .push_bind(self.electron_correction)
            .push_bind(self.electron_contamination)
            .push_bind(self.energy.as_str());
    }
}
