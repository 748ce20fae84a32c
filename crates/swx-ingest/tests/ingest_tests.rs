//! End-to-end ingestion tests against Postgres
//!
//! Each test gets a fresh database from `#[sqlx::test]` with the workspace
//! migrations applied. Requires `DATABASE_URL`.

use sqlx::PgPool;
use std::fs;
use std::path::Path;
use swx_ingest::parsers::parse_date;
use swx_ingest::{IngestConfig, IngestError, Orchestrator, PgIngestStore, ProcessingStatus};
use tempfile::TempDir;

const DAY: &str = "2024-06-01";

fn write_csv(root: &Path, day: &str, tag: &str, contents: &str) {
    let dir = root.join(day);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(format!("{}_{}.csv", tag, day)), contents).unwrap();
}

fn orchestrator(pool: &PgPool, root: &TempDir) -> Orchestrator<PgIngestStore> {
    let config = IngestConfig::default().with_data_dir(root.path());
    Orchestrator::new(&config, PgIngestStore::new(pool.clone(), config.batch_size))
}

async fn count(pool: &PgPool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(pool)
        .await
        .unwrap()
}

// ============================================================================
// Single Date
// ============================================================================

#[sqlx::test(migrations = "../../migrations")]
async fn test_process_date_loads_boulder_file(pool: PgPool) -> anyhow::Result<()> {
    let root = TempDir::new()?;
    write_csv(root.path(), DAY, "boulder_k_index_1m", "time_tag,k_index\n2024-06-01T00:00:00Z,3.0\n");

    let orchestrator = orchestrator(&pool, &root);
    let date = parse_date(DAY).unwrap();
    let summary = orchestrator.process_date(date).await?;
    assert_eq!(summary.rows_inserted, 1);

    let k_index: Option<f64> = sqlx::query_scalar("SELECT k_index FROM boulder_k_index_1m")
        .fetch_one(&pool)
        .await?;
    assert_eq!(k_index, Some(3.0));

    let entry = orchestrator.store().processing_entry(date).await?.unwrap();
    assert_eq!(entry.files_count, 1);
    assert_eq!(entry.status, ProcessingStatus::Completed);

    let stored_date: String = sqlx::query_scalar("SELECT date FROM processing_log")
        .fetch_one(&pool)
        .await?;
    assert_eq!(stored_date, DAY);

    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_second_run_changes_nothing(pool: PgPool) -> anyhow::Result<()> {
    let root = TempDir::new()?;
    write_csv(root.path(), DAY, "boulder_k_index_1m", "time_tag,k_index\n2024-06-01T00:00:00Z,3.0\n");

    let orchestrator = orchestrator(&pool, &root);
    let date = parse_date(DAY).unwrap();
    orchestrator.process_date(date).await?;
    let first_entry = orchestrator.store().processing_entry(date).await?;

    // new rows for an already-logged date must not be picked up
    write_csv(
        root.path(),
        DAY,
        "boulder_k_index_1m",
        "time_tag,k_index\n2024-06-01T00:00:00Z,3.0\n2024-06-01T00:01:00Z,4.0\n",
    );
    let second = orchestrator.process_date(date).await?;

    assert_eq!(second.dates_skipped, 1);
    assert_eq!(second.rows_inserted, 0);
    assert_eq!(count(&pool, "boulder_k_index_1m").await, 1);
    assert_eq!(count(&pool, "processing_log").await, 1);
    assert_eq!(orchestrator.store().processing_entry(date).await?, first_entry);

    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_unknown_date_is_not_found(pool: PgPool) -> anyhow::Result<()> {
    let root = TempDir::new()?;
    write_csv(root.path(), DAY, "boulder_k_index_1m", "time_tag,k_index\n2024-06-01T00:00:00Z,3.0\n");

    let result = orchestrator(&pool, &root)
        .process_date(parse_date("2099-01-01").unwrap())
        .await;

    assert!(matches!(result, Err(IngestError::TargetDateNotFound(_))));
    assert_eq!(count(&pool, "processing_log").await, 0);

    Ok(())
}

// ============================================================================
// Whole Corpus
// ============================================================================

#[sqlx::test(migrations = "../../migrations")]
async fn test_process_all_loads_every_dataset(pool: PgPool) -> anyhow::Result<()> {
    let root = TempDir::new()?;
    let p = root.path();

    write_csv(
        p,
        DAY,
        "dscovr_mag_1s",
        "time_tag,bt,bx_gse,by_gse,bz_gse,theta_gse,phi_gse,bx_gsm,by_gsm,bz_gsm,theta_gsm,phi_gsm\n\
         2024-06-01 00:00:00.000,5.1,1.2,-3.4,2.2,25.5,289.4,1.2,-3.0,2.8,33.1,291.0\n\
         2024-06-01 00:00:01.000,5.0,,,,,,,,,,\n",
    );
    write_csv(
        p,
        DAY,
        "magnetometers-1-day",
        "time_tag,satellite,He,Hp,Hn,total,arcjet_flag\n\
         2024-06-01T00:00:00Z,16,12.1,95.3,-4.4,96.2,false\n\
         2024-06-01T00:00:00Z,18,11.8,94.9,-4.0,95.8,false\n",
    );
    write_csv(
        p,
        DAY,
        "planetary_k_index_1m",
        "time_tag,kp_index,estimated_kp,kp\n2024-06-01T00:00:00,2,2.33,2P\n",
    );
    write_csv(
        p,
        DAY,
        "solar_regions",
        "observed_date,region,latitude,longitude,location,carrington_longitude,old_carrington_longitude,area,spot_class,extent,number_spots,mag_class,mag_string,status,c_xray_events,m_xray_events,x_xray_events,proton_events,s_flares,impulse_flares_1,impulse_flares_2,impulse_flares_3,impulse_flares_4,protons,c_flare_probability,m_flare_probability,x_flare_probability,proton_probability,first_date\n\
         2024-06-01,13697,-17,5,S17E05,142,,350,Ekc,12,25,Beta-Gamma,,,3,1,0,,2,0,0,1,0,,75,30,5,1,2024-05-28\n",
    );
    write_csv(
        p,
        DAY,
        "primary-differential-protons-1-day",
        "time_tag,satellite,flux,energy,yaw_flip,channel\n\
         2024-06-01T00:00:00Z,18,0.12,1020-1860 keV,1,P1\n\
         2024-06-01T00:00:00Z,18,0.03,1900-2300 keV,1,P2A\n",
    );
    write_csv(
        p,
        DAY,
        "secondary-integral-electrons-1-day",
        "time_tag,satellite,flux,energy\n2024-06-01T00:00:00Z,16,250.5,>=2 MeV\n",
    );
    write_csv(
        p,
        DAY,
        "primary-xray-1-day",
        "time_tag,satellite,flux,observed_flux,electron_correction,electron_contamination,energy\n\
         2024-06-01T00:00:00Z,16,1.0e-7,1.1e-7,0.0,false,0.05-0.4nm\n\
         2024-06-01T00:00:00Z,16,2.3e-6,2.3e-6,0.0,false,0.1-0.8nm\n",
    );
    write_csv(p, DAY, "f10-7cm-flux", "time_tag,flux\n2024-06-01,180\n");

    write_csv(
        p,
        "2024-06-02",
        "boulder_k_index_1m",
        "time_tag,k_index\n2024-06-02T00:00:00Z,2.0\nbroken,1.0\n",
    );

    let summary = orchestrator(&pool, &root).process_all().await?;

    assert_eq!(summary.dates_processed, 2);
    assert_eq!(summary.files_failed, 0);
    assert_eq!(summary.files_loaded, 8);

    assert_eq!(count(&pool, "dscovr_mag_1s").await, 2);
    assert_eq!(count(&pool, "magnetometers_1_day").await, 2);
    assert_eq!(count(&pool, "planetary_k_index_1m").await, 1);
    assert_eq!(count(&pool, "solar_regions").await, 1);
    assert_eq!(count(&pool, "primary_differential_protons_1_day").await, 2);
    assert_eq!(count(&pool, "secondary_integral_electrons_1_day").await, 1);
    assert_eq!(count(&pool, "primary_xray_1_day").await, 2);
    assert_eq!(count(&pool, "boulder_k_index_1m").await, 1);
    assert_eq!(count(&pool, "processing_log").await, 2);

    let (region, first_date): (i16, Option<chrono::DateTime<chrono::Utc>>) =
        sqlx::query_as("SELECT region, first_date FROM solar_regions")
            .fetch_one(&pool)
            .await?;
    assert_eq!(region, 13697);
    assert!(first_date.is_some());

    let files: i32 = sqlx::query_scalar("SELECT files_count FROM processing_log WHERE date = $1")
        .bind(DAY)
        .fetch_one(&pool)
        .await?;
    assert_eq!(files, 7);

    Ok(())
}
