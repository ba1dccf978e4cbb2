//! Maintenance actions behind the `--cr`, `--rm`, `--init` and `--test`
//! flags. Any combination runs in a fixed order (create, init, test,
//! remove) and the process exits without serving.

use anyhow::{Context, Result};
use serde_json::json;
use sqlx::PgPool;
use std::{fs, path::Path};

use crate::config::{AppConfig, SetupFlags};
use crate::services::auth::make_password;
use crate::services::pictures::PictureStore;

/// Tables in dependency order; dropped in reverse.
const TABLES: [&str; 11] = [
    "executive_role",
    "executive",
    "executive_role_map",
    "executive_token",
    "executive_image",
    "company",
    "landmark",
    "bus_stop",
    "route",
    "landmark_in_route",
    "bus",
];

/// Run the requested setup actions in order.
pub async fn run(
    flags: SetupFlags,
    config: &AppConfig,
    db: &PgPool,
    pictures: &PictureStore,
) -> Result<()> {
    if flags.create {
        create_all(db, pictures).await?;
    }
    if flags.init {
        init_sample_data(db).await?;
    }
    if flags.test {
        test_via_api(config).await?;
    }
    if flags.remove {
        remove_all(db, pictures).await?;
    }
    Ok(())
}

/// `--cr`: execute the DDL file and provision the picture bucket.
pub async fn create_all(db: &PgPool, pictures: &PictureStore) -> Result<()> {
    let path = "migrations/0001_init.sql";
    if !Path::new(path).exists() {
        anyhow::bail!("DDL file not found: {}", path);
    }
    let sql = fs::read_to_string(path)?;
    let statements = sql
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>();

    tracing::info!("Running {} DDL statements...", statements.len());
    for stmt in statements {
        tracing::debug!("Executing DDL: {}", stmt);
        sqlx::query(stmt).execute(db).await?;
    }

    pictures
        .ensure_bucket()
        .await
        .map_err(|err| anyhow::anyhow!("bucket provisioning failed: {}", err))?;
    tracing::info!("Tables and buckets created.");
    Ok(())
}

/// `--rm`: drop every table and purge the picture bucket.
pub async fn remove_all(db: &PgPool, pictures: &PictureStore) -> Result<()> {
    for table in TABLES.iter().rev() {
        sqlx::query(&format!("DROP TABLE IF EXISTS {} CASCADE", table))
            .execute(db)
            .await?;
    }
    if let Err(err) = pictures.purge_bucket().await {
        tracing::warn!("bucket removal failed (may not exist): {}", err);
    }
    tracing::info!("Tables and buckets removed.");
    Ok(())
}

/// `--init`: fixed sample data. Idempotent; reruns leave existing rows alone.
pub async fn init_sample_data(db: &PgPool) -> Result<()> {
    // Admin role: every permission. Guest role: read-only.
    sqlx::query(
        "INSERT INTO executive_role \
         (name, manage_ex_token, create_executive, update_executive, delete_executive, \
          create_landmark, update_landmark, delete_landmark, \
          create_bus_stop, update_bus_stop, delete_bus_stop, \
          create_company, update_company, delete_company, \
          create_route, update_route, delete_route, \
          create_bus, update_bus, delete_bus) \
         VALUES \
         ('Admin', true, true, true, true, true, true, true, true, true, true, \
          true, true, true, true, true, true, true, true, true), \
         ('Guest', false, false, false, false, false, false, false, false, false, false, \
          false, false, false, false, false, false, false, false, false) \
         ON CONFLICT (name) DO NOTHING",
    )
    .execute(db)
    .await?;

    let password = make_password("password")
        .map_err(|err| anyhow::anyhow!("hashing sample password: {}", err))?;
    sqlx::query(
        "INSERT INTO executive (username, password, gender, full_name, designation) \
         VALUES ($1, $2, 1, 'Administrator', 'Administrator'), \
                ($3, $2, 1, 'Guest', 'Guest') \
         ON CONFLICT (username) DO NOTHING",
    )
    .bind("admin")
    .bind(&password)
    .bind("guest")
    .execute(db)
    .await?;

    sqlx::query(
        "INSERT INTO executive_role_map (role_id, executive_id) \
         SELECT r.id, e.id FROM executive_role r, executive e \
         WHERE (r.name = 'Admin' AND e.username = 'admin') \
            OR (r.name = 'Guest' AND e.username = 'guest') \
         ON CONFLICT (executive_id) DO NOTHING",
    )
    .execute(db)
    .await?;

    tracing::info!("Sample roles, executives and mappings created.");
    Ok(())
}

/// `--test`: exercise a running server through its public API, logging in
/// as the `--init` admin and creating a small working data set.
pub async fn test_via_api(config: &AppConfig) -> Result<()> {
    let base = format!("http://127.0.0.1:{}", config.port);
    let client = reqwest::Client::new();

    let login: serde_json::Value = client
        .post(format!("{}{}", base, crate::urls::ACCOUNT_TOKEN))
        .form(&[("username", "admin"), ("password", "password")])
        .send()
        .await?
        .error_for_status()
        .context("admin login failed; did --init run?")?
        .json()
        .await?;
    let token = login["access_token"]
        .as_str()
        .context("login response missing access_token")?
        .to_string();
    let auth = format!("Bearer {}", token);

    // Two landmarks around Kochi, then a company, a route between them,
    // a bus and a bus stop.
    let landmark_a: serde_json::Value = client
        .post(format!("{}{}", base, crate::urls::LANDMARK))
        .header("Authorization", &auth)
        .form(&[
            ("name", "Aluva"),
            (
                "boundary",
                "POLYGON((76.34 10.10,76.36 10.10,76.36 10.12,76.34 10.12,76.34 10.10))",
            ),
            ("type", "3"),
        ])
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    let landmark_b: serde_json::Value = client
        .post(format!("{}{}", base, crate::urls::LANDMARK))
        .header("Authorization", &auth)
        .form(&[
            ("name", "Ernakulam South"),
            (
                "boundary",
                "POLYGON((76.28 9.96,76.30 9.96,76.30 9.98,76.28 9.98,76.28 9.96))",
            ),
            ("type", "4"),
        ])
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    client
        .post(format!("{}{}", base, crate::urls::BUS_STOP))
        .header("Authorization", &auth)
        .form(&[
            ("landmark_id", landmark_a["id"].to_string().as_str()),
            ("location", "POINT(76.35 10.11)"),
        ])
        .send()
        .await?
        .error_for_status()?;

    let company: serde_json::Value = client
        .post(format!("{}{}", base, crate::urls::COMPANY))
        .header("Authorization", &auth)
        .form(&[
            ("name", "Sample Transports"),
            ("address", "MG Road, Ernakulam"),
            ("contact_person", "Operator"),
            ("phone_number", "+91-9000000000"),
            ("email_id", "ops@sample.example"),
            ("location", "POINT(76.29 9.97)"),
        ])
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    let route: serde_json::Value = client
        .post(format!("{}{}", base, crate::urls::ROUTE))
        .header("Authorization", &auth)
        .form(&[
            ("company_id", company["id"].to_string().as_str()),
            ("name", "Aluva - South"),
            ("start_time", "06:30:00"),
        ])
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    client
        .post(format!("{}{}", base, crate::urls::LANDMARK_IN_ROUTE))
        .header("Authorization", &auth)
        .header("Content-Type", "application/json")
        .json(&json!({
            "route_id": route["id"],
            "landmarks": [
                {
                    "landmark_id": landmark_a["id"],
                    "distance_from_start": 0,
                    "arrival_delta": 0,
                    "departure_delta": 0
                },
                {
                    "landmark_id": landmark_b["id"],
                    "distance_from_start": 14000,
                    "arrival_delta": 2400,
                    "departure_delta": 2400
                }
            ]
        }))
        .send()
        .await?
        .error_for_status()?;

    client
        .post(format!("{}{}", base, crate::urls::BUS))
        .header("Authorization", &auth)
        .form(&[
            ("company_id", company["id"].to_string().as_str()),
            ("registration_number", "KL07AB1234"),
            ("name", "Sample Express"),
            ("capacity", "48"),
            ("manufactured_on", "2020-01-15T00:00:00Z"),
        ])
        .send()
        .await?
        .error_for_status()?;

    tracing::info!("API smoke data created against {}.", base);
    Ok(())
}
