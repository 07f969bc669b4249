use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgConnection;
use time::OffsetDateTime;
use tracing::debug;

use crate::application::repos::{ImageMutator, ImageRepository, RepoError};
use crate::domain::account::Account;
use crate::domain::error::DomainError;
use crate::domain::image::{Image, ImageDraft, Installer, Repo, RepoRecord};
use crate::domain::timing::Timestamps;

use super::{PostgresRepositories, map_sqlx_error};

const SELECT_IMAGE: &str = r#"
    SELECT id, uuid, name, description, distribution, status, version, output_types,
           created_at, updated_at, deleted_at
    FROM images
"#;

const DELETE_CHILDREN: [&str; 5] = [
    "DELETE FROM image_users WHERE image_id = $1",
    "DELETE FROM image_installers WHERE image_id = $1",
    "DELETE FROM image_tags WHERE image_id = $1",
    "DELETE FROM image_packages WHERE image_id = $1",
    "DELETE FROM image_repos WHERE image_id = $1",
];

#[derive(sqlx::FromRow)]
struct ImageRow {
    id: i64,
    uuid: String,
    name: String,
    description: String,
    distribution: String,
    status: String,
    version: i32,
    output_types: Vec<String>,
    created_at: Option<OffsetDateTime>,
    updated_at: Option<OffsetDateTime>,
    deleted_at: Option<OffsetDateTime>,
}

#[derive(sqlx::FromRow)]
struct UserRow {
    image_id: i64,
    username: String,
    ssh_key: String,
}

#[derive(sqlx::FromRow)]
struct InstallerRow {
    image_id: i64,
    iso_url: String,
    compose_job_id: String,
    checksum: String,
}

#[derive(sqlx::FromRow)]
struct NamedRow {
    image_id: i64,
    name: String,
}

#[derive(sqlx::FromRow)]
struct RepoRow {
    image_id: i64,
    name: String,
    url: String,
}

/// Child rows of a batch of images, keyed by `images.id`.
#[derive(Default)]
struct Children {
    users: HashMap<i64, UserRow>,
    installers: HashMap<i64, InstallerRow>,
    tags: HashMap<i64, Vec<String>>,
    packages: HashMap<i64, Vec<String>>,
    repos: HashMap<i64, Vec<RepoRow>>,
}

impl Children {
    async fn load(conn: &mut PgConnection, ids: &[i64]) -> Result<Self, RepoError> {
        let ids = ids.to_vec();
        let mut children = Children::default();

        let users: Vec<UserRow> = sqlx::query_as(
            "SELECT image_id, username, ssh_key FROM image_users WHERE image_id = ANY($1)",
        )
        .bind(&ids)
        .fetch_all(&mut *conn)
        .await
        .map_err(map_sqlx_error)?;
        children.users = users.into_iter().map(|row| (row.image_id, row)).collect();

        let installers: Vec<InstallerRow> = sqlx::query_as(
            r#"
            SELECT image_id, iso_url, compose_job_id, checksum
            FROM image_installers
            WHERE image_id = ANY($1)
            "#,
        )
        .bind(&ids)
        .fetch_all(&mut *conn)
        .await
        .map_err(map_sqlx_error)?;
        children.installers = installers
            .into_iter()
            .map(|row| (row.image_id, row))
            .collect();

        let tags: Vec<NamedRow> = sqlx::query_as(
            "SELECT image_id, name FROM image_tags WHERE image_id = ANY($1) ORDER BY image_id, name",
        )
        .bind(&ids)
        .fetch_all(&mut *conn)
        .await
        .map_err(map_sqlx_error)?;
        for row in tags {
            children.tags.entry(row.image_id).or_default().push(row.name);
        }

        let packages: Vec<NamedRow> = sqlx::query_as(
            r#"
            SELECT image_id, name
            FROM image_packages
            WHERE image_id = ANY($1)
            ORDER BY image_id, position
            "#,
        )
        .bind(&ids)
        .fetch_all(&mut *conn)
        .await
        .map_err(map_sqlx_error)?;
        for row in packages {
            children
                .packages
                .entry(row.image_id)
                .or_default()
                .push(row.name);
        }

        let repos: Vec<RepoRow> = sqlx::query_as(
            r#"
            SELECT image_id, name, url
            FROM image_repos
            WHERE image_id = ANY($1)
            ORDER BY image_id, position
            "#,
        )
        .bind(&ids)
        .fetch_all(&mut *conn)
        .await
        .map_err(map_sqlx_error)?;
        for row in repos {
            children.repos.entry(row.image_id).or_default().push(row);
        }

        Ok(children)
    }

    /// Rebuilds the aggregate through its validating constructor.
    /// Stored repositories that no longer validate are skipped.
    fn assemble(&mut self, row: ImageRow) -> Result<Image, RepoError> {
        let user = self.users.remove(&row.id).ok_or_else(|| RepoError::Integrity {
            message: format!("image `{}` has no user row", row.uuid),
        })?;
        let version = u32::try_from(row.version).map_err(|_| DomainError::InvalidVersion)?;
        let repos = self
            .repos
            .remove(&row.id)
            .unwrap_or_default()
            .into_iter()
            .filter(|repo| Repo::new(repo.name.as_str(), repo.url.as_str()).is_some())
            .map(|repo| RepoRecord::new(repo.name, repo.url))
            .collect();

        let mut image = Image::new(ImageDraft {
            uuid: row.uuid,
            name: row.name,
            description: row.description,
            distribution: row.distribution,
            status: row.status,
            username: user.username,
            ssh_key: user.ssh_key,
            output_types: row.output_types,
            tags: self.tags.remove(&row.id).unwrap_or_default(),
            packages: self.packages.remove(&row.id).unwrap_or_default(),
            version,
            repos,
        })?;
        image.set_timing(Timestamps::new(row.created_at, row.updated_at, row.deleted_at));
        if let Some(installer) = self.installers.remove(&row.id) {
            image.record_installer(Installer::new(
                installer.iso_url,
                installer.compose_job_id,
                installer.checksum,
            ));
        }
        Ok(image)
    }
}

fn stored_version(image: &Image) -> Result<i32, RepoError> {
    i32::try_from(image.version().get()).map_err(|_| RepoError::InvalidInput {
        message: format!("version {} does not fit the images table", image.version().get()),
    })
}

async fn insert_children(
    conn: &mut PgConnection,
    account: &Account,
    image_id: i64,
    image: &Image,
) -> Result<(), RepoError> {
    sqlx::query(
        "INSERT INTO image_users (image_id, account, username, ssh_key) VALUES ($1, $2, $3, $4)",
    )
    .bind(image_id)
    .bind(account.as_str())
    .bind(image.user().username())
    .bind(image.user().ssh_key())
    .execute(&mut *conn)
    .await
    .map_err(map_sqlx_error)?;

    let installer = image.installer();
    if !installer.is_zero() {
        sqlx::query(
            r#"
            INSERT INTO image_installers (image_id, account, iso_url, compose_job_id, checksum)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(image_id)
        .bind(account.as_str())
        .bind(installer.iso_url())
        .bind(installer.compose_job_id())
        .bind(installer.checksum())
        .execute(&mut *conn)
        .await
        .map_err(map_sqlx_error)?;
    }

    sqlx::query(
        r#"
        INSERT INTO image_tags (image_id, account, name)
        SELECT $1, $2, t.name FROM UNNEST($3::text[]) AS t(name)
        "#,
    )
    .bind(image_id)
    .bind(account.as_str())
    .bind(image.tags().to_vec())
    .execute(&mut *conn)
    .await
    .map_err(map_sqlx_error)?;

    sqlx::query(
        r#"
        INSERT INTO image_packages (image_id, account, position, name)
        SELECT $1, $2, t.ord::int, t.name
        FROM UNNEST($3::text[]) WITH ORDINALITY AS t(name, ord)
        "#,
    )
    .bind(image_id)
    .bind(account.as_str())
    .bind(image.packages().to_vec())
    .execute(&mut *conn)
    .await
    .map_err(map_sqlx_error)?;

    let (names, urls): (Vec<String>, Vec<String>) = image
        .repos()
        .iter()
        .map(|repo| (repo.name().to_string(), repo.url().to_string()))
        .unzip();
    sqlx::query(
        r#"
        INSERT INTO image_repos (image_id, account, position, name, url)
        SELECT $1, $2, t.ord::int, t.name, t.url
        FROM UNNEST($3::text[], $4::text[]) WITH ORDINALITY AS t(name, url, ord)
        "#,
    )
    .bind(image_id)
    .bind(account.as_str())
    .bind(names)
    .bind(urls)
    .execute(&mut *conn)
    .await
    .map_err(map_sqlx_error)?;

    Ok(())
}

async fn delete_children(conn: &mut PgConnection, image_id: i64) -> Result<(), RepoError> {
    for statement in DELETE_CHILDREN {
        sqlx::query(statement)
            .bind(image_id)
            .execute(&mut *conn)
            .await
            .map_err(map_sqlx_error)?;
    }
    Ok(())
}

#[async_trait]
impl ImageRepository for PostgresRepositories {
    async fn create(&self, account: &Account, image: &Image) -> Result<(), RepoError> {
        debug!(account = %account, uuid = image.uuid(), "postgres create image");
        let timing = image.timing();
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let image_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO images (
                account, uuid, name, description, distribution, status, version,
                output_types, created_at, updated_at, deleted_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id
            "#,
        )
        .bind(account.as_str())
        .bind(image.uuid())
        .bind(image.name().as_str())
        .bind(image.description())
        .bind(image.distribution().as_str())
        .bind(image.status().as_str())
        .bind(stored_version(image)?)
        .bind(image.output_types().to_strings())
        .bind(timing.created_at)
        .bind(timing.updated_at)
        .bind(timing.deleted_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        insert_children(&mut tx, account, image_id, image).await?;
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn get(&self, account: &Account, uuid: &str) -> Result<Image, RepoError> {
        debug!(account = %account, uuid, "postgres get image");
        let mut conn = self.pool().acquire().await.map_err(map_sqlx_error)?;

        let row: Option<ImageRow> = sqlx::query_as(&format!(
            "{SELECT_IMAGE} WHERE account = $1 AND uuid = $2 AND deleted_at IS NULL"
        ))
        .bind(account.as_str())
        .bind(uuid)
        .fetch_optional(&mut *conn)
        .await
        .map_err(map_sqlx_error)?;
        let row = row.ok_or(RepoError::NotFound)?;

        let mut children = Children::load(&mut conn, &[row.id]).await?;
        children.assemble(row)
    }

    async fn update(
        &self,
        account: &Account,
        uuid: &str,
        mutator: ImageMutator,
    ) -> Result<Image, RepoError> {
        debug!(account = %account, uuid, "postgres update image");
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let row: Option<ImageRow> = sqlx::query_as(&format!(
            "{SELECT_IMAGE} WHERE account = $1 AND uuid = $2 AND deleted_at IS NULL FOR UPDATE"
        ))
        .bind(account.as_str())
        .bind(uuid)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;
        let row = row.ok_or(RepoError::NotFound)?;
        let image_id = row.id;

        let mut children = Children::load(&mut tx, &[image_id]).await?;
        let current = children.assemble(row)?;
        // Dropping `tx` on a mutator error rolls the transaction back.
        let updated = mutator(current)?;
        let timing = updated.timing();

        sqlx::query(
            r#"
            UPDATE images
            SET name = $2,
                description = $3,
                distribution = $4,
                status = $5,
                version = $6,
                output_types = $7,
                created_at = $8,
                updated_at = $9
            WHERE id = $1
            "#,
        )
        .bind(image_id)
        .bind(updated.name().as_str())
        .bind(updated.description())
        .bind(updated.distribution().as_str())
        .bind(updated.status().as_str())
        .bind(stored_version(&updated)?)
        .bind(updated.output_types().to_strings())
        .bind(timing.created_at)
        .bind(timing.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        delete_children(&mut tx, image_id).await?;
        insert_children(&mut tx, account, image_id, &updated).await?;
        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(updated)
    }

    async fn delete(&self, account: &Account, uuid: &str) -> Result<(), RepoError> {
        debug!(account = %account, uuid, "postgres delete image");
        let now = OffsetDateTime::now_utc();
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let image_id: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE images
            SET deleted_at = $3, updated_at = $3
            WHERE account = $1 AND uuid = $2 AND deleted_at IS NULL
            RETURNING id
            "#,
        )
        .bind(account.as_str())
        .bind(uuid)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;
        let image_id = image_id.ok_or(RepoError::NotFound)?;

        delete_children(&mut tx, image_id).await?;
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn list(&self, account: &Account) -> Result<Vec<Image>, RepoError> {
        debug!(account = %account, "postgres list images");
        let mut conn = self.pool().acquire().await.map_err(map_sqlx_error)?;

        let rows: Vec<ImageRow> = sqlx::query_as(&format!(
            "{SELECT_IMAGE} WHERE account = $1 AND deleted_at IS NULL ORDER BY created_at, id"
        ))
        .bind(account.as_str())
        .fetch_all(&mut *conn)
        .await
        .map_err(map_sqlx_error)?;

        let ids: Vec<i64> = rows.iter().map(|row| row.id).collect();
        let mut children = Children::load(&mut conn, &ids).await?;
        rows.into_iter().map(|row| children.assemble(row)).collect()
    }
}
