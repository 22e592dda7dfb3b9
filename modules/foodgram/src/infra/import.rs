//! Seed data loader for `ingredients.csv` (`name,unit`) and `tags.csv`
//! (`name,color,slug`). Files have no header row; re-running is idempotent.

use std::fmt;
use std::path::Path;

use anyhow::Context;
use sea_orm::{ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter, Set};
use sea_orm_migration::MigratorTrait;
use tracing::{info, warn};

use super::storage::entity::{ingredient, tag};
use super::storage::Migrator;

pub const INGREDIENTS_FILE: &str = "ingredients.csv";
pub const TAGS_FILE: &str = "tags.csv";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FileReport {
    pub created: u64,
    pub existing: u64,
    pub skipped: u64,
}

impl fmt::Display for FileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} created, {} existing, {} skipped",
            self.created, self.existing, self.skipped
        )
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportReport {
    pub ingredients: FileReport,
    pub tags: FileReport,
}

/// Rows with exactly `width` fields; the rest are counted in `report.skipped`.
async fn read_rows(
    path: &Path,
    width: usize,
    report: &mut FileReport,
) -> anyhow::Result<Vec<Vec<String>>> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("read {}", path.display()))?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes.as_slice());

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("parse {}", path.display()))?;
        if record.len() != width {
            warn!(
                file = %path.display(),
                line = line + 1,
                fields = record.len(),
                expected = width,
                "skipping row with wrong field count"
            );
            report.skipped += 1;
            continue;
        }
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

async fn import_ingredients(db: &DatabaseConnection, path: &Path) -> anyhow::Result<FileReport> {
    let mut report = FileReport::default();
    for row in read_rows(path, 2, &mut report).await? {
        let (name, unit) = (&row[0], &row[1]);
        let found = ingredient::Entity::find()
            .filter(ingredient::Column::Name.eq(name.as_str()))
            .filter(ingredient::Column::MeasurementUnit.eq(unit.as_str()))
            .one(db)
            .await?;
        if found.is_some() {
            report.existing += 1;
            continue;
        }
        ingredient::Entity::insert(ingredient::ActiveModel {
            name: Set(name.clone()),
            measurement_unit: Set(unit.clone()),
            ..Default::default()
        })
        .exec_without_returning(db)
        .await
        .with_context(|| format!("insert ingredient {name}"))?;
        report.created += 1;
    }
    Ok(report)
}

async fn import_tags(db: &DatabaseConnection, path: &Path) -> anyhow::Result<FileReport> {
    let mut report = FileReport::default();
    for row in read_rows(path, 3, &mut report).await? {
        let (name, color, slug) = (&row[0], &row[1], &row[2]);
        let clashing = tag::Entity::find()
            .filter(
                Condition::any()
                    .add(tag::Column::Name.eq(name.as_str()))
                    .add(tag::Column::Color.eq(color.as_str()))
                    .add(tag::Column::Slug.eq(slug.as_str())),
            )
            .all(db)
            .await?;
        if clashing
            .iter()
            .any(|t| &t.name == name && &t.color == color && &t.slug == slug)
        {
            report.existing += 1;
            continue;
        }
        if !clashing.is_empty() {
            warn!(%name, %color, %slug, "skipping tag that conflicts with an existing one");
            report.skipped += 1;
            continue;
        }
        tag::Entity::insert(tag::ActiveModel {
            name: Set(name.clone()),
            color: Set(color.clone()),
            slug: Set(slug.clone()),
            ..Default::default()
        })
        .exec_without_returning(db)
        .await
        .with_context(|| format!("insert tag {slug}"))?;
        report.created += 1;
    }
    Ok(report)
}

/// Load both files from `dir` into an already migrated database.
pub async fn import_dir(db: &DatabaseConnection, dir: &Path) -> anyhow::Result<ImportReport> {
    let ingredients = import_ingredients(db, &dir.join(INGREDIENTS_FILE)).await?;
    info!(file = INGREDIENTS_FILE, %ingredients, "import finished");
    let tags = import_tags(db, &dir.join(TAGS_FILE)).await?;
    info!(file = TAGS_FILE, %tags, "import finished");
    Ok(ImportReport { ingredients, tags })
}

/// Apply migrations, then import seed data from `dir`.
pub async fn import_data(db: &modkit_db::DbHandle, dir: &Path) -> anyhow::Result<ImportReport> {
    Migrator::up(db.seaorm(), None)
        .await
        .context("apply foodgram migrations")?;
    import_dir(db.seaorm(), dir).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use modkit_db::{ConnectOpts, DbHandle};

    async fn db() -> DbHandle {
        DbHandle::connect("sqlite::memory:", ConnectOpts::default())
            .await
            .unwrap()
    }

    fn write_fixtures(dir: &Path, ingredients: &str, tags: &str) {
        std::fs::write(dir.join(INGREDIENTS_FILE), ingredients).unwrap();
        std::fs::write(dir.join(TAGS_FILE), tags).unwrap();
    }

    #[tokio::test]
    async fn skips_bad_rows_and_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        write_fixtures(
            dir.path(),
            "flour,g\negg,pcs\nbroken\nsalt,g,extra\n\"sugar, brown\",g\n",
            "Breakfast,#E26C2D,breakfast\nLunch,#49B64E,lunch\nDinner,#8775D2\n",
        );
        let db = db().await;

        let first = import_data(&db, dir.path()).await.unwrap();
        assert_eq!(
            first.ingredients,
            FileReport {
                created: 3,
                existing: 0,
                skipped: 2
            }
        );
        assert_eq!(first.tags.created, 2);
        assert_eq!(first.tags.skipped, 1);

        let second = import_data(&db, dir.path()).await.unwrap();
        assert_eq!(second.ingredients.created, 0);
        assert_eq!(second.ingredients.existing, 3);
        assert_eq!(second.tags.created, 0);
        assert_eq!(second.tags.existing, 2);

        let count = ingredient::Entity::find().all(db.seaorm()).await.unwrap().len();
        assert_eq!(count, 3);
    }

    #[tokio::test]
    async fn partial_tag_conflict_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write_fixtures(
            dir.path(),
            "",
            "Breakfast,#E26C2D,breakfast\nBrunch,#E26C2D,brunch\n",
        );
        let db = db().await;

        let report = import_data(&db, dir.path()).await.unwrap();
        assert_eq!(report.tags.created, 1);
        assert_eq!(report.tags.skipped, 1);
        assert_eq!(report.tags.to_string(), "1 created, 0 existing, 1 skipped");
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let db = db().await;
        let err = import_data(&db, dir.path()).await.unwrap_err();
        assert!(format!("{err:#}").contains(INGREDIENTS_FILE));
    }
}
